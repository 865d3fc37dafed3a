//! Parallel solve of sub-problems and assembly of the restricted matrix.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Instant;

use smallvec::SmallVec;
use tracing::{debug, info};

use super::BlockMapping;
use crate::distance::DistanceMatrix;
use crate::{Error, Result};

/// A unit of work the solver hands to a worker thread.
pub trait SolveTask: Send {
    /// Name used in logs and error messages.
    fn label(&self) -> &str;

    /// Local result and the blocks it fills in the global matrix.
    fn run(&self) -> (DistanceMatrix, SmallVec<[BlockMapping; 3]>);
}

/// A finished task on its way back to the assembler.
struct Solved {
    label: String,
    blocks: SmallVec<[BlockMapping; 3]>,
    matrix: DistanceMatrix,
}

type Outcome = std::result::Result<Solved, String>;

/// Solve every task on a pool of `worker_count` threads and scatter the
/// results into an `n × n` matrix initialised to `inf`.
///
/// Tasks are pulled from `tasks` lazily and handed out in chunks of
/// `chunk_size`. At most `worker_count * chunk_size` tasks are taken from
/// the input and not yet assembled at any time, which bounds the memory
/// held by pending work and finished results. Results are consumed in
/// completion order; the first failing task aborts the assembly.
///
/// # Errors
///
/// - `InvalidInput` if `worker_count` or `chunk_size` is zero, or a block
///   mapping does not fit the result it scatters.
/// - `WorkerError` if the pool cannot be built or a worker panics.
pub fn solve_and_assemble<T, I>(
    tasks: I,
    n: usize,
    worker_count: usize,
    chunk_size: usize,
) -> Result<DistanceMatrix>
where
    T: SolveTask + 'static,
    I: IntoIterator<Item = T>,
{
    if worker_count == 0 {
        return Err(Error::InvalidInput("worker_count must be at least 1".into()));
    }
    if chunk_size == 0 {
        return Err(Error::InvalidInput("chunk_size must be at least 1".into()));
    }

    let start = Instant::now();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(worker_count)
        .thread_name(|i| format!("restricted-sp-{i}"))
        .build()
        .map_err(|e| Error::WorkerError(format!("failed to build worker pool: {e}")))?;

    let capacity = worker_count.saturating_mul(chunk_size);
    info!(workers = worker_count, chunk_size, capacity, "solving restricted sub-problems");

    let (tx, rx) = mpsc::channel::<Outcome>();
    let abort = Arc::new(AtomicBool::new(false));
    let mut tasks = tasks.into_iter();
    let mut exhausted = false;
    let mut in_flight = 0usize;

    let mut matrix = DistanceMatrix::unreachable(n);
    let mut done = 0usize;
    loop {
        while !exhausted && in_flight + chunk_size <= capacity {
            let chunk: Vec<T> = tasks.by_ref().take(chunk_size).collect();
            if chunk.len() < chunk_size {
                exhausted = true;
            }
            if chunk.is_empty() {
                break;
            }
            in_flight += chunk.len();
            spawn_chunk(&pool, chunk, tx.clone(), Arc::clone(&abort));
        }
        if in_flight == 0 {
            break;
        }

        let outcome = rx.recv().map_err(|_| {
            Error::WorkerError(format!("workers stopped after {done} sub-problems"))
        })?;
        in_flight -= 1;
        let solved = outcome.map_err(|msg| {
            abort.store(true, Ordering::Relaxed);
            Error::WorkerError(msg)
        })?;
        for block in &solved.blocks {
            if !block.fits(&solved.matrix, n) {
                abort.store(true, Ordering::Relaxed);
                return Err(Error::InvalidInput(format!(
                    "block mapping of sub-problem {} does not fit its result", solved.label,
                )));
            }
            matrix.scatter_block(
                &solved.matrix,
                block.local_rows.clone(),
                block.local_cols.clone(),
                &block.global_rows,
                &block.global_cols,
            );
        }
        done += 1;
        debug!(label = %solved.label, done, in_flight, "sub-problem assembled");
    }

    info!(nodes = n, sub_problems = done, elapsed = ?start.elapsed(), "restricted distance matrix assembled");
    Ok(matrix)
}

/// Run `chunk` on one worker. Every task is dropped before its outcome is
/// sent, so a received outcome always means one task less in memory.
fn spawn_chunk<T: SolveTask + 'static>(
    pool: &rayon::ThreadPool,
    chunk: Vec<T>,
    tx: mpsc::Sender<Outcome>,
    abort: Arc<AtomicBool>,
) {
    pool.spawn(move || {
        for task in chunk {
            if abort.load(Ordering::Relaxed) {
                return;
            }
            let label = task.label().to_string();
            let outcome = match catch_unwind(AssertUnwindSafe(|| task.run())) {
                Ok((matrix, blocks)) => Ok(Solved { label, blocks, matrix }),
                Err(panic) => {
                    abort.store(true, Ordering::Relaxed);
                    Err(format!("sub-problem {label} panicked: {}", panic_message(&*panic)))
                }
            };
            drop(task);
            // receiver gone means the assembly already failed
            if tx.send(outcome).is_err() {
                return;
            }
        }
    });
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::SparseAdjacency;
    use crate::model::NodeId;
    use smallvec::smallvec;
    use std::sync::atomic::AtomicUsize;

    fn line(n: usize) -> SparseAdjacency {
        let nodes = (0..n as u64).map(NodeId).collect();
        SparseAdjacency::from_local_edges(nodes, (0..n - 1).map(|i| (i, i + 1, 1.0)))
    }

    /// Dijkstra on a directed line of `len` nodes.
    struct Line {
        label: &'static str,
        len: usize,
        n_sources: usize,
        blocks: SmallVec<[BlockMapping; 3]>,
    }

    impl SolveTask for Line {
        fn label(&self) -> &str {
            self.label
        }

        fn run(&self) -> (DistanceMatrix, SmallVec<[BlockMapping; 3]>) {
            (line(self.len).distances_from_prefix(self.n_sources), self.blocks.clone())
        }
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(matches!(solve_and_assemble(Vec::<Line>::new(), 2, 0, 1), Err(Error::InvalidInput(_))));
        assert!(matches!(solve_and_assemble(Vec::<Line>::new(), 2, 1, 0), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_no_sub_problems_is_all_unreachable() {
        let m = solve_and_assemble(Vec::<Line>::new(), 2, 2, 1).unwrap();
        assert_eq!(m.get(0, 1), f32::INFINITY);
    }

    #[test]
    fn test_chunking_does_not_change_result() {
        let make = || {
            vec![
                Line {
                    label: "first",
                    len: 2,
                    n_sources: 2,
                    blocks: smallvec![BlockMapping::new(0..2, 0..2, &[0, 1], &[0, 1])],
                },
                Line {
                    label: "second",
                    len: 3,
                    n_sources: 1,
                    blocks: smallvec![BlockMapping::new(0..1, 1..3, &[2], &[3, 0])],
                },
            ]
        };
        let a = solve_and_assemble(make(), 4, 1, 1).unwrap();
        let b = solve_and_assemble(make(), 4, 3, 2).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.get(0, 1), 1.0);
        assert_eq!(a.get(2, 3), 1.0);
        assert_eq!(a.get(2, 0), 2.0);
        assert_eq!(a.get(3, 3), f32::INFINITY);
    }

    #[test]
    fn test_mismatched_block_aborts_assembly() {
        // block asks for more rows than the solve produces
        let bad = Line {
            label: "broken",
            len: 2,
            n_sources: 1,
            blocks: smallvec![BlockMapping::new(0..2, 0..2, &[0, 1], &[0, 1])],
        };
        let err = solve_and_assemble(vec![bad], 2, 1, 1).unwrap_err();
        assert!(err.to_string().contains("broken"), "{err}");
    }

    // ========================================================================
    // Worker panics
    // ========================================================================

    /// Panics on the `fail_at`-th task, succeeds on the others.
    struct Fragile {
        index: usize,
        fail_at: usize,
    }

    impl SolveTask for Fragile {
        fn label(&self) -> &str {
            if self.index == self.fail_at { "exploding" } else { "steady" }
        }

        fn run(&self) -> (DistanceMatrix, SmallVec<[BlockMapping; 3]>) {
            if self.index == self.fail_at {
                panic!("weight table corrupted");
            }
            (DistanceMatrix::unreachable(1), SmallVec::new())
        }
    }

    #[test]
    fn test_worker_panic_aborts_assembly() {
        for (workers, chunk) in [(1, 1), (2, 3), (4, 1)] {
            let tasks = (0..12).map(|index| Fragile { index, fail_at: 5 });
            let err = solve_and_assemble(tasks, 3, workers, chunk).unwrap_err();
            assert!(matches!(err, Error::WorkerError(_)), "{err}");
            let msg = err.to_string();
            assert!(msg.contains("exploding"), "{msg}");
            assert!(msg.contains("weight table corrupted"), "{msg}");
        }
    }

    // ========================================================================
    // Bounded work in flight
    // ========================================================================

    #[derive(Default)]
    struct Live {
        now: AtomicUsize,
        peak: AtomicUsize,
    }

    /// Counts itself as live from creation until it is dropped.
    struct Tracked {
        index: usize,
        n: usize,
        live: Arc<Live>,
    }

    impl Tracked {
        fn new(index: usize, n: usize, live: &Arc<Live>) -> Self {
            let now = live.now.fetch_add(1, Ordering::SeqCst) + 1;
            live.peak.fetch_max(now, Ordering::SeqCst);
            Self { index, n, live: Arc::clone(live) }
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.live.now.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl SolveTask for Tracked {
        fn label(&self) -> &str {
            "tracked"
        }

        fn run(&self) -> (DistanceMatrix, SmallVec<[BlockMapping; 3]>) {
            std::thread::sleep(std::time::Duration::from_millis(1));
            let result = DistanceMatrix::from_rows(&[[1.0f32]]).unwrap();
            let col = (self.index + 1) % self.n;
            (result, smallvec![BlockMapping::new(0..1, 0..1, &[self.index], &[col])])
        }
    }

    #[test]
    fn test_live_tasks_bounded_by_workers_times_chunk() {
        let n = 40;
        for (workers, chunk) in [(1, 1), (2, 3), (3, 2)] {
            let live = Arc::new(Live::default());
            let tasks = (0..n).map(|i| Tracked::new(i, n, &live));
            let m = solve_and_assemble(tasks, n, workers, chunk).unwrap();

            let peak = live.peak.load(Ordering::SeqCst);
            assert!(peak <= workers * chunk, "peak {peak} with {workers} x {chunk}");
            assert_eq!(live.now.load(Ordering::SeqCst), 0);
            for i in 0..n {
                assert_eq!(m.get(i, (i + 1) % n), 1.0);
            }
        }
    }
}
