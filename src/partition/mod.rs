//! # Partition machinery
//!
//! The restricted matrix `N` only allows a trip to use streets of its start
//! cell, its goal cell and the unpartitioned network. Instead of one solve
//! per trip class, `N` is split into independent sub-problems whose result
//! blocks tile the matrix:
//!
//! | Label | Nodes | Sources | Writes |
//! |-------|-------|---------|--------|
//! | `Pi<>Pj` | `Pi ∪ Pj ∪ U` | `Pi ∪ Pj` | `Pi × Pj`, `Pj × Pi` |
//! | `Pi+Sparsified` | `Pi ∪ U` | `Pi ∪ U` | `Pi × (Pi ∪ U)`, `U × Pi` |
//! | `unp` | `U` | `U` | `U × U` |
//!
//! Every ordered pair of the matrix is written by exactly one sub-problem,
//! so the assembled matrix does not depend on completion order.

pub mod overlap;
pub mod decompose;
pub mod solver;

use std::ops::Range;
use std::sync::Arc;

use hashbrown::HashMap;
use smallvec::{smallvec, SmallVec};

use crate::distance::{DistanceMatrix, SparseAdjacency};
use crate::model::NodeId;

pub use decompose::decompose;
pub use overlap::pairwise_overlap;
pub use solver::{solve_and_assemble, SolveTask};

/// Where a rectangular block of a sub-problem result lands in the global
/// matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMapping {
    pub local_rows: Range<usize>,
    pub local_cols: Range<usize>,
    pub global_rows: Vec<usize>,
    pub global_cols: Vec<usize>,
}

impl BlockMapping {
    pub fn new(
        local_rows: Range<usize>,
        local_cols: Range<usize>,
        global_rows: &[usize],
        global_cols: &[usize],
    ) -> Self {
        debug_assert_eq!(local_rows.len(), global_rows.len());
        debug_assert_eq!(local_cols.len(), global_cols.len());
        Self {
            local_rows,
            local_cols,
            global_rows: global_rows.to_vec(),
            global_cols: global_cols.to_vec(),
        }
    }

    /// Whether the block can be read from `result` and written into an
    /// `n × n` matrix.
    pub fn fits(&self, result: &DistanceMatrix, n: usize) -> bool {
        self.local_rows.len() == self.global_rows.len()
            && self.local_cols.len() == self.global_cols.len()
            && self.local_rows.end <= result.rows()
            && self.local_cols.end <= result.cols()
            && self.global_rows.iter().chain(&self.global_cols).all(|&g| g < n)
    }

    /// Global `(row, col)` pairs written by this block.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.global_rows
            .iter()
            .flat_map(move |&r| self.global_cols.iter().map(move |&c| (r, c)))
    }
}

/// The street network of one decomposition, shared by all its
/// sub-problems. Indices are positions in the global node order.
#[derive(Debug)]
pub(crate) struct Network {
    /// Resolved edges over the whole node order.
    pub(crate) graph: SparseAdjacency,
    /// Sorted global indices of each partition.
    pub(crate) members: Vec<Vec<usize>>,
    /// Sorted global indices of the unpartitioned nodes.
    pub(crate) unpartitioned: Vec<usize>,
}

/// Which groups of the network a sub-problem covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scope {
    /// Two partitions plus the unpartitioned nodes.
    Pair(usize, usize),
    /// One partition plus the unpartitioned nodes.
    Sparsified(usize),
    Unpartitioned,
}

/// One independent shortest-path solve.
///
/// A sub-problem only names the groups it covers. Its adjacency is built
/// when it is solved and dropped right after, so a decomposition holds a
/// single copy of the network however many sub-problems it has.
#[derive(Debug, Clone)]
pub struct SubProblem {
    /// `"<start><><goal>"`, `"<part>+Sparsified"` or `"unp"`.
    pub label: String,
    scope: Scope,
    network: Arc<Network>,
}

impl SubProblem {
    pub(crate) fn new(label: String, scope: Scope, network: Arc<Network>) -> Self {
        Self { label, scope, network }
    }

    /// Global indices of the local nodes, group after group.
    fn groups(&self) -> SmallVec<[&[usize]; 3]> {
        let net = &*self.network;
        let u = net.unpartitioned.as_slice();
        match self.scope {
            Scope::Pair(i, j) => smallvec![net.members[i].as_slice(), net.members[j].as_slice(), u],
            Scope::Sparsified(i) => smallvec![net.members[i].as_slice(), u],
            Scope::Unpartitioned => smallvec![u],
        }
    }

    /// Dijkstra runs from local nodes `0..n_sources`.
    pub fn n_sources(&self) -> usize {
        let net = &*self.network;
        match self.scope {
            Scope::Pair(i, j) => net.members[i].len() + net.members[j].len(),
            Scope::Sparsified(i) => net.members[i].len() + net.unpartitioned.len(),
            Scope::Unpartitioned => net.unpartitioned.len(),
        }
    }

    /// Local node order.
    pub fn nodes(&self) -> Vec<NodeId> {
        let order = self.network.graph.nodes();
        self.groups().iter().flat_map(|g| g.iter().map(move |&i| order[i])).collect()
    }

    /// Induced subgraph in local node order. Only edges with both ends
    /// inside the covered groups survive.
    pub fn adjacency(&self) -> SparseAdjacency {
        let net = &*self.network;
        let locals: Vec<usize> = self.groups().iter().flat_map(|g| g.iter().copied()).collect();
        let local_of: HashMap<usize, usize> =
            locals.iter().enumerate().map(|(l, &g)| (g, l)).collect();
        let local_of = &local_of;

        let edges = locals.iter().enumerate().flat_map(move |(l, &g)| {
            net.graph
                .neighbors(g)
                .filter_map(move |(t, w)| Some((l, *local_of.get(&t)?, w)))
        });
        let order = net.graph.nodes();
        let nodes = locals.iter().map(|&g| order[g]).collect();
        SparseAdjacency::from_local_edges(nodes, edges)
    }

    /// Where the rows of the solved matrix land globally.
    pub fn blocks(&self) -> SmallVec<[BlockMapping; 3]> {
        let net = &*self.network;
        let u = &net.unpartitioned;
        let nu = u.len();
        match self.scope {
            Scope::Pair(i, j) => {
                let (pi, pj) = (&net.members[i], &net.members[j]);
                let (ni, nj) = (pi.len(), pj.len());
                smallvec![
                    BlockMapping::new(0..ni, ni..ni + nj, pi, pj),
                    BlockMapping::new(ni..ni + nj, 0..ni, pj, pi),
                ]
            }
            Scope::Sparsified(i) => {
                let pi = &net.members[i];
                let ni = pi.len();
                let cols: Vec<usize> = pi.iter().chain(u).copied().collect();
                smallvec![
                    BlockMapping::new(0..ni, 0..ni + nu, pi, &cols),
                    BlockMapping::new(ni..ni + nu, 0..ni, u, pi),
                ]
            }
            Scope::Unpartitioned => smallvec![BlockMapping::new(0..nu, 0..nu, u, u)],
        }
    }

    pub fn solve(&self) -> DistanceMatrix {
        self.adjacency().distances_from_prefix(self.n_sources())
    }
}

impl SolveTask for SubProblem {
    fn label(&self) -> &str {
        &self.label
    }

    fn run(&self) -> (DistanceMatrix, SmallVec<[BlockMapping; 3]>) {
        (self.solve(), self.blocks())
    }
}

/// All sub-problems of one restricted matrix.
#[derive(Debug, Clone)]
pub struct Decomposition {
    /// Side length of the global matrix.
    pub size: usize,
    /// Global indices of unpartitioned nodes, ascending.
    pub unpartitioned: Vec<usize>,
    pub sub_problems: Vec<SubProblem>,
}

impl Decomposition {
    pub fn len(&self) -> usize {
        self.sub_problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sub_problems.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.sub_problems.iter().map(|s| s.label.as_str()).collect()
    }

    pub fn get(&self, label: &str) -> Option<&SubProblem> {
        self.sub_problems.iter().find(|s| s.label == label)
    }

    /// Solve all sub-problems and assemble the global matrix.
    pub fn solve(self, worker_count: usize, chunk_size: usize) -> crate::Result<DistanceMatrix> {
        solve_and_assemble(self.sub_problems, self.size, worker_count, chunk_size)
    }
}
