//! # superblock-metrics — How much longer do trips get inside superblocks?
//!
//! Evaluates a partitioning of a street network into low-traffic cells
//! ("superblocks") by comparing three all-pairs distance regimes:
//!
//! | Measure | Meaning |
//! |---------|---------|
//! | `E` | Straight-line distance between node coordinates |
//! | `S` | Shortest path on the full street graph |
//! | `N` | Shortest path that may only cross the start cell, the goal cell and unpartitioned streets |
//!
//! and deriving directness and efficiency ratios from them.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `Partitioning` is the contract between any partitioner and the engine
//! 2. **Immutable input**: the `StreetGraph` is a read-only snapshot during a computation
//! 3. **Independent sub-problems**: `N` is assembled from disjoint blocks solved in parallel
//! 4. **Explicit configuration**: `MetricConfig` is passed in, nothing is read at import time
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use superblock_metrics::{Metric, MetricConfig, Partitioning};
//!
//! # fn example(partitioning: &impl Partitioning) -> superblock_metrics::Result<()> {
//! let config = MetricConfig::default().with_worker_count(4);
//! let mut metric = Metric::new();
//! metric.compute(partitioning, &config)?;
//! metric.derive_statistics()?;
//! println!("{metric}");
//! metric.save(&config, "my_city")?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod distance;
pub mod partition;
pub mod metric;
pub mod diagnostics;
pub mod config;

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{
    Node, NodeId, Relationship, RelId, Value, PropertyMap,
    StreetGraph, Crs, Partition, Partitioning, StaticPartitioning,
};

// ============================================================================
// Re-exports: Distances
// ============================================================================

pub use distance::{
    DistanceMatrix,
    planar_distance_matrix, geographic_distance_matrix,
    shortest_path_matrix, SparseAdjacency,
};

// ============================================================================
// Re-exports: Partition machinery
// ============================================================================

pub use partition::{
    pairwise_overlap, decompose, solve_and_assemble,
    SubProblem, BlockMapping, Decomposition, SolveTask,
};

// ============================================================================
// Re-exports: Engine
// ============================================================================

pub use metric::{coverage, Metric, MetricState, Measure, MeasureStats};
pub use config::MetricConfig;
pub use diagnostics::{CollectingSink, DiagnosticsSink, DistanceDistribution, TracingSink};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Overlapping partitions: {0}")]
    Overlap(String),

    #[error("Graph is not projected: {0}")]
    NotProjected(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("State error: {0}")]
    StateError(String),

    #[error("Worker error: {0}")]
    WorkerError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
