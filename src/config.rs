//! Explicit configuration for one metric computation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Upper bound for the default worker count.
pub const MAX_DEFAULT_WORKERS: usize = 32;

/// Settings for [`Metric::compute`](crate::Metric::compute) and persistence.
///
/// Every field has a default, so a config file only needs to list what it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricConfig {
    /// Root directory of persisted metrics.
    pub results_dir: PathBuf,
    /// Edge attribute used as cost; `None` counts hops.
    pub weight: Option<String>,
    /// Threads solving restricted sub-problems; `None` picks a default.
    pub worker_count: Option<usize>,
    /// Sub-problems handed to a worker at once.
    pub chunk_size: usize,
    /// Emit distance distributions to a diagnostics sink.
    pub make_plots: bool,
    /// Validate that partitions are node-disjoint before decomposing.
    pub check_overlap: bool,
    pub compute_coverage: bool,
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("results"),
            weight: Some("length".to_string()),
            worker_count: None,
            chunk_size: 1,
            make_plots: false,
            check_overlap: true,
            compute_coverage: false,
        }
    }
}

impl MetricConfig {
    /// Read a JSON config file. Missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                Error::NotFound(format!("config file {}", path.display()))
            }
            _ => Error::Io(e),
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        debug!(path = %path.display(), "loaded metric config");
        Ok(config)
    }

    pub fn with_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = dir.into();
        self
    }

    pub fn with_weight(mut self, weight: Option<&str>) -> Self {
        self.weight = weight.map(str::to_string);
        self
    }

    pub fn with_worker_count(mut self, workers: usize) -> Self {
        self.worker_count = Some(workers);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_plots(mut self, make_plots: bool) -> Self {
        self.make_plots = make_plots;
        self
    }

    pub fn with_overlap_check(mut self, check: bool) -> Self {
        self.check_overlap = check;
        self
    }

    pub fn with_coverage(mut self, compute: bool) -> Self {
        self.compute_coverage = compute;
        self
    }

    /// Reject settings no computation can run with.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidInput("chunk_size must be at least 1".into()));
        }
        if self.worker_count == Some(0) {
            return Err(Error::InvalidInput("worker_count must be at least 1".into()));
        }
        Ok(())
    }

    pub fn weight(&self) -> Option<&str> {
        self.weight.as_deref()
    }

    /// Configured worker count, or half the available parallelism capped at
    /// [`MAX_DEFAULT_WORKERS`] and never below 1.
    pub fn resolved_worker_count(&self) -> usize {
        match self.worker_count {
            Some(n) => n,
            None => {
                let available = std::thread::available_parallelism().map_or(1, |n| n.get());
                let workers = (available / 2).clamp(1, MAX_DEFAULT_WORKERS);
                debug!(available, workers, "using default worker count");
                workers
            }
        }
    }
}
