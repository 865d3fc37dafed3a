//! JSON persistence of metric statistics under the results directory.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use super::{Metric, MetricState};
use crate::config::MetricConfig;
use crate::{Error, Result};

impl Metric {
    /// `<results_dir>/<name>/<name>.metrics`
    ///
    /// # Errors
    ///
    /// `InvalidInput` unless `name` is a single plain path component.
    pub fn metrics_path(config: &MetricConfig, name: &str) -> Result<PathBuf> {
        let mut components = Path::new(name).components();
        let plain = matches!(components.next(), Some(Component::Normal(c)) if c == OsStr::new(name))
            && components.next().is_none()
            && !name.contains(['/', '\\']);
        if !plain {
            return Err(Error::InvalidInput(format!("invalid run name {name:?}")));
        }
        Ok(config.results_dir.join(name).join(format!("{name}.metrics")))
    }

    /// Write the statistics of this metric. Matrices are not saved.
    pub fn save(&self, config: &MetricConfig, name: &str) -> Result<PathBuf> {
        let path = Self::metrics_path(config, name)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        if path.exists() {
            debug!(path = %path.display(), "metrics already exist, overwriting");
        } else {
            debug!(path = %path.display(), "saving metrics");
        }
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(path)
    }

    /// Read metrics saved under `name`.
    ///
    /// # Errors
    ///
    /// `NotFound` if nothing was saved under that name.
    pub fn load(config: &MetricConfig, name: &str) -> Result<Metric> {
        let path = Self::metrics_path(config, name)?;
        let file = File::open(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                Error::NotFound(format!("no metrics at {}", path.display()))
            }
            _ => Error::Io(e),
        })?;
        let mut metric: Metric = serde_json::from_reader(BufReader::new(file))?;
        metric.state = if metric.has_results() {
            MetricState::StatisticsComputed
        } else {
            MetricState::Empty
        };
        debug!(path = %path.display(), "loaded metrics");
        Ok(metric)
    }
}
