//! # Diagnostics
//!
//! Data behind the distance plots. Rendering is left to whoever implements
//! [`DiagnosticsSink`]; [`TracingSink`] just logs a summary.

use tracing::info;

use crate::{Error, Result};

/// Unit label for distances under `weight`, in thousands.
pub fn distance_unit(weight: Option<&str>) -> String {
    match weight {
        None => "khops".to_string(),
        Some("length") => "km".to_string(),
        Some(other) => format!("k{other}"),
    }
}

/// Resolve the `(min, max)` range of a color or histogram axis.
///
/// Bounds given in `minmax` win; missing bounds come from the finite,
/// non-zero entries of `values`.
///
/// # Errors
///
/// `InvalidInput` if a bound has to be derived but `values` has no usable
/// entry, or if the resolved `min >= max`.
pub fn determine_minmax(values: &[f64], minmax: Option<(Option<f64>, Option<f64>)>) -> Result<(f64, f64)> {
    let (lo, hi) = minmax.unwrap_or((None, None));
    let (lo, hi) = match (lo, hi) {
        (Some(lo), Some(hi)) => (lo, hi),
        _ => {
            let mut usable = values.iter().copied().filter(|v| v.is_finite() && *v != 0.0).peekable();
            if usable.peek().is_none() {
                return Err(Error::InvalidInput("no values to determine min/max from".into()));
            }
            let (data_lo, data_hi) = usable
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(a, b), v| (a.min(v), b.max(v)));
            (lo.unwrap_or(data_lo), hi.unwrap_or(data_hi))
        }
    };
    if lo >= hi {
        return Err(Error::InvalidInput(format!(
            "minmax is ({lo}, {hi}), but the first value must be smaller than the second",
        )));
    }
    Ok((lo, hi))
}

// ============================================================================
// Distance distribution
// ============================================================================

/// Distances of one measure together with the node coordinates they were
/// computed over.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceDistribution {
    pub title: String,
    /// Finite distances in the base unit.
    pub distances: Vec<f32>,
    pub coords: (Vec<f64>, Vec<f64>),
    pub coord_title: String,
    /// Axis labels of `coords`.
    pub labels: (String, String),
    pub unit: String,
}

/// Equal-width histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// `bins + 1` edges, ascending.
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl DistanceDistribution {
    /// Histogram of the distances in thousands of the base unit.
    /// `None` without distances or with zero bins.
    pub fn histogram(&self, bins: usize) -> Option<Histogram> {
        if bins == 0 || self.distances.is_empty() {
            return None;
        }
        let scaled: Vec<f64> = self.distances.iter().map(|&d| f64::from(d) / 1000.0).collect();
        let lo = scaled.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = scaled.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let width = if hi > lo { (hi - lo) / bins as f64 } else { 1.0 };

        let edges = (0..=bins).map(|i| lo + width * i as f64).collect();
        let mut counts = vec![0usize; bins];
        for v in scaled {
            let bin = (((v - lo) / width) as usize).min(bins - 1);
            counts[bin] += 1;
        }
        Some(Histogram { edges, counts })
    }

    /// Smallest and largest distance.
    pub fn range(&self) -> Option<(f32, f32)> {
        let lo = self.distances.iter().copied().reduce(f32::min)?;
        let hi = self.distances.iter().copied().reduce(f32::max)?;
        Some((lo, hi))
    }
}

/// Receiver of diagnostic data produced while computing metrics.
pub trait DiagnosticsSink {
    fn distance_distribution(&mut self, distribution: &DistanceDistribution);
}

/// Logs a one-line summary per distribution.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn distance_distribution(&mut self, distribution: &DistanceDistribution) {
        let (min, max) = distribution.range().unwrap_or((f32::NAN, f32::NAN));
        let mean = if distribution.distances.is_empty() {
            f64::NAN
        } else {
            distribution.distances.iter().map(|&d| f64::from(d)).sum::<f64>()
                / distribution.distances.len() as f64
        };
        info!(
            title = %distribution.title,
            count = distribution.distances.len(),
            min,
            max,
            mean,
            unit = %distribution.unit,
            coords = %distribution.coord_title,
            "distance distribution"
        );
    }
}

/// Keeps every distribution, for callers that render them later.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    pub distributions: Vec<DistanceDistribution>,
}

impl DiagnosticsSink for CollectingSink {
    fn distance_distribution(&mut self, distribution: &DistanceDistribution) {
        self.distributions.push(distribution.clone());
    }
}
