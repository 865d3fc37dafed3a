//! # Metric engine
//!
//! Builds the three distance matrices of a partitioning and condenses them
//! into ratios.
//!
//! ```text
//! Empty ──compute──▶ MatricesComputed ──derive_statistics──▶ StatisticsComputed
//! ```
//!
//! Matrices are transient: they are never persisted and can be dropped with
//! [`Metric::clear_matrices`] once statistics exist. Statistics are the
//! durable output.

pub mod statistics;
mod persistence;

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::MetricConfig;
use crate::diagnostics::{distance_unit, DiagnosticsSink, DistanceDistribution, TracingSink};
use crate::distance::geometric::coordinates;
use crate::distance::shortest_path::edge_weight;
use crate::distance::{planar_distance_matrix, shortest_path_matrix, DistanceMatrix};
use crate::model::{NodeId, Partitioning, StreetGraph};
use crate::partition::decompose;
use crate::{Error, Result};

// ============================================================================
// Measures
// ============================================================================

/// One of the three distance regimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Measure {
    /// Euclidean
    E,
    /// Shortest path, full graph
    S,
    /// Shortest path, restricted to start cell, goal cell and unpartitioned streets
    N,
}

impl Measure {
    pub const ALL: [Measure; 3] = [Measure::E, Measure::S, Measure::N];

    pub fn as_str(self) -> &'static str {
        match self {
            Measure::E => "E",
            Measure::S => "S",
            Measure::N => "N",
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered pairs reported for directness.
pub const DIRECTNESS_PAIRS: [(Measure, Measure); 3] =
    [(Measure::E, Measure::S), (Measure::E, Measure::N), (Measure::S, Measure::N)];

/// Ordered pairs reported for global and local efficiency.
pub const EFFICIENCY_PAIRS: [(Measure, Measure); 3] =
    [(Measure::S, Measure::E), (Measure::N, Measure::E), (Measure::N, Measure::S)];

fn pair_key((a, b): (Measure, Measure)) -> String {
    format!("{a}{b}")
}

/// Optional values under fixed keys, in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureStats(Vec<(String, Option<f64>)>);

impl MeasureStats {
    fn with_keys(keys: impl IntoIterator<Item = String>) -> Self {
        Self(keys.into_iter().map(|k| (k, None)).collect())
    }

    fn measures() -> Self {
        Self::with_keys(Measure::ALL.iter().map(|m| m.to_string()))
    }

    fn pairs(pairs: &[(Measure, Measure)]) -> Self {
        Self::with_keys(pairs.iter().copied().map(pair_key))
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.iter().find(|(k, _)| k == key).and_then(|&(_, v)| v)
    }

    /// Set an existing key. Unknown keys are ignored.
    pub fn set(&mut self, key: &str, value: Option<f64>) {
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value;
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_all_none(&self) -> bool {
        self.0.iter().all(|(_, v)| v.is_none())
    }
}

// ============================================================================
// Metric
// ============================================================================

/// Lifecycle of a [`Metric`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MetricState {
    #[default]
    Empty,
    MatricesComputed,
    StatisticsComputed,
}

#[derive(Debug, Clone)]
struct DistanceMatrices {
    e: DistanceMatrix,
    s: DistanceMatrix,
    n: DistanceMatrix,
}

impl DistanceMatrices {
    fn get(&self, measure: Measure) -> &DistanceMatrix {
        match measure {
            Measure::E => &self.e,
            Measure::S => &self.s,
            Measure::N => &self.n,
        }
    }
}

/// Distance matrices and statistics of one partitioning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    /// Share of edge weight inside partitions.
    pub coverage: Option<f64>,
    /// Weakly connected components of the full graph.
    pub num_components: Option<usize>,
    pub avg_path_length: MeasureStats,
    pub directness: MeasureStats,
    pub global_efficiency: MeasureStats,
    pub local_efficiency: MeasureStats,
    /// Edge attribute the shortest paths were computed with; `None` for hops.
    pub weight: Option<String>,
    #[serde(skip)]
    matrices: Option<DistanceMatrices>,
    #[serde(skip)]
    state: MetricState,
}

impl Default for Metric {
    fn default() -> Self {
        Self::new()
    }
}

impl Metric {
    pub fn new() -> Self {
        Self {
            coverage: None,
            num_components: None,
            avg_path_length: MeasureStats::measures(),
            directness: MeasureStats::pairs(&DIRECTNESS_PAIRS),
            global_efficiency: MeasureStats::pairs(&EFFICIENCY_PAIRS),
            local_efficiency: MeasureStats::pairs(&EFFICIENCY_PAIRS),
            weight: None,
            matrices: None,
            state: MetricState::Empty,
        }
    }

    pub fn state(&self) -> MetricState {
        self.state
    }

    // ========================================================================
    // Computation
    // ========================================================================

    /// Build `E`, `S` and `N` for `partitioning`. Distributions go to a
    /// [`TracingSink`] when `config.make_plots` is set.
    pub fn compute(&mut self, partitioning: &dyn Partitioning, config: &MetricConfig) -> Result<()> {
        self.compute_with_sink(partitioning, config, &mut TracingSink)
    }

    /// Like [`compute`](Self::compute), with distance distributions sent to
    /// `sink` when `config.make_plots` is set.
    ///
    /// On error the metric is left untouched.
    pub fn compute_with_sink(
        &mut self,
        partitioning: &dyn Partitioning,
        config: &MetricConfig,
        sink: &mut dyn DiagnosticsSink,
    ) -> Result<()> {
        config.validate()?;
        let start = Instant::now();
        let graph = partitioning.graph();
        let order = partitioning.node_order();
        let weight = config.weight();
        let workers = config.resolved_worker_count();
        info!(
            nodes = order.len(),
            edges = graph.relationship_count(),
            weight = weight.unwrap_or("hops"),
            workers,
            "computing distance matrices"
        );

        let e = planar_distance_matrix(graph, &order)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|err| Error::WorkerError(format!("failed to build worker pool: {err}")))?;
        let s = pool.install(|| shortest_path_matrix(graph, weight, &order))?;

        let partitions = partitioning.partitions();
        let n = decompose(graph, &partitions, &order, weight, config.check_overlap)?
            .solve(workers, config.chunk_size)?;

        let coverage = if config.compute_coverage {
            let value = coverage(partitioning, weight)?;
            debug!(?value, "coverage");
            value
        } else {
            None
        };

        let matrices = DistanceMatrices { e, s, n };
        debug!(
            bytes = matrices.e.memory_bytes() + matrices.s.memory_bytes() + matrices.n.memory_bytes(),
            "distance matrices held in memory"
        );
        if config.make_plots {
            emit_distributions(graph, &order, &matrices, weight, sink)?;
        }

        *self = Self::new();
        self.weight = config.weight.clone();
        self.num_components = Some(graph.weakly_connected_components());
        self.coverage = coverage;
        self.matrices = Some(matrices);
        self.state = MetricState::MatricesComputed;
        info!(elapsed = ?start.elapsed(), "distance matrices computed");
        Ok(())
    }

    /// Fill average path lengths, directness and efficiencies from the
    /// matrices.
    pub fn derive_statistics(&mut self) -> Result<()> {
        let matrices = self.matrices.as_ref().ok_or_else(|| {
            Error::StateError("statistics need distance matrices, call compute first".into())
        })?;

        let mut avg_path_length = MeasureStats::measures();
        for m in Measure::ALL {
            let value = statistics::avg_path_length(matrices.get(m));
            debug!(measure = %m, ?value, "average path length");
            avg_path_length.set(m.as_str(), value);
        }

        let mut directness = MeasureStats::pairs(&DIRECTNESS_PAIRS);
        for pair in DIRECTNESS_PAIRS {
            let key = pair_key(pair);
            let value = statistics::directness(matrices.get(pair.0), matrices.get(pair.1))?;
            debug!(%key, ?value, "directness");
            directness.set(&key, value);
        }

        let mut global_efficiency = MeasureStats::pairs(&EFFICIENCY_PAIRS);
        let mut local_efficiency = MeasureStats::pairs(&EFFICIENCY_PAIRS);
        for pair in EFFICIENCY_PAIRS {
            let key = pair_key(pair);
            let (d1, d2) = (matrices.get(pair.0), matrices.get(pair.1));
            let global = statistics::global_efficiency(d1, d2)?;
            let local = statistics::local_efficiency(d1, d2)?;
            debug!(%key, ?global, ?local, "efficiency");
            global_efficiency.set(&key, global);
            local_efficiency.set(&key, local);
        }

        self.avg_path_length = avg_path_length;
        self.directness = directness;
        self.global_efficiency = global_efficiency;
        self.local_efficiency = local_efficiency;
        self.state = MetricState::StatisticsComputed;
        Ok(())
    }

    /// Drop the matrices. Statistics stay.
    pub fn clear_matrices(&mut self) {
        self.matrices = None;
        if self.state == MetricState::MatricesComputed {
            self.state = MetricState::Empty;
        }
    }

    pub fn has_matrices(&self) -> bool {
        self.matrices.is_some()
    }

    /// Whether coverage or any statistic is set.
    pub fn has_results(&self) -> bool {
        self.coverage.is_some()
            || !self.avg_path_length.is_all_none()
            || !self.directness.is_all_none()
            || !self.global_efficiency.is_all_none()
            || !self.local_efficiency.is_all_none()
    }

    // ========================================================================
    // Matrix access
    // ========================================================================

    /// `E`, `S` and `N` in that order.
    pub fn distance_matrices(&self) -> Result<[(Measure, &DistanceMatrix); 3]> {
        let m = self.require_matrices()?;
        Ok([(Measure::E, &m.e), (Measure::S, &m.s), (Measure::N, &m.n)])
    }

    pub fn distance_matrix(&self, measure: Measure) -> Result<&DistanceMatrix> {
        Ok(self.require_matrices()?.get(measure))
    }

    /// Entry-wise `(d_a - d_b) / d_b`; `inf` where either entry is zero or
    /// infinite.
    pub fn relative_difference(&self, a: Measure, b: Measure) -> Result<Vec<Vec<f32>>> {
        let m = self.require_matrices()?;
        let (da, db) = (m.get(a), m.get(b));
        Ok((0..da.rows())
            .map(|i| {
                da.row(i)
                    .zip(db.row(i))
                    .map(|(x, y)| {
                        if x == 0.0 || y == 0.0 || x.is_infinite() || y.is_infinite() {
                            f32::INFINITY
                        } else {
                            (x - y) / y
                        }
                    })
                    .collect()
            })
            .collect())
    }

    fn require_matrices(&self) -> Result<&DistanceMatrices> {
        self.matrices
            .as_ref()
            .ok_or_else(|| Error::StateError("No distance matrices available".into()))
    }

    /// `Metric(<display>)`.
    pub fn repr(&self) -> String {
        format!("Metric({self})")
    }
}

/// Ratio of edge weight inside partition subgraphs to edge weight of the
/// whole graph. `None` when the graph carries no weight at all.
pub fn coverage(partitioning: &dyn Partitioning, weight: Option<&str>) -> Result<Option<f64>> {
    let total = total_weight(partitioning.graph(), weight)?;
    if total == 0.0 {
        return Ok(None);
    }
    let mut inside = 0.0;
    for part in partitioning.partitions() {
        inside += total_weight(&part.subgraph, weight)?;
    }
    Ok(Some(inside / total))
}

fn total_weight(graph: &StreetGraph, weight: Option<&str>) -> Result<f64> {
    graph.relationships().map(|rel| edge_weight(rel, weight)).sum()
}

fn emit_distributions(
    graph: &StreetGraph,
    order: &[NodeId],
    matrices: &DistanceMatrices,
    weight: Option<&str>,
    sink: &mut dyn DiagnosticsSink,
) -> Result<()> {
    let (xs, ys) = coordinates(graph, order, ("x", "y"))?;
    let titles = [
        (Measure::E, "Distribution of euclidean distances", "km".to_string()),
        (Measure::S, "Distribution of shortest path lengths on full graph", distance_unit(weight)),
        (Measure::N, "Distribution of shortest path distances for the partitioning", distance_unit(weight)),
    ];
    for (measure, title, unit) in titles {
        sink.distance_distribution(&DistanceDistribution {
            title: title.to_string(),
            distances: matrices.get(measure).finite_values(),
            coords: (xs.clone(), ys.clone()),
            coord_title: "Coordinates of nodes".to_string(),
            labels: ("x".to_string(), "y".to_string()),
            unit,
        });
    }
    Ok(())
}

// ============================================================================
// Equality and display
// ============================================================================

impl PartialEq for Metric {
    fn eq(&self, other: &Self) -> bool {
        self.coverage == other.coverage
            && self.num_components == other.num_components
            && self.avg_path_length == other.avg_path_length
            && self.directness == other.directness
            && self.global_efficiency == other.global_efficiency
            && self.local_efficiency == other.local_efficiency
            && self.weight == other.weight
    }
}

/// Only fields that are set, e.g. `directness: ES: 1, EN: 2; `.
impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(v) = self.coverage {
            write!(f, "coverage: {v}; ")?;
        }
        if let Some(v) = self.num_components {
            write!(f, "num_components: {v}; ")?;
        }
        for (name, stats) in [
            ("avg_path_length", &self.avg_path_length),
            ("directness", &self.directness),
            ("global_efficiency", &self.global_efficiency),
            ("local_efficiency", &self.local_efficiency),
        ] {
            if stats.is_all_none() {
                continue;
            }
            let entries: Vec<String> = stats
                .iter()
                .filter_map(|(k, v)| v.map(|v| format!("{k}: {v}")))
                .collect();
            write!(f, "{name}: {}; ", entries.join(", "))?;
        }
        if let Some(w) = &self.weight {
            write!(f, "weight: {w}; ")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;
    use crate::model::{Crs, Node, StaticPartitioning};
    use pretty_assertions::assert_eq;

    /// Three nodes on a straight two-way street, 100 m apart.
    fn straight_street() -> StaticPartitioning {
        let mut g = StreetGraph::new().with_crs(Crs::Projected("EPSG:32632".into()));
        for i in 0..3u64 {
            g.add_node(Node::planar(i, 100.0 * i as f64, 0.0));
        }
        for (a, b) in [(0, 1), (1, 2)] {
            g.add_street(a, b, 100.0).unwrap();
            g.add_street(b, a, 100.0).unwrap();
        }
        StaticPartitioning::new(g)
    }

    fn config() -> MetricConfig {
        MetricConfig::default().with_worker_count(2)
    }

    #[test]
    fn test_statistics_need_matrices() {
        let mut metric = Metric::new();
        assert_eq!(metric.state(), MetricState::Empty);
        assert!(matches!(metric.derive_statistics(), Err(Error::StateError(_))));
        let err = metric.distance_matrices().unwrap_err();
        assert!(err.to_string().contains("No distance matrices available"));
    }

    #[test]
    fn test_straight_street_is_fully_direct() {
        let mut metric = Metric::new();
        metric.compute(&straight_street(), &config()).unwrap();
        assert_eq!(metric.state(), MetricState::MatricesComputed);
        assert_eq!(metric.num_components, Some(1));
        metric.derive_statistics().unwrap();
        assert_eq!(metric.state(), MetricState::StatisticsComputed);

        assert_eq!(metric.directness.get("ES"), Some(1.0));
        assert_eq!(metric.directness.get("SN"), Some(1.0));
        assert_eq!(metric.global_efficiency.get("NE"), Some(1.0));
        // (100 + 200 + 100) * 2 / 6
        let avg = metric.avg_path_length.get("S").unwrap();
        assert!((avg - 400.0 / 3.0).abs() < 1e-9, "{avg}");
    }

    #[test]
    fn test_clear_matrices_keeps_statistics() {
        let mut metric = Metric::new();
        metric.compute(&straight_street(), &config()).unwrap();
        metric.derive_statistics().unwrap();
        let before = metric.clone();
        metric.clear_matrices();
        assert!(!metric.has_matrices());
        assert_eq!(metric.state(), MetricState::StatisticsComputed);
        assert_eq!(metric, before);
        assert!(matches!(metric.relative_difference(Measure::S, Measure::E), Err(Error::StateError(_))));
    }

    #[test]
    fn test_relative_difference() {
        let mut metric = Metric::new();
        metric.compute(&straight_street(), &config()).unwrap();
        let rel = metric.relative_difference(Measure::E, Measure::S).unwrap();
        assert_eq!(rel[0][1], 0.0);
        assert_eq!(rel[1][1], f32::INFINITY);
    }

    #[test]
    fn test_unprojected_graph_leaves_metric_untouched() {
        let mut p = straight_street();
        p.graph = p.graph.with_crs(Crs::Geographic("EPSG:4326".into()));
        let mut metric = Metric::new();
        assert!(matches!(metric.compute(&p, &config()), Err(Error::NotProjected(_))));
        assert_eq!(metric.state(), MetricState::Empty);
        assert_eq!(metric, Metric::new());
    }

    #[test]
    fn test_coverage_and_distributions() {
        let p = straight_street().with_partition("cell", &[0, 1]);
        let mut sink = CollectingSink::default();
        let mut metric = Metric::new();
        metric
            .compute_with_sink(&p, &config().with_coverage(true).with_plots(true), &mut sink)
            .unwrap();
        // 200 of 400 length units run inside the cell
        assert_eq!(metric.coverage, Some(0.5));
        assert_eq!(sink.distributions.len(), 3);
        assert_eq!(sink.distributions[1].unit, "km");
        assert_eq!(sink.distributions[0].distances.len(), 9);
    }

    #[test]
    fn test_coverage_hops() {
        let p = straight_street().with_partition("cell", &[1, 2]);
        assert_eq!(coverage(&p, None).unwrap(), Some(0.5));
        assert_eq!(coverage(&StaticPartitioning::new(StreetGraph::new()), None).unwrap(), None);
    }

    #[test]
    fn test_display_only_set_fields() {
        let mut metric = Metric::new();
        assert_eq!(metric.to_string(), "");
        metric.directness.set("ES", Some(1.0));
        metric.directness.set("EN", Some(2.0));
        assert_eq!(metric.to_string(), "directness: ES: 1, EN: 2; ");
        metric.weight = Some("length".into());
        metric.num_components = Some(3);
        assert_eq!(
            metric.repr(),
            "Metric(num_components: 3; directness: ES: 1, EN: 2; weight: length; )"
        );
    }

    #[test]
    fn test_equality_ignores_matrices() {
        let mut computed = Metric::new();
        computed.compute(&straight_street(), &config()).unwrap();
        let mut bare = Metric::new();
        bare.weight = Some("length".into());
        bare.num_components = Some(1);
        assert_eq!(computed, bare);
        bare.coverage = Some(0.1);
        assert_ne!(computed, bare);
    }
}
