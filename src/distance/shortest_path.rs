//! Dijkstra shortest paths on a sparse adjacency (measure `S`, and the
//! building block of every sub-problem of `N`).

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;

use hashbrown::HashMap;
use rayon::prelude::*;
use tracing::debug;

use super::DistanceMatrix;
use crate::model::bf16::f32_to_bf16;
use crate::model::{NodeId, Relationship, StreetGraph};
use crate::{Error, Result};

// ============================================================================
// Sparse adjacency (CSR)
// ============================================================================

/// Weighted directed adjacency over a local node list, compressed-row.
///
/// Local index `i` is the position of a node in the list the adjacency was
/// built from. Parallel edges collapse to their cheapest weight; edges with
/// an endpoint outside the list are dropped.
#[derive(Debug, Clone)]
pub struct SparseAdjacency {
    nodes: Vec<NodeId>,
    offsets: Vec<usize>,
    targets: Vec<usize>,
    weights: Vec<f64>,
}

impl SparseAdjacency {
    /// Build the adjacency of `graph` restricted to `nodes`.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if a node is unknown or listed twice, or an edge
    /// weight is non-numeric or negative.
    pub fn from_graph(graph: &StreetGraph, nodes: &[NodeId], weight: Option<&str>) -> Result<Self> {
        let mut local: HashMap<NodeId, usize> = HashMap::with_capacity(nodes.len());
        for (i, &id) in nodes.iter().enumerate() {
            if !graph.contains(id) {
                return Err(Error::InvalidInput(format!("node {id} is not in the graph")));
            }
            if local.insert(id, i).is_some() {
                return Err(Error::InvalidInput(format!("node {id} is listed twice")));
            }
        }

        let mut edges = Vec::new();
        for rel in graph.relationships() {
            let (Some(&u), Some(&v)) = (local.get(&rel.src), local.get(&rel.dst)) else {
                continue;
            };
            edges.push((u, v, edge_weight(rel, weight)?));
        }
        Ok(Self::from_local_edges(nodes.to_vec(), edges))
    }

    /// Build from edges already expressed in local indices.
    pub(crate) fn from_local_edges(
        nodes: Vec<NodeId>,
        edges: impl IntoIterator<Item = (usize, usize, f64)>,
    ) -> Self {
        let mut cheapest: HashMap<(usize, usize), f64> = HashMap::new();
        for (u, v, w) in edges {
            if u == v {
                continue;
            }
            cheapest
                .entry((u, v))
                .and_modify(|old| *old = old.min(w))
                .or_insert(w);
        }

        let mut edges: Vec<((usize, usize), f64)> = cheapest.into_iter().collect();
        edges.sort_unstable_by_key(|&(key, _)| key);

        let mut offsets = vec![0usize; nodes.len() + 1];
        for &((u, _), _) in &edges {
            offsets[u + 1] += 1;
        }
        for i in 0..nodes.len() {
            offsets[i + 1] += offsets[i];
        }
        let (targets, weights) = edges.into_iter().map(|((_, v), w)| (v, w)).unzip();

        Self { nodes, offsets, targets, weights }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.targets.len()
    }

    /// Global ids in local index order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub(crate) fn neighbors(&self, u: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.offsets[u]..self.offsets[u + 1];
        self.targets[range.clone()].iter().copied().zip(self.weights[range].iter().copied())
    }

    /// Single-source distances to every local node. Unreachable is `inf`.
    pub fn dijkstra(&self, source: usize) -> Vec<f64> {
        let mut dist = vec![f64::INFINITY; self.nodes.len()];
        let mut heap = BinaryHeap::new();

        dist[source] = 0.0;
        heap.push(State { cost: 0.0, node: source });

        while let Some(State { cost, node }) = heap.pop() {
            if cost > dist[node] {
                continue;
            }
            for (next, w) in self.neighbors(node) {
                let candidate = cost + w;
                if candidate < dist[next] {
                    dist[next] = candidate;
                    heap.push(State { cost: candidate, node: next });
                }
            }
        }
        dist
    }

    /// Distances from the first `n_sources` local nodes to all local nodes,
    /// as an `n_sources × node_count` matrix. Rows run in parallel.
    pub fn distances_from_prefix(&self, n_sources: usize) -> DistanceMatrix {
        let n_sources = n_sources.min(self.nodes.len());
        let rows: Vec<Vec<u16>> = (0..n_sources)
            .into_par_iter()
            .map(|s| self.dijkstra(s).into_iter().map(|d| f32_to_bf16(d as f32)).collect())
            .collect();
        DistanceMatrix::from_bf16_rows(rows, self.nodes.len())
    }
}

/// Resolve the cost of `rel` under `weight`, rejecting negative values.
pub(crate) fn edge_weight(rel: &Relationship, weight: Option<&str>) -> Result<f64> {
    let w = rel.weight(weight)?;
    if w < 0.0 {
        return Err(Error::InvalidInput(format!(
            "negative edge weights are not supported (edge {} has {w})", rel.id,
        )));
    }
    Ok(w)
}

// ============================================================================
// Priority queue entry
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct State {
    cost: f64,
    node: usize,
}

// Min-heap: flip the cost ordering, break ties on node index.
impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| self.node.cmp(&other.node))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for State {}

// ============================================================================
// All pairs
// ============================================================================

/// All-pairs shortest path distances on the full graph over `node_order`.
///
/// `weight` names the edge attribute used as cost; `None` counts hops.
pub fn shortest_path_matrix(
    graph: &StreetGraph,
    weight: Option<&str>,
    node_order: &[NodeId],
) -> Result<DistanceMatrix> {
    let start = Instant::now();
    let adjacency = SparseAdjacency::from_graph(graph, node_order, weight)?;
    let matrix = adjacency.distances_from_prefix(adjacency.node_count());
    debug!(
        nodes = adjacency.node_count(),
        edges = adjacency.edge_count(),
        weight = weight.unwrap_or("hops"),
        elapsed = ?start.elapsed(),
        "shortest path matrix calculated"
    );
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, RelId};

    fn chain(n: u64) -> StreetGraph {
        let mut g = StreetGraph::new();
        for i in 0..n {
            g.add_node(Node::new(i));
        }
        for i in 0..n - 1 {
            g.add_street(i, i + 1, 10.0).unwrap();
        }
        g
    }

    #[test]
    fn test_directed_chain() {
        let g = chain(4);
        let m = shortest_path_matrix(&g, Some("length"), &g.node_ids()).unwrap();
        assert_eq!(m.get(0, 3), 30.0);
        assert_eq!(m.get(3, 0), f32::INFINITY);
        assert_eq!(m.get(2, 2), 0.0);
    }

    #[test]
    fn test_hop_count_ignores_lengths() {
        let g = chain(4);
        let m = shortest_path_matrix(&g, None, &g.node_ids()).unwrap();
        assert_eq!(m.get(0, 3), 3.0);
        assert_eq!(m.get(1, 2), 1.0);
    }

    #[test]
    fn test_missing_weight_attribute_costs_one() {
        let g = chain(3);
        let m = shortest_path_matrix(&g, Some("travel_time"), &g.node_ids()).unwrap();
        assert_eq!(m.get(0, 2), 2.0);
    }

    #[test]
    fn test_parallel_edges_take_cheapest() {
        let mut g = chain(2);
        g.add_street(0, 1, 4.0).unwrap();
        g.add_street(0, 1, 7.0).unwrap();
        let m = shortest_path_matrix(&g, Some("length"), &g.node_ids()).unwrap();
        assert_eq!(m.get(0, 1), 4.0);
    }

    #[test]
    fn test_shortcut_beats_direct_edge() {
        let mut g = chain(3);
        g.add_street(0, 2, 50.0).unwrap();
        let m = shortest_path_matrix(&g, Some("length"), &g.node_ids()).unwrap();
        assert_eq!(m.get(0, 2), 20.0);
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut g = chain(2);
        g.add_street(1, 0, -1.0).unwrap();
        let err = shortest_path_matrix(&g, Some("length"), &g.node_ids()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(err.to_string().contains("negative"), "{err}");
    }

    #[test]
    fn test_non_numeric_weight_rejected() {
        let mut g = chain(2);
        let rel = Relationship::new(RelId(9), NodeId(1), NodeId(0)).with_property("length", "long");
        g.add_relationship(rel).unwrap();
        assert!(matches!(
            shortest_path_matrix(&g, Some("length"), &g.node_ids()),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_restricted_node_list_drops_outside_edges() {
        let mut g = chain(3);
        g.add_street(0, 2, 50.0).unwrap();
        let adjacency = SparseAdjacency::from_graph(&g, &[NodeId(2), NodeId(0)], Some("length")).unwrap();
        assert_eq!(adjacency.edge_count(), 1);
        let m = adjacency.distances_from_prefix(2);
        assert_eq!(m.get(1, 0), 50.0);
        assert_eq!(m.get(0, 1), f32::INFINITY);
    }

    #[test]
    fn test_prefix_is_rectangular() {
        let g = chain(4);
        let adjacency = SparseAdjacency::from_graph(&g, &g.node_ids(), None).unwrap();
        let m = adjacency.distances_from_prefix(2);
        assert_eq!((m.rows(), m.cols()), (2, 4));
        assert_eq!(m.get(1, 3), 2.0);
    }

    #[test]
    fn test_duplicate_and_unknown_nodes_rejected() {
        let g = chain(2);
        assert!(SparseAdjacency::from_graph(&g, &[NodeId(0), NodeId(0)], None).is_err());
        assert!(SparseAdjacency::from_graph(&g, &[NodeId(7)], None).is_err());
    }
}
