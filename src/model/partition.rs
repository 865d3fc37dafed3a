//! Partitions and the contract every partitioner implements.

use hashbrown::HashSet;

use super::{NodeId, StreetGraph};

/// A named low-traffic cell: its nodes and the subgraph the partitioner
/// assigned to it.
#[derive(Debug, Clone)]
pub struct Partition {
    pub name: String,
    pub nodes: HashSet<NodeId>,
    pub subgraph: StreetGraph,
}

impl Partition {
    /// Partition whose subgraph is the one induced by `nodes` on `graph`.
    pub fn induced(
        name: impl Into<String>,
        nodes: impl IntoIterator<Item = NodeId>,
        graph: &StreetGraph,
    ) -> Self {
        let nodes: HashSet<NodeId> = nodes.into_iter().collect();
        let subgraph = graph.induced_subgraph(&nodes);
        Self { name: name.into(), nodes, subgraph }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// What the metric engine needs from a partitioner.
///
/// Implementors own the street graph and the partitions; the engine only
/// reads them. `node_order` fixes the row/column order of every distance
/// matrix built for one computation.
pub trait Partitioning {
    /// The full street graph.
    fn graph(&self) -> &StreetGraph;

    /// Ordered node list used as matrix index.
    fn node_order(&self) -> Vec<NodeId>;

    /// Ordered partitions. Expected to be pairwise node-disjoint.
    fn partitions(&self) -> Vec<Partition>;
}

/// A partitioning given explicitly, e.g. loaded from disk or built in tests.
#[derive(Debug, Clone)]
pub struct StaticPartitioning {
    pub graph: StreetGraph,
    pub partitions: Vec<Partition>,
    /// `None` uses graph iteration order.
    pub order: Option<Vec<NodeId>>,
}

impl StaticPartitioning {
    pub fn new(graph: StreetGraph) -> Self {
        Self { graph, partitions: Vec::new(), order: None }
    }

    /// Add a partition induced by the nodes with the given raw ids.
    pub fn with_partition(mut self, name: impl Into<String>, nodes: &[u64]) -> Self {
        let part = Partition::induced(name, nodes.iter().map(|&id| NodeId(id)), &self.graph);
        self.partitions.push(part);
        self
    }

    pub fn with_order(mut self, order: Vec<NodeId>) -> Self {
        self.order = Some(order);
        self
    }
}

impl Partitioning for StaticPartitioning {
    fn graph(&self) -> &StreetGraph {
        &self.graph
    }

    fn node_order(&self) -> Vec<NodeId> {
        self.order.clone().unwrap_or_else(|| self.graph.node_ids())
    }

    fn partitions(&self) -> Vec<Partition> {
        self.partitions.clone()
    }
}
