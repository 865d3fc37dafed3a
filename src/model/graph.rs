//! StreetGraph — directed, edge-weighted street network snapshot.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use super::{Node, NodeId, Relationship, RelId};
use crate::{Error, Result};

/// Coordinate reference system metadata of a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Crs {
    /// Projected system with a linear unit (e.g. UTM, `EPSG:32632`).
    Projected(String),
    /// Angular system, coordinates in degrees (e.g. `EPSG:4326`).
    Geographic(String),
}

impl Crs {
    pub fn is_projected(&self) -> bool {
        matches!(self, Crs::Projected(_))
    }

    pub fn name(&self) -> &str {
        match self {
            Crs::Projected(name) | Crs::Geographic(name) => name,
        }
    }
}

/// A street graph: nodes in insertion order plus directed relationships.
///
/// Insertion order is the graph-iteration order used whenever no explicit
/// node order is supplied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreetGraph {
    nodes: Vec<Node>,
    relationships: Vec<Relationship>,
    /// node id → position in `nodes`
    index: HashMap<NodeId, usize>,
    crs: Option<Crs>,
}

impl StreetGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = Some(crs);
        self
    }

    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Add a node. Re-adding an existing id replaces its properties.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id;
        match self.index.get(&id) {
            Some(&pos) => self.nodes[pos] = node,
            None => {
                self.index.insert(id, self.nodes.len());
                self.nodes.push(node);
            }
        }
        id
    }

    /// Add a directed relationship between two existing nodes.
    pub fn add_relationship(&mut self, rel: Relationship) -> Result<RelId> {
        for end in [rel.src, rel.dst] {
            if !self.index.contains_key(&end) {
                return Err(Error::InvalidInput(format!(
                    "relationship {} references unknown node {end}", rel.id,
                )));
            }
        }
        let id = rel.id;
        self.relationships.push(rel);
        Ok(id)
    }

    /// Convenience: add `src -> dst` with a `length` attribute.
    pub fn add_street(&mut self, src: u64, dst: u64, length: f64) -> Result<RelId> {
        let id = RelId(self.relationships.len() as u64);
        self.add_relationship(Relationship::new(id, NodeId(src), NodeId(dst)).with_property("length", length))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn relationship_count(&self) -> usize { self.relationships.len() }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.index.get(&id).map(|&pos| &self.nodes[pos])
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id).collect()
    }

    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.iter()
    }

    /// Subgraph induced by `keep`: those nodes and every relationship with
    /// both ends inside. CRS metadata is carried over.
    pub fn induced_subgraph(&self, keep: &hashbrown::HashSet<NodeId>) -> StreetGraph {
        let mut sub = StreetGraph { crs: self.crs.clone(), ..StreetGraph::default() };
        for node in self.nodes.iter().filter(|n| keep.contains(&n.id)) {
            sub.add_node(node.clone());
        }
        sub.relationships = self
            .relationships
            .iter()
            .filter(|r| keep.contains(&r.src) && keep.contains(&r.dst))
            .cloned()
            .collect();
        sub
    }

    /// Number of weakly connected components (edge direction ignored).
    pub fn weakly_connected_components(&self) -> usize {
        let mut parent: Vec<usize> = (0..self.nodes.len()).collect();

        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }

        let mut components = self.nodes.len();
        for rel in &self.relationships {
            let a = find(&mut parent, self.index[&rel.src]);
            let b = find(&mut parent, self.index[&rel.dst]);
            if a != b {
                parent[a] = b;
                components -= 1;
            }
        }
        components
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbrown::HashSet;

    fn two_islands() -> StreetGraph {
        let mut g = StreetGraph::new().with_crs(Crs::Projected("EPSG:32632".into()));
        for i in 0..5 {
            g.add_node(Node::planar(i, i as f64, 0.0));
        }
        g.add_street(0, 1, 1.0).unwrap();
        g.add_street(2, 1, 1.0).unwrap();
        g.add_street(3, 4, 1.0).unwrap();
        g
    }

    #[test]
    fn test_unknown_endpoint_rejected() {
        let mut g = two_islands();
        let err = g.add_street(0, 99, 1.0).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_readding_node_keeps_order() {
        let mut g = two_islands();
        g.add_node(Node::planar(2, 10.0, 10.0));
        assert_eq!(g.node_count(), 5);
        assert_eq!(g.node_ids(), vec![NodeId(0), NodeId(1), NodeId(2), NodeId(3), NodeId(4)]);
        assert_eq!(g.node(NodeId(2)).unwrap().get("x").unwrap().as_float(), Some(10.0));
    }

    #[test]
    fn test_weakly_connected_components() {
        assert_eq!(two_islands().weakly_connected_components(), 2);
        assert_eq!(StreetGraph::new().weakly_connected_components(), 0);
    }

    #[test]
    fn test_induced_subgraph() {
        let g = two_islands();
        let keep: HashSet<NodeId> = [NodeId(0), NodeId(1), NodeId(3)].into_iter().collect();
        let sub = g.induced_subgraph(&keep);
        assert_eq!(sub.node_count(), 3);
        assert_eq!(sub.relationship_count(), 1);
        assert!(sub.crs().unwrap().is_projected());
    }
}
