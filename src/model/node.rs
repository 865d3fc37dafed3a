//! Node (intersection) in the street network.

use serde::{Deserialize, Serialize};
use super::{PropertyMap, Value};

/// Opaque node identifier (usually an OSM id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self { NodeId(id) }
}

/// A node of the street graph.
///
/// Coordinates live in the property map under `x`/`y` (projected) and
/// `lat`/`lon` (degrees), the way graph loaders deliver them. They are
/// validated only when a distance module reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub properties: PropertyMap,
}

impl Node {
    pub fn new(id: u64) -> Self {
        Self {
            id: NodeId(id),
            properties: PropertyMap::new(),
        }
    }

    /// Node with projected coordinates in a linear unit.
    pub fn planar(id: u64, x: f64, y: f64) -> Self {
        Self::new(id).with_property("x", x).with_property("y", y)
    }

    /// Node with geographic coordinates in degrees.
    pub fn geographic(id: u64, lat: f64, lon: f64) -> Self {
        Self::new(id).with_property("lat", lat).with_property("lon", lon)
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planar_node_has_coordinates() {
        let node = Node::planar(7, 1.5, -2.0);
        assert_eq!(node.id, NodeId(7));
        assert_eq!(node.get("x").and_then(Value::as_float), Some(1.5));
        assert_eq!(node.get("y").and_then(Value::as_float), Some(-2.0));
        assert!(node.get("lat").is_none());
    }
}
