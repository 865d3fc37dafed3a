//! Relationship (directed street segment) in the street network.

use serde::{Deserialize, Serialize};
use super::{NodeId, PropertyMap, Value};

/// Opaque relationship identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelId(pub u64);

impl std::fmt::Display for RelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A directed edge. Two-way streets are two relationships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelId,
    pub src: NodeId,
    pub dst: NodeId,
    pub properties: PropertyMap,
}

impl Relationship {
    pub fn new(id: RelId, src: NodeId, dst: NodeId) -> Self {
        Self {
            id,
            src,
            dst,
            properties: PropertyMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Resolve the traversal cost of this edge.
    ///
    /// `None` means hop count (every edge costs 1). A missing attribute also
    /// costs 1. Non-numeric and NaN values are rejected here; negative values
    /// are passed through so the caller can report them.
    pub fn weight(&self, attr: Option<&str>) -> crate::Result<f64> {
        let Some(attr) = attr else { return Ok(1.0) };
        match self.properties.get(attr) {
            None | Some(Value::Null) => Ok(1.0),
            Some(value) => match value.as_float() {
                Some(w) if !w.is_nan() => Ok(w),
                _ => Err(crate::Error::InvalidInput(format!(
                    "edge {} ({} -> {}) has non-numeric weight `{attr}` = {value}",
                    self.id, self.src, self.dst,
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel() -> Relationship {
        Relationship::new(RelId(1), NodeId(1), NodeId(2))
    }

    #[test]
    fn test_weight_resolution() {
        let r = rel().with_property("length", 12.5);
        assert_eq!(r.weight(Some("length")).unwrap(), 12.5);
        assert_eq!(r.weight(None).unwrap(), 1.0);
        // Missing attribute falls back to one hop
        assert_eq!(r.weight(Some("travel_time")).unwrap(), 1.0);
    }

    #[test]
    fn test_non_numeric_weight_rejected() {
        let r = rel().with_property("length", "long");
        assert!(matches!(r.weight(Some("length")), Err(crate::Error::InvalidInput(_))));
        let r = rel().with_property("length", f64::NAN);
        assert!(r.weight(Some("length")).is_err());
    }
}
