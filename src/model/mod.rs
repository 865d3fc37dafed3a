//! # Street Network Model
//!
//! Plain data types that cross every boundary: partitioner ↔ decomposer ↔
//! solver ↔ metric engine.
//!
//! Design rule: the graph is an immutable snapshot once handed to the engine.
//! Attribute tagging belongs to whoever built the graph, not to this crate.

pub mod node;
pub mod relationship;
pub mod value;
pub mod property_map;
pub mod graph;
pub mod partition;
pub mod bf16;

pub use node::{Node, NodeId};
pub use relationship::{Relationship, RelId};
pub use value::Value;
pub use property_map::PropertyMap;
pub use graph::{StreetGraph, Crs};
pub use partition::{Partition, Partitioning, StaticPartitioning};
pub use bf16::{f32_to_bf16, bf16_to_f32, BF16_INFINITY};
