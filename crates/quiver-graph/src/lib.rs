//! Quiver Graph crate - knowledge-graph storage and bounded traversal.
//!
//! Persists directed labeled graphs as node documents with inlined edge
//! lists, and answers reachability queries with a cycle-safe breadth-first
//! expansion.

pub mod store;
pub mod types;

pub use store::GraphStore;
pub use types::{GraphEdge, GraphNode, RelatedNode};
