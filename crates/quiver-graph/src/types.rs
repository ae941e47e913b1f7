//! Graph data types.

use serde::{Deserialize, Serialize};

/// A named graph node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphNode {
    /// Unique node name, used as the document `_id`.
    pub id: String,
    /// Free-form node kind, e.g. "person" or "company".
    #[serde(rename = "type")]
    pub node_type: String,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
        }
    }
}

/// A directed, labeled edge between two nodes.
///
/// Edges are identified by the full `(source, target, relation)` triple, so
/// two nodes may be connected by several differently-labeled edges.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub relation: String,
}

impl GraphEdge {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation: relation.into(),
        }
    }
}

/// A node reached by traversal, labeled with the depth it was first seen at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedNode {
    pub id: String,
    pub node_type: String,
    /// Hops from the start node; direct neighbors are depth 1.
    pub depth: u32,
}
