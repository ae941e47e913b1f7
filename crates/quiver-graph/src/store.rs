//! Graph persistence and traversal over a document store.
//!
//! A graph is stored as one document per node under the node's id, with the
//! node's outgoing edges inlined as a `{relation, target}` array. There is
//! no separate edge collection and no incremental update: [`GraphStore::store_graph`]
//! always rewrites the whole collection.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use quiver_core::error::{QuiverError, Result};
use quiver_core::types::{Document, ID_FIELD};
use quiver_store::{DocumentStore, Filter};

use crate::types::{GraphEdge, GraphNode, RelatedNode};

/// Field on a node document holding the node kind.
pub const TYPE_FIELD: &str = "type";
/// Field on a node document holding the outgoing edge array.
pub const EDGES_FIELD: &str = "edges";
/// Field on an inlined edge entry naming the edge label.
pub const RELATION_FIELD: &str = "relation";
/// Field on an inlined edge entry naming the destination node id.
pub const TARGET_FIELD: &str = "target";

/// Knowledge-graph storage bound to one collection.
///
/// Independent of the search index lifecycle: graph collections carry no
/// vector index and traversal never touches embeddings.
pub struct GraphStore<S> {
    store: Arc<S>,
    database: String,
    collection: String,
}

impl<S: DocumentStore> GraphStore<S> {
    pub fn new(store: Arc<S>, database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            store,
            database: database.into(),
            collection: collection.into(),
        }
    }

    /// Replace the collection's contents with the given graph.
    ///
    /// Every edge source must name one of `nodes`; targets may dangle
    /// (point at ids with no node), in which case traversal ignores them.
    /// Duplicate `(source, target, relation)` triples collapse to one edge.
    ///
    /// The clear and the insert are two separate store operations, so a
    /// crash between them leaves the collection empty. Callers treat this
    /// as a batch load under a single-writer convention.
    pub async fn store_graph(&self, nodes: &[GraphNode], edges: &[GraphEdge]) -> Result<()> {
        let mut ids: HashSet<&str> = HashSet::with_capacity(nodes.len());
        for node in nodes {
            if !ids.insert(node.id.as_str()) {
                return Err(QuiverError::Graph(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
        }
        for edge in edges {
            if !ids.contains(edge.source.as_str()) {
                return Err(QuiverError::Graph(format!(
                    "edge source '{}' has no node",
                    edge.source
                )));
            }
        }

        let mut seen: HashSet<(&str, &str, &str)> = HashSet::with_capacity(edges.len());
        let mut outgoing: HashMap<&str, Vec<&GraphEdge>> = HashMap::new();
        for edge in edges {
            let key = (
                edge.source.as_str(),
                edge.target.as_str(),
                edge.relation.as_str(),
            );
            if seen.insert(key) {
                outgoing.entry(edge.source.as_str()).or_default().push(edge);
            }
        }

        let cleared = self
            .store
            .delete_many(&self.database, &self.collection, &Filter::new())
            .await?;

        let documents: Vec<Document> = nodes
            .iter()
            .map(|node| node_document(node, outgoing.get(node.id.as_str())))
            .collect();
        self.store
            .insert_many(&self.database, &self.collection, documents)
            .await?;

        info!(
            "Stored graph with {} nodes and {} edges in '{}.{}' (replaced {} documents)",
            nodes.len(),
            seen.len(),
            self.database,
            self.collection,
            cleared
        );
        Ok(())
    }

    /// Breadth-first expansion from `start_node_id` along outgoing edges.
    ///
    /// Returns every reachable node once, labeled with the minimum number
    /// of hops from the start; the start node itself is not included.
    /// Results come back in traversal order: depth 1 first, and within a
    /// depth in collection insertion order. `max_depth` caps the expansion;
    /// `None` walks until the frontier is exhausted, which the visited set
    /// guarantees even on cyclic graphs. An unknown start id yields an
    /// empty result rather than an error.
    pub async fn find_related(
        &self,
        start_node_id: &str,
        max_depth: Option<u32>,
    ) -> Result<Vec<RelatedNode>> {
        let start = self.fetch_nodes(&[start_node_id.to_string()]).await?;
        let Some(start_doc) = start.first() else {
            debug!(
                "Start node '{}' not found in '{}.{}'",
                start_node_id, self.database, self.collection
            );
            return Ok(Vec::new());
        };

        // `visited` holds every id already reported or enqueued, so each
        // node is expanded at the first depth that reaches it.
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(start_node_id.to_string());

        let mut frontier: Vec<String> = Vec::new();
        for target in edge_targets(start_doc) {
            if visited.insert(target.clone()) {
                frontier.push(target);
            }
        }

        let mut related: Vec<RelatedNode> = Vec::new();
        let mut depth: u32 = 0;
        while !frontier.is_empty() {
            depth += 1;
            if max_depth.is_some_and(|cap| depth > cap) {
                break;
            }

            let documents = self.fetch_nodes(&frontier).await?;
            let mut next: Vec<String> = Vec::new();
            for document in &documents {
                let Some((id, node_type)) = node_identity(document) else {
                    warn!(
                        "Skipping malformed graph node document in '{}.{}'",
                        self.database, self.collection
                    );
                    continue;
                };
                related.push(RelatedNode {
                    id,
                    node_type,
                    depth,
                });
                for target in edge_targets(document) {
                    if visited.insert(target.clone()) {
                        next.push(target);
                    }
                }
            }
            frontier = next;
        }

        debug!(
            "Traversal from '{}' reached {} nodes within depth {}",
            start_node_id,
            related.len(),
            depth
        );
        Ok(related)
    }

    /// Fetch the node documents for a batch of ids in one store round trip.
    async fn fetch_nodes(&self, ids: &[String]) -> Result<Vec<Document>> {
        let values: Vec<Value> = ids.iter().map(|id| Value::from(id.as_str())).collect();
        let filter = Filter::new().one_of(ID_FIELD, values);
        self.store
            .find(&self.database, &self.collection, &filter, None)
            .await
    }
}

fn node_document(node: &GraphNode, edges: Option<&Vec<&GraphEdge>>) -> Document {
    let edge_entries: Vec<Value> = edges
        .into_iter()
        .flatten()
        .map(|edge| {
            json!({
                RELATION_FIELD: edge.relation,
                TARGET_FIELD: edge.target,
            })
        })
        .collect();

    let mut document = Document::new();
    document.insert(ID_FIELD.to_string(), Value::from(node.id.as_str()));
    document.insert(TYPE_FIELD.to_string(), Value::from(node.node_type.as_str()));
    document.insert(EDGES_FIELD.to_string(), Value::Array(edge_entries));
    document
}

fn node_identity(document: &Document) -> Option<(String, String)> {
    let id = document.get(ID_FIELD)?.as_str()?.to_string();
    let node_type = document.get(TYPE_FIELD)?.as_str()?.to_string();
    Some((id, node_type))
}

fn edge_targets(document: &Document) -> Vec<String> {
    document
        .get(EDGES_FIELD)
        .and_then(Value::as_array)
        .map(|edges| {
            edges
                .iter()
                .filter_map(|edge| Some(edge.get(TARGET_FIELD)?.as_str()?.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_store::MemoryStore;

    fn make_store() -> (Arc<MemoryStore>, GraphStore<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let graph = GraphStore::new(Arc::clone(&store), "graph_db", "knowledge");
        (store, graph)
    }

    fn person(id: &str) -> GraphNode {
        GraphNode::new(id, "person")
    }

    async fn all_documents(store: &MemoryStore) -> Vec<Document> {
        store
            .find("graph_db", "knowledge", &Filter::new(), None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_store_graph_persists_nodes_with_inlined_edges() {
        let (store, graph) = make_store();
        let nodes = vec![
            person("alice"),
            person("bob"),
            GraphNode::new("acme", "company"),
        ];
        let edges = vec![
            GraphEdge::new("alice", "bob", "knows"),
            GraphEdge::new("bob", "acme", "works_at"),
        ];

        graph.store_graph(&nodes, &edges).await.unwrap();

        let documents = all_documents(&store).await;
        assert_eq!(documents.len(), 3);
        assert_eq!(documents[0][ID_FIELD], json!("alice"));
        assert_eq!(documents[0][TYPE_FIELD], json!("person"));
        assert_eq!(
            documents[0][EDGES_FIELD],
            json!([{"relation": "knows", "target": "bob"}])
        );
        // A node without outgoing edges still carries the array.
        assert_eq!(documents[2][EDGES_FIELD], json!([]));
    }

    #[tokio::test]
    async fn test_store_graph_rejects_unknown_edge_source() {
        let (store, graph) = make_store();
        let nodes = vec![person("alice")];
        let edges = vec![GraphEdge::new("ghost", "alice", "haunts")];

        let result = graph.store_graph(&nodes, &edges).await;
        assert!(matches!(result, Err(QuiverError::Graph(_))));
        // The graph is validated before anything is written.
        assert!(all_documents(&store).await.is_empty());
    }

    #[tokio::test]
    async fn test_store_graph_rejects_duplicate_node_ids() {
        let (_, graph) = make_store();
        let nodes = vec![person("alice"), GraphNode::new("alice", "company")];

        let result = graph.store_graph(&nodes, &[]).await;
        assert!(matches!(result, Err(QuiverError::Graph(_))));
    }

    #[tokio::test]
    async fn test_store_graph_deduplicates_repeated_edges() {
        let (store, graph) = make_store();
        let nodes = vec![person("alice"), person("bob")];
        let edges = vec![
            GraphEdge::new("alice", "bob", "knows"),
            GraphEdge::new("alice", "bob", "knows"),
            GraphEdge::new("alice", "bob", "likes"),
        ];

        graph.store_graph(&nodes, &edges).await.unwrap();

        let documents = all_documents(&store).await;
        // The duplicate triple collapses; the differently-labeled edge stays.
        assert_eq!(
            documents[0][EDGES_FIELD],
            json!([
                {"relation": "knows", "target": "bob"},
                {"relation": "likes", "target": "bob"},
            ])
        );
    }

    #[tokio::test]
    async fn test_store_graph_replaces_previous_contents() {
        let (store, graph) = make_store();
        graph
            .store_graph(&[person("alice"), person("bob")], &[])
            .await
            .unwrap();
        graph
            .store_graph(&[GraphNode::new("acme", "company")], &[])
            .await
            .unwrap();

        let documents = all_documents(&store).await;
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0][ID_FIELD], json!("acme"));
    }

    #[tokio::test]
    async fn test_find_related_follows_chain_with_depths() {
        let (_, graph) = make_store();
        let nodes = vec![person("alice"), person("bob"), GraphNode::new("acme", "company")];
        let edges = vec![
            GraphEdge::new("alice", "bob", "knows"),
            GraphEdge::new("bob", "acme", "works_at"),
        ];
        graph.store_graph(&nodes, &edges).await.unwrap();

        let related = graph.find_related("alice", None).await.unwrap();
        assert_eq!(
            related,
            vec![
                RelatedNode {
                    id: "bob".to_string(),
                    node_type: "person".to_string(),
                    depth: 1,
                },
                RelatedNode {
                    id: "acme".to_string(),
                    node_type: "company".to_string(),
                    depth: 2,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_find_related_terminates_on_cycle_with_min_depths() {
        let (_, graph) = make_store();
        let nodes = vec![person("a"), person("b"), person("c")];
        let edges = vec![
            GraphEdge::new("a", "b", "next"),
            GraphEdge::new("b", "c", "next"),
            GraphEdge::new("c", "a", "next"),
        ];
        graph.store_graph(&nodes, &edges).await.unwrap();

        let related = graph.find_related("a", None).await.unwrap();
        let summary: Vec<(&str, u32)> = related
            .iter()
            .map(|node| (node.id.as_str(), node.depth))
            .collect();
        // Each node exactly once; the start node never reports itself.
        assert_eq!(summary, vec![("b", 1), ("c", 2)]);
    }

    #[tokio::test]
    async fn test_find_related_diamond_keeps_minimum_depth() {
        let (_, graph) = make_store();
        let nodes = vec![person("a"), person("b"), person("c"), person("d")];
        let edges = vec![
            GraphEdge::new("a", "b", "next"),
            GraphEdge::new("a", "c", "next"),
            GraphEdge::new("b", "d", "next"),
            GraphEdge::new("c", "d", "next"),
        ];
        graph.store_graph(&nodes, &edges).await.unwrap();

        let related = graph.find_related("a", None).await.unwrap();
        let summary: Vec<(&str, u32)> = related
            .iter()
            .map(|node| (node.id.as_str(), node.depth))
            .collect();
        assert_eq!(summary, vec![("b", 1), ("c", 1), ("d", 2)]);
    }

    #[tokio::test]
    async fn test_find_related_respects_max_depth() {
        let (_, graph) = make_store();
        let nodes = vec![person("a"), person("b"), person("c"), person("d")];
        let edges = vec![
            GraphEdge::new("a", "b", "next"),
            GraphEdge::new("b", "c", "next"),
            GraphEdge::new("c", "d", "next"),
        ];
        graph.store_graph(&nodes, &edges).await.unwrap();

        let related = graph.find_related("a", Some(2)).await.unwrap();
        let ids: Vec<&str> = related.iter().map(|node| node.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);

        let none = graph.find_related("a", Some(0)).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_find_related_missing_start_is_empty() {
        let (_, graph) = make_store();
        graph.store_graph(&[person("alice")], &[]).await.unwrap();

        let related = graph.find_related("nobody", None).await.unwrap();
        assert!(related.is_empty());
    }

    #[tokio::test]
    async fn test_find_related_ignores_dangling_targets() {
        let (_, graph) = make_store();
        let nodes = vec![person("alice")];
        let edges = vec![GraphEdge::new("alice", "ghost", "haunted_by")];
        graph.store_graph(&nodes, &edges).await.unwrap();

        let related = graph.find_related("alice", None).await.unwrap();
        assert!(related.is_empty());
    }

    #[tokio::test]
    async fn test_find_related_excludes_start_on_self_loop() {
        let (_, graph) = make_store();
        let nodes = vec![person("a"), person("b")];
        let edges = vec![
            GraphEdge::new("a", "b", "next"),
            GraphEdge::new("b", "a", "back"),
            GraphEdge::new("a", "a", "self"),
        ];
        graph.store_graph(&nodes, &edges).await.unwrap();

        let related = graph.find_related("a", None).await.unwrap();
        let ids: Vec<&str> = related.iter().map(|node| node.id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
    }
}
