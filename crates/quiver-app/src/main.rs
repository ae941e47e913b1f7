//! Quiver application binary - composition root.
//!
//! Ties the Quiver crates together into a single executable:
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Open the selected document store backend (SQLite or in-memory)
//! 3. Create a vector index and wait for it to become READY
//! 4. Ingest a small demo corpus with embedded content
//! 5. Run vector, keyword, and hybrid searches and print the results
//! 6. Store a small knowledge graph and traverse it
//!
//! The demo corpus makes the binary a smoke test for the whole stack; point
//! `--backend sqlite` at a data directory to keep the results on disk.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use quiver_core::config::StoreBackend;
use quiver_core::types::Document;
use quiver_core::QuiverConfig;
use quiver_graph::{GraphEdge, GraphNode, GraphStore};
use quiver_search::{
    DynEmbeddingProvider, EmbeddingProvider, HashEmbedding, IngestionPipeline, SearchEngine,
    SearchResult,
};
use quiver_store::{DocumentStore, IndexProvisioning, MemoryStore, SqliteStore};

mod cli;
use cli::CliArgs;

const DATABASE: &str = "demo_db";
const DOCS_COLLECTION: &str = "demo_docs";
const INDEX_NAME: &str = "demo_index";
const GRAPH_COLLECTION: &str = "demo_kg";

/// Expand ~ to home directory in a path string.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if data_dir.starts_with("~/") || data_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&data_dir[2..])
    } else {
        PathBuf::from(data_dir)
    }
}

fn demo_documents() -> Vec<Document> {
    [
        serde_json::json!({
            "name": "Document 1",
            "content": "OpenAI develops artificial intelligence technologies.",
            "meta_data": {"category": "AI", "tags": ["openai", "ai", "technology"]},
        }),
        serde_json::json!({
            "name": "Document 2",
            "content": "MongoDB is a popular NoSQL database.",
            "meta_data": {"category": "Database", "tags": ["mongodb", "nosql", "database"]},
        }),
        serde_json::json!({
            "name": "Document 3",
            "content": "Python is a versatile programming language.",
            "meta_data": {"category": "Programming", "tags": ["python", "programming", "language"]},
        }),
        serde_json::json!({
            "name": "Document 4",
            "content": "Artificial intelligence and machine learning are transforming industries.",
            "meta_data": {"category": "AI", "tags": ["ai", "machine learning", "transformation"]},
        }),
        serde_json::json!({
            "name": "Document 5",
            "content": "OpenAI's ChatGPT is a language model for generating human-like text.",
            "meta_data": {"category": "AI", "tags": ["openai", "chatgpt", "language model"]},
        }),
    ]
    .into_iter()
    .filter_map(|value| value.as_object().cloned())
    .collect()
}

fn print_result(result: &SearchResult) {
    let body = serde_json::to_string(&result.document)
        .unwrap_or_else(|_| "<unprintable document>".to_string());
    match result.score {
        Some(score) => println!("  score={score:.4} {body}"),
        None => println!("  {body}"),
    }
}

/// Run the search and graph demo against any store backend.
async fn run_demo<S: DocumentStore>(
    store: Arc<S>,
    config: &QuiverConfig,
) -> quiver_core::Result<()> {
    let embedder = Arc::new(HashEmbedding::new());
    let engine = SearchEngine::new(
        Arc::clone(&store),
        Arc::clone(&embedder) as Arc<dyn DynEmbeddingProvider>,
        DATABASE,
        DOCS_COLLECTION,
        INDEX_NAME,
        config.search.text_field.as_str(),
    );

    // Index lifecycle: create, then poll until the store reports READY.
    engine
        .manager()
        .create_index(
            DATABASE,
            DOCS_COLLECTION,
            INDEX_NAME,
            &config.search.text_field,
            config.index.metric,
        )
        .await?;
    let ready = engine
        .manager()
        .wait_until_ready(
            DATABASE,
            DOCS_COLLECTION,
            INDEX_NAME,
            config.index.poll_max_attempts,
            Duration::from_secs(config.index.poll_interval_secs),
        )
        .await;
    if !ready {
        warn!(
            "Index '{}' did not become ready; searches will return no results",
            INDEX_NAME
        );
    }

    // Ingest the demo corpus, embedding the configured text field.
    let pipeline = IngestionPipeline::new(Arc::clone(&store), HashEmbedding::new(), DATABASE, DOCS_COLLECTION);
    let outcome = pipeline
        .insert_documents(demo_documents(), &[config.search.text_field.as_str()])
        .await?;
    info!(?outcome, "Demo corpus ingested");

    let limit = config.search.default_limit;

    println!("\n--- Vector Search (string query) ---");
    for result in engine
        .vector_search(
            "Tell me about artificial intelligence advancements.",
            limit,
            None,
        )
        .await
    {
        print_result(&result);
    }

    // A precomputed query vector skips the embedding step entirely. Reusing
    // a corpus sentence makes its document rank first with score ~1.0.
    println!("\n--- Vector Search (precomputed embedding) ---");
    let query_vector = embedder.embed("MongoDB is a popular NoSQL database.").await?;
    for result in engine.vector_search(query_vector, limit, None).await {
        print_result(&result);
    }

    println!("\n--- Keyword Search ---");
    for result in engine.keyword_search("Python", limit).await {
        print_result(&result);
    }

    println!("\n--- Hybrid Search ---");
    for result in engine
        .hybrid_search(
            "Advancements in machine learning.",
            "transforming",
            limit,
            None,
        )
        .await
    {
        print_result(&result);
    }

    // Knowledge graph: store a small graph and expand from one node.
    let graph = GraphStore::new(Arc::clone(&store), DATABASE, GRAPH_COLLECTION);
    let nodes = vec![
        GraphNode::new("Alice", "person"),
        GraphNode::new("AcmeCorp", "company"),
        GraphNode::new("Bob", "person"),
    ];
    let edges = vec![
        GraphEdge::new("Alice", "AcmeCorp", "works at"),
        GraphEdge::new("Bob", "AcmeCorp", "works at"),
        GraphEdge::new("Alice", "Bob", "knows"),
    ];
    graph.store_graph(&nodes, &edges).await?;

    println!("\n--- Knowledge Graph: find_related(\"Alice\") ---");
    for node in graph.find_related("Alice", config.graph.max_depth).await? {
        println!("  depth={} {} ({})", node.depth, node.id, node.node_type);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let config = QuiverConfig::load_or_default(&config_file);

    // Tracing. RUST_LOG wins; otherwise the CLI flag, then the config file.
    let level = args
        .resolve_log_level()
        .unwrap_or_else(|| config.general.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();

    info!("Starting Quiver v{}", env!("CARGO_PKG_VERSION"));
    info!(path = %config_file.display(), "Configuration resolved");

    match args.resolve_backend(config.store.backend) {
        StoreBackend::Memory => {
            info!("Using in-memory store backend");
            let store = Arc::new(MemoryStore::with_provisioning(IndexProvisioning::AfterPolls(
                config.store.ready_after_polls,
            )));
            run_demo(store, &config).await?;
        }
        StoreBackend::Sqlite => {
            let data_dir = resolve_data_dir(
                args.resolve_data_dir()
                    .as_deref()
                    .unwrap_or(&config.general.data_dir),
            );
            let db_path = data_dir.join(&config.store.file);
            let store = Arc::new(SqliteStore::open(&db_path, config.store.ready_after_polls)?);
            info!(path = %db_path.display(), "SQLite store opened");
            run_demo(store, &config).await?;
        }
    }

    Ok(())
}
