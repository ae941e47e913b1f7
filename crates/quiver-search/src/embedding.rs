//! Embedding provider trait and the default local implementation.
//!
//! `HashEmbedding` derives deterministic vectors from a hash of the input
//! text. It carries no semantic signal between different strings, but it is
//! dependency-free, stable across runs, and exact-match queries rank their
//! source text first, which is enough for local development and for every
//! lifecycle test in this workspace. Swapping in a real model is a
//! configuration concern, not an engine change.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use quiver_core::error::{QuiverError, Result};

/// Service for turning text into fixed-dimensional vectors.
///
/// Implementations must be deterministic about dimensionality: the engine
/// calls `embed` once to size a new index and trusts every later vector to
/// have the same length.
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for the given text.
    fn embed(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<Vec<f32>>> + Send;

    /// Dimensionality of vectors produced by this provider.
    fn dimensions(&self) -> usize;
}

/// Object-safe version of [`EmbeddingProvider`] for dynamic dispatch.
///
/// `EmbeddingProvider::embed` returns `impl Future`, which rules out trait
/// objects. This mirror trait boxes the future so providers can be stored
/// as `Arc<dyn DynEmbeddingProvider>`. A blanket impl covers every
/// `EmbeddingProvider` automatically.
pub trait DynEmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for the given text (boxed future).
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<f32>>> + Send + 'a>>;

    /// Dimensionality of vectors produced by this provider.
    fn dimensions(&self) -> usize;
}

impl<T: EmbeddingProvider> DynEmbeddingProvider for T {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<f32>>> + Send + 'a>> {
        Box::pin(self.embed(text))
    }

    fn dimensions(&self) -> usize {
        EmbeddingProvider::dimensions(self)
    }
}

/// Deterministic hash-based embedding provider.
///
/// Identical inputs always produce identical 384-dimensional unit vectors,
/// so cosine similarity of a text with itself is exactly 1.0.
#[derive(Debug, Clone, Default)]
pub struct HashEmbedding;

impl HashEmbedding {
    pub fn new() -> Self {
        Self
    }

    fn hash_to_vector(text: &str) -> Vec<f32> {
        let mut result = Vec::with_capacity(384);
        for i in 0..384 {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            i.hash(&mut hasher);
            let h = hasher.finish();
            let val = ((h as f64) / (u64::MAX as f64)) * 2.0 - 1.0;
            result.push(val as f32);
        }

        // L2-normalize so dot product and cosine agree on unit vectors.
        let norm: f32 = result.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut result {
                *val /= norm;
            }
        }

        result
    }
}

impl EmbeddingProvider for HashEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(QuiverError::Provider("Cannot embed empty text".to_string()));
        }
        Ok(Self::hash_to_vector(text))
    }

    fn dimensions(&self) -> usize {
        384
    }
}
