//! Ports for embedding generation and the vector-indexed collections.
//!
//! Unified memory runs two logical collections ("chunks" and "goal_stack")
//! over one index. Durability is the adapter's concern; callers must
//! serialize concurrent writers themselves.

use async_trait::async_trait;
use serde_json::Value;

/// Deterministic text embedding. Kept synchronous: the default
/// implementation is a feature hasher with no I/O.
pub trait EmbeddingService: Send + Sync {
    fn embed(&self, text: &str) -> Vec<f32>;

    fn dimension(&self) -> usize;
}

/// A stored record plus its similarity score for the query that returned it.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub document: String,
    pub metadata: Value,
    /// Cosine similarity to the query text; 0.0 for direct gets.
    pub score: f32,
}

/// Vector-indexed document store.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace a record.
    async fn add(
        &self,
        collection: &str,
        id: &str,
        document: &str,
        metadata: Value,
    ) -> anyhow::Result<()>;

    /// Replace a record's metadata, leaving document and embedding intact.
    async fn update_metadata(
        &self,
        collection: &str,
        id: &str,
        metadata: Value,
    ) -> anyhow::Result<()>;

    async fn get(&self, collection: &str, id: &str) -> anyhow::Result<Option<VectorRecord>>;

    /// Top-k query by text, optionally filtered by exact-match metadata
    /// keys before ranking.
    async fn query(
        &self,
        collection: &str,
        text: &str,
        top_k: usize,
        filter: Option<&Value>,
    ) -> anyhow::Result<Vec<VectorRecord>>;

    async fn delete(&self, collection: &str, id: &str) -> anyhow::Result<()>;
}
