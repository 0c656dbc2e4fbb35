//! Sqlite-backed vector index.
//!
//! One table keyed by (collection, id) holding the document, its JSON
//! metadata, and the embedding as little-endian f32 bytes. Similarity is
//! computed in Rust over the collection's rows; collections here are small
//! (hundreds of chunks), so a scan beats maintaining an ANN structure.
//! In-memory sqlite when no directory is given, a file under the directory
//! when durability is requested.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use crate::domain::ports::{EmbeddingService, VectorIndex, VectorRecord};

use super::embedder::cosine_similarity;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS vectors (
    collection TEXT NOT NULL,
    id         TEXT NOT NULL,
    document   TEXT NOT NULL,
    metadata   TEXT NOT NULL,
    embedding  BLOB NOT NULL,
    PRIMARY KEY (collection, id)
)";

pub struct SqliteVectorIndex {
    pool: SqlitePool,
    embedder: Arc<dyn EmbeddingService>,
}

impl SqliteVectorIndex {
    /// Open the index. `persist_dir = None` keeps everything in memory.
    pub async fn open(
        persist_dir: Option<&Path>,
        embedder: Arc<dyn EmbeddingService>,
    ) -> Result<Self> {
        let url = match persist_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
                format!("sqlite://{}?mode=rwc", dir.join("memory.db").display())
            }
            None => "sqlite::memory:".to_string(),
        };

        // A single connection: an in-memory database exists per connection,
        // and the engine serializes access anyway.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .with_context(|| format!("failed to open vector store at {url}"))?;

        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .context("failed to create vector store schema")?;

        Ok(Self { pool, embedder })
    }

    pub async fn count(&self, collection: &str) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM vectors WHERE collection = ?")
            .bind(collection)
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.get("n");
        Ok(n as u64)
    }
}

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Exact-match metadata filter: every key in `filter` must equal the
/// record's value for that key.
fn passes_filter(metadata: &Value, filter: Option<&Value>) -> bool {
    let Some(Value::Object(wanted)) = filter else {
        return true;
    };
    wanted
        .iter()
        .all(|(key, value)| metadata.get(key) == Some(value))
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn add(
        &self,
        collection: &str,
        id: &str,
        document: &str,
        metadata: Value,
    ) -> Result<()> {
        let embedding = embedding_to_bytes(&self.embedder.embed(document));
        sqlx::query(
            "INSERT OR REPLACE INTO vectors (collection, id, document, metadata, embedding)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(collection)
        .bind(id)
        .bind(document)
        .bind(metadata.to_string())
        .bind(embedding)
        .execute(&self.pool)
        .await
        .context("failed to insert vector record")?;
        Ok(())
    }

    async fn update_metadata(&self, collection: &str, id: &str, metadata: Value) -> Result<()> {
        let result = sqlx::query(
            "UPDATE vectors SET metadata = ? WHERE collection = ? AND id = ?",
        )
        .bind(metadata.to_string())
        .bind(collection)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("failed to update vector metadata")?;

        if result.rows_affected() == 0 {
            anyhow::bail!("no record {id} in collection {collection}");
        }
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<VectorRecord>> {
        let row = sqlx::query(
            "SELECT id, document, metadata FROM vectors WHERE collection = ? AND id = ?",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch vector record")?;

        Ok(row.map(|row| {
            let metadata: String = row.get("metadata");
            VectorRecord {
                id: row.get("id"),
                document: row.get("document"),
                metadata: serde_json::from_str(&metadata).unwrap_or(Value::Null),
                score: 0.0,
            }
        }))
    }

    async fn query(
        &self,
        collection: &str,
        text: &str,
        top_k: usize,
        filter: Option<&Value>,
    ) -> Result<Vec<VectorRecord>> {
        let query_embedding = self.embedder.embed(text);

        let rows = sqlx::query(
            "SELECT id, document, metadata, embedding FROM vectors WHERE collection = ?",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .context("failed to scan vector collection")?;

        let mut scored: Vec<VectorRecord> = rows
            .into_iter()
            .filter_map(|row| {
                let metadata_text: String = row.get("metadata");
                let metadata: Value = serde_json::from_str(&metadata_text).ok()?;
                if !passes_filter(&metadata, filter) {
                    return None;
                }
                let embedding_bytes: Vec<u8> = row.get("embedding");
                let embedding = bytes_to_embedding(&embedding_bytes);
                Some(VectorRecord {
                    id: row.get("id"),
                    document: row.get("document"),
                    metadata,
                    score: cosine_similarity(&query_embedding, &embedding),
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM vectors WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to delete vector record")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::vector::HashEmbedder;
    use serde_json::json;

    async fn index() -> SqliteVectorIndex {
        SqliteVectorIndex::open(None, Arc::new(HashEmbedder::default()))
            .await
            .expect("in-memory index")
    }

    #[tokio::test]
    async fn add_get_round_trip() {
        let idx = index().await;
        idx.add("chunks", "c1", "Goal: fix sort", json!({"n": 1}))
            .await
            .unwrap();

        let record = idx.get("chunks", "c1").await.unwrap().unwrap();
        assert_eq!(record.document, "Goal: fix sort");
        assert_eq!(record.metadata["n"], 1);
        assert!(idx.get("chunks", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn query_ranks_the_closest_document_first() {
        let idx = index().await;
        idx.add("chunks", "sorting", "fix the sorting bug IndexError sort.py", json!({}))
            .await
            .unwrap();
        idx.add("chunks", "network", "configure nginx proxy timeout settings", json!({}))
            .await
            .unwrap();

        let results = idx
            .query("chunks", "sorting bug in sort.py", 2, None)
            .await
            .unwrap();
        assert_eq!(results[0].id, "sorting");
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let idx = index().await;
        idx.add("chunks", "a", "doc", json!({})).await.unwrap();
        idx.add("goal_stack", "b", "doc", json!({})).await.unwrap();

        assert_eq!(idx.count("chunks").await.unwrap(), 1);
        assert_eq!(idx.count("goal_stack").await.unwrap(), 1);
        assert!(idx.get("chunks", "b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn metadata_filter_is_exact_match() {
        let idx = index().await;
        idx.add("chunks", "a", "shared words here", json!({"status": "active"}))
            .await
            .unwrap();
        idx.add("chunks", "b", "shared words here", json!({"status": "sealed"}))
            .await
            .unwrap();

        let results = idx
            .query("chunks", "shared words", 10, Some(&json!({"status": "sealed"})))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "b");
    }

    #[tokio::test]
    async fn update_metadata_replaces_only_metadata() {
        let idx = index().await;
        idx.add("chunks", "a", "doc text", json!({"uses": 1}))
            .await
            .unwrap();
        idx.update_metadata("chunks", "a", json!({"uses": 2}))
            .await
            .unwrap();

        let record = idx.get("chunks", "a").await.unwrap().unwrap();
        assert_eq!(record.metadata["uses"], 2);
        assert_eq!(record.document, "doc text");

        assert!(idx
            .update_metadata("chunks", "missing", json!({}))
            .await
            .is_err());
    }
}
