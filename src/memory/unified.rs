//! Two logical stores over one vector index.
//!
//! The chunk store caches successful heuristic resolutions; operational
//! memory persists the goal stack as context nodes. Store failures are
//! never fatal: a failed write logs and moves on, a failed read returns
//! empty. Chunks are heuristic hints, not authoritative state.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::models::{
    Chunk, ContextNode, ContextStatus, EditorState, StateSignature,
};
use crate::domain::ports::{EmbeddingService, VectorIndex};
use crate::infrastructure::vector::{HashEmbedder, SqliteVectorIndex};

const CHUNKS: &str = "chunks";
const GOAL_STACK: &str = "goal_stack";

/// Default retrieval policy: at most this many chunks come back, and only
/// ones at or above this success rate.
pub const DEFAULT_TOP_K: usize = 3;
pub const MIN_SUCCESS_RATE: f64 = 0.7;

pub struct UnifiedMemory {
    index: Arc<dyn VectorIndex>,
    /// Active context chain, root first. Guarded for interior mutability;
    /// never held across an await.
    context_stack: Mutex<Vec<Uuid>>,
}

impl UnifiedMemory {
    /// Open over sqlite, in-memory unless a directory is given.
    pub async fn open(persist_dir: Option<&Path>) -> Result<Self> {
        let embedder: Arc<dyn EmbeddingService> = Arc::new(HashEmbedder::default());
        let index = SqliteVectorIndex::open(persist_dir, embedder).await?;
        Ok(Self::with_index(Arc::new(index)))
    }

    /// Memory over an injected index; how tests substitute the backend.
    pub fn with_index(index: Arc<dyn VectorIndex>) -> Self {
        Self {
            index,
            context_stack: Mutex::new(Vec::new()),
        }
    }

    // --- chunk store ---

    /// Insert a chunk, or merge with an existing one by deterministic id:
    /// a re-learned chunk gains a success and a fresh `last_used`.
    pub async fn store_chunk(&self, chunk: &Chunk) {
        let existing = match self.index.get(CHUNKS, &chunk.id).await {
            Ok(existing) => existing,
            Err(error) => {
                warn!(%error, "chunk lookup failed; skipping store");
                return;
            }
        };

        let merged = match existing.and_then(|r| serde_json::from_value::<Chunk>(r.metadata).ok())
        {
            Some(mut stored) => {
                stored.record_use(true, Utc::now());
                stored
            }
            None => chunk.clone(),
        };

        let metadata = match serde_json::to_value(&merged) {
            Ok(metadata) => metadata,
            Err(error) => {
                warn!(%error, "chunk serialization failed; skipping store");
                return;
            }
        };

        if let Err(error) = self
            .index
            .add(CHUNKS, &merged.id, &merged.embedding_text(), metadata)
            .await
        {
            warn!(%error, chunk = %merged.id, "chunk store failed");
        } else {
            debug!(chunk = %merged.id, operator = %merged.operator_name, "stored chunk");
        }
    }

    /// Chunks similar to the current situation, filtered by success rate
    /// and ordered by descending activation.
    pub async fn retrieve_similar(
        &self,
        state: &EditorState,
        goal_description: &str,
        top_k: usize,
        min_success_rate: f64,
    ) -> Vec<Chunk> {
        let query = StateSignature::from_state(state, goal_description).embedding_text();

        let records = match self.index.query(CHUNKS, &query, top_k * 2, None).await {
            Ok(records) => records,
            Err(error) => {
                warn!(%error, "chunk retrieval failed; returning none");
                return Vec::new();
            }
        };

        let now = Utc::now();
        let mut chunks: Vec<Chunk> = records
            .into_iter()
            .filter_map(|r| serde_json::from_value::<Chunk>(r.metadata).ok())
            .filter(|c| c.success_rate() >= min_success_rate)
            .collect();

        chunks.sort_by(|a, b| {
            b.activation(now)
                .partial_cmp(&a.activation(now))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        chunks.truncate(top_k);
        chunks
    }

    /// Bump a chunk's counters after reuse.
    pub async fn update_success(&self, chunk_id: &str, succeeded: bool) -> bool {
        let record = match self.index.get(CHUNKS, chunk_id).await {
            Ok(Some(record)) => record,
            Ok(None) => return false,
            Err(error) => {
                warn!(%error, "chunk lookup failed; skipping update");
                return false;
            }
        };

        let Ok(mut chunk) = serde_json::from_value::<Chunk>(record.metadata) else {
            return false;
        };
        chunk.record_use(succeeded, Utc::now());

        let Ok(metadata) = serde_json::to_value(&chunk) else {
            return false;
        };
        match self.index.update_metadata(CHUNKS, chunk_id, metadata).await {
            Ok(()) => true,
            Err(error) => {
                warn!(%error, chunk = %chunk_id, "chunk update failed");
                false
            }
        }
    }

    // --- operational memory (goal stack persistence) ---

    /// Persist a goal frame and make it the active context.
    pub async fn push_context(
        &self,
        goal_description: &str,
        state_snapshot: &str,
        parent_id: Option<Uuid>,
    ) -> Option<Uuid> {
        let depth = self.context_stack.lock().expect("context lock").len();
        let node = ContextNode::new(goal_description, state_snapshot, parent_id, depth);
        let id = node.id;

        let document = format!("{goal_description}\n{state_snapshot}");
        let metadata = serde_json::to_value(&node).ok()?;
        if let Err(error) = self
            .index
            .add(GOAL_STACK, &id.to_string(), &document, metadata)
            .await
        {
            warn!(%error, "context push failed; goal stack not persisted");
            return None;
        }

        self.context_stack.lock().expect("context lock").push(id);
        Some(id)
    }

    /// Seal the active context with its outcome and pop it. Returns the new
    /// active context id, if any.
    pub async fn pop_context(
        &self,
        status: ContextStatus,
        resolution_operator: Option<&str>,
        resolution_reasoning: Option<&str>,
    ) -> Option<Uuid> {
        let popped = self.context_stack.lock().expect("context lock").pop()?;

        if let Ok(Some(record)) = self.index.get(GOAL_STACK, &popped.to_string()).await {
            if let Ok(mut node) = serde_json::from_value::<ContextNode>(record.metadata) {
                node.seal(
                    status,
                    resolution_operator.map(str::to_string),
                    resolution_reasoning.map(str::to_string),
                );
                if let Ok(metadata) = serde_json::to_value(&node) {
                    if let Err(error) = self
                        .index
                        .update_metadata(GOAL_STACK, &popped.to_string(), metadata)
                        .await
                    {
                        warn!(%error, "context seal failed");
                    }
                }
            }
        }

        self.context_stack
            .lock()
            .expect("context lock")
            .last()
            .copied()
    }

    /// Record how the active context was resolved, without popping it.
    pub async fn update_context_resolution(&self, operator: &str, reasoning: &str) {
        let Some(active) = self.active_context_id() else {
            return;
        };
        if let Ok(Some(record)) = self.index.get(GOAL_STACK, &active.to_string()).await {
            if let Ok(mut node) = serde_json::from_value::<ContextNode>(record.metadata) {
                node.resolution_operator = Some(operator.to_string());
                node.resolution_reasoning = Some(reasoning.to_string());
                if let Ok(metadata) = serde_json::to_value(&node) {
                    let _ = self
                        .index
                        .update_metadata(GOAL_STACK, &active.to_string(), metadata)
                        .await;
                }
            }
        }
    }

    pub fn active_context_id(&self) -> Option<Uuid> {
        self.context_stack
            .lock()
            .expect("context lock")
            .last()
            .copied()
    }

    pub async fn get_active_context(&self) -> Option<ContextNode> {
        let id = self.active_context_id()?;
        self.fetch_context(id).await
    }

    /// Root-first chain of active contexts.
    pub async fn get_context_chain(&self) -> Vec<ContextNode> {
        let ids: Vec<Uuid> = self.context_stack.lock().expect("context lock").clone();
        let mut chain = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(node) = self.fetch_context(id).await {
                chain.push(node);
            }
        }
        chain
    }

    async fn fetch_context(&self, id: Uuid) -> Option<ContextNode> {
        match self.index.get(GOAL_STACK, &id.to_string()).await {
            Ok(Some(record)) => serde_json::from_value(record.metadata).ok(),
            Ok(None) => None,
            Err(error) => {
                warn!(%error, "context fetch failed");
                None
            }
        }
    }

    /// Past resolutions relevant to `query`, rendered as one-line hints for
    /// the resolver's prompts. Only sealed, successfully resolved contexts
    /// qualify.
    pub async fn retrieve_relevant_history(
        &self,
        query: &str,
        max_results: usize,
    ) -> Vec<String> {
        let records = match self
            .index
            .query(
                GOAL_STACK,
                query,
                max_results * 3,
                Some(&json!({ "status": "success" })),
            )
            .await
        {
            Ok(records) => records,
            Err(error) => {
                warn!(%error, "history retrieval failed; returning none");
                return Vec::new();
            }
        };

        records
            .into_iter()
            .filter_map(|r| serde_json::from_value::<ContextNode>(r.metadata).ok())
            .filter(|n| n.resolution_operator.is_some())
            .take(max_results)
            .map(|n| {
                format!(
                    "Goal: {} -> resolved by {} ({})",
                    n.goal_description,
                    n.resolution_operator.as_deref().unwrap_or("unknown"),
                    n.resolution_reasoning.as_deref().unwrap_or("no reasoning recorded"),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn memory() -> UnifiedMemory {
        UnifiedMemory::open(None).await.expect("in-memory store")
    }

    fn chunk_for(goal: &str, operator: &str) -> Chunk {
        let mut state = EditorState::new("/p");
        state.push_error("IndexError: list index out of range in sort.py");
        Chunk::from_success(&state, operator, json!({"op": "read_file", "path": "sort.py"}), goal, Some(42.0))
    }

    #[tokio::test]
    async fn stored_chunk_is_retrieved_for_a_matching_state() {
        let memory = memory().await;
        let chunk = chunk_for("Fix the sort in sort.py", "read_file(sort.py)");
        memory.store_chunk(&chunk).await;

        let mut state = EditorState::new("/p");
        state.push_error("IndexError: list index out of range in sort.py");
        let found = memory
            .retrieve_similar(&state, "Fix the sort in sort.py", 3, MIN_SUCCESS_RATE)
            .await;

        assert!(found.iter().any(|c| c.id == chunk.id));
    }

    #[tokio::test]
    async fn low_success_rate_chunks_are_filtered_out() {
        let memory = memory().await;
        let chunk = chunk_for("Fix the sort in sort.py", "read_file(sort.py)");
        memory.store_chunk(&chunk).await;

        // Three failures against one success: rate drops to 0.25.
        for _ in 0..3 {
            memory.update_success(&chunk.id, false).await;
        }

        let mut state = EditorState::new("/p");
        state.push_error("IndexError: list index out of range in sort.py");
        let found = memory
            .retrieve_similar(&state, "Fix the sort in sort.py", 3, MIN_SUCCESS_RATE)
            .await;

        assert!(found.iter().all(|c| c.success_rate() >= MIN_SUCCESS_RATE));
        assert!(!found.iter().any(|c| c.id == chunk.id));
    }

    #[tokio::test]
    async fn restore_of_same_chunk_merges_counters() {
        let memory = memory().await;
        let chunk = chunk_for("Fix the sort in sort.py", "read_file(sort.py)");
        memory.store_chunk(&chunk).await;
        memory.store_chunk(&chunk).await;

        let mut state = EditorState::new("/p");
        state.push_error("IndexError: list index out of range in sort.py");
        let found = memory
            .retrieve_similar(&state, "Fix the sort in sort.py", 3, 0.0)
            .await;
        let stored = found.iter().find(|c| c.id == chunk.id).unwrap();
        assert_eq!(stored.success_count, 2);
    }

    #[tokio::test]
    async fn context_push_pop_tracks_the_active_frame() {
        let memory = memory().await;
        let root = memory
            .push_context("root goal", "wd: /p", None)
            .await
            .unwrap();
        let child = memory
            .push_context("sub goal", "wd: /p", Some(root))
            .await
            .unwrap();

        assert_eq!(memory.active_context_id(), Some(child));
        assert_eq!(memory.get_context_chain().await.len(), 2);

        let back = memory
            .pop_context(ContextStatus::Success, Some("read_file(a.py)"), None)
            .await;
        assert_eq!(back, Some(root));

        let active = memory.get_active_context().await.unwrap();
        assert_eq!(active.goal_description, "root goal");
    }

    #[tokio::test]
    async fn relevant_history_reports_sealed_successes_only() {
        let memory = memory().await;
        let root = memory
            .push_context("fix the sorting bug in sort.py", "errors: IndexError", None)
            .await
            .unwrap();
        memory
            .push_context("choose between readers", "tie", Some(root))
            .await
            .unwrap();

        // Seal the child as a success with its resolution.
        memory
            .pop_context(
                ContextStatus::Success,
                Some("read_file(sort.py)"),
                Some("selected by utility"),
            )
            .await;

        let history = memory
            .retrieve_relevant_history("sorting bug readers", 2)
            .await;
        assert_eq!(history.len(), 1);
        assert!(history[0].contains("read_file(sort.py)"));
    }
}
