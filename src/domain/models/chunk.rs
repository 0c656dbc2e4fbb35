//! Learned chunks: cached (state-signature, operator) success records.
//!
//! A chunk is created when the ACT-R or evolutionary path resolves an
//! impasse and the selected operator succeeds. Retrieval later injects the
//! chunk as a high-priority synthetic proposal, turning slow deliberation
//! into a cheap reflex.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::state::{hex_prefix, EditorState};

/// Activation decay per hour since last use.
const DECAY_RATE_PER_HOUR: f64 = 0.5;

/// Prefix lengths keeping signatures bounded.
const GOAL_PREFIX: usize = 200;
const ERROR_PREFIX: usize = 200;
const MAX_SIGNATURE_FILES: usize = 5;

/// Compressed, deterministic fingerprint of a state for chunk matching.
///
/// Depends only on the goal text prefix, the working directory, up to five
/// open-file paths, and a prefix of the most recent error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSignature {
    pub goal: String,
    pub working_directory: String,
    pub open_files: Vec<String>,
    #[serde(default)]
    pub recent_error: Option<String>,
}

impl StateSignature {
    pub fn from_state(state: &EditorState, goal_description: &str) -> Self {
        let mut open_files: Vec<String> = state.open_files.keys().cloned().collect();
        open_files.sort();
        open_files.truncate(MAX_SIGNATURE_FILES);

        Self {
            goal: truncate_chars(goal_description, GOAL_PREFIX),
            working_directory: state.working_directory.clone(),
            open_files,
            recent_error: state.last_error().map(|e| truncate_chars(e, ERROR_PREFIX)),
        }
    }

    /// Canonical textual serialization; the basis for chunk ids.
    pub fn canonical_text(&self) -> String {
        let files = self.open_files.join(",");
        format!(
            "goal={}|wd={}|files={}|error={}",
            self.goal,
            self.working_directory,
            files,
            self.recent_error.as_deref().unwrap_or("")
        )
    }

    /// Text used both to embed stored chunks and to query for them.
    pub fn embedding_text(&self) -> String {
        let mut parts = vec![format!("Goal: {}", self.goal)];
        if let Some(error) = &self.recent_error {
            parts.push(format!("Error: {error}"));
        }
        if !self.open_files.is_empty() {
            parts.push(format!("Files: {}", self.open_files.join(", ")));
        }
        parts.join(" | ")
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// A learned (state-signature, operator, success-rate) tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Deterministic content hash of signature + operator.
    pub id: String,
    pub state_signature: StateSignature,
    pub operator_name: String,
    pub operator_params: serde_json::Value,
    pub goal_description: String,
    pub success_count: u32,
    pub failure_count: u32,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    #[serde(default)]
    pub utility: Option<f64>,
}

impl Chunk {
    /// Build a chunk from a successful resolution. The state is the one the
    /// operator was selected against, not the successor.
    pub fn from_success(
        state: &EditorState,
        operator_name: &str,
        operator_params: serde_json::Value,
        goal_description: &str,
        utility: Option<f64>,
    ) -> Self {
        let signature = StateSignature::from_state(state, goal_description);
        let id = Self::id_for(&signature, operator_name);
        let now = Utc::now();

        Self {
            id,
            state_signature: signature,
            operator_name: operator_name.to_string(),
            operator_params,
            goal_description: goal_description.to_string(),
            success_count: 1,
            failure_count: 0,
            created_at: now,
            last_used: now,
            utility,
        }
    }

    pub fn id_for(signature: &StateSignature, operator_name: &str) -> String {
        let material = format!("{}|op={}", signature.canonical_text(), operator_name);
        let digest = Sha256::digest(material.as_bytes());
        hex_prefix(&digest, 32)
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            return 0.0;
        }
        f64::from(self.success_count) / f64::from(total)
    }

    /// ACT-R style activation: frequency minus recency decay.
    pub fn activation(&self, now: DateTime<Utc>) -> f64 {
        let frequency = f64::from(self.success_count + 1).ln();
        let hours_since_use =
            (now - self.last_used).num_milliseconds() as f64 / 3_600_000.0;
        frequency - DECAY_RATE_PER_HOUR * hours_since_use.max(0.0)
    }

    pub fn embedding_text(&self) -> String {
        let mut text = format!(
            "Goal: {} | Operator: {}",
            self.goal_description, self.operator_name
        );
        if let Some(error) = &self.state_signature.recent_error {
            text.push_str(&format!(" | Error: {error}"));
        }
        if !self.state_signature.open_files.is_empty() {
            text.push_str(&format!(
                " | Files: {}",
                self.state_signature.open_files.join(", ")
            ));
        }
        text
    }

    pub fn record_use(&mut self, succeeded: bool, now: DateTime<Utc>) {
        if succeeded {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        self.last_used = now;
    }
}
