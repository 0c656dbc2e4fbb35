//! Working-memory state snapshot of the development environment.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Upper bound on retained error-log entries (newest last).
const MAX_ERROR_LOG: usize = 64;

/// A file loaded into the environment, with parsed structure when available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub content: String,
    pub language: String,
    /// Serialized syntax-tree summary, populated lazily by the analyzer.
    #[serde(default)]
    pub ast: Option<serde_json::Value>,
    pub last_modified: DateTime<Utc>,
}

impl FileRecord {
    pub fn new(
        path: impl Into<String>,
        content: impl Into<String>,
        language: impl Into<String>,
        last_modified: DateTime<Utc>,
    ) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            language: language.into(),
            ast: None,
            last_modified,
        }
    }

    /// Map a file extension to a language identifier the analyzer knows.
    pub fn language_for_extension(ext: &str) -> &'static str {
        match ext {
            "py" => "python",
            "js" | "mjs" => "javascript",
            "ts" => "typescript",
            "rs" => "rust",
            "go" => "go",
            "java" => "java",
            "c" | "h" => "c",
            "cpp" | "hpp" | "cc" => "cpp",
            _ => "text",
        }
    }
}

/// Immutable-by-convention snapshot of the environment. Operators never
/// mutate a state they are given; they clone it and return the successor in
/// their [`super::OperatorResult`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditorState {
    pub working_directory: String,
    /// Ordered so that serialization (and therefore hashing) is stable.
    pub open_files: BTreeMap<String, FileRecord>,
    /// Cursor line per path.
    pub cursor_position: BTreeMap<String, usize>,
    pub last_output: Option<String>,
    /// Bounded, newest last.
    pub error_log: VecDeque<String>,
    pub git_status: Option<String>,
}

impl EditorState {
    pub fn new(working_directory: impl Into<String>) -> Self {
        Self {
            working_directory: working_directory.into(),
            ..Self::default()
        }
    }

    /// Append an error, dropping the oldest entry once the log is full.
    pub fn push_error(&mut self, error: impl Into<String>) {
        if self.error_log.len() >= MAX_ERROR_LOG {
            self.error_log.pop_front();
        }
        self.error_log.push_back(error.into());
    }

    pub fn last_error(&self) -> Option<&str> {
        self.error_log.back().map(String::as_str)
    }

    /// Content hash over the canonical serialization, used to key state
    /// transitions. BTreeMap ordering makes this deterministic.
    pub fn content_hash(&self) -> String {
        let canonical = serde_json::to_string(self).unwrap_or_default();
        let digest = Sha256::digest(canonical.as_bytes());
        hex_prefix(&digest, 16)
    }
}

/// Render the first `n` bytes of a digest as lowercase hex.
pub(crate) fn hex_prefix(digest: &[u8], n: usize) -> String {
    digest
        .iter()
        .take(n)
        .map(|b| format!("{b:02x}"))
        .collect()
}
