//! File operators: read, list, write, apply-fix.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::domain::models::{
    EditorState, FileRecord, Goal, Operator, OperatorResult, SharedOperator,
};

fn resolve(state: &EditorState, path: &str) -> PathBuf {
    Path::new(&state.working_directory).join(path)
}

fn modified_time(path: &Path) -> DateTime<Utc> {
    path.metadata()
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

/// Read a file into the open-files map. Non-destructive.
pub struct ReadFile {
    name: String,
    path: String,
}

impl ReadFile {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: format!("read_file({path})"),
            path,
        }
    }

    pub fn shared(path: impl Into<String>) -> SharedOperator {
        Arc::new(Self::new(path))
    }
}

#[async_trait]
impl Operator for ReadFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn params(&self) -> serde_json::Value {
        json!({ "op": "read_file", "path": self.path })
    }

    fn is_applicable(&self, state: &EditorState, _goal: &Goal) -> bool {
        resolve(state, &self.path).is_file()
    }

    async fn execute(&self, state: &EditorState) -> OperatorResult {
        let full_path = resolve(state, &self.path);
        let content = match tokio::fs::read_to_string(&full_path).await {
            Ok(content) => content,
            Err(error) => {
                return OperatorResult::failed(format!("failed to read {}: {error}", self.path))
            }
        };

        let ext = full_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let language = FileRecord::language_for_extension(ext);

        let mut new_state = state.clone();
        let bytes = content.len();
        new_state.open_files.insert(
            self.path.clone(),
            FileRecord::new(&self.path, content, language, modified_time(&full_path)),
        );

        OperatorResult::succeeded(new_state, format!("Read {bytes} bytes from {}", self.path))
    }
}

/// List a directory into `last_output`. Non-destructive.
pub struct ListDirectory {
    name: String,
    path: String,
}

impl ListDirectory {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: format!("list_dir({path})"),
            path,
        }
    }

    pub fn shared(path: impl Into<String>) -> SharedOperator {
        Arc::new(Self::new(path))
    }
}

#[async_trait]
impl Operator for ListDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    fn params(&self) -> serde_json::Value {
        json!({ "op": "list_dir", "path": self.path })
    }

    fn is_applicable(&self, state: &EditorState, _goal: &Goal) -> bool {
        resolve(state, &self.path).is_dir()
    }

    async fn execute(&self, state: &EditorState) -> OperatorResult {
        let full_path = resolve(state, &self.path);
        let mut entries = match tokio::fs::read_dir(&full_path).await {
            Ok(entries) => entries,
            Err(error) => {
                return OperatorResult::failed(format!("failed to list {}: {error}", self.path))
            }
        };

        let mut files = Vec::new();
        let mut dirs = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            match entry.file_type().await {
                Ok(kind) if kind.is_dir() => dirs.push(format!("{name}/")),
                _ => files.push(name),
            }
        }
        dirs.sort();
        files.sort();

        let listing: Vec<String> = dirs.into_iter().chain(files).collect();
        let output = format!("Contents of {}:\n{}", self.path, listing.join("\n"));

        let mut new_state = state.clone();
        new_state.last_output = Some(output.clone());
        OperatorResult::succeeded(new_state, output)
    }
}

/// Write content to a file. Destructive.
pub struct WriteFile {
    name: String,
    path: String,
    content: String,
}

impl WriteFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: format!("write_file({path})"),
            path,
            content: content.into(),
        }
    }

    pub fn shared(path: impl Into<String>, content: impl Into<String>) -> SharedOperator {
        Arc::new(Self::new(path, content))
    }
}

#[async_trait]
impl Operator for WriteFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_destructive(&self) -> bool {
        true
    }

    fn params(&self) -> serde_json::Value {
        json!({ "op": "write_file", "path": self.path, "content": self.content })
    }

    fn is_applicable(&self, _state: &EditorState, _goal: &Goal) -> bool {
        true
    }

    async fn execute(&self, state: &EditorState) -> OperatorResult {
        let full_path = resolve(state, &self.path);
        if let Some(parent) = full_path.parent() {
            if let Err(error) = tokio::fs::create_dir_all(parent).await {
                return OperatorResult::failed(format!(
                    "failed to create parent of {}: {error}",
                    self.path
                ));
            }
        }
        if let Err(error) = tokio::fs::write(&full_path, &self.content).await {
            return OperatorResult::failed(format!("failed to write {}: {error}", self.path));
        }

        let message = format!("Wrote {} bytes to {}", self.content.len(), self.path);
        let mut new_state = state.clone();
        new_state.last_output = Some(message.clone());
        OperatorResult::succeeded(new_state, message)
    }
}

/// Replace a file with corrected content, carrying the hypothesis that
/// motivated the fix. Destructive.
pub struct ApplyFix {
    name: String,
    path: String,
    fix_description: String,
    fixed_content: String,
}

impl ApplyFix {
    pub fn new(
        path: impl Into<String>,
        fix_description: impl Into<String>,
        fixed_content: impl Into<String>,
    ) -> Self {
        let path = path.into();
        Self {
            name: format!("apply_fix({path})"),
            path,
            fix_description: fix_description.into(),
            fixed_content: fixed_content.into(),
        }
    }

    pub fn shared(
        path: impl Into<String>,
        fix_description: impl Into<String>,
        fixed_content: impl Into<String>,
    ) -> SharedOperator {
        Arc::new(Self::new(path, fix_description, fixed_content))
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl Operator for ApplyFix {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_destructive(&self) -> bool {
        true
    }

    fn params(&self) -> serde_json::Value {
        json!({
            "op": "apply_fix",
            "path": self.path,
            "fix_description": self.fix_description,
            "fixed_content": self.fixed_content,
        })
    }

    fn is_applicable(&self, _state: &EditorState, _goal: &Goal) -> bool {
        true
    }

    async fn execute(&self, state: &EditorState) -> OperatorResult {
        let full_path = resolve(state, &self.path);
        if let Err(error) = tokio::fs::write(&full_path, &self.fixed_content).await {
            return OperatorResult::failed(format!("failed to write fix to {}: {error}", self.path));
        }

        let mut new_state = state.clone();
        let ext = full_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        new_state.open_files.insert(
            self.path.clone(),
            FileRecord::new(
                &self.path,
                self.fixed_content.clone(),
                FileRecord::language_for_extension(ext),
                Utc::now(),
            ),
        );
        let message = format!("Applied fix to {}: {}", self.path, self.fix_description);
        new_state.last_output = Some(message.clone());

        OperatorResult::succeeded(new_state, message)
    }
}
