//! Re-materialize operators from parameter bags.
//!
//! The single mapping from `{"op": ..., ...}` to a boxed operator, used for
//! LLM-suggested operators and for chunk-derived proposals alike.

use serde_json::Value;

use crate::domain::models::SharedOperator;

use super::exec_ops::RunCode;
use super::file_ops::{ApplyFix, ListDirectory, ReadFile, WriteFile};

/// Build an operator from its parameter bag. Unknown kinds and missing
/// required parameters yield `None`; callers skip those suggestions.
pub fn materialize(params: &Value) -> Option<SharedOperator> {
    let kind = params.get("op")?.as_str()?;
    match kind {
        "read_file" => {
            let path = params.get("path")?.as_str()?;
            Some(ReadFile::shared(path))
        }
        "list_dir" => {
            let path = params
                .get("path")
                .and_then(Value::as_str)
                .unwrap_or(".");
            Some(ListDirectory::shared(path))
        }
        "write_file" => {
            let path = params.get("path")?.as_str()?;
            let content = params.get("content")?.as_str()?;
            Some(WriteFile::shared(path, content))
        }
        "apply_fix" => {
            let path = params.get("path")?.as_str()?;
            let description = params.get("fix_description")?.as_str()?;
            let content = params.get("fixed_content")?.as_str()?;
            Some(ApplyFix::shared(path, description, content))
        }
        "run_code" => {
            let path = params.get("path")?.as_str()?;
            Some(RunCode::shared(path))
        }
        _ => None,
    }
}

/// Build an operator from an LLM suggestion: kind plus a flat parameter
/// object.
pub fn materialize_suggestion(name: &str, parameters: &Value) -> Option<SharedOperator> {
    let mut params = parameters.clone();
    if let Value::Object(map) = &mut params {
        map.insert("op".to_string(), Value::String(name.to_lowercase()));
    } else {
        params = serde_json::json!({ "op": name.to_lowercase() });
    }
    materialize(&params)
}
