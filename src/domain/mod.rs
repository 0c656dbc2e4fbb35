//! Domain layer: models and ports.
//!
//! Models are plain data; ports are the trait seams behind which the
//! collaborators (LLM transport, vector index, approval hook, code
//! analyzer, operators) live.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
