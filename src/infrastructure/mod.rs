//! Adapters behind the domain ports: HTTP LLM transport, sqlite vector
//! index, tree-sitter analyzer, configuration loading, logging setup.

pub mod ast;
pub mod config;
pub mod logging;
pub mod ollama;
pub mod vector;
