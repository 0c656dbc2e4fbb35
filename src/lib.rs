//! Mindvalve - hybrid neuro-symbolic decision engine.
//!
//! A three-tier reasoning pipeline for autonomous code-editing agents: a
//! deterministic symbolic rule cycle (propose / decide / apply) backstopped
//! by an LLM-driven utility heuristic and, for code-repair goals, an
//! evolutionary search. Successful heuristic resolutions are chunked into
//! unified memory and replayed as cheap cached reflexes on later cycles.

pub mod domain;
pub mod engine;
pub mod infrastructure;
pub mod llm;
pub mod memory;
pub mod operators;
pub mod safety;

pub use domain::models::{Config, EditorState, Goal, GoalStatus, OperatorResult, Verbosity};
pub use domain::{DomainError, DomainResult};
pub use engine::agent::{AgentBuilder, CognitiveAgent};
