//! Typed LLM client wrapper, response schemas, and prompt templates.

pub mod client;
pub mod prompts;
pub mod schemas;

pub use client::LlmClient;
pub use schemas::{
    CodeCandidate, OperatorProposal, OperatorSuggestion, PopulationProposal, SchemaValidated,
    UtilityEstimate, UtilityEvaluation,
};
