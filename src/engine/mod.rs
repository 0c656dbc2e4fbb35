//! The decision-engine core: rule cycle, impasse handling, pressure
//! monitoring, the ACT-R resolver, and the evolutionary fallback.

pub mod actr;
pub mod agent;
pub mod context_compressor;
pub mod evaluator;
pub mod evolution;
pub mod impasse;
pub mod meta_monitor;
pub mod rule_engine;
pub mod working_memory;

pub use actr::{ActrResolver, Resolution};
pub use agent::{AgentBuilder, CognitiveAgent, SolveStats};
pub use context_compressor::{CompressedView, ContextCompressor};
pub use evaluator::{CandidateEvaluator, CodeEvaluator, EvaluationResult};
pub use evolution::EvolutionarySolver;
pub use impasse::{Impasse, ImpasseDetector, ImpasseKind, Selection};
pub use meta_monitor::{MetaCognitiveMonitor, ReliefPath};
pub use rule_engine::{Proposal, ProposalSource, Rule, RuleEngine};
pub use working_memory::{StateTransition, WorkingMemory};
