pub mod chunk;
pub mod config;
pub mod context;
pub mod goal;
pub mod metrics;
pub mod operator;
pub mod state;
pub mod verbosity;

pub use chunk::{Chunk, StateSignature};
pub use config::Config;
pub use context::{ContextNode, ContextStatus};
pub use goal::{Goal, GoalArena, GoalStatus};
pub use metrics::CognitiveMetrics;
pub use operator::{Operator, OperatorResult, SharedOperator};
pub use state::{EditorState, FileRecord};
pub use verbosity::Verbosity;
