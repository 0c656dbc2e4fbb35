pub mod approval;
pub mod code_analyzer;
pub mod llm_transport;
pub mod vector_index;

pub use approval::{ApprovalDecision, ApprovalHook, ApprovalRequest};
pub use code_analyzer::{CodeAnalyzer, FunctionSpan};
pub use llm_transport::{ChatMessage, ChatRequest, ChatResponse, LlmTransport};
pub use vector_index::{EmbeddingService, VectorIndex, VectorRecord};
