// RAG (Retrieval-Augmented Generation) pipeline for financial questions
//
// Components:
// - Chain: stage trait with declared fields, sequential composition
// - Context: question embedding + top-k news summary retrieval
// - QA: prompt rendering + single completion
// - Template: prompt layouts
// - History: chat history sinks and windowed buffer
// - Pipeline: the two stages wired together

pub mod chain;
pub mod context;
pub mod history;
pub mod pipeline;
pub mod qa;
pub mod template;
pub mod types;

// Re-export key types
pub use chain::{Chain, FieldMap, SequentialChain};
pub use context::ContextExtractorChain;
pub use history::{ChatHistory, HistorySink, RecordingHistorySink, TracingHistorySink};
pub use pipeline::{Backends, FinancialBot};
pub use qa::{FieldWiring, FinancialBotQaChain};
pub use template::{PromptOutput, PromptTemplate};
pub use types::{Answer, BotReply, Query, RetrievedContext};
