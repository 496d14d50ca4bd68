//! financial-bot - retrieval-augmented financial question answering
//!
//! Embeds a user's question, retrieves the most relevant news summaries from
//! a vector store, renders a prompt with the user's profile and chat history,
//! and asks a language model for the answer.
//!
//! # Architecture
//!
//! - **Embedding**: `EmbeddingModel` seam, candle BERT engine
//! - **Vector DB**: `VectorStore` seam, Qdrant and in-memory stores
//! - **LLM**: `TextGenerator` seam, Ollama client
//! - **RAG**: chains, prompt templates, the `FinancialBot` pipeline

pub mod errors;
pub use errors::{BotError, Result};

pub mod config;
pub mod logging;

pub mod embedding;
pub mod llm;
pub mod vector_db;

pub mod rag;
pub use rag::{Answer, BotReply, FinancialBot, Query};

// Command-line surface for the binary
pub mod cli;
