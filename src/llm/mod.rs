//! Text generation backends
//!
//! Provides the `TextGenerator` seam and an Ollama implementation.

pub mod ollama;

pub use ollama::{OllamaGenerator, DEFAULT_MODEL, DEFAULT_OLLAMA_URL};

use async_trait::async_trait;

use crate::errors::Result;

/// Produces a single completion for a rendered prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}
