//! Question embedding
//!
//! The pipeline only depends on the `EmbeddingModel` seam; `EmbeddingEngine`
//! is the candle-backed implementation used by the binary.

pub mod engine;

pub use engine::EmbeddingEngine;

use crate::errors::Result;

/// Turns text into a fixed-length vector.
///
/// Implementations must be deterministic for fixed weights so that repeated
/// retrieval for the same question is stable.
pub trait EmbeddingModel: Send + Sync {
    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of every vector returned by `embed`
    fn dimension(&self) -> usize;
}
