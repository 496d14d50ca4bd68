//! Vector store access
//!
//! Components:
//! - `VectorStore`: read-only similarity search seam used by the pipeline
//! - `QdrantStore`: Qdrant gRPC adapter
//! - `InMemoryStore`: brute-force cosine store for local runs and tests

pub mod memory;
pub mod qdrant;

pub use memory::InMemoryStore;
pub use qdrant::QdrantStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::Result;

/// One search hit: the stored payload and its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: Map<String, Value>,
}

impl ScoredPoint {
    /// String payload field, if present
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

/// Nearest-neighbour search over a named collection.
///
/// Results are ordered by decreasing similarity and hold at most `k` points
/// (fewer when the collection is smaller).
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn search(&self, vector: &[f32], k: usize, collection: &str)
        -> Result<Vec<ScoredPoint>>;
}
