//! In-process vector store with brute-force cosine ranking.
//!
//! Holds every point in memory, so it is meant for local runs, demos and
//! tests rather than a real news corpus.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::errors::{BotError, Result};
use crate::vector_db::{ScoredPoint, VectorStore};

const SERVICE: &str = "memory-store";

#[derive(Debug, Clone)]
struct StoredPoint {
    id: String,
    vector: Vec<f32>,
    payload: Map<String, Value>,
}

/// Collections of points kept in memory
#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Vec<StoredPoint>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a point, creating the collection on first use
    pub fn upsert(
        &self,
        collection: &str,
        id: impl Into<String>,
        vector: Vec<f32>,
        payload: Map<String, Value>,
    ) -> Result<()> {
        let id = id.into();
        let mut collections = self
            .collections
            .write()
            .map_err(|_| BotError::upstream(SERVICE, "lock poisoned"))?;
        let points = collections.entry(collection.to_string()).or_default();

        if let Some(dim) = points.first().map(|p| p.vector.len()) {
            if dim != vector.len() {
                return Err(BotError::InvalidInput(format!(
                    "vector length {} does not match collection dimension {}",
                    vector.len(),
                    dim
                )));
            }
        }

        let point = StoredPoint { id, vector, payload };
        match points.iter_mut().find(|p| p.id == point.id) {
            Some(existing) => *existing = point,
            None => points.push(point),
        }
        Ok(())
    }

    /// Number of points in a collection (0 if it does not exist)
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|c| c.get(collection).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        collection: &str,
    ) -> Result<Vec<ScoredPoint>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| BotError::upstream(SERVICE, "lock poisoned"))?;

        let points = collections
            .get(collection)
            .ok_or_else(|| BotError::upstream(SERVICE, format!("collection '{}' not found", collection)))?;

        let mut scored = Vec::with_capacity(points.len());
        for point in points {
            let score = cosine_similarity(vector, &point.vector)?;
            scored.push(ScoredPoint {
                id: point.id.clone(),
                score,
                payload: point.payload.clone(),
            });
        }

        // Stable sort keeps insertion order between equal scores.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}

fn cosine_similarity(query: &[f32], candidate: &[f32]) -> Result<f32> {
    if query.is_empty() || query.len() != candidate.len() {
        return Err(BotError::upstream(
            SERVICE,
            format!(
                "vector length mismatch: {} != {}",
                query.len(),
                candidate.len()
            ),
        ));
    }

    let dot: f32 = query.iter().zip(candidate).map(|(a, b)| a * b).sum();
    let query_norm = query.iter().map(|v| v * v).sum::<f32>().sqrt();
    let candidate_norm = candidate.iter().map(|v| v * v).sum::<f32>().sqrt();
    let denom = query_norm * candidate_norm;

    if denom <= f32::EPSILON {
        return Ok(0.0);
    }
    Ok(dot / denom)
}
