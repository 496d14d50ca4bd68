//! Qdrant vector store adapter
use async_trait::async_trait;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, value::Kind, PointId, SearchPointsBuilder, Value as QdrantValue,
};
use qdrant_client::Qdrant;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::config::VectorStoreConfig;
use crate::errors::{BotError, Result};
use crate::vector_db::{ScoredPoint, VectorStore};

const SERVICE: &str = "qdrant";

/// Vector store backed by a Qdrant server
pub struct QdrantStore {
    client: Qdrant,
    url: String,
}

impl QdrantStore {
    /// Build a client for the configured server.
    ///
    /// No request is made until the first search.
    pub fn connect(config: &VectorStoreConfig) -> Result<Self> {
        let client = Qdrant::from_url(&config.url)
            .api_key(config.api_key.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BotError::upstream(SERVICE, format!("Failed to create client: {}", e)))?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    /// Check that a collection exists on the server
    pub async fn has_collection(&self, collection: &str) -> Result<bool> {
        self.client
            .collection_exists(collection)
            .await
            .map_err(|e| BotError::upstream(SERVICE, e))
    }

    /// Server URL this store talks to
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        collection: &str,
    ) -> Result<Vec<ScoredPoint>> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(collection, vector.to_vec(), k as u64).with_payload(true),
            )
            .await
            .map_err(|e| BotError::upstream(SERVICE, format!("search in '{}': {}", collection, e)))?;

        debug!(collection, hits = response.result.len(), "qdrant search complete");

        Ok(response
            .result
            .into_iter()
            .map(|point| ScoredPoint {
                id: point_id_to_string(&point.id),
                score: point.score,
                payload: payload_to_json(point.payload),
            })
            .collect())
    }
}

fn payload_to_json(payload: HashMap<String, QdrantValue>) -> Map<String, JsonValue> {
    payload
        .into_iter()
        .filter_map(|(key, value)| qdrant_to_json_value(&value).map(|json| (key, json)))
        .collect()
}

fn qdrant_to_json_value(value: &QdrantValue) -> Option<JsonValue> {
    value.kind.as_ref().and_then(|kind| match kind {
        Kind::NullValue(_) => Some(JsonValue::Null),
        Kind::StringValue(s) => Some(JsonValue::String(s.clone())),
        Kind::IntegerValue(i) => Some(JsonValue::Number((*i).into())),
        Kind::DoubleValue(f) => serde_json::Number::from_f64(*f).map(JsonValue::Number),
        Kind::BoolValue(b) => Some(JsonValue::Bool(*b)),
        Kind::ListValue(list) => Some(JsonValue::Array(
            list.values.iter().filter_map(qdrant_to_json_value).collect(),
        )),
        Kind::StructValue(inner) => Some(JsonValue::Object(
            inner
                .fields
                .iter()
                .filter_map(|(k, v)| qdrant_to_json_value(v).map(|json| (k.clone(), json)))
                .collect(),
        )),
    })
}

fn point_id_to_string(point_id: &Option<PointId>) -> String {
    match point_id.as_ref().and_then(|id| id.point_id_options.as_ref()) {
        Some(PointIdOptions::Num(n)) => n.to_string(),
        Some(PointIdOptions::Uuid(u)) => u.clone(),
        None => "unknown".to_string(),
    }
}
