// Context extraction: embed the question, pull the nearest news summaries
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::embedding::EmbeddingModel;
use crate::errors::{BotError, Result};
use crate::rag::chain::{require, Chain, FieldMap};
use crate::rag::types::RetrievedContext;
use crate::vector_db::{ScoredPoint, VectorStore};

/// Default output field
pub const CONTEXT_KEY: &str = "context";

/// Payload field holding a news summary
pub const SUMMARY_FIELD: &str = "summary";

/// Retrieves the `top_k` news summaries closest to the question
pub struct ContextExtractorChain {
    embedding_model: Arc<dyn EmbeddingModel>,
    vector_store: Arc<dyn VectorStore>,
    collection: String,
    top_k: usize,
    output_key: String,
}

impl ContextExtractorChain {
    /// Create extractor over `collection` with `top_k = 1`
    pub fn new(
        embedding_model: Arc<dyn EmbeddingModel>,
        vector_store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedding_model,
            vector_store,
            collection: collection.into(),
            top_k: 1,
            output_key: CONTEXT_KEY.to_string(),
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_output_key(mut self, output_key: impl Into<String>) -> Self {
        self.output_key = output_key.into();
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Retrieve context for `question`.
    ///
    /// `about_me` is accepted for interface symmetry and not used for
    /// retrieval yet.
    pub async fn extract(&self, _about_me: &str, question: &str) -> Result<RetrievedContext> {
        if question.is_empty() {
            return Err(BotError::InvalidInput("question must not be empty".to_string()));
        }

        if self.top_k == 0 {
            return Ok(RetrievedContext::default());
        }

        let embedding = self.embedding_model.embed(question).map_err(|e| {
            warn!(error = %e, "question embedding failed");
            e
        })?;

        let expected = self.embedding_model.dimension();
        if embedding.len() != expected {
            warn!(got = embedding.len(), expected, "embedding has unexpected length");
            return Err(BotError::upstream(
                "embedding",
                format!("expected {} dimensions, got {}", expected, embedding.len()),
            ));
        }

        let matches = self
            .vector_store
            .search(&embedding, self.top_k, &self.collection)
            .await
            .map_err(|e| {
                warn!(error = %e, collection = %self.collection, "vector search failed");
                e
            })?;

        debug!(
            collection = %self.collection,
            top_k = self.top_k,
            matches = matches.len(),
            "retrieved news context"
        );

        join_summaries(&matches, self.top_k)
    }
}

/// Each summary followed by a newline, in rank order
fn join_summaries(matches: &[ScoredPoint], limit: usize) -> Result<RetrievedContext> {
    let mut text = String::new();
    for point in matches.iter().take(limit) {
        let summary = point.payload_str(SUMMARY_FIELD).ok_or_else(|| {
            BotError::upstream(
                "vector-store",
                format!("match '{}' has no string '{}' payload", point.id, SUMMARY_FIELD),
            )
        })?;
        text.push_str(summary);
        text.push('\n');
    }
    Ok(RetrievedContext { text })
}

#[async_trait]
impl Chain for ContextExtractorChain {
    fn name(&self) -> &str {
        "context_extractor"
    }

    fn input_keys(&self) -> Vec<&str> {
        vec!["about_me", "question"]
    }

    fn output_keys(&self) -> Vec<&str> {
        vec![self.output_key.as_str()]
    }

    async fn call(&self, inputs: &FieldMap) -> Result<FieldMap> {
        let about_me = require(inputs, "about_me")?;
        let question = require(inputs, "question")?;

        let context = self.extract(about_me, question).await?;
        Ok(FieldMap::from([(self.output_key.clone(), context.text)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_db::InMemoryStore;
    use serde_json::{json, Map};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Maps text to a vector by its length; counts calls
    #[derive(Default)]
    struct LengthEmbedder {
        calls: AtomicUsize,
    }

    impl EmbeddingModel for LengthEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1.0, text.len() as f32 / 100.0])
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    struct BrokenEmbedder;

    impl EmbeddingModel for BrokenEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(BotError::upstream("embedding", "model not loaded"))
        }

        fn dimension(&self) -> usize {
            0
        }
    }

    fn summary(text: &str) -> Map<String, serde_json::Value> {
        let mut payload = Map::new();
        payload.insert(SUMMARY_FIELD.to_string(), json!(text));
        payload
    }

    fn seeded_store() -> Arc<InMemoryStore> {
        let store = InMemoryStore::new();
        store
            .upsert("news", "1", vec![1.0, 0.3], summary("Tech stocks rally."))
            .unwrap();
        store
            .upsert("news", "2", vec![1.0, 0.9], summary("Chipmakers report gains."))
            .unwrap();
        store
            .upsert("news", "3", vec![-1.0, 0.0], summary("Oil slides."))
            .unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_extract_joins_in_rank_order() {
        let chain = ContextExtractorChain::new(Arc::new(LengthEmbedder::default()), seeded_store(), "news")
            .with_top_k(2);

        // 36 chars -> [1.0, 0.36], nearest to doc 1 then doc 2
        let context = chain
            .extract("", "What is the outlook for tech stocks?")
            .await
            .unwrap();
        assert_eq!(context.text, "Tech stocks rally.\nChipmakers report gains.\n");
    }

    #[tokio::test]
    async fn test_default_top_k_is_one() {
        let chain = ContextExtractorChain::new(Arc::new(LengthEmbedder::default()), seeded_store(), "news");
        assert_eq!(chain.top_k(), 1);

        let context = chain.extract("", "What is the outlook for tech stocks?").await.unwrap();
        assert_eq!(context.text, "Tech stocks rally.\n");
    }

    #[tokio::test]
    async fn test_top_k_zero_skips_services() {
        let embedder = Arc::new(LengthEmbedder::default());
        let chain = ContextExtractorChain::new(embedder.clone(), seeded_store(), "news").with_top_k(0);

        let context = chain.extract("", "Any news?").await.unwrap();
        assert!(context.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    struct NoMatches;

    #[async_trait]
    impl VectorStore for NoMatches {
        async fn search(&self, _v: &[f32], _k: usize, _c: &str) -> Result<Vec<ScoredPoint>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_zero_matches_yields_empty_context() {
        let chain = ContextExtractorChain::new(Arc::new(LengthEmbedder::default()), Arc::new(NoMatches), "news")
            .with_top_k(5);
        assert_eq!(chain.extract("", "Any news on bonds?").await.unwrap().text, "");
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let chain = ContextExtractorChain::new(Arc::new(LengthEmbedder::default()), seeded_store(), "news");
        let err = chain.extract("about me", "").await.unwrap_err();
        assert!(matches!(err, BotError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_whitespace_question_is_embedded() {
        let embedder = Arc::new(LengthEmbedder::default());
        let chain = ContextExtractorChain::new(embedder.clone(), seeded_store(), "news");

        let context = chain.extract("", " ").await.unwrap();
        assert_eq!(context.text.lines().count(), 1);
        assert!(context.text.ends_with('\n'));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    /// Ignores `k` and returns every point it holds
    struct OverfullStore;

    #[async_trait]
    impl VectorStore for OverfullStore {
        async fn search(&self, _v: &[f32], k: usize, _c: &str) -> Result<Vec<ScoredPoint>> {
            Ok((0..k + 2)
                .map(|i| ScoredPoint {
                    id: i.to_string(),
                    score: 1.0,
                    payload: summary(&format!("Story {}", i)),
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_extra_matches_truncated_to_top_k() {
        let chain = ContextExtractorChain::new(Arc::new(LengthEmbedder::default()), Arc::new(OverfullStore), "news")
            .with_top_k(2);
        let context = chain.extract("", "Any news?").await.unwrap();
        assert_eq!(context.text, "Story 0\nStory 1\n");
    }

    /// Claims a wider vector than it produces
    struct MisreportingEmbedder;

    impl EmbeddingModel for MisreportingEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        fn dimension(&self) -> usize {
            384
        }
    }

    #[tokio::test]
    async fn test_embedding_length_mismatch_is_upstream_error() {
        let chain = ContextExtractorChain::new(Arc::new(MisreportingEmbedder), seeded_store(), "news");
        let err = chain.extract("", "question").await.unwrap_err();
        assert!(err.is_upstream());
        assert!(err.to_string().contains("384"));
    }

    #[tokio::test]
    async fn test_embedding_failure_propagates() {
        let chain = ContextExtractorChain::new(Arc::new(BrokenEmbedder), seeded_store(), "news");
        let err = chain.extract("", "question").await.unwrap_err();
        assert!(err.is_upstream());
        assert!(err.to_string().contains("model not loaded"));
    }

    #[tokio::test]
    async fn test_missing_collection_propagates() {
        let chain = ContextExtractorChain::new(Arc::new(LengthEmbedder::default()), seeded_store(), "absent");
        let err = chain.extract("", "question").await.unwrap_err();
        assert!(err.is_upstream());
    }

    #[test]
    fn test_match_without_summary_is_upstream_error() {
        let point = ScoredPoint {
            id: "7".to_string(),
            score: 0.9,
            payload: Map::new(),
        };
        let err = join_summaries(&[point], 1).unwrap_err();
        assert!(err.is_upstream());
    }

    #[test]
    fn test_join_zero_matches() {
        assert_eq!(join_summaries(&[], 3).unwrap().text, "");
    }

    #[tokio::test]
    async fn test_chain_call_uses_output_key() {
        let chain = ContextExtractorChain::new(Arc::new(LengthEmbedder::default()), seeded_store(), "news")
            .with_output_key("news");

        let inputs = FieldMap::from([
            ("about_me".to_string(), "investor".to_string()),
            ("question".to_string(), "What is the outlook for tech stocks?".to_string()),
        ]);
        let outputs = chain.call(&inputs).await.unwrap();
        assert_eq!(outputs["news"], "Tech stocks rally.\n");
        assert_eq!(chain.output_keys(), vec!["news"]);
    }

    #[tokio::test]
    async fn test_chain_call_missing_question() {
        let chain = ContextExtractorChain::new(Arc::new(LengthEmbedder::default()), seeded_store(), "news");
        let inputs = FieldMap::from([("about_me".to_string(), "investor".to_string())]);
        let err = chain.call(&inputs).await.unwrap_err();
        assert!(matches!(err, BotError::MissingField(ref k) if k == "question"));
    }
}
