// End-to-end question answering: context extraction, then answer generation
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::config::Config;
use crate::embedding::{EmbeddingEngine, EmbeddingModel};
use crate::errors::{BotError, Result};
use crate::llm::{OllamaGenerator, TextGenerator};
use crate::rag::chain::{require, Chain, SequentialChain};
use crate::rag::context::ContextExtractorChain;
use crate::rag::history::{HistorySink, TracingHistorySink};
use crate::rag::qa::FinancialBotQaChain;
use crate::rag::template::PromptTemplate;
use crate::rag::types::{Answer, BotReply, Query, RetrievedContext};
use crate::vector_db::{QdrantStore, VectorStore};

/// Fields a caller supplies per question
pub const QUERY_KEYS: [&str; 3] = ["about_me", "question", "chat_history"];

/// The external collaborators a bot is built from
pub struct Backends {
    pub embedding_model: Arc<dyn EmbeddingModel>,
    pub vector_store: Arc<dyn VectorStore>,
    pub generator: Arc<dyn TextGenerator>,
    pub history_sink: Arc<dyn HistorySink>,
}

impl Backends {
    /// Candle embeddings, Qdrant, Ollama and tracing-based history logging
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            embedding_model: Arc::new(EmbeddingEngine::new(&config.embedding)?),
            vector_store: Arc::new(QdrantStore::connect(&config.vector_store)?),
            generator: Arc::new(OllamaGenerator::new(&config.llm)?),
            history_sink: Arc::new(TracingHistorySink),
        })
    }
}

/// Financial question-answering pipeline
pub struct FinancialBot {
    chain: SequentialChain,
    context_key: String,
    answer_key: String,
}

impl FinancialBot {
    /// Compose the two stages; fails if their field declarations do not line up
    pub fn new(extractor: ContextExtractorChain, qa: FinancialBotQaChain) -> Result<Self> {
        let context_key = single_output(&extractor)?;
        let answer_key = single_output(&qa)?;

        let stages: Vec<Box<dyn Chain>> = vec![Box::new(extractor), Box::new(qa)];
        let chain = SequentialChain::new(stages, &QUERY_KEYS)?;

        Ok(Self {
            chain,
            context_key,
            answer_key,
        })
    }

    /// Build from configuration and already-constructed backends
    pub fn with_backends(config: &Config, backends: Backends) -> Result<Self> {
        let template = PromptTemplate::lookup(&config.prompt.template).ok_or_else(|| {
            BotError::ConfigError(format!("Unknown prompt template: {}", config.prompt.template))
        })?;

        let extractor = ContextExtractorChain::new(
            backends.embedding_model,
            backends.vector_store,
            config.vector_store.collection.clone(),
        )
        .with_top_k(config.retrieval.top_k);

        let qa = FinancialBotQaChain::new(backends.generator, template, backends.history_sink)
            .with_wiring(config.prompt.wiring);

        Self::new(extractor, qa)
    }

    /// Build with the production backends named in `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_backends(config, Backends::from_config(config)?)
    }

    /// Answer a question, returning the retrieved context as well
    pub async fn ask(&self, query: &Query) -> Result<BotReply> {
        let started = Instant::now();
        info!(question_chars = query.question.len(), "answering question");

        let fields = self.chain.run(&query.to_fields()).await?;

        let reply = BotReply {
            context: RetrievedContext {
                text: require(&fields, &self.context_key)?.to_string(),
            },
            answer: Answer {
                text: require(&fields, &self.answer_key)?.to_string(),
            },
        };

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            context_chars = reply.context.text.len(),
            answer_chars = reply.answer.text.len(),
            "question answered"
        );
        Ok(reply)
    }

    /// Answer a question
    pub async fn answer(&self, query: &Query) -> Result<Answer> {
        Ok(self.ask(query).await?.answer)
    }

    /// Stage names in execution order
    pub fn stages(&self) -> Vec<&str> {
        self.chain.stage_names()
    }
}

/// The one field a stage declares as its output
fn single_output(chain: &dyn Chain) -> Result<String> {
    match chain.output_keys().as_slice() {
        [key] => Ok(key.to_string()),
        keys => Err(BotError::Composition(format!(
            "chain '{}' must declare exactly one output, found {}",
            chain.name(),
            keys.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::history::RecordingHistorySink;
    use crate::rag::qa::FieldWiring;
    use crate::vector_db::InMemoryStore;
    use async_trait::async_trait;

    struct UnitEmbedder;

    impl EmbeddingModel for UnitEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    struct Echo;

    #[async_trait]
    impl TextGenerator for Echo {
        async fn generate(&self, prompt: &str) -> Result<String> {
            Ok(prompt.to_string())
        }
    }

    fn backends() -> Backends {
        let store = InMemoryStore::new();
        let mut payload = serde_json::Map::new();
        payload.insert("summary".to_string(), serde_json::json!("Fed holds rates."));
        store.upsert("alpaca_financial_news", "1", vec![1.0, 0.0], payload).unwrap();

        Backends {
            embedding_model: Arc::new(UnitEmbedder),
            vector_store: Arc::new(store),
            generator: Arc::new(Echo),
            history_sink: Arc::new(RecordingHistorySink::new()),
        }
    }

    #[test]
    fn test_stages_in_order() {
        let bot = FinancialBot::with_backends(&Config::default(), backends()).unwrap();
        assert_eq!(bot.stages(), vec!["context_extractor", "financial_bot_qa"]);
    }

    #[test]
    fn test_mismatched_keys_fail_at_composition() {
        let b = backends();
        let extractor = ContextExtractorChain::new(b.embedding_model, b.vector_store, "news")
            .with_output_key("news_context");
        let qa = FinancialBotQaChain::new(b.generator, PromptTemplate::falcon(), b.history_sink);

        let err = FinancialBot::new(extractor, qa).err().unwrap();
        assert!(matches!(err, BotError::Composition(_)));
    }

    #[tokio::test]
    async fn test_custom_field_names_flow_through_reply() {
        let b = backends();
        let history = Arc::new(RecordingHistorySink::new());
        let extractor = ContextExtractorChain::new(b.embedding_model, b.vector_store, "alpaca_financial_news")
            .with_output_key("news");
        let qa = FinancialBotQaChain::new(b.generator, PromptTemplate::falcon(), history.clone())
            .with_context_key("news")
            .with_output_key("reply");

        let bot = FinancialBot::new(extractor, qa).unwrap();
        let reply = bot
            .ask(&Query::new("", "Will rates move?", "h"))
            .await
            .unwrap();

        assert_eq!(reply.context.text, "Fed holds rates.\n");
        assert!(reply.answer.text.contains(">>ANSWER<< "));
        assert_eq!(history.records(), vec!["h".to_string()]);
    }

    #[test]
    fn test_unknown_template_is_config_error() {
        let mut config = Config::default();
        config.prompt.template = "nope".to_string();
        let err = FinancialBot::with_backends(&config, backends()).err().unwrap();
        assert!(matches!(err, BotError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_ask_returns_context_and_answer() {
        let mut config = Config::default();
        config.prompt.wiring = FieldWiring::Corrected;
        let bot = FinancialBot::with_backends(&config, backends()).unwrap();

        let reply = bot
            .ask(&Query::new("I own bonds.", "Will rates move?", ""))
            .await
            .unwrap();
        assert_eq!(reply.context.text, "Fed holds rates.\n");
        assert!(reply.answer.text.contains(">>QUESTION<< Will rates move?"));
    }
}
