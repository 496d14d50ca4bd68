// Answer generation: render the prompt, call the model, pass its text through
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::llm::TextGenerator;
use crate::rag::chain::{require, Chain, FieldMap};
use crate::rag::context::CONTEXT_KEY;
use crate::rag::history::HistorySink;
use crate::rag::template::PromptTemplate;
use crate::rag::types::{Answer, PromptFields};

/// Default output field
pub const ANSWER_KEY: &str = "answer";

/// How chain inputs map onto the `news_context` and `question` prompt slots.
///
/// `Compatible` reproduces the historical wiring: the user's question fills
/// `news_context` and the retrieved context fills `question`. `Corrected`
/// puts each value in the slot its name suggests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldWiring {
    #[default]
    Compatible,
    Corrected,
}

impl FieldWiring {
    /// Returns `(news_context, question)` prompt values
    pub fn route<'a>(&self, question: &'a str, context: &'a str) -> (&'a str, &'a str) {
        match self {
            FieldWiring::Compatible => (question, context),
            FieldWiring::Corrected => (context, question),
        }
    }
}

/// Generates the answer for a rendered financial prompt
pub struct FinancialBotQaChain {
    generator: Arc<dyn TextGenerator>,
    template: PromptTemplate,
    history_sink: Arc<dyn HistorySink>,
    wiring: FieldWiring,
    context_key: String,
    output_key: String,
}

impl FinancialBotQaChain {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        template: PromptTemplate,
        history_sink: Arc<dyn HistorySink>,
    ) -> Self {
        Self {
            generator,
            template,
            history_sink,
            wiring: FieldWiring::default(),
            context_key: CONTEXT_KEY.to_string(),
            output_key: ANSWER_KEY.to_string(),
        }
    }

    pub fn with_wiring(mut self, wiring: FieldWiring) -> Self {
        self.wiring = wiring;
        self
    }

    /// Field the retrieved context is read from
    pub fn with_context_key(mut self, context_key: impl Into<String>) -> Self {
        self.context_key = context_key.into();
        self
    }

    pub fn with_output_key(mut self, output_key: impl Into<String>) -> Self {
        self.output_key = output_key.into();
        self
    }

    pub fn wiring(&self) -> FieldWiring {
        self.wiring
    }

    /// Render the prompt from the four slot values and generate the answer.
    ///
    /// The answer is the backend's text, unmodified. The chat history is
    /// handed to the history sink after a successful generation.
    pub async fn generate(
        &self,
        about_me: &str,
        news_context: &str,
        chat_history: &str,
        question: &str,
    ) -> Result<Answer> {
        let fields = PromptFields {
            user_context: about_me,
            news_context,
            chat_history,
            question,
        }
        .to_fields();

        let prompt = self.template.format_infer(&fields)?.prompt;
        debug!(template = %self.template.name, prompt_chars = prompt.len(), "prompt rendered");

        let text = self.generator.generate(&prompt).await.map_err(|e| {
            warn!(error = %e, "text generation failed");
            e
        })?;

        self.history_sink.record(chat_history);

        Ok(Answer { text })
    }
}

#[async_trait]
impl Chain for FinancialBotQaChain {
    fn name(&self) -> &str {
        "financial_bot_qa"
    }

    fn input_keys(&self) -> Vec<&str> {
        vec!["about_me", "question", "chat_history", self.context_key.as_str()]
    }

    fn output_keys(&self) -> Vec<&str> {
        vec![self.output_key.as_str()]
    }

    async fn call(&self, inputs: &FieldMap) -> Result<FieldMap> {
        let about_me = require(inputs, "about_me")?;
        let question = require(inputs, "question")?;
        let chat_history = require(inputs, "chat_history")?;
        let context = require(inputs, &self.context_key)?;

        let (news_context, question_slot) = self.wiring.route(question, context);

        let answer = self
            .generate(about_me, news_context, chat_history, question_slot)
            .await?;
        Ok(FieldMap::from([(self.output_key.clone(), answer.text)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BotError;
    use crate::rag::history::RecordingHistorySink;
    use std::sync::Mutex;

    /// Returns a fixed completion and remembers prompts
    struct ScriptedGenerator {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl TextGenerator for FailingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Err(BotError::upstream("ollama", "HTTP 500"))
        }
    }

    fn inputs() -> FieldMap {
        FieldMap::from([
            ("about_me".to_string(), "I am a student.".to_string()),
            ("question".to_string(), "Should I buy NVDA?".to_string()),
            ("chat_history".to_string(), "Human: hi\nAI: hello".to_string()),
            ("context".to_string(), "Chipmakers report gains.\n".to_string()),
        ])
    }

    #[test]
    fn test_wiring_route() {
        assert_eq!(FieldWiring::Compatible.route("q", "c"), ("q", "c"));
        assert_eq!(FieldWiring::Corrected.route("q", "c"), ("c", "q"));
        assert_eq!(FieldWiring::default(), FieldWiring::Compatible);
    }

    #[tokio::test]
    async fn test_answer_is_backend_output_verbatim() {
        let generator = ScriptedGenerator::new("  Hold for now.\n");
        let chain = FinancialBotQaChain::new(
            generator.clone(),
            PromptTemplate::falcon(),
            Arc::new(RecordingHistorySink::new()),
        );

        let answer = chain.generate("me", "news", "", "q").await.unwrap();
        assert_eq!(answer.text, "  Hold for now.\n");
        assert_eq!(generator.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_compatible_wiring_transposes_slots() {
        let generator = ScriptedGenerator::new("ok");
        let chain = FinancialBotQaChain::new(
            generator.clone(),
            PromptTemplate::falcon(),
            Arc::new(RecordingHistorySink::new()),
        );

        chain.call(&inputs()).await.unwrap();
        let prompt = &generator.prompts()[0];
        assert!(prompt.contains(">>DOMAIN<< I am a student.\nShould I buy NVDA?"));
        assert!(prompt.contains(">>QUESTION<< Chipmakers report gains.\n"));
    }

    #[tokio::test]
    async fn test_corrected_wiring_uses_named_slots() {
        let generator = ScriptedGenerator::new("ok");
        let chain = FinancialBotQaChain::new(
            generator.clone(),
            PromptTemplate::falcon(),
            Arc::new(RecordingHistorySink::new()),
        )
        .with_wiring(FieldWiring::Corrected);

        chain.call(&inputs()).await.unwrap();
        let prompt = &generator.prompts()[0];
        assert!(prompt.contains(">>DOMAIN<< I am a student.\nChipmakers report gains.\n"));
        assert!(prompt.contains(">>QUESTION<< Should I buy NVDA?"));
    }

    #[tokio::test]
    async fn test_missing_input_skips_generation() {
        let generator = ScriptedGenerator::new("never");
        let sink = Arc::new(RecordingHistorySink::new());
        let chain = FinancialBotQaChain::new(generator.clone(), PromptTemplate::falcon(), sink.clone());

        let mut partial = inputs();
        partial.remove("chat_history");

        let err = chain.call(&partial).await.unwrap_err();
        assert!(matches!(err, BotError::MissingField(ref k) if k == "chat_history"));
        assert!(generator.prompts().is_empty());
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn test_template_missing_placeholder_skips_generation() {
        let mut template = PromptTemplate::falcon();
        template.question_template = ">>QUESTION<< {question} ({ticker})".to_string();

        let generator = ScriptedGenerator::new("never");
        let chain = FinancialBotQaChain::new(
            generator.clone(),
            template,
            Arc::new(RecordingHistorySink::new()),
        );

        let err = chain.generate("me", "news", "", "q").await.unwrap_err();
        assert!(matches!(err, BotError::MissingField(ref k) if k == "ticker"));
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_history_recorded_once_per_generation() {
        let sink = Arc::new(RecordingHistorySink::new());
        let chain = FinancialBotQaChain::new(ScriptedGenerator::new("ok"), PromptTemplate::falcon(), sink.clone());

        chain.call(&inputs()).await.unwrap();
        assert_eq!(sink.records(), vec!["Human: hi\nAI: hello".to_string()]);
    }

    #[tokio::test]
    async fn test_backend_failure_propagates_without_history() {
        let sink = Arc::new(RecordingHistorySink::new());
        let chain = FinancialBotQaChain::new(Arc::new(FailingGenerator), PromptTemplate::falcon(), sink.clone());

        let err = chain.call(&inputs()).await.unwrap_err();
        assert!(err.is_upstream());
        assert!(sink.records().is_empty());
    }

    #[test]
    fn test_declared_inputs_follow_context_key() {
        let chain = FinancialBotQaChain::new(
            ScriptedGenerator::new("ok"),
            PromptTemplate::falcon(),
            Arc::new(RecordingHistorySink::new()),
        )
        .with_context_key("news");
        assert_eq!(chain.input_keys(), vec!["about_me", "question", "chat_history", "news"]);
        assert_eq!(chain.output_keys(), vec![ANSWER_KEY]);
    }
}
