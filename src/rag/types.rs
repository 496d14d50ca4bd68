// Data contracts flowing through the pipeline
use serde::{Deserialize, Serialize};

use crate::rag::chain::FieldMap;

/// One user interaction. Built per question, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub about_me: String,
    pub question: String,
    pub chat_history: String,
}

impl Query {
    pub fn new(
        about_me: impl Into<String>,
        question: impl Into<String>,
        chat_history: impl Into<String>,
    ) -> Self {
        Self {
            about_me: about_me.into(),
            question: question.into(),
            chat_history: chat_history.into(),
        }
    }

    /// Chain inputs: `about_me`, `question`, `chat_history`
    pub fn to_fields(&self) -> FieldMap {
        FieldMap::from([
            ("about_me".to_string(), self.about_me.clone()),
            ("question".to_string(), self.question.clone()),
            ("chat_history".to_string(), self.chat_history.clone()),
        ])
    }
}

/// Retrieved news summaries, one per line in store rank order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub text: String,
}

impl RetrievedContext {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Values substituted into the prompt template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptFields<'a> {
    pub user_context: &'a str,
    pub news_context: &'a str,
    pub chat_history: &'a str,
    pub question: &'a str,
}

impl PromptFields<'_> {
    pub fn to_fields(&self) -> FieldMap {
        FieldMap::from([
            ("user_context".to_string(), self.user_context.to_string()),
            ("news_context".to_string(), self.news_context.to_string()),
            ("chat_history".to_string(), self.chat_history.to_string()),
            ("question".to_string(), self.question.to_string()),
        ])
    }
}

/// Model output, returned verbatim
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
}

/// Everything one pipeline invocation produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotReply {
    pub context: RetrievedContext,
    pub answer: Answer,
}
