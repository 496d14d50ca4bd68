//! Prompt templates for financial question answering.
//!
//! A template is a sequence of sections (system, context, chat history,
//! question, answer) joined by a separator. Sections contain `{name}`
//! placeholders; `{{` and `}}` are literal braces.

use serde::{Deserialize, Serialize};

use crate::errors::{BotError, Result};
use crate::rag::chain::FieldMap;

/// Structured prompt layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub name: String,
    pub system_template: String,
    pub system_message: String,
    pub context_template: String,
    pub chat_history_template: String,
    pub question_template: String,
    pub answer_template: String,
    pub sep: String,
    pub eos: String,
}

/// Rendered prompt plus the fields it was rendered from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptOutput {
    pub prompt: String,
    pub payload: FieldMap,
}

/// Names of every registered template
pub const REGISTERED_TEMPLATES: &[&str] = &["falcon"];

impl PromptTemplate {
    /// Look up a registered template by name
    pub fn lookup(name: &str) -> Option<Self> {
        match name {
            "falcon" => Some(Self::falcon()),
            _ => None,
        }
    }

    /// Falcon-instruct layout with `>>SECTION<<` markers
    pub fn falcon() -> Self {
        Self {
            name: "falcon".to_string(),
            system_template: ">>INTRODUCTION<< {system_message}".to_string(),
            system_message: "You are a helpful assistant, with financial expertise.".to_string(),
            context_template: ">>DOMAIN<< {user_context}\n{news_context}".to_string(),
            chat_history_template: ">>SUMMARY<< {chat_history}".to_string(),
            question_template: ">>QUESTION<< {question}".to_string(),
            answer_template: ">>ANSWER<< {answer}".to_string(),
            sep: "\n".to_string(),
            eos: "<|endoftext|>".to_string(),
        }
    }

    /// Template text used at inference time; the answer section is left open
    pub fn infer_raw_template(&self) -> String {
        let answer_prefix = self
            .answer_template
            .split("{answer}")
            .next()
            .unwrap_or_default();

        [
            self.system_section(),
            self.context_template.clone(),
            self.chat_history_template.clone(),
            self.question_template.clone(),
            answer_prefix.to_string(),
        ]
        .join(&self.sep)
    }

    /// Template text for training samples, closed with the EOS marker
    pub fn train_raw_template(&self) -> String {
        let body = [
            self.system_section(),
            self.context_template.clone(),
            self.chat_history_template.clone(),
            self.question_template.clone(),
            self.answer_template.clone(),
        ]
        .join(&self.sep);
        format!("{}{}", body, escape(&self.eos))
    }

    /// Render an inference prompt from `user_context`, `news_context`,
    /// `chat_history` and `question`
    pub fn format_infer(&self, fields: &FieldMap) -> Result<PromptOutput> {
        Ok(PromptOutput {
            prompt: render(&self.infer_raw_template(), fields)?,
            payload: fields.clone(),
        })
    }

    /// Render a training sample; additionally needs `answer`
    pub fn format_train(&self, fields: &FieldMap) -> Result<PromptOutput> {
        Ok(PromptOutput {
            prompt: render(&self.train_raw_template(), fields)?,
            payload: fields.clone(),
        })
    }

    fn system_section(&self) -> String {
        self.system_template
            .replace("{system_message}", &escape(&self.system_message))
    }
}

/// Substitute `{name}` placeholders from `fields` in a single pass.
///
/// Substituted values are not rescanned, so user text containing braces is
/// inserted as-is.
pub fn render(template: &str, fields: &FieldMap) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => {
                            return Err(BotError::InvalidInput(format!(
                                "unterminated placeholder '{{{}'",
                                name
                            )))
                        }
                    }
                }
                let value = fields
                    .get(name.trim())
                    .ok_or_else(|| BotError::MissingField(name.trim().to_string()))?;
                out.push_str(value);
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

fn escape(text: &str) -> String {
    text.replace('{', "{{").replace('}', "}}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn infer_fields() -> FieldMap {
        fields(&[
            ("user_context", "I am a student."),
            ("news_context", "Tech stocks rally.\n"),
            ("chat_history", ""),
            ("question", "Should I invest?"),
        ])
    }

    #[test]
    fn test_lookup_registered() {
        for name in REGISTERED_TEMPLATES {
            assert!(PromptTemplate::lookup(name).is_some());
        }
        assert!(PromptTemplate::lookup("gpt").is_none());
    }

    #[test]
    fn test_format_infer_layout() {
        let output = PromptTemplate::falcon().format_infer(&infer_fields()).unwrap();
        assert_eq!(
            output.prompt,
            ">>INTRODUCTION<< You are a helpful assistant, with financial expertise.\n\
             >>DOMAIN<< I am a student.\nTech stocks rally.\n\n\
             >>SUMMARY<< \n\
             >>QUESTION<< Should I invest?\n\
             >>ANSWER<< "
        );
        assert_eq!(output.payload, infer_fields());
    }

    #[test]
    fn test_format_infer_missing_field() {
        let mut partial = infer_fields();
        partial.remove("chat_history");

        let err = PromptTemplate::falcon().format_infer(&partial).unwrap_err();
        assert!(matches!(err, BotError::MissingField(ref k) if k == "chat_history"));
    }

    #[test]
    fn test_format_train_appends_answer_and_eos() {
        let mut sample = infer_fields();
        sample.insert("answer".to_string(), "Diversify.".to_string());

        let output = PromptTemplate::falcon().format_train(&sample).unwrap();
        assert!(output.prompt.ends_with(">>ANSWER<< Diversify.<|endoftext|>"));
    }

    #[test]
    fn test_format_train_requires_answer() {
        let err = PromptTemplate::falcon().format_train(&infer_fields()).unwrap_err();
        assert!(matches!(err, BotError::MissingField(ref k) if k == "answer"));
    }

    #[test]
    fn test_render_values_are_not_rescanned() {
        let out = render("Q: {question}", &fields(&[("question", "what is {ticker}?")])).unwrap();
        assert_eq!(out, "Q: what is {ticker}?");
    }

    #[test]
    fn test_render_escaped_braces() {
        let out = render("{{literal}} {x}", &fields(&[("x", "1")])).unwrap();
        assert_eq!(out, "{literal} 1");
    }

    #[test]
    fn test_render_unterminated_placeholder() {
        let err = render("oops {question", &FieldMap::new()).unwrap_err();
        assert!(matches!(err, BotError::InvalidInput(_)));
    }
}
