//! Configuration management for the financial bot
//!
//! Provides TOML-based configuration with defaults and validation.
//! Location: ~/.financial-bot/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::{BotError, Result};
use crate::llm::DEFAULT_MODEL;
use crate::rag::qa::FieldWiring;
use crate::rag::template::PromptTemplate;

/// Complete configuration for the financial bot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub embedding: EmbeddingConfig,
    pub vector_store: VectorStoreConfig,
    pub retrieval: RetrievalConfig,
    pub llm: LlmConfig,
    pub prompt: PromptConfig,
    pub history: HistoryConfig,
    pub logging: LoggingConfig,
}

/// Embedding model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model_id: String,
    pub max_input_length: usize,
    pub normalize: bool,
}

/// Qdrant connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
    pub timeout_secs: u64,
}

/// Retrieval behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of candidate documents retrieved per question
    pub top_k: usize,
}

/// Ollama generation backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub host: String,
    pub port: u16,
    pub model: String,
    pub temperature: f32,
    pub max_new_tokens: usize,
    pub timeout_secs: u64,
}

/// Prompt rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub template: String,
    pub wiring: FieldWiring,
}

/// Interactive chat history configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Number of past turns kept by the interactive session
    pub window: usize,
}

/// Log output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_id: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            max_input_length: 384,
            normalize: true,
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            api_key: None,
            collection: "alpaca_financial_news".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 1 }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 11434,
            model: DEFAULT_MODEL.to_string(),
            temperature: 1.0,
            max_new_tokens: 500,
            timeout_secs: 120,
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            template: "falcon".to_string(),
            wiring: FieldWiring::default(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { window: 3 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            Self::load_from_file(&config_path)
        } else {
            Self::load_default()
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| BotError::ConfigError(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| BotError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load default configuration from standard location or use built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(config_path) = Self::default_path() {
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        Ok(Config::default())
    }

    /// Standard configuration file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".financial-bot").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.embedding.model_id.trim().is_empty() {
            return Err(BotError::ConfigError(
                "embedding.model_id must not be empty".to_string(),
            ));
        }

        if self.embedding.max_input_length == 0 {
            return Err(BotError::ConfigError(
                "embedding.max_input_length must be greater than 0".to_string(),
            ));
        }

        if self.vector_store.collection.trim().is_empty() {
            return Err(BotError::ConfigError(
                "vector_store.collection must not be empty".to_string(),
            ));
        }

        if self.llm.model.trim().is_empty() {
            return Err(BotError::ConfigError(
                "llm.model must not be empty".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(BotError::ConfigError(
                "llm.temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.llm.max_new_tokens == 0 {
            return Err(BotError::ConfigError(
                "llm.max_new_tokens must be greater than 0".to_string(),
            ));
        }

        if self.history.window == 0 {
            return Err(BotError::ConfigError(
                "history.window must be greater than 0".to_string(),
            ));
        }

        if PromptTemplate::lookup(&self.prompt.template).is_none() {
            return Err(BotError::ConfigError(format!(
                "Unknown prompt template: {}",
                self.prompt.template
            )));
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(BotError::ConfigError(format!(
                    "Invalid log level: {}",
                    self.logging.level
                )))
            }
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| BotError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                BotError::ConfigError(format!("Failed to create config dir: {}", e))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| BotError::ConfigError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }
}

impl LlmConfig {
    /// Get Ollama base URL
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}
