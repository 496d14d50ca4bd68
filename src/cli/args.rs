//! Command-line argument parsing for the financial bot
//!
//! Provides clap-based CLI with subcommands and per-run overrides of the
//! configuration file.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;
use crate::rag::FieldWiring;

/// financial-bot - ask financial questions grounded in recent news
#[derive(Parser, Debug)]
#[command(name = "financial-bot")]
#[command(version)]
#[command(about = "Answer financial questions using retrieved news summaries", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of news summaries to retrieve
    #[arg(long, global = true)]
    pub top_k: Option<usize>,

    /// Ollama model to use
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Put retrieved news in the news slot and the question in the question slot
    #[arg(long, global = true)]
    pub corrected_wiring: bool,

    /// Log at debug level (-vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a single question
    Ask {
        /// The question
        #[arg(value_name = "QUESTION")]
        question: String,

        /// Who is asking (profile, goals, holdings)
        #[arg(long, default_value = "")]
        about_me: String,

        /// Prior conversation, passed through as-is
        #[arg(long, default_value = "")]
        chat_history: String,

        /// Also print the retrieved news context
        #[arg(long)]
        show_context: bool,
    },

    /// Start an interactive session that keeps recent turns as chat history
    Chat {
        /// Who is asking (profile, goals, holdings)
        #[arg(long, default_value = "")]
        about_me: String,
    },

    /// Check that Ollama is reachable and the Qdrant collection exists
    Health,

    /// Display the effective configuration
    Config,
}

impl Args {
    /// Apply command-line overrides on top of a loaded configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(top_k) = self.top_k {
            config.retrieval.top_k = top_k;
        }
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if self.corrected_wiring {
            config.prompt.wiring = FieldWiring::Corrected;
        }
        match self.verbose {
            0 => {}
            1 => config.logging.level = "debug".to_string(),
            _ => config.logging.level = "trace".to_string(),
        }
    }
}
