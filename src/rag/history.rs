//! Chat history handling.
//!
//! The pipeline treats chat history as an opaque string. `HistorySink`
//! receives it for diagnostics at generation time; `ChatHistory` is a
//! windowed buffer an interactive caller can use to build that string.

use std::collections::VecDeque;
use std::sync::Mutex;

/// Receives the chat history seen by the generation stage
pub trait HistorySink: Send + Sync {
    fn record(&self, chat_history: &str);
}

/// Emits chat history as a `tracing` event on `financial_bot::history`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHistorySink;

impl HistorySink for TracingHistorySink {
    fn record(&self, chat_history: &str) {
        tracing::info!(
            target: "financial_bot::history",
            chat_history = %chat_history,
            "chat history at generation"
        );
    }
}

/// Keeps every recorded history in memory
#[derive(Debug, Default)]
pub struct RecordingHistorySink {
    records: Mutex<Vec<String>>,
}

impl RecordingHistorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<String> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl HistorySink for RecordingHistorySink {
    fn record(&self, chat_history: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.push(chat_history.to_string());
        }
    }
}

/// One question/answer exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub human: String,
    pub ai: String,
}

/// Bounded FIFO of recent turns
#[derive(Debug, Clone)]
pub struct ChatHistory {
    window: usize,
    turns: VecDeque<Turn>,
}

impl ChatHistory {
    /// Keep at most `window` turns
    pub fn new(window: usize) -> Self {
        Self {
            window,
            turns: VecDeque::with_capacity(window),
        }
    }

    /// Append a turn, evicting the oldest beyond the window
    pub fn push(&mut self, human: impl Into<String>, ai: impl Into<String>) {
        if self.window == 0 {
            return;
        }
        if self.turns.len() == self.window {
            self.turns.pop_front();
        }
        self.turns.push_back(Turn {
            human: human.into(),
            ai: ai.into(),
        });
    }

    /// Render as `Human: …` / `AI: …` lines, oldest first
    pub fn render(&self) -> String {
        self.turns
            .iter()
            .map(|t| format!("Human: {}\nAI: {}", t.human, t.ai))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }
}
