//! Core data models for translation

use serde::{Deserialize, Serialize};
use std::fmt;

/// Chat message exchanged with the model service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `user`, `assistant` or `system`
    pub role: String,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// Message with the `user` role
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Decoding options sent along with a chat request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatOptions {
    /// Decoding temperature
    pub temperature: f32,
}

/// Body of `POST /api/chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,
    /// Conversation, a single user message here
    pub messages: Vec<ChatMessage>,
    /// Always `false`; the reply arrives as one JSON object
    pub stream: bool,
    /// Decoding options
    pub options: ChatOptions,
}

impl ChatRequest {
    /// Single-message, non-streaming request
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage::user(prompt)],
            stream: false,
            options: ChatOptions { temperature },
        }
    }
}

/// Body returned by `POST /api/chat` when streaming is off
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    /// Model that answered
    #[serde(default)]
    pub model: String,
    /// The assistant reply
    pub message: ChatMessage,
    /// Whether generation finished
    #[serde(default)]
    pub done: bool,
}

/// One installed model as listed by `GET /api/tags`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelTag {
    /// Model name including its tag, e.g. `translategemma:4b`
    pub name: String,
    /// Size on disk in bytes
    #[serde(default)]
    pub size: u64,
}

/// Body returned by `GET /api/tags`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagsResponse {
    /// Installed models
    #[serde(default)]
    pub models: Vec<ModelTag>,
}

/// What the translator did with one fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationOutcome {
    /// Fresh reply from the model service
    Translated(String),
    /// Served from the run cache
    Cached(String),
    /// Service call failed; carries the original text
    Fallback(String),
    /// Blank input, passed through untouched
    Skipped(String),
}

impl TranslationOutcome {
    /// Text to write back into the document
    pub fn text(&self) -> &str {
        match self {
            TranslationOutcome::Translated(text)
            | TranslationOutcome::Cached(text)
            | TranslationOutcome::Fallback(text)
            | TranslationOutcome::Skipped(text) => text,
        }
    }

    /// Consume the outcome and return its text
    pub fn into_text(self) -> String {
        match self {
            TranslationOutcome::Translated(text)
            | TranslationOutcome::Cached(text)
            | TranslationOutcome::Fallback(text)
            | TranslationOutcome::Skipped(text) => text,
        }
    }

    /// Whether the service call failed
    pub fn is_fallback(&self) -> bool {
        matches!(self, TranslationOutcome::Fallback(_))
    }
}

/// Per-run translation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TranslationStats {
    /// Fragments handled
    pub fragments: usize,
    /// Requests sent to the model service
    pub service_calls: usize,
    /// Fragments served from the run cache
    pub cache_hits: usize,
    /// Requests that failed and fell back to the source text
    pub failures: usize,
    /// Blank fragments passed through
    pub skipped: usize,
}

impl TranslationStats {
    /// Count one outcome
    pub fn record(&mut self, outcome: &TranslationOutcome) {
        self.fragments += 1;
        match outcome {
            TranslationOutcome::Translated(_) => self.service_calls += 1,
            TranslationOutcome::Cached(_) => self.cache_hits += 1,
            TranslationOutcome::Fallback(_) => {
                self.service_calls += 1;
                self.failures += 1;
            }
            TranslationOutcome::Skipped(_) => self.skipped += 1,
        }
    }
}

impl fmt::Display for TranslationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} fragments, {} service calls, {} cache hits, {} failed",
            self.fragments, self.service_calls, self.cache_hits, self.failures
        )
    }
}
