//! Model service client

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::config::TranslatorConfig;
use crate::core::errors::{Result, TranslationError};
use crate::core::models::{ChatRequest, ChatResponse, TagsResponse};

/// Text-to-text service the translator talks to.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send one prompt and return the raw generated text
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Check that the service answers; returns the installed model names
    async fn ping(&self) -> Result<Vec<String>>;
}

/// HTTP client for a local Ollama server
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    host: String,
    model: String,
    temperature: f32,
}

impl OllamaClient {
    /// Create a new client
    pub fn new(config: &TranslatorConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| TranslationError::ConfigError {
                message: e.to_string(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .pool_idle_timeout(Some(Duration::from_secs(30)))
            .build()?;

        Ok(Self {
            client,
            host: config.host.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    /// Base URL without a trailing slash
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Configured model identifier
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ping the service and warn when the configured model is not installed
    pub async fn ensure_available(&self) -> Result<Vec<String>> {
        let models = self.ping().await?;

        let installed = models
            .iter()
            .any(|name| name == &self.model || name == &format!("{}:latest", self.model));
        if !installed {
            warn!(
                "Model {} is not listed by {} ({} models installed)",
                self.model,
                self.host,
                models.len()
            );
        }

        Ok(models)
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest::new(&self.model, prompt, self.temperature);
        let url = format!("{}/api/chat", self.host);

        debug!("POST {} (model {})", url, self.model);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TranslationError::NetworkError {
                message: e.to_string(),
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TranslationError::ApiError {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| TranslationError::InvalidResponseError {
                message: e.to_string(),
            })?;

        Ok(chat.message.content)
    }

    async fn ping(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.host);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TranslationError::ServiceUnavailable {
                host: self.host.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslationError::ServiceUnavailable {
                host: self.host.clone(),
                message: format!("HTTP {}", status.as_u16()),
            });
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| TranslationError::ServiceUnavailable {
                host: self.host.clone(),
                message: e.to_string(),
            })?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}
