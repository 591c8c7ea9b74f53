//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::core::errors::TranslationError;

/// Default Ollama endpoint
pub const DEFAULT_HOST: &str = "http://localhost:11434";

/// Default translation model
pub const DEFAULT_MODEL: &str = "translategemma:4b";

/// Default input document
pub const DEFAULT_INPUT: &str = "input.html";

/// Default output document for single-file runs
pub const DEFAULT_OUTPUT: &str = "output_ar.html";

/// Configuration for translator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Base URL of the Ollama service
    pub host: String,
    /// Model identifier sent with every request
    pub model: String,
    /// Target language name, as written in the prompt
    pub target_lang: String,
    /// Decoding temperature
    pub temperature: f32,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
    /// Input file or directory
    pub input: PathBuf,
    /// Output file or directory; derived from the input when unset
    pub output: Option<PathBuf>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            model: DEFAULT_MODEL.to_string(),
            target_lang: "Arabic".to_string(),
            temperature: 0.3,
            timeout_ms: 120_000,
            input: PathBuf::from(DEFAULT_INPUT),
            output: None,
        }
    }
}

impl TranslatorConfig {
    /// Load configuration: defaults, then optional JSON file, then environment
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::from_file(path)?
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Override fields from environment-style lookups
    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("OLLAMA_HOST") {
            self.host = normalize_host(&host);
        }

        if let Some(model) = lookup("OLLAMA_MODEL") {
            self.model = model;
        }

        if let Some(target_lang) = lookup("TARGET_LANG") {
            self.target_lang = target_lang;
        }

        if let Some(temperature) = lookup("TRANSLATE_TEMPERATURE") {
            self.temperature = temperature.parse::<f32>()?;
        }

        if let Some(timeout_ms) = lookup("REQUEST_TIMEOUT_MS") {
            self.timeout_ms = timeout_ms.parse::<u64>()?;
        }

        debug!("Effective configuration: {:?}", self);
        Ok(())
    }

    /// Load from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| TranslationError::FileError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| TranslationError::ConfigError {
                message: format!("{}: {}", path.display(), e),
            })?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Output path, defaulting by input kind: a file next to the working
    /// directory, or a `translated/` folder inside an input directory
    pub fn output_path(&self) -> PathBuf {
        match &self.output {
            Some(output) => output.clone(),
            None if self.input.is_dir() => self.input.join("translated"),
            None => PathBuf::from(DEFAULT_OUTPUT),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.host.trim().is_empty() {
            return Err(anyhow::anyhow!("Service host is required"));
        }

        if self.model.trim().is_empty() {
            return Err(anyhow::anyhow!("Model identifier is required"));
        }

        if self.target_lang.trim().is_empty() {
            return Err(anyhow::anyhow!("Target language is required"));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(anyhow::anyhow!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            ));
        }

        if self.timeout_ms == 0 {
            return Err(anyhow::anyhow!("timeout_ms must be greater than 0"));
        }

        Ok(())
    }
}

/// Ollama accepts `OLLAMA_HOST=127.0.0.1:11434`; give it a scheme.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}
