//! Cached fragment translator with fail-open fallback

use std::collections::HashMap;
use tracing::{debug, warn};

use crate::core::client::TextGenerator;
use crate::core::errors::{Result, TranslationError};
use crate::core::models::{TranslationOutcome, TranslationStats};

/// Longest prefix of a fragment shown in log lines
const PREVIEW_CHARS: usize = 50;

/// Build the instruction sent to the model for one fragment
pub fn build_prompt(text: &str, target_lang: &str) -> String {
    format!(
        "Translate the following text into {target_lang}, keeping:\n\
         - the original meaning\n\
         - scientific and technical names in their original language\n\
         - symbols and numbers unchanged\n\
         - no added comments or explanations; return only the translation\n\
         \n\
         Text:\n\
         \"{text}\"\n\
         \n\
         Translation:"
    )
}

/// First characters of a fragment, for progress output
pub fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Translates fragments one at a time, at most one service call per distinct text
pub struct CachedTranslator<G> {
    generator: G,
    target_lang: String,
    cache: HashMap<String, String>,
    stats: TranslationStats,
}

impl<G: TextGenerator> CachedTranslator<G> {
    /// Create a translator with an empty run cache
    pub fn new(generator: G, target_lang: impl Into<String>) -> Self {
        Self {
            generator,
            target_lang: target_lang.into(),
            cache: HashMap::new(),
            stats: TranslationStats::default(),
        }
    }

    /// Translate one fragment.
    ///
    /// Failures never escape: the original text is cached and returned as
    /// [`TranslationOutcome::Fallback`], so the same text is not retried.
    pub async fn translate(&mut self, text: &str) -> TranslationOutcome {
        let outcome = self.resolve(text).await;
        self.stats.record(&outcome);
        outcome
    }

    async fn resolve(&mut self, text: &str) -> TranslationOutcome {
        if text.trim().is_empty() {
            return TranslationOutcome::Skipped(text.to_string());
        }

        if let Some(cached) = self.cache.get(text) {
            return TranslationOutcome::Cached(cached.clone());
        }

        debug!("Translating: {}", preview(text));

        let outcome = match self.request(text).await {
            Ok(translation) => TranslationOutcome::Translated(translation),
            Err(e) => {
                warn!("Translation failed for '{}': {}", preview(text), e);
                TranslationOutcome::Fallback(text.to_string())
            }
        };

        self.cache.insert(text.to_string(), outcome.text().to_string());
        outcome
    }

    async fn request(&self, text: &str) -> Result<String> {
        let prompt = build_prompt(text, &self.target_lang);
        let reply = self.generator.generate(&prompt).await?;
        let translation = reply.trim();

        if translation.is_empty() {
            return Err(TranslationError::InvalidResponseError {
                message: "Empty translation in response".to_string(),
            });
        }

        Ok(translation.to_string())
    }

    /// Whether a text has already been resolved in this run
    pub fn is_cached(&self, text: &str) -> bool {
        self.cache.contains_key(text)
    }

    /// Number of distinct texts resolved so far
    pub fn unique_count(&self) -> usize {
        self.cache.len()
    }

    /// Counters for this run
    pub fn stats(&self) -> TranslationStats {
        self.stats
    }

    /// The underlying text generator
    pub fn generator(&self) -> &G {
        &self.generator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Echoes the quoted source text in upper case and records every prompt
    #[derive(Default)]
    struct RecordingGenerator {
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
        reply_override: Option<&'static str>,
    }

    fn quoted(prompt: &str) -> &str {
        let start = prompt.find("Text:\n\"").map(|i| i + 7).unwrap_or(0);
        let end = prompt.rfind("\"\n\nTranslation:").unwrap_or(prompt.len());
        &prompt[start..end]
    }

    #[async_trait]
    impl TextGenerator for RecordingGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());

            let text = quoted(prompt);
            if Some(text) == self.fail_on {
                return Err(TranslationError::NetworkError {
                    message: "connection reset".to_string(),
                });
            }
            if let Some(reply) = self.reply_override {
                return Ok(reply.to_string());
            }
            Ok(format!("  {}\n", text.to_uppercase()))
        }

        async fn ping(&self) -> Result<Vec<String>> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_build_prompt_embeds_text_and_language() {
        let prompt = build_prompt("Sunset photo", "Arabic");
        assert!(prompt.contains("into Arabic"));
        assert!(prompt.contains("\"Sunset photo\""));
        assert!(prompt.contains("symbols and numbers unchanged"));
        assert!(prompt.contains("return only the translation"));
        assert_eq!(quoted(&prompt), "Sunset photo");
    }

    #[test]
    fn test_preview_truncates_long_text() {
        let long = "x".repeat(80);
        assert_eq!(preview(&long), format!("{}...", "x".repeat(50)));
        assert_eq!(preview("short"), "short");
    }

    #[tokio::test]
    async fn test_repeated_text_calls_service_once() {
        let mut translator = CachedTranslator::new(RecordingGenerator::default(), "Arabic");

        let first = translator.translate("Hello World").await;
        let second = translator.translate("Hello World").await;

        assert_eq!(first, TranslationOutcome::Translated("HELLO WORLD".to_string()));
        assert_eq!(second, TranslationOutcome::Cached("HELLO WORLD".to_string()));
        assert_eq!(translator.generator().calls.load(Ordering::SeqCst), 1);
        assert_eq!(translator.unique_count(), 1);
    }

    #[tokio::test]
    async fn test_cache_is_case_and_whitespace_sensitive() {
        let mut translator = CachedTranslator::new(RecordingGenerator::default(), "Arabic");

        translator.translate("Hello").await;
        translator.translate("hello").await;
        translator.translate("Hello ").await;

        assert_eq!(translator.generator().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_blank_input_is_passed_through() {
        let mut translator = CachedTranslator::new(RecordingGenerator::default(), "Arabic");

        let outcome = translator.translate("   \n").await;

        assert_eq!(outcome, TranslationOutcome::Skipped("   \n".to_string()));
        assert_eq!(translator.generator().calls.load(Ordering::SeqCst), 0);
        assert!(!translator.is_cached("   \n"));
    }

    #[tokio::test]
    async fn test_failure_falls_back_and_is_not_retried() {
        let generator = RecordingGenerator {
            fail_on: Some("Broken"),
            ..Default::default()
        };
        let mut translator = CachedTranslator::new(generator, "Arabic");

        let first = translator.translate("Broken").await;
        let second = translator.translate("Broken").await;
        let other = translator.translate("Fine").await;

        assert_eq!(first, TranslationOutcome::Fallback("Broken".to_string()));
        assert_eq!(second, TranslationOutcome::Cached("Broken".to_string()));
        assert_eq!(other.text(), "FINE");
        assert_eq!(translator.generator().calls.load(Ordering::SeqCst), 2);
        assert_eq!(translator.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_empty_reply_falls_back_to_source_text() {
        let generator = RecordingGenerator {
            reply_override: Some("  \n "),
            ..Default::default()
        };
        let mut translator = CachedTranslator::new(generator, "Arabic");

        let outcome = translator.translate("Menu").await;

        assert!(outcome.is_fallback());
        assert_eq!(outcome.text(), "Menu");
        assert_eq!(translator.stats().failures, 1);
        assert!(translator.is_cached("Menu"));
    }

    #[tokio::test]
    async fn test_prompt_uses_target_language() {
        let mut translator = CachedTranslator::new(RecordingGenerator::default(), "French");
        translator.translate("Cell membrane").await;

        let prompts = translator.generator().prompts.lock().unwrap().clone();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("into French"));
        assert!(prompts[0].contains("\"Cell membrane\""));
    }
}
