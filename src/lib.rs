//! HTML Translator - translate the text of HTML documents with a local model
//!
//! This library extracts translatable text from HTML, translates each distinct
//! fragment once through an Ollama server, and writes the translations back
//! into the original markup.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod core;
pub mod processors;
pub mod cli;

// Re-export key types for convenience
pub use crate::core::{
    client::{OllamaClient, TextGenerator},
    config::TranslatorConfig,
    errors::TranslationError,
    models::{TranslationOutcome, TranslationStats},
    translator::CachedTranslator,
};

pub use crate::processors::html::{Fragment, FragmentKind, HtmlDocument, HtmlProcessor};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
