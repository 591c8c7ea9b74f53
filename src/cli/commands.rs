//! CLI command definitions and handlers

use clap::Subcommand;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

use crate::core::client::{OllamaClient, TextGenerator};
use crate::core::config::TranslatorConfig;
use crate::core::errors::TranslationError;
use crate::core::translator::CachedTranslator;
use crate::processors::html::{find_html_files, HtmlProcessor};

/// Commands for HTML Translator
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Translate an HTML file, or every HTML file below a directory
    Html {
        /// Input file or directory (default: input.html)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Output file or directory (default: output_ar.html)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Target language name, as written in the prompt
        #[arg(short, long)]
        target_lang: Option<String>,

        /// Decoding temperature
        #[arg(long)]
        temperature: Option<f32>,
    },

    /// Check the model service and list installed models
    Models,
}

/// Connect to the service, failing before any file is read
async fn connect(config: &TranslatorConfig) -> anyhow::Result<OllamaClient> {
    let client = OllamaClient::new(config)?;

    client.ensure_available().await.map_err(|e| {
        anyhow::anyhow!("{}\nStart Ollama (`ollama serve`) and try again.", e)
    })?;

    info!("Model service reachable at {}", client.host());
    Ok(client)
}

/// Handle HTML translation command
pub async fn handle_html(config: TranslatorConfig, show_progress: bool) -> anyhow::Result<()> {
    let start_time = Instant::now();

    let input = config.input.clone();
    if !input.exists() {
        return Err(TranslationError::InputNotFound {
            path: input.display().to_string(),
        }
        .into());
    }

    let output = config.output_path();

    info!("Starting HTML translation");
    info!("Input: {}", input.display());
    info!("Output: {}", output.display());
    info!("Model: {}", config.model);
    info!("Target language: {}", config.target_lang);

    let client = connect(&config).await?;
    let translator = CachedTranslator::new(client, config.target_lang.clone());
    let mut processor = HtmlProcessor::new(translator).with_progress(show_progress);

    // Pair every input file with its output path
    let jobs: Vec<(PathBuf, PathBuf)> = if input.is_dir() {
        let files = find_html_files(&input)?;
        files
            .into_iter()
            .filter(|f| !f.starts_with(&output))
            .filter_map(|f| {
                let relative = f.strip_prefix(&input).ok()?.to_path_buf();
                Some((f, output.join(relative)))
            })
            .collect()
    } else {
        vec![(input, output)]
    };

    if jobs.is_empty() {
        anyhow::bail!("No HTML files found");
    }

    let mut processed = 0;
    let mut fallbacks = 0;

    for (file_path, out_path) in &jobs {
        let report = processor.translate_file(file_path, out_path).await?;
        processed += 1;
        fallbacks += report.fallbacks;
    }

    let duration = start_time.elapsed();
    let stats = processor.translator().stats();
    info!("Completed: {} in {:?}", stats, duration);

    println!("\n✅ Translation completed!");
    println!("   Files: {}", processed);
    println!("   Fragments: {}", stats.fragments);
    println!("   Unique texts: {}", processor.translator().unique_count());
    if fallbacks > 0 {
        println!("   Left untranslated after errors: {}", fallbacks);
    }
    println!("   Time: {:?}", duration);

    Ok(())
}

/// Handle models command
pub async fn handle_models(config: TranslatorConfig) -> anyhow::Result<()> {
    let client = OllamaClient::new(&config)?;
    let models = client.ping().await?;

    println!("Models at {}:", client.host());
    for name in &models {
        let marker = if name == client.model() { "*" } else { " " };
        println!(" {} {}", marker, name);
    }

    if models.is_empty() {
        println!("   (none installed)");
    }

    Ok(())
}
