//! Main entry point for HTML Translator CLI

#![forbid(unsafe_code)]

use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use html_translator::cli::commands::{self, Commands};
use html_translator::core::config::{normalize_host, TranslatorConfig};

/// HTML Translator - translate HTML documents with a local Ollama model
#[derive(Parser, Debug)]
#[command(name = "html-translator", version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Ollama host (default: http://localhost:11434, or OLLAMA_HOST)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Model identifier (default: translategemma:4b, or OLLAMA_MODEL)
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Hide the progress bar
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenv().ok();

    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}={}", env!("CARGO_CRATE_NAME"), log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = TranslatorConfig::load(args.config.as_deref())?;

    // Override config with CLI args if provided
    if let Some(host) = args.host {
        config.host = normalize_host(&host);
    }

    if let Some(model) = args.model {
        config.model = model;
    }

    match args.command {
        Some(Commands::Html {
            file,
            output,
            target_lang,
            temperature,
        }) => {
            if let Some(file) = file {
                config.input = file;
            }
            if output.is_some() {
                config.output = output;
            }
            if let Some(target_lang) = target_lang {
                config.target_lang = target_lang;
            }
            if let Some(temperature) = temperature {
                config.temperature = temperature;
            }

            config.validate()?;
            commands::handle_html(config, !args.quiet).await?;
        }
        Some(Commands::Models) => {
            config.validate()?;
            commands::handle_models(config).await?;
        }
        None => {
            config.validate()?;
            commands::handle_html(config, !args.quiet).await?;
        }
    }

    Ok(())
}
