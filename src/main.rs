//! Main entry point for the Quality Translator CLI

#![forbid(unsafe_code)]

use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quality_translator::cli::commands::{self, Commands};
use quality_translator::{TranslationRequest, TranslatorConfig};

/// Quality Translator - LLM translation with evaluator-driven retries
#[derive(Parser, Debug)]
#[command(name = "quality-translator", version, about, long_about = None)]
struct Args {
    /// API key (optional, defaults to OPENAI_API_KEY env var)
    #[arg(long)]
    api_key: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Maximum concurrent requests in batch mode
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// JSON or YAML config file (defaults to environment variables)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

fn init_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("quality_translator={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(args: &Args) -> anyhow::Result<TranslatorConfig> {
    let mut config = match &args.config {
        Some(path) => TranslatorConfig::from_file(path)?,
        None => TranslatorConfig::from_env()?,
    };

    // Override config with CLI args if provided
    if let Some(api_key) = &args.api_key {
        config.api_key = api_key.clone();
    }
    if let Some(max_concurrent) = args.max_concurrent {
        config.max_concurrent = max_concurrent;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    let args = Args::parse();

    let server_debug = matches!(args.command, Some(Commands::Server { debug: true, .. }));
    init_logging(args.verbose || server_debug);

    let Some(command) = args.command.as_ref() else {
        println!("Please specify a command. Use --help for more information.");
        return Ok(());
    };
    let config = load_config(&args)?;

    // Execute command
    match command {
        Commands::Translate {
            text,
            source_lang,
            target_lang,
            context,
            reference,
            json,
        } => {
            let mut request = TranslationRequest::new(text.clone(), source_lang.clone(), target_lang.clone())?;
            if let Some(context) = context {
                request = request.with_context(context.clone());
            }
            if let Some(reference) = reference {
                request = request.with_reference(reference.clone());
            }
            commands::handle_translate(config, request, *json).await?;
        }
        Commands::Batch { file, output } => {
            commands::handle_batch(config, file.clone(), output.clone()).await?;
        }
        Commands::Evaluate { file, results } => {
            commands::handle_evaluate(config, file.clone(), results.clone()).await?;
        }
        Commands::Server { host, port, .. } => {
            commands::handle_server(config, host.clone(), *port).await?;
        }
        Commands::CheckConnection => {
            commands::handle_check_connection(config).await?;
        }
    }

    Ok(())
}
