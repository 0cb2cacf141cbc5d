//! CLI command definitions and handlers

use clap::Subcommand;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::client::OpenAiClient;
use crate::core::config::TranslatorConfig;
use crate::core::cost::{CostEstimator, CostLedger};
use crate::core::evaluator::Evaluator;
use crate::core::models::{AttemptOutcome, TranslationRequest, TranslationResult};
use crate::core::orchestrator::{BatchReport, Orchestrator};

/// Commands for the quality-gated translator
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Translate a single text
    Translate {
        /// Text to translate
        #[arg(short = 'x', long)]
        text: String,

        /// Source language
        #[arg(short, long, default_value = "English")]
        source_lang: String,

        /// Target language
        #[arg(short, long)]
        target_lang: String,

        /// Domain context to guide terminology
        #[arg(short, long)]
        context: Option<String>,

        /// Reference translation to evaluate against
        #[arg(long)]
        reference: Option<String>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Translate a JSON file of requests
    Batch {
        /// JSON array of {text, source_lang, target_lang, context?, reference?}
        #[arg(short, long)]
        file: PathBuf,

        /// Where to write the JSON results (default: <file>_results.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Re-score the results of a previous batch run
    Evaluate {
        /// The requests file the batch was run with
        #[arg(short, long)]
        file: PathBuf,

        /// Batch results JSON written by `batch`
        #[arg(short, long)]
        results: PathBuf,
    },

    /// Start HTTP API server
    Server {
        /// Bind address (default: 0.0.0.0)
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Listen port (default: 8000)
        #[arg(short, long, default_value_t = 8000)]
        port: u16,

        /// Enable debug mode
        #[arg(long)]
        debug: bool,
    },

    /// Send one test translation to verify credentials and endpoint
    CheckConnection,
}

/// Handle single translation command
pub async fn handle_translate(
    config: TranslatorConfig,
    request: TranslationRequest,
    json: bool,
) -> anyhow::Result<()> {
    use tracing::info;

    let orchestrator = Orchestrator::from_config(config)?;
    info!(
        "Translating {} chars from {} to {}",
        request.text().len(),
        request.source_lang(),
        request.target_lang()
    );

    let result = orchestrator.translate(&request).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    if !result.success {
        anyhow::bail!(result.error.unwrap_or_else(|| "translation failed".to_string()));
    }
    Ok(())
}

fn print_result(result: &TranslationResult) {
    if !result.success {
        eprintln!("❌ {}", result.error.as_deref().unwrap_or("translation failed"));
        return;
    }

    println!("{}", result.translated_text);
    println!();
    println!(
        "{} Score: {:.1} ({}, {} attempts)",
        if result.accepted { "✅" } else { "⚠️ " },
        result.quality_score,
        result.status,
        result.attempts_count()
    );

    for record in &result.attempts {
        match &record.outcome {
            AttemptOutcome::Evaluated { score, .. } => println!(
                "   #{} accuracy {:.1} fluency {:.1} context {:.1} → {:.1}{}",
                record.index + 1,
                score.accuracy,
                score.fluency,
                score.context_relevance,
                score.composite,
                if score.parsed { "" } else { " (unparsed)" }
            ),
            AttemptOutcome::Failed { message, .. } => {
                println!("   #{} failed: {}", record.index + 1, message)
            }
        }
    }

    let cost = CostEstimator::new().estimate_result(result);
    println!(
        "   Tokens: {} in / {} out, est. cost ${:.4}",
        result.usage.total_input_tokens,
        result.usage.total_output_tokens,
        cost.total()
    );
}

/// Handle batch translation command
pub async fn handle_batch(
    config: TranslatorConfig,
    file: PathBuf,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};
    use std::time::Instant;
    use tracing::info;

    let start_time = Instant::now();

    // Determine output path
    let output = output.unwrap_or_else(|| {
        let mut out = file.clone();
        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "requests".to_string());
        out.set_file_name(format!("{}_results.json", stem));
        out
    });

    info!("Starting batch translation");
    info!("Input: {}", file.display());
    info!("Output: {}", output.display());

    let content = std::fs::read_to_string(&file)?;
    let requests: Vec<TranslationRequest> = serde_json::from_str(&content)?;

    if requests.is_empty() {
        anyhow::bail!("No requests found in {}", file.display());
    }

    let orchestrator = Orchestrator::from_config(config)?;

    // Create progress bar
    let pb = ProgressBar::new(requests.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("=>-"),
    );

    let report = orchestrator
        .translate_batch_with(&requests, |index, result| {
            pb.set_message(format!("#{} scored {:.1}", index + 1, result.quality_score));
            pb.inc(1);
        })
        .await;

    pb.finish_with_message("Completed");

    std::fs::write(&output, serde_json::to_string_pretty(&report)?)?;

    let duration = start_time.elapsed();
    let mut ledger = CostLedger::default();
    for (request, result) in requests.iter().zip(&report.results) {
        ledger.record(request, result);
    }
    let cost = CostEstimator::new().estimate_all(&report.results);
    info!(
        "Completed: {} accepted, {} failed in {:?}",
        report.accepted, report.failed, duration
    );

    println!("\n✅ Batch translation completed!");
    println!("   Requests: {}", report.results.len());
    println!("   Accepted: {}", report.accepted);
    println!("   Below threshold: {}", report.results.len() - report.accepted - report.failed);
    println!("   Failed: {}", report.failed);
    println!(
        "   Tokens: {} in / {} out",
        report.usage.total_input_tokens, report.usage.total_output_tokens
    );
    println!("   Estimated cost: ${:.4}", cost.total());
    println!("   Time: {:?}", duration);
    println!("   Results: {}", output.display());
    println!("\n{}", ledger.report(chrono::Utc::now()));

    Ok(())
}

/// Handle evaluate command
pub async fn handle_evaluate(config: TranslatorConfig, file: PathBuf, results: PathBuf) -> anyhow::Result<()> {
    use tracing::info;

    config.validate()?;
    let requests: Vec<TranslationRequest> = serde_json::from_str(&std::fs::read_to_string(&file)?)?;
    let report: BatchReport = serde_json::from_str(&std::fs::read_to_string(&results)?)?;

    if requests.len() != report.results.len() {
        anyhow::bail!(
            "{} has {} requests but {} has {} results",
            file.display(),
            requests.len(),
            results.display(),
            report.results.len()
        );
    }

    let client = OpenAiClient::new(&config)?;
    let evaluator = Evaluator::from_config(Arc::new(client), &config);
    info!("Re-evaluating {} translations with {}", requests.len(), evaluator.model_id());

    let evaluations = evaluator
        .evaluate_batch(&requests, &report.results, config.max_concurrent)
        .await;

    for (i, evaluation) in evaluations.iter().enumerate() {
        match evaluation {
            Some(evaluation) => {
                let score = &evaluation.score;
                println!(
                    "#{} accuracy {:.1} fluency {:.1} context {:.1} → {:.1}{}",
                    i + 1,
                    score.accuracy,
                    score.fluency,
                    score.context_relevance,
                    score.composite,
                    if score.parsed { "" } else { " (unparsed)" }
                );
            }
            None => println!("#{} skipped: translation failed", i + 1),
        }
    }

    Ok(())
}

/// Handle server command
pub async fn handle_server(config: TranslatorConfig, host: String, port: u16) -> anyhow::Result<()> {
    use crate::server::api::run_server;
    use tracing::info;

    info!("Starting HTTP server on {}:{}", host, port);
    println!("🚀 Server starting on http://{}:{}", host, port);

    run_server(config, host, port).await?;

    Ok(())
}

/// Handle connection check command
pub async fn handle_check_connection(config: TranslatorConfig) -> anyhow::Result<()> {
    let model = config.translation_model_id.clone();
    let orchestrator = Orchestrator::from_config(config)?;

    match orchestrator.check_connection().await {
        Ok(text) => {
            println!("✅ Connection successful ({})", model);
            println!("   Test translation: {}", text);
            Ok(())
        }
        Err(e) => {
            println!("❌ Connection failed ({}): {}", model, e);
            if let Some(retry_after) = e.retry_after() {
                println!("   Retry after {:?}", retry_after);
            }
            Err(e.into())
        }
    }
}
