//! choicebench CLI
//!
//! Runs a multiple-choice benchmark over every configured model and subject,
//! writes the results to the configured output directory and prints a
//! per-model summary table. A `.env` file in the working directory is
//! loaded before the provider key is resolved.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use choicebench_core::{RunConfig, RunSummary};
use choicebench_runtime::{FileSink, JsonlDataset, ProviderRegistry, RunCoordinatorBuilder};

mod progress;

use progress::BarProgress;

#[derive(Parser, Debug)]
#[command(name = "choicebench")]
#[command(author, version, about = "Multiple-choice LLM benchmark runner")]
struct Cli {
    /// Path to the run configuration
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = RunConfig::from_yaml_file(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    let registry = ProviderRegistry::with_defaults();
    let provider = registry
        .create_from_config(&config.provider)
        .with_context(|| format!("Failed to create '{}' provider", config.provider_type()))?;

    if !provider.health_check().await {
        bail!("Provider '{}' failed its health check", provider.name());
    }

    tracing::info!(
        provider = provider.name(),
        models = ?config.models,
        dataset_dir = %config.dataset_dir.display(),
        output_dir = %config.output_dir.display(),
        "Configuration loaded"
    );

    let coordinator = RunCoordinatorBuilder::new(config.clone())
        .provider(provider)
        .dataset(Arc::new(JsonlDataset::new(&config.dataset_dir)))
        .sink(Arc::new(FileSink::new(&config.output_dir)))
        .progress(Arc::new(BarProgress::new()))
        .build()?;

    let subjects = coordinator
        .subjects()
        .await
        .context("Failed to list subjects")?;
    if subjects.is_empty() {
        bail!("No subjects to evaluate in {}", config.dataset_dir.display());
    }

    let report = coordinator.run(&config.models, &subjects).await?;

    print!("{}", format_summary(&report.summaries));

    if !report.failures.is_empty() {
        tracing::warn!(failures = report.failures.len(), "Some subjects were skipped");
    }
    tracing::info!(
        llm_calls = report.usage.llm_calls,
        retries = report.usage.retries,
        failed_calls = report.usage.failed_calls,
        total_tokens = report.usage.total_tokens,
        "Run complete"
    );

    Ok(())
}

fn format_summary(summaries: &[RunSummary]) -> String {
    let width = summaries
        .iter()
        .map(|s| s.model.len())
        .max()
        .unwrap_or(0)
        .max("model".len());

    // Writing to a String cannot fail
    let mut table = String::from("\n");
    let _ = writeln!(
        table,
        "{:<width$}  {:>8}  {:>8}  {:>7}  {:>9}  {:>8}",
        "model", "subjects", "mean", "correct", "questions", "overall"
    );
    for summary in summaries {
        let _ = writeln!(
            table,
            "{:<width$}  {:>8}  {:>7.2}%  {:>7}  {:>9}  {:>7.2}%",
            summary.model,
            summary.subjects,
            summary.mean_accuracy * 100.0,
            summary.total_correct,
            summary.total_questions,
            summary.overall_accuracy * 100.0,
        );
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["choicebench"]);
        assert_eq!(cli.config, PathBuf::from("config.yaml"));
        assert!(!cli.verbose);
    }

    #[test]
    fn test_flags() {
        let cli = Cli::parse_from(["choicebench", "--config", "runs/mmlu.yaml", "-v"]);
        assert_eq!(cli.config, PathBuf::from("runs/mmlu.yaml"));
        assert!(cli.verbose);
    }

    #[test]
    fn test_summary_shows_correct_count() {
        let summary = RunSummary {
            model: "gpt-4o-mini".to_string(),
            mean_accuracy: 5.0 / 9.0,
            total_correct: 2,
            total_questions: 10,
            overall_accuracy: 0.2,
            subjects: 2,
        };

        let table = format_summary(&[summary]);
        let lines: Vec<&str> = table.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 2);

        let header: Vec<&str> = lines[0].split_whitespace().collect();
        assert_eq!(
            header,
            vec!["model", "subjects", "mean", "correct", "questions", "overall"]
        );
        let row: Vec<&str> = lines[1].split_whitespace().collect();
        assert_eq!(row, vec!["gpt-4o-mini", "2", "55.56%", "2", "10", "20.00%"]);
    }
}
