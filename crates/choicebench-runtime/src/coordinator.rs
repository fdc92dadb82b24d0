//! Run coordinator for a full benchmark batch.
//!
//! The coordinator walks models, then subjects, one subject at a time:
//! - Subjects come from the dataset, optionally restricted by an allow-list
//! - Each (model, subject) pair is evaluated by the [`SubjectEvaluator`]
//! - A subject that cannot be loaded is recorded and skipped
//! - Per-model summaries are computed once at the end and persisted

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use choicebench_core::{summarize, RunConfig, RunSummary, SubjectResult};

use crate::dataset::{is_excluded_subject, DatasetError, DatasetSource};
use crate::evaluator::SubjectEvaluator;
use crate::progress::{NoProgress, ProgressObserver};
use crate::providers::{CompletionConfig, LlmProvider};
use crate::resilience::{LlmUsage, ResilientCaller, RetryPolicy};
use crate::sink::{ResultSink, SinkError};

/// Errors from the run coordinator.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Failed to persist results: {0}")]
    Sink(#[from] SinkError),
}

/// A subject skipped during the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectFailure {
    pub model: String,
    pub subject: String,
    pub error: String,
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Subject results in the order they completed
    pub results: Vec<SubjectResult>,

    /// One summary per model
    pub summaries: Vec<RunSummary>,

    /// Subjects that could not be evaluated
    pub failures: Vec<SubjectFailure>,

    /// Inference usage over the whole run
    pub usage: LlmUsage,
}

/// Runs every (model, subject) pair and hands the report to a sink.
pub struct RunCoordinator {
    dataset: Arc<dyn DatasetSource>,
    evaluator: SubjectEvaluator,
    sink: Arc<dyn ResultSink>,
    subject_filter: Option<Vec<String>>,
}

impl RunCoordinator {
    pub fn new(
        dataset: Arc<dyn DatasetSource>,
        evaluator: SubjectEvaluator,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            dataset,
            evaluator,
            sink,
            subject_filter: None,
        }
    }

    /// Only evaluate these subjects.
    pub fn with_subject_filter(mut self, subjects: Option<Vec<String>>) -> Self {
        self.subject_filter = subjects;
        self
    }

    /// Subjects this run will evaluate, in dataset order.
    ///
    /// Allow-listed subjects missing from the dataset are logged and dropped.
    pub async fn subjects(&self) -> Result<Vec<String>, RunError> {
        let available = self.dataset.list_subjects().await?;

        let Some(filter) = &self.subject_filter else {
            return Ok(available);
        };

        for requested in filter {
            if is_excluded_subject(requested) || !available.contains(requested) {
                tracing::warn!(subject = %requested, "Requested subject not in dataset, skipping");
            }
        }

        Ok(available
            .into_iter()
            .filter(|subject| filter.contains(subject))
            .collect())
    }

    /// Evaluate every model on every subject without persisting.
    pub async fn execute(&self, models: &[String], subjects: &[String]) -> RunReport {
        let started_at = Utc::now();
        let mut results = Vec::with_capacity(models.len() * subjects.len());
        let mut failures = Vec::new();

        tracing::info!(
            models = models.len(),
            subjects = subjects.len(),
            provider = self.evaluator.caller().provider_name(),
            "Starting run"
        );

        for model in models {
            tracing::info!(model = %model, "Evaluating model");

            for subject in subjects {
                let items = match self.dataset.load_items(subject).await {
                    Ok(items) => items,
                    Err(e) => {
                        tracing::error!(
                            model = %model,
                            subject = %subject,
                            error = %e,
                            "Skipping subject"
                        );
                        failures.push(SubjectFailure {
                            model: model.clone(),
                            subject: subject.clone(),
                            error: e.to_string(),
                        });
                        continue;
                    }
                };

                let result = self.evaluator.evaluate(model, subject, items).await;
                tracing::info!(
                    "{}: {:.2}% ({}/{})",
                    subject,
                    result.accuracy * 100.0,
                    result.correct,
                    result.total
                );
                results.push(result);
            }
        }

        let summaries = summarize(&results);
        for summary in &summaries {
            tracing::info!(
                model = %summary.model,
                mean_accuracy = summary.mean_accuracy,
                overall_accuracy = summary.overall_accuracy,
                total_correct = summary.total_correct,
                total_questions = summary.total_questions,
                "Model summary"
            );
        }

        RunReport {
            started_at,
            finished_at: Utc::now(),
            results,
            summaries,
            failures,
            usage: self.usage(),
        }
    }

    /// Evaluate and persist.
    ///
    /// The report is returned even when nothing could be evaluated; only a
    /// sink failure fails the run.
    pub async fn run(
        &self,
        models: &[String],
        subjects: &[String],
    ) -> Result<RunReport, RunError> {
        let report = self.execute(models, subjects).await;
        self.sink.persist(&report).await?;
        Ok(report)
    }

    /// Current inference usage.
    pub fn usage(&self) -> LlmUsage {
        self.evaluator.caller().usage().snapshot()
    }
}

/// Builder for RunCoordinator.
pub struct RunCoordinatorBuilder {
    config: RunConfig,
    provider: Option<Arc<dyn LlmProvider>>,
    dataset: Option<Arc<dyn DatasetSource>>,
    sink: Option<Arc<dyn ResultSink>>,
    progress: Arc<dyn ProgressObserver>,
}

impl RunCoordinatorBuilder {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            provider: None,
            dataset: None,
            sink: None,
            progress: Arc::new(NoProgress),
        }
    }

    /// Set the inference provider.
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn dataset(mut self, dataset: Arc<dyn DatasetSource>) -> Self {
        self.dataset = Some(dataset);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Report per-item progress to `progress`.
    pub fn progress(mut self, progress: Arc<dyn ProgressObserver>) -> Self {
        self.progress = progress;
        self
    }

    /// Build the coordinator.
    pub fn build(self) -> Result<RunCoordinator, RunError> {
        let provider = self
            .provider
            .ok_or_else(|| RunError::NotConfigured("No provider set".to_string()))?;
        let dataset = self
            .dataset
            .ok_or_else(|| RunError::NotConfigured("No dataset set".to_string()))?;
        let sink = self
            .sink
            .ok_or_else(|| RunError::NotConfigured("No result sink set".to_string()))?;

        let caller = ResilientCaller::new(
            provider,
            RetryPolicy::from(&self.config.retry),
            CompletionConfig::from(&self.config),
        );
        let evaluator = SubjectEvaluator::from_config(Arc::new(caller), &self.config)
            .with_progress(self.progress);

        Ok(RunCoordinator::new(dataset, evaluator, sink)
            .with_subject_filter(self.config.subjects.clone()))
    }
}
