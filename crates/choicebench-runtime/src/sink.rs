//! Persisting run results.

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use choicebench_core::RunSummary;

use crate::coordinator::{RunReport, SubjectFailure};

pub const RESULTS_FILE: &str = "results.json";
pub const SUMMARY_FILE: &str = "summary.csv";
pub const RUN_FILE: &str = "run.json";

/// Errors from result sinks.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Destination for a finished run.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn persist(&self, report: &RunReport) -> Result<(), SinkError>;
}

/// Writes `results.json`, `summary.csv` and `run.json` into a directory.
#[derive(Debug, Clone)]
pub struct FileSink {
    output_dir: PathBuf,
}

#[derive(Serialize)]
struct SummaryRow<'a> {
    model: &'a str,
    mean_accuracy: f64,
    total_correct: u64,
    total_questions: u64,
    overall_accuracy: f64,
}

impl<'a> From<&'a RunSummary> for SummaryRow<'a> {
    fn from(summary: &'a RunSummary) -> Self {
        Self {
            model: &summary.model,
            mean_accuracy: summary.mean_accuracy,
            total_correct: summary.total_correct,
            total_questions: summary.total_questions,
            overall_accuracy: summary.overall_accuracy,
        }
    }
}

#[derive(Serialize)]
struct RunMetadata<'a> {
    started_at: String,
    finished_at: String,
    models: Vec<&'a str>,
    subjects: Vec<&'a str>,
    failures: &'a [SubjectFailure],
    usage: &'a crate::resilience::LlmUsage,
}

impl FileSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    async fn write(&self, name: &str, contents: Vec<u8>) -> Result<(), SinkError> {
        let path = self.output_dir.join(name);
        tokio::fs::write(&path, contents)
            .await
            .map_err(|source| SinkError::Io { path, source })
    }
}

/// Render the per-model summary table as CSV.
pub fn summary_csv(summaries: &[RunSummary]) -> Result<Vec<u8>, SinkError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if summaries.is_empty() {
        writer.write_record([
            "model",
            "mean_accuracy",
            "total_correct",
            "total_questions",
            "overall_accuracy",
        ])?;
    }
    for summary in summaries {
        writer.serialize(SummaryRow::from(summary))?;
    }
    writer.into_inner().map_err(|e| SinkError::Io {
        path: PathBuf::from(SUMMARY_FILE),
        source: e.into_error(),
    })
}

fn run_metadata(report: &RunReport) -> RunMetadata<'_> {
    let mut models: Vec<&str> = Vec::new();
    let mut subjects: Vec<&str> = Vec::new();
    for result in &report.results {
        if !models.contains(&result.model.as_str()) {
            models.push(&result.model);
        }
        if !subjects.contains(&result.subject.as_str()) {
            subjects.push(&result.subject);
        }
    }

    RunMetadata {
        started_at: report.started_at.to_rfc3339(),
        finished_at: report.finished_at.to_rfc3339(),
        models,
        subjects,
        failures: &report.failures,
        usage: &report.usage,
    }
}

#[async_trait]
impl ResultSink for FileSink {
    async fn persist(&self, report: &RunReport) -> Result<(), SinkError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|source| SinkError::Io {
                path: self.output_dir.clone(),
                source,
            })?;

        self.write(RESULTS_FILE, serde_json::to_vec_pretty(&report.results)?)
            .await?;
        self.write(SUMMARY_FILE, summary_csv(&report.summaries)?)
            .await?;
        self.write(RUN_FILE, serde_json::to_vec_pretty(&run_metadata(report))?)
            .await?;

        tracing::info!(
            output_dir = %self.output_dir.display(),
            results = report.results.len(),
            "Results saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::LlmUsage;
    use choicebench_core::{summarize, SubjectResult};

    fn report() -> RunReport {
        let results = vec![
            SubjectResult::new("gpt-4o-mini", "astronomy", 1, 1, 0),
            SubjectResult::new("gpt-4o-mini", "virology", 1, 9, 2),
        ];
        let now = chrono::Utc::now();
        RunReport {
            started_at: now,
            finished_at: now,
            summaries: summarize(&results),
            results,
            failures: vec![SubjectFailure {
                model: "gpt-4o-mini".into(),
                subject: "law".into(),
                error: "Unknown subject: law".into(),
            }],
            usage: LlmUsage::default(),
        }
    }

    #[test]
    fn test_summary_csv_layout() {
        let csv = String::from_utf8(summary_csv(&report().summaries).unwrap()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("model,mean_accuracy,total_correct,total_questions,overall_accuracy")
        );
        let row: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(row[0], "gpt-4o-mini");
        assert!((row[1].parse::<f64>().unwrap() - 5.0 / 9.0).abs() < 1e-9);
        assert_eq!(row[2], "2");
        assert_eq!(row[3], "10");
        assert_eq!(row[4].parse::<f64>().unwrap(), 0.2);
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_empty_summary_keeps_header() {
        let csv = String::from_utf8(summary_csv(&[]).unwrap()).unwrap();
        assert_eq!(
            csv.trim_end(),
            "model,mean_accuracy,total_correct,total_questions,overall_accuracy"
        );
    }

    #[tokio::test]
    async fn test_file_sink_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("nested").join("results");
        let sink = FileSink::new(&output_dir);

        sink.persist(&report()).await.unwrap();

        let results: serde_json::Value =
            serde_json::from_slice(&std::fs::read(output_dir.join(RESULTS_FILE)).unwrap())
                .unwrap();
        assert_eq!(results.as_array().unwrap().len(), 2);
        assert_eq!(results[1]["subject"], "virology");
        assert_eq!(results[1]["correct"], 1);
        assert_eq!(results[1]["total"], 9);
        assert_eq!(results[1]["failed"], 2);

        assert!(output_dir.join(SUMMARY_FILE).exists());

        let run: serde_json::Value =
            serde_json::from_slice(&std::fs::read(output_dir.join(RUN_FILE)).unwrap()).unwrap();
        assert_eq!(run["models"], serde_json::json!(["gpt-4o-mini"]));
        assert_eq!(run["subjects"], serde_json::json!(["astronomy", "virology"]));
        assert_eq!(run["failures"][0]["subject"], "law");
    }
}
