//! Question sources.
//!
//! A [`DatasetSource`] lists the subjects it holds and loads the ordered
//! items of one subject. [`JsonlDataset`] reads a directory with one
//! `<subject>.jsonl` file per subject:
//!
//! ```text
//! {"question": "2 + 2 = ?", "choices": ["3", "4", "5", "6"], "answer": 1}
//! ```

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use choicebench_core::{Item, ItemError};

/// Pseudo-subjects that aggregate or hold non-test splits.
pub const EXCLUDED_SUBJECTS: &[&str] = &["all", "auxiliary_train", "validation", "dev"];

const SUBJECT_EXTENSION: &str = "jsonl";

/// Errors from dataset sources.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Dataset IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown subject: {0}")]
    UnknownSubject(String),

    #[error("{subject} line {line}: {source}")]
    Malformed {
        subject: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("{subject} line {line}: {source}")]
    InvalidItem {
        subject: String,
        line: usize,
        #[source]
        source: ItemError,
    },
}

/// Whether a subject is a meta-category rather than a real subject.
pub fn is_excluded_subject(subject: &str) -> bool {
    EXCLUDED_SUBJECTS.contains(&subject)
}

/// Source of subjects and their items.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// Subject identifiers, sorted, meta-categories excluded.
    async fn list_subjects(&self) -> Result<Vec<String>, DatasetError>;

    /// Ordered items of the test split for `subject`.
    async fn load_items(&self, subject: &str) -> Result<Vec<Item>, DatasetError>;
}

/// Directory of `<subject>.jsonl` files.
#[derive(Debug, Clone)]
pub struct JsonlDataset {
    root: PathBuf,
}

impl JsonlDataset {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn subject_path(&self, subject: &str) -> PathBuf {
        self.root.join(format!("{subject}.{SUBJECT_EXTENSION}"))
    }
}

#[async_trait]
impl DatasetSource for JsonlDataset {
    async fn list_subjects(&self) -> Result<Vec<String>, DatasetError> {
        let io_err = |source| DatasetError::Io {
            path: self.root.clone(),
            source,
        };

        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(io_err)?;
        let mut subjects = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SUBJECT_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !is_excluded_subject(stem) {
                    subjects.push(stem.to_string());
                }
            }
        }

        subjects.sort();
        tracing::debug!(root = %self.root.display(), count = subjects.len(), "Listed subjects");
        Ok(subjects)
    }

    async fn load_items(&self, subject: &str) -> Result<Vec<Item>, DatasetError> {
        let path = self.subject_path(subject);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DatasetError::UnknownSubject(subject.to_string()))
            }
            Err(source) => return Err(DatasetError::Io { path, source }),
        };

        parse_items(subject, &content)
    }
}

/// Parse JSON Lines into validated items. Blank lines are skipped.
pub fn parse_items(subject: &str, content: &str) -> Result<Vec<Item>, DatasetError> {
    let mut items = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        let item: Item = serde_json::from_str(line).map_err(|source| DatasetError::Malformed {
            subject: subject.to_string(),
            line: line_no,
            source,
        })?;

        item.validate().map_err(|source| DatasetError::InvalidItem {
            subject: subject.to_string(),
            line: line_no,
            source,
        })?;

        items.push(item);
    }

    Ok(items)
}

/// Subjects held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataset {
    subjects: BTreeMap<String, Vec<Item>>,
}

impl InMemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subject(mut self, subject: impl Into<String>, items: Vec<Item>) -> Self {
        self.insert(subject, items);
        self
    }

    pub fn insert(&mut self, subject: impl Into<String>, items: Vec<Item>) {
        self.subjects.insert(subject.into(), items);
    }
}

#[async_trait]
impl DatasetSource for InMemoryDataset {
    async fn list_subjects(&self) -> Result<Vec<String>, DatasetError> {
        Ok(self
            .subjects
            .keys()
            .filter(|s| !is_excluded_subject(s))
            .cloned()
            .collect())
    }

    async fn load_items(&self, subject: &str) -> Result<Vec<Item>, DatasetError> {
        self.subjects
            .get(subject)
            .cloned()
            .ok_or_else(|| DatasetError::UnknownSubject(subject.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALGEBRA: &str = r#"{"question": "2 + 2 = ?", "choices": ["3", "4", "5", "6"], "answer": 1}

{"question": "x + 1 = 3, x = ?", "choices": ["1", "2", "3", "4"], "answer": 1}
"#;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[tokio::test]
    async fn test_list_subjects_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "virology.jsonl", ALGEBRA);
        write(dir.path(), "abstract_algebra.jsonl", ALGEBRA);
        write(dir.path(), "all.jsonl", ALGEBRA);
        write(dir.path(), "auxiliary_train.jsonl", ALGEBRA);
        write(dir.path(), "README.md", "not a subject");

        let dataset = JsonlDataset::new(dir.path());
        let subjects = dataset.list_subjects().await.unwrap();
        assert_eq!(subjects, vec!["abstract_algebra", "virology"]);
    }

    #[tokio::test]
    async fn test_load_items_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "abstract_algebra.jsonl", ALGEBRA);

        let items = JsonlDataset::new(dir.path())
            .load_items("abstract_algebra")
            .await
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].question, "2 + 2 = ?");
        assert_eq!(items[0].answer_letter(), Some('B'));
    }

    #[tokio::test]
    async fn test_missing_subject() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonlDataset::new(dir.path())
            .load_items("nope")
            .await
            .unwrap_err();
        assert!(matches!(err, DatasetError::UnknownSubject(s) if s == "nope"));
    }

    #[tokio::test]
    async fn test_missing_root() {
        let dataset = JsonlDataset::new("/nonexistent/choicebench/data");
        assert!(matches!(
            dataset.list_subjects().await,
            Err(DatasetError::Io { .. })
        ));
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let content = format!("{ALGEBRA}{{\"question\": \"broken\"\n");
        let err = parse_items("algebra", &content).unwrap_err();
        assert!(matches!(err, DatasetError::Malformed { line: 4, .. }));
    }

    #[test]
    fn test_invalid_item_rejected() {
        let content = r#"{"question": "q", "choices": ["a", "b", "c"], "answer": 0}"#;
        let err = parse_items("s", content).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::InvalidItem {
                source: ItemError::ChoiceCount(3),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_in_memory_dataset() {
        let dataset = InMemoryDataset::new()
            .with_subject("b", vec![Item::new("q", ["1", "2", "3", "4"], 0)])
            .with_subject("a", vec![])
            .with_subject("dev", vec![]);

        assert_eq!(dataset.list_subjects().await.unwrap(), vec!["a", "b"]);
        assert_eq!(dataset.load_items("b").await.unwrap().len(), 1);
        assert!(dataset.load_items("c").await.is_err());
    }
}
