//! Core types for multiple-choice evaluation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of choices every item carries.
pub const CHOICE_COUNT: usize = 4;

/// Choice labels, in display order.
pub const CHOICE_LETTERS: [char; CHOICE_COUNT] = ['A', 'B', 'C', 'D'];

/// Map a zero-based choice index to its label (`0 -> 'A'`).
///
/// This is the only index-to-letter mapping in the crate. Prompt rendering
/// and scoring both go through it so they can never disagree. Indexes past
/// the last choice have no label.
pub fn choice_letter(index: usize) -> Option<char> {
    CHOICE_LETTERS.get(index).copied()
}

/// Errors for items that cannot be evaluated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ItemError {
    #[error("expected {CHOICE_COUNT} choices, found {0}")]
    ChoiceCount(usize),

    #[error("answer index {index} out of range for {choices} choices")]
    AnswerOutOfRange { index: usize, choices: usize },

    #[error("question text is empty")]
    EmptyQuestion,
}

/// A labeled multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Question text
    pub question: String,

    /// Choice texts, in display order
    pub choices: Vec<String>,

    /// Zero-based index of the correct choice
    #[serde(rename = "answer")]
    pub answer_index: usize,
}

impl Item {
    pub fn new(
        question: impl Into<String>,
        choices: impl IntoIterator<Item = impl Into<String>>,
        answer_index: usize,
    ) -> Self {
        Self {
            question: question.into(),
            choices: choices.into_iter().map(Into::into).collect(),
            answer_index,
        }
    }

    /// The letter of the correct choice, if the answer index is in range.
    pub fn answer_letter(&self) -> Option<char> {
        choice_letter(self.answer_index)
    }

    /// Check the item is well-formed.
    pub fn validate(&self) -> Result<(), ItemError> {
        if self.question.trim().is_empty() {
            return Err(ItemError::EmptyQuestion);
        }
        if self.choices.len() != CHOICE_COUNT {
            return Err(ItemError::ChoiceCount(self.choices.len()));
        }
        if self.answer_index >= self.choices.len() {
            return Err(ItemError::AnswerOutOfRange {
                index: self.answer_index,
                choices: self.choices.len(),
            });
        }
        Ok(())
    }
}

/// Outcome of scoring one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoredOutcome {
    /// Letter extracted from the response, if any
    pub predicted_letter: Option<char>,

    /// Whether the prediction matched the answer
    pub is_correct: bool,

    /// Whether the item counts toward the subject total.
    /// False only when the call itself failed.
    pub counted: bool,
}

impl ScoredOutcome {
    /// Score a response against the item it answers.
    ///
    /// An unparseable response is counted and wrong.
    pub fn answered(item: &Item, predicted_letter: Option<char>) -> Self {
        Self {
            predicted_letter,
            is_correct: predicted_letter.is_some() && predicted_letter == item.answer_letter(),
            counted: true,
        }
    }

    /// Outcome for an item whose call never produced a response.
    pub fn failed() -> Self {
        Self {
            predicted_letter: None,
            is_correct: false,
            counted: false,
        }
    }
}

/// `correct / total`, or 0.0 when nothing was counted.
pub fn accuracy(correct: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        correct as f64 / total as f64
    }
}

/// Result of evaluating one model on one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectResult {
    /// Subject identifier
    pub subject: String,

    /// `correct / total` (0.0 when total is 0)
    pub accuracy: f64,

    /// Items answered correctly
    pub correct: u64,

    /// Items that produced a response
    pub total: u64,

    /// Model identifier
    pub model: String,

    /// Items excluded because their call failed
    #[serde(default)]
    pub failed: u64,
}

impl SubjectResult {
    /// Build a result; accuracy is derived from the counts.
    pub fn new(
        model: impl Into<String>,
        subject: impl Into<String>,
        correct: u64,
        total: u64,
        failed: u64,
    ) -> Self {
        debug_assert!(correct <= total);
        Self {
            subject: subject.into(),
            accuracy: accuracy(correct, total),
            correct,
            total,
            model: model.into(),
            failed,
        }
    }
}

/// Per-model aggregate over every evaluated subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Model identifier
    pub model: String,

    /// Unweighted mean of per-subject accuracies
    pub mean_accuracy: f64,

    /// Sum of correct answers across subjects
    pub total_correct: u64,

    /// Sum of counted items across subjects
    pub total_questions: u64,

    /// Pooled accuracy, `total_correct / total_questions`
    pub overall_accuracy: f64,

    /// Number of subjects aggregated
    pub subjects: usize,
}

/// Aggregate subject results into one summary per model.
///
/// Models are reported in the order they first appear.
pub fn summarize(results: &[SubjectResult]) -> Vec<RunSummary> {
    let mut summaries: Vec<(RunSummary, f64)> = Vec::new();

    for result in results {
        let index = match summaries.iter().position(|(s, _)| s.model == result.model) {
            Some(index) => index,
            None => {
                summaries.push((
                    RunSummary {
                        model: result.model.clone(),
                        mean_accuracy: 0.0,
                        total_correct: 0,
                        total_questions: 0,
                        overall_accuracy: 0.0,
                        subjects: 0,
                    },
                    0.0,
                ));
                summaries.len() - 1
            }
        };

        let (summary, accuracy_sum) = &mut summaries[index];
        summary.total_correct += result.correct;
        summary.total_questions += result.total;
        summary.subjects += 1;
        *accuracy_sum += result.accuracy;
    }

    summaries
        .into_iter()
        .map(|(mut summary, accuracy_sum)| {
            summary.mean_accuracy = accuracy_sum / summary.subjects as f64;
            summary.overall_accuracy = accuracy(summary.total_correct, summary.total_questions);
            summary
        })
        .collect()
}
