//! Few-shot prompt rendering.
//!
//! The rendered prompt is a pure function of its inputs: the same exemplars
//! and question always produce byte-identical text.

use std::fmt::Write;

use crate::types::{Item, ItemError, CHOICE_COUNT, CHOICE_LETTERS};

/// Instruction placed at the top of every prompt.
pub const INSTRUCTION_HEADER: &str =
    "Answer with only the letter (A, B, C or D) of the correct choice.\n\n";

/// Final cue left open for the model to complete.
pub const ANSWER_CUE: &str = "Answer:";

/// Renders few-shot multiple-choice prompts.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    header: String,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self {
            header: INSTRUCTION_HEADER.to_string(),
        }
    }

    /// Replace the instruction header.
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    /// Render a prompt from worked exemplars and the target question.
    ///
    /// Each exemplar is rendered with its correct letter so the model sees
    /// the expected answer format. The target ends with a bare `Answer:`.
    /// Fails if an exemplar is invalid or the target does not carry exactly
    /// [`CHOICE_COUNT`] choices.
    pub fn build(
        &self,
        exemplars: &[Item],
        question: &str,
        choices: &[String],
    ) -> Result<String, ItemError> {
        if choices.len() != CHOICE_COUNT {
            return Err(ItemError::ChoiceCount(choices.len()));
        }

        let mut prompt = self.header.clone();

        for exemplar in exemplars {
            exemplar.validate()?;
            let answer = exemplar.answer_letter().ok_or(ItemError::AnswerOutOfRange {
                index: exemplar.answer_index,
                choices: exemplar.choices.len(),
            })?;
            render_question(&mut prompt, &exemplar.question, &exemplar.choices);
            // Writing to a String cannot fail
            let _ = write!(prompt, "{} {}\n\n", ANSWER_CUE, answer);
        }

        render_question(&mut prompt, question, choices);
        prompt.push_str(ANSWER_CUE);
        Ok(prompt)
    }

    /// Render a prompt whose target is `item`.
    pub fn build_for(&self, exemplars: &[Item], item: &Item) -> Result<String, ItemError> {
        self.build(exemplars, &item.question, &item.choices)
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn render_question(prompt: &mut String, question: &str, choices: &[String]) {
    let _ = writeln!(prompt, "Question: {}", question);
    for (letter, choice) in CHOICE_LETTERS.iter().zip(choices) {
        let _ = writeln!(prompt, "  {}. {}", letter, choice);
    }
}
