//! # choicebench-core
//!
//! Deterministic building blocks for multiple-choice LLM benchmarks.
//!
//! This crate never performs I/O beyond reading a config file. It provides:
//! - [`PromptBuilder`]: few-shot prompt rendering
//! - [`extract`]: choice-letter extraction from model responses
//! - [`select_exemplars`]: the few-shot exemplar rule
//! - [`SubjectResult`] / [`summarize`]: scoring and per-model aggregation
//! - [`RunConfig`]: typed, validated run configuration
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: identical inputs render identical prompts
//! 2. **No leakage**: a question is never among its own exemplars
//! 3. **Total accounting**: `0 <= correct <= total`, accuracy is 0.0 when nothing was counted
//!
//! ## Example
//!
//! ```rust
//! use choicebench_core::{extract, select_exemplars, Item, PromptBuilder};
//!
//! let items = vec![
//!     Item::new("2 + 2 = ?", ["3", "4", "5", "6"], 1),
//!     Item::new("Capital of Italy?", ["Rome", "Oslo", "Lima", "Bern"], 0),
//! ];
//!
//! let exemplars = select_exemplars(&items, 1, 5);
//! let prompt = PromptBuilder::new().build_for(exemplars, &items[1]).unwrap();
//! assert!(prompt.ends_with("Answer:"));
//!
//! assert_eq!(extract("The answer is A."), Some('A'));
//! ```

pub mod config;
pub mod extract;
pub mod fewshot;
pub mod prompt;
pub mod types;

// Re-export main types at crate root
pub use config::{ConfigError, RetrySettings, RunConfig, DEFAULT_PROVIDER};
pub use extract::extract;
pub use fewshot::{exemplar_range, select_exemplars};
pub use prompt::{PromptBuilder, ANSWER_CUE, INSTRUCTION_HEADER};
pub use types::{
    accuracy, choice_letter, summarize, Item, ItemError, RunSummary, ScoredOutcome,
    SubjectResult, CHOICE_COUNT, CHOICE_LETTERS,
};
