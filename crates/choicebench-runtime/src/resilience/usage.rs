//! Token and call accounting across a run.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::providers::TokenUsage;

/// Accumulated inference usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmUsage {
    /// Total tokens used
    pub total_tokens: u64,

    /// Prompt/input tokens
    pub prompt_tokens: u64,

    /// Completion/output tokens
    pub completion_tokens: u64,

    /// Calls that returned a response
    pub llm_calls: u64,

    /// Retries slept before a further attempt
    pub retries: u64,

    /// Calls that failed after their final attempt
    pub failed_calls: u64,
}

impl LlmUsage {
    /// Add token usage from a provider response.
    pub fn add(&mut self, usage: &TokenUsage) {
        self.prompt_tokens += u64::from(usage.prompt_tokens);
        self.completion_tokens += u64::from(usage.completion_tokens);
        self.total_tokens += u64::from(usage.total());
        self.llm_calls += 1;
    }
}

/// Thread-safe usage accumulator shared by concurrent calls.
#[derive(Debug, Default)]
pub struct UsageTracker {
    usage: RwLock<LlmUsage>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, usage: &TokenUsage) {
        self.usage.write().add(usage);
    }

    pub fn record_retry(&self) {
        self.usage.write().retries += 1;
    }

    pub fn record_failure(&self) {
        self.usage.write().failed_calls += 1;
    }

    /// Current totals.
    pub fn snapshot(&self) -> LlmUsage {
        self.usage.read().clone()
    }
}
