//! Retrying wrapper around a single inference call.

use backon::{BackoffBuilder, ExponentialBuilder, Retryable};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use choicebench_core::RetrySettings;

use super::usage::UsageTracker;
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, ProviderError};

/// Errors surfaced by [`ResilientCaller::call`].
#[derive(Error, Debug)]
pub enum CallError {
    #[error("gave up after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    #[error("non-retryable provider error: {0}")]
    Rejected(#[source] ProviderError),
}

impl CallError {
    /// The provider error behind the failure.
    pub fn provider_error(&self) -> &ProviderError {
        match self {
            Self::Exhausted { source, .. } => source,
            Self::Rejected(source) => source,
        }
    }
}

/// Exponential backoff policy for inference calls.
///
/// Delays start at `min_delay` and grow by `factor` up to `max_delay`,
/// with no jitter. With the defaults a call is attempted five times, waiting
/// 4s, 8s, 16s and 30s between attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,

    /// Delay before the first retry
    pub min_delay: Duration,

    /// Upper bound on any single delay
    pub max_delay: Duration,

    /// Growth factor between delays
    pub factor: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            min_delay: settings.min_delay,
            max_delay: settings.max_delay,
            factor: settings.factor,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// The backon builder for this policy.
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_factor(self.factor)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize)
    }

    /// Delays slept between attempts, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.backoff().build().collect()
    }

    /// Whether an error should trigger another attempt.
    pub fn should_retry(&self, error: &ProviderError) -> bool {
        error.is_retryable()
    }
}

/// Calls a provider with deterministic decoding and retries transient
/// failures according to a [`RetryPolicy`].
///
/// Holds no per-call state; one caller is shared by every task of a run.
pub struct ResilientCaller {
    provider: Arc<dyn LlmProvider>,
    policy: RetryPolicy,
    completion: CompletionConfig,
    usage: UsageTracker,
}

impl ResilientCaller {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        policy: RetryPolicy,
        completion: CompletionConfig,
    ) -> Self {
        Self {
            provider,
            policy,
            completion,
            usage: UsageTracker::new(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Ask `model` to complete `prompt`, returning the trimmed response text.
    pub async fn call(&self, model: &str, prompt: &str) -> Result<String, CallError> {
        let config = self.completion.for_model(model);
        let provider = &self.provider;
        let config_ref = &config;
        let mut attempts = 0u32;
        let mut failed_attempts = 0u32;

        let result = (|| {
            attempts += 1;
            async move {
                provider
                    .complete(vec![ChatMessage::user(prompt)], config_ref)
                    .await
            }
        })
        .retry(self.policy.backoff())
        .sleep(tokio::time::sleep)
        .when(|e: &ProviderError| self.policy.should_retry(e))
        .notify(|e: &ProviderError, delay: Duration| {
            failed_attempts += 1;
            self.usage.record_retry();
            tracing::warn!(
                model = model,
                attempt = failed_attempts,
                max_attempts = self.policy.max_attempts,
                error = %e,
                delay = %humantime::format_duration(delay),
                "Inference call failed, retrying"
            );
        })
        .await;

        match result {
            Ok(response) => {
                tracing::debug!(
                    model = model,
                    served_by = %response.model,
                    stop_reason = ?response.stop_reason,
                    tokens = response.usage.total(),
                    "Inference call completed"
                );
                self.usage.record_success(&response.usage);
                Ok(response.content.trim().to_string())
            }
            Err(source) => {
                self.usage.record_failure();
                if source.is_retryable() {
                    Err(CallError::Exhausted { attempts, source })
                } else {
                    Err(CallError::Rejected(source))
                }
            }
        }
    }
}
