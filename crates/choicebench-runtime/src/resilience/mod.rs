//! Resilience patterns for choicebench-runtime.
//!
//! This module provides:
//! - Retry with exponential backoff around each inference call
//! - A concurrency cap on in-flight calls
//! - Token and call accounting

mod limiter;
mod retry;
mod usage;

pub use limiter::{CallPermit, ConcurrencyLimiter};
pub use retry::{CallError, ResilientCaller, RetryPolicy};
pub use usage::{LlmUsage, UsageTracker};
