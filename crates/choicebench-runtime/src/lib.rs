//! # choicebench-runtime
//!
//! Async evaluation runtime for choicebench.
//!
//! This crate runs the benchmark against a live model. Everything that
//! decides *what* is asked and *how* it is scored lives in
//! `choicebench-core`; this crate decides *when* and *how often*:
//!
//! - [`providers`]: the [`LlmProvider`] trait and the OpenAI-compatible backend
//! - [`resilience`]: retry with exponential backoff, the concurrency cap, usage accounting
//! - [`SubjectEvaluator`]: fans one subject's items out over a `JoinSet`
//! - [`RunCoordinator`]: walks models and subjects and persists the report
//! - [`DatasetSource`] / [`ResultSink`]: where items come from and where results go
//! - [`ProgressObserver`]: per-item progress callbacks
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use choicebench_core::RunConfig;
//! use choicebench_runtime::{FileSink, JsonlDataset, ProviderRegistry, RunCoordinatorBuilder};
//!
//! let config = RunConfig::from_yaml_file("config.yaml")?;
//! let provider = ProviderRegistry::with_defaults().create_from_config(&config.provider)?;
//!
//! let coordinator = RunCoordinatorBuilder::new(config.clone())
//!     .provider(provider)
//!     .dataset(Arc::new(JsonlDataset::new(&config.dataset_dir)))
//!     .sink(Arc::new(FileSink::new(&config.output_dir)))
//!     .build()?;
//!
//! let subjects = coordinator.subjects().await?;
//! let report = coordinator.run(&config.models, &subjects).await?;
//! ```

pub mod coordinator;
pub mod dataset;
pub mod evaluator;
pub mod progress;
pub mod providers;
pub mod resilience;
pub mod sink;

pub use coordinator::{
    RunCoordinator, RunCoordinatorBuilder, RunError, RunReport, SubjectFailure,
};
pub use dataset::{
    is_excluded_subject, DatasetError, DatasetSource, InMemoryDataset, JsonlDataset,
    EXCLUDED_SUBJECTS,
};
pub use evaluator::{SubjectEvaluator, Tally, TallyCounts};
pub use progress::{NoProgress, ProgressObserver};
pub use providers::{
    ApiKey, ChatMessage, CompletionConfig, CompletionResponse, KeyLookup, KeySource, LlmProvider,
    ProviderError, ProviderFactory, ProviderRegistry, TokenUsage, GREEDY_TEMPERATURE,
};
pub use resilience::{
    CallError, CallPermit, ConcurrencyLimiter, LlmUsage, ResilientCaller, RetryPolicy,
    UsageTracker,
};
pub use sink::{FileSink, ResultSink, SinkError};

#[cfg(feature = "openai")]
pub use providers::{OpenAiProvider, OpenAiProviderFactory, OPENAI_API_KEY_ENV};
