//! Per-subject evaluation.
//!
//! Every item of a subject becomes one task on a [`JoinSet`]. Tasks wait on
//! a [`ConcurrencyLimiter`] before calling the model, so at most
//! `num_concurrent` calls are in flight while the rest queue. The evaluator
//! returns only once every task has resolved.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::Instrument;

use choicebench_core::{
    extract, select_exemplars, Item, PromptBuilder, RunConfig, ScoredOutcome, SubjectResult,
};

use crate::progress::{NoProgress, ProgressObserver};
use crate::resilience::{ConcurrencyLimiter, ResilientCaller};

/// Running counts for one subject, shared by its item tasks.
#[derive(Debug, Default)]
pub struct Tally {
    counts: Mutex<TallyCounts>,
}

/// A snapshot of a [`Tally`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TallyCounts {
    pub correct: u64,
    pub total: u64,
    pub failed: u64,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one item's outcome as a single update.
    pub fn record(&self, outcome: &ScoredOutcome) {
        let mut counts = self.counts.lock();
        if outcome.counted {
            counts.total += 1;
            if outcome.is_correct {
                counts.correct += 1;
            }
        } else {
            counts.failed += 1;
        }
    }

    pub fn counts(&self) -> TallyCounts {
        *self.counts.lock()
    }
}

/// Evaluates all items of one subject for one model.
pub struct SubjectEvaluator {
    caller: Arc<ResilientCaller>,
    prompt_builder: PromptBuilder,
    n_fewshot: usize,
    max_samples: Option<usize>,
    num_concurrent: usize,
    progress: Arc<dyn ProgressObserver>,
}

impl SubjectEvaluator {
    pub fn new(caller: Arc<ResilientCaller>) -> Self {
        Self {
            caller,
            prompt_builder: PromptBuilder::new(),
            n_fewshot: 5,
            max_samples: None,
            num_concurrent: 10,
            progress: Arc::new(NoProgress),
        }
    }

    /// Evaluator using the few-shot, sampling and concurrency settings of `config`.
    pub fn from_config(caller: Arc<ResilientCaller>, config: &RunConfig) -> Self {
        Self::new(caller)
            .with_fewshot(config.n_fewshot)
            .with_max_samples(config.max_samples)
            .with_concurrency(config.num_concurrent)
    }

    pub fn with_fewshot(mut self, n_fewshot: usize) -> Self {
        self.n_fewshot = n_fewshot;
        self
    }

    pub fn with_max_samples(mut self, max_samples: Option<usize>) -> Self {
        self.max_samples = max_samples;
        self
    }

    /// Set the concurrency cap. Values below one are raised to one.
    pub fn with_concurrency(mut self, num_concurrent: usize) -> Self {
        self.num_concurrent = num_concurrent.max(1);
        self
    }

    pub fn with_prompt_builder(mut self, prompt_builder: PromptBuilder) -> Self {
        self.prompt_builder = prompt_builder;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressObserver>) -> Self {
        self.progress = progress;
        self
    }

    pub fn caller(&self) -> &Arc<ResilientCaller> {
        &self.caller
    }

    /// Evaluate `items` for `model` and return the subject's result.
    ///
    /// Items whose prompt cannot be built or whose call fails are logged and
    /// excluded from the total; they never abort the rest of the subject.
    pub async fn evaluate(
        &self,
        model: &str,
        subject: &str,
        mut items: Vec<Item>,
    ) -> SubjectResult {
        if let Some(max_samples) = self.max_samples {
            items.truncate(max_samples);
        }

        let span = tracing::info_span!("subject", model = model, subject = subject);
        async {
            let prompts: Vec<_> = (0..items.len())
                .map(|index| {
                    let exemplars = select_exemplars(&items, index, self.n_fewshot);
                    self.prompt_builder.build_for(exemplars, &items[index])
                })
                .collect();

            let limiter = ConcurrencyLimiter::new(self.num_concurrent);
            let tally = Arc::new(Tally::new());
            let mut tasks = JoinSet::new();

            tracing::debug!(
                items = items.len(),
                capacity = limiter.capacity(),
                "Evaluating subject"
            );
            self.progress.subject_started(model, subject, items.len());

            for (index, (item, prompt)) in items.into_iter().zip(prompts).enumerate() {
                let prompt = match prompt {
                    Ok(prompt) => prompt,
                    Err(e) => {
                        tracing::warn!(index, error = %e, "Cannot build prompt, excluding item");
                        tally.record(&ScoredOutcome::failed());
                        self.progress.item_finished(model, subject);
                        continue;
                    }
                };

                let caller = self.caller.clone();
                let limiter = limiter.clone();
                let tally = tally.clone();
                let model = model.to_string();
                let subject = subject.to_string();
                let progress = self.progress.clone();

                tasks.spawn(
                    async move {
                        let outcome = match limiter.acquire().await {
                            Ok(_permit) => match caller.call(&model, &prompt).await {
                                Ok(response) => ScoredOutcome::answered(&item, extract(&response)),
                                Err(e) => {
                                    tracing::warn!(
                                        model = %model,
                                        subject = %subject,
                                        index,
                                        error = %e,
                                        "Item failed, excluding from total"
                                    );
                                    ScoredOutcome::failed()
                                }
                            },
                            Err(e) => {
                                tracing::warn!(index, error = %e, "Limiter closed");
                                ScoredOutcome::failed()
                            }
                        };
                        tally.record(&outcome);
                        progress.item_finished(&model, &subject);
                    }
                    .in_current_span(),
                );
            }

            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "Item task did not complete");
                    tally.record(&ScoredOutcome::failed());
                    self.progress.item_finished(model, subject);
                }
            }
            self.progress.subject_finished(model, subject);

            let counts = tally.counts();
            SubjectResult::new(model, subject, counts.correct, counts.total, counts.failed)
        }
        .instrument(span)
        .await
    }
}
