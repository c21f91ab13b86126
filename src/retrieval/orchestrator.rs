//! Context retrieval orchestration.
//!
//! Applies admission control, fans the enabled strategies out as independent
//! tasks each bounded by its own timeout, gathers whatever survives, and hands
//! the results to the [`ContextEnricher`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::ContextRetrievalConfig;
use crate::data::{ContextRetrievalResult, DiffAnalysisBundle, EnrichedDiffAnalysisBundle};
use crate::retrieval::enricher::ContextEnricher;
use crate::retrieval::strategy::ContextStrategy;

/// Why a request was not admitted to context retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Retrieval is disabled in configuration.
    Disabled,
    /// The diff exceeds `maxDiffLines` and large diffs are skipped.
    DiffTooLarge {
        /// Total changed lines in the diff.
        changed_lines: usize,
        /// Configured limit.
        max_diff_lines: usize,
    },
    /// The repository falls outside the rollout percentage.
    NotInRollout {
        /// Rollout bucket of the repository, `0..100`.
        bucket: u8,
    },
}

/// Outcome of a single strategy task.
enum StrategyOutcome {
    Completed(ContextRetrievalResult),
    Failed(anyhow::Error),
    TimedOut,
    Panicked(String),
}

/// Coordinates context strategies for a diff.
pub struct ContextOrchestrator {
    config: ContextRetrievalConfig,
    strategies: Vec<Arc<dyn ContextStrategy>>,
}

impl ContextOrchestrator {
    /// Creates an orchestrator over the registered strategies.
    pub fn new(config: ContextRetrievalConfig, strategies: Vec<Arc<dyn ContextStrategy>>) -> Self {
        Self { config, strategies }
    }

    /// Retrieves and merges context for `bundle`.
    ///
    /// Never fails: skipped, empty, and partially failed retrievals all yield
    /// a valid enriched bundle.
    pub async fn retrieve_enriched_context(
        &self,
        bundle: DiffAnalysisBundle,
    ) -> EnrichedDiffAnalysisBundle {
        if let Some(reason) = self.admission_skip_reason(&bundle) {
            info!(repository = %bundle.repository, ?reason, "Skipping context retrieval");
            return EnrichedDiffAnalysisBundle::without_context(bundle);
        }

        let selected = self.select_strategies();
        if selected.is_empty() {
            debug!("No context strategies enabled");
            return EnrichedDiffAnalysisBundle::without_context(bundle);
        }

        let started = Instant::now();
        let bundle = Arc::new(bundle);
        let outcomes = self.run_strategies(&selected, &bundle).await;

        let mut results = Vec::with_capacity(outcomes.len());
        for (strategy, outcome) in selected.iter().zip(outcomes) {
            match outcome {
                StrategyOutcome::Completed(result) => {
                    debug!(
                        strategy = strategy.name(),
                        matches = result.matches().len(),
                        duration_ms = result.metadata().duration.as_millis() as u64,
                        "Context strategy completed"
                    );
                    results.push(result);
                }
                StrategyOutcome::Failed(e) => {
                    warn!(strategy = strategy.name(), "Context strategy failed: {e:#}");
                }
                StrategyOutcome::TimedOut => {
                    warn!(
                        strategy = strategy.name(),
                        timeout_secs = self.config.strategy_timeout().as_secs(),
                        "Context strategy timed out"
                    );
                }
                StrategyOutcome::Panicked(message) => {
                    warn!(strategy = strategy.name(), "Context strategy panicked: {message}");
                }
            }
        }

        info!(
            strategies = selected.len(),
            succeeded = results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Context retrieval finished"
        );

        // Every task has finished, so this is normally the last reference.
        let bundle = Arc::unwrap_or_clone(bundle);
        ContextEnricher::merge_results(bundle, results)
    }

    /// Returns why `bundle` would be skipped, or `None` if it is admitted.
    #[must_use]
    pub fn admission_skip_reason(&self, bundle: &DiffAnalysisBundle) -> Option<SkipReason> {
        if !self.config.enabled() {
            return Some(SkipReason::Disabled);
        }

        let rollout = self.config.rollout();
        let changed_lines = bundle.total_changed_lines();
        if rollout.skip_large_diffs() && changed_lines > rollout.max_diff_lines() {
            return Some(SkipReason::DiffTooLarge {
                changed_lines,
                max_diff_lines: rollout.max_diff_lines(),
            });
        }

        if !rollout.admits(&bundle.repository) {
            return Some(SkipReason::NotInRollout {
                bucket: rollout_bucket(&bundle.repository),
            });
        }

        None
    }

    /// Enabled strategies ordered by priority, then name.
    fn select_strategies(&self) -> Vec<Arc<dyn ContextStrategy>> {
        let mut selected: Vec<Arc<dyn ContextStrategy>> = self
            .strategies
            .iter()
            .filter(|s| self.config.is_strategy_enabled(s.name()))
            .cloned()
            .collect();
        selected.sort_by(|a, b| {
            a.priority()
                .cmp(&b.priority())
                .then_with(|| a.name().cmp(b.name()))
        });
        selected
    }

    /// Spawns one task per strategy and waits for all of them.
    ///
    /// Each task carries its own timeout, started when the task starts; on
    /// expiry the strategy future is dropped, cancelling its in-flight work.
    /// Outcomes are returned in the order of `selected`.
    async fn run_strategies(
        &self,
        selected: &[Arc<dyn ContextStrategy>],
        bundle: &Arc<DiffAnalysisBundle>,
    ) -> Vec<StrategyOutcome> {
        let timeout = self.config.strategy_timeout();

        let handles: Vec<_> = selected
            .iter()
            .map(|strategy| {
                let strategy = Arc::clone(strategy);
                let bundle = Arc::clone(bundle);
                tokio::spawn(async move {
                    run_with_timeout(strategy.as_ref(), &bundle, timeout).await
                })
            })
            .collect();

        futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| match joined {
                Ok(outcome) => outcome,
                Err(e) => StrategyOutcome::Panicked(e.to_string()),
            })
            .collect()
    }
}

async fn run_with_timeout(
    strategy: &dyn ContextStrategy,
    bundle: &DiffAnalysisBundle,
    timeout: Duration,
) -> StrategyOutcome {
    match tokio::time::timeout(timeout, strategy.retrieve_context(bundle)).await {
        Ok(Ok(result)) => StrategyOutcome::Completed(result),
        Ok(Err(e)) => StrategyOutcome::Failed(e),
        Err(_) => StrategyOutcome::TimedOut,
    }
}

/// Maps a repository identifier to a stable rollout bucket in `0..100`.
///
/// FNV-1a, so buckets are identical across processes and platforms.
#[must_use]
pub fn rollout_bucket(repository: &str) -> u8 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let hash = repository.bytes().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    });
    (hash % 100) as u8
}
