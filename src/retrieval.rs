//! Context retrieval: strategies, merging, and orchestration.

use std::path::PathBuf;
use std::sync::Arc;

pub mod cochange;
pub mod enricher;
pub mod error;
pub mod frequency;
pub mod history;
pub mod metadata;
pub mod orchestrator;
pub mod strategy;

#[cfg(test)]
pub(crate) mod test_utils;

pub use cochange::{CoChangeAnalyzer, CommitHistorySource, FileCoChange};
pub use enricher::{ContextEnricher, MERGED_STRATEGY_NAME};
pub use error::ContextError;
pub use frequency::{calculate_frequencies, CoChangeMetrics};
pub use history::{HistoryStrategy, HISTORY_STRATEGY_NAME};
pub use metadata::{MetadataStrategy, METADATA_STRATEGY_NAME};
pub use orchestrator::{rollout_bucket, ContextOrchestrator, SkipReason};
pub use strategy::{ContextStrategy, StrategyFuture};

use crate::config::ContextRetrievalConfig;

/// Builds the built-in strategies.
///
/// Both strategies are always registered; enablement is decided per request
/// by the orchestrator. `workspace_root` enables existence checks in the
/// metadata strategy.
pub fn default_strategies(
    config: &ContextRetrievalConfig,
    history_source: Arc<dyn CommitHistorySource>,
    workspace_root: Option<PathBuf>,
) -> Vec<Arc<dyn ContextStrategy>> {
    let analyzer = CoChangeAnalyzer::new(history_source, *config.history());
    let history: Arc<dyn ContextStrategy> = Arc::new(HistoryStrategy::new(analyzer));
    let metadata: Arc<dyn ContextStrategy> = Arc::new(MetadataStrategy::new(workspace_root));
    vec![history, metadata]
}
