//! Context strategy trait.

use std::future::Future;
use std::pin::Pin;

use anyhow::Result;

use crate::data::{ContextRetrievalResult, DiffAnalysisBundle};

/// Future returned by [`ContextStrategy::retrieve_context`].
pub type StrategyFuture<'a> = Pin<Box<dyn Future<Output = Result<ContextRetrievalResult>> + Send + 'a>>;

/// A pluggable technique for discovering files related to a diff.
///
/// Strategies never observe each other: each one reads the shared, immutable
/// bundle and returns an independent result.
pub trait ContextStrategy: Send + Sync {
    /// Discovers context matches for the bundle.
    fn retrieve_context<'a>(&'a self, bundle: &'a DiffAnalysisBundle) -> StrategyFuture<'a>;

    /// Stable identifier matched against `enabledStrategies`.
    fn name(&self) -> &str;

    /// Ordering key for reporting and tie-breaking; lower sorts first.
    ///
    /// Does not affect scheduling: every enabled strategy runs concurrently.
    fn priority(&self) -> i32;
}
