//! Co-change analysis over commit history.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use tracing::debug;

use crate::config::HistorySettings;
use crate::git::CommitInfo;
use crate::retrieval::frequency::{co_change_metrics, CoChangeMetrics};

/// Source of commit history for individual files.
///
/// Implemented by [`GitHistorySource`](crate::git::GitHistorySource) for local
/// repositories; SCM service clients can implement it the same way.
pub trait CommitHistorySource: Send + Sync {
    /// Returns up to `max_results` commits touching `file_path`, newest first,
    /// optionally bounded to commits authored at or after `since`.
    fn commits_for<'a>(
        &'a self,
        repository: &'a str,
        file_path: &'a str,
        since: Option<DateTime<FixedOffset>>,
        max_results: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<CommitInfo>>> + Send + 'a>>;
}

/// Co-change findings for a single target file.
#[derive(Debug, Clone)]
pub struct FileCoChange {
    /// The changed file the history was fetched for.
    pub target: String,
    /// Number of commits in the examined window.
    pub commits_examined: usize,
    /// Normalized scores for every co-changed file, strongest first.
    pub metrics: Vec<CoChangeMetrics>,
}

/// Finds files historically modified together with a target file.
pub struct CoChangeAnalyzer {
    source: Arc<dyn CommitHistorySource>,
    settings: HistorySettings,
}

impl CoChangeAnalyzer {
    /// Creates an analyzer over the given history source.
    pub fn new(source: Arc<dyn CommitHistorySource>, settings: HistorySettings) -> Self {
        Self { source, settings }
    }

    /// Window and filtering settings.
    #[must_use]
    pub fn settings(&self) -> &HistorySettings {
        &self.settings
    }

    /// Fetches the commit window for `target` and scores its co-changed files.
    pub async fn analyze(&self, repository: &str, target: &str) -> Result<FileCoChange> {
        let since = self.settings.since();
        let commits = self
            .source
            .commits_for(
                repository,
                target,
                since,
                self.settings.max_commits_per_file(),
            )
            .await
            .with_context(|| format!("Failed to fetch commit history for {target}"))?;

        let metrics = co_change_metrics(target, &commits);
        debug!(
            file = target,
            commits = commits.len(),
            candidates = metrics.len(),
            "Analyzed co-change history"
        );

        Ok(FileCoChange {
            target: target.to_string(),
            commits_examined: commits.len(),
            metrics,
        })
    }
}
