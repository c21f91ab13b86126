//! Commit history lookups against a local repository.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use git2::{Repository, Sort};
use tracing::debug;

use crate::git::commit::{commit_touches, to_datetime};
use crate::git::CommitInfo;
use crate::retrieval::CommitHistorySource;

/// Most commits walked for a single lookup before giving up.
pub const DEFAULT_SCAN_LIMIT: usize = 5000;

/// [`CommitHistorySource`] backed by a local git checkout.
///
/// The source is bound to one repository, so the `repository` identifier
/// passed to lookups is only used for logging.
#[derive(Debug, Clone)]
pub struct GitHistorySource {
    repo_path: PathBuf,
    scan_limit: usize,
}

impl GitHistorySource {
    /// Creates a source for the repository at `repo_path`.
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
            scan_limit: DEFAULT_SCAN_LIMIT,
        }
    }

    /// Caps how many commits a lookup may walk.
    #[must_use]
    pub fn with_scan_limit(mut self, scan_limit: usize) -> Self {
        self.scan_limit = scan_limit;
        self
    }
}

impl CommitHistorySource for GitHistorySource {
    fn commits_for<'a>(
        &'a self,
        repository: &'a str,
        file_path: &'a str,
        since: Option<DateTime<FixedOffset>>,
        max_results: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<CommitInfo>>> + Send + 'a>> {
        let repo_path = self.repo_path.clone();
        let target = file_path.to_string();
        let scan_limit = self.scan_limit;

        Box::pin(async move {
            let commits = tokio::task::spawn_blocking(move || {
                walk_file_history(&repo_path, &target, since, max_results, scan_limit)
            })
            .await
            .context("History lookup task failed")??;

            debug!(
                repository,
                file = file_path,
                commits = commits.len(),
                "Loaded file history"
            );
            Ok(commits)
        })
    }
}

/// Walks first-parent diffs from HEAD, newest first, collecting commits that touch `file_path`.
///
/// Merge commits are skipped. The walk stops after `max_results` matches,
/// at the first commit whose committer time is before `since`, or after
/// `scan_limit` commits. Author dates are ignored for the window.
fn walk_file_history(
    repo_path: &Path,
    file_path: &str,
    since: Option<DateTime<FixedOffset>>,
    max_results: usize,
    scan_limit: usize,
) -> Result<Vec<CommitInfo>> {
    let repo = Repository::open(repo_path)
        .with_context(|| format!("Failed to open git repository: {}", repo_path.display()))?;

    let mut walker = repo.revwalk().context("Failed to create revwalk")?;
    walker
        .set_sorting(Sort::TOPOLOGICAL | Sort::TIME)
        .context("Failed to set revwalk sorting")?;
    walker.push_head().context("Failed to push HEAD")?;

    let mut commits = Vec::new();
    for oid in walker.take(scan_limit) {
        if commits.len() >= max_results {
            break;
        }

        let oid = oid.context("Failed to get commit OID from walker")?;
        let commit = repo.find_commit(oid).context("Failed to find commit")?;
        if commit.parent_count() > 1 {
            continue;
        }

        if let Some(cutoff) = since {
            if to_datetime(commit.time())? < cutoff {
                break;
            }
        }
        if commit_touches(&repo, &commit, file_path)? {
            commits.push(CommitInfo::from_git_commit(&repo, &commit)?);
        }
    }

    Ok(commits)
}
