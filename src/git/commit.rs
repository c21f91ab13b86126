//! Commit records used for co-change analysis.

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Utc};
use git2::{Commit, Diff, DiffOptions, Repository};
use serde::{Deserialize, Serialize};

/// A commit and the files it touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Full commit hash.
    pub sha: String,
    /// Full commit message.
    pub message: String,
    /// Author name and email address.
    pub author: String,
    /// Author timestamp with the author's offset.
    pub authored_at: DateTime<FixedOffset>,
    /// Paths changed relative to the first parent, repository-relative.
    pub changed_files: Vec<String>,
}

impl CommitInfo {
    /// Builds a record from a git2 commit, diffing against its first parent.
    pub fn from_git_commit(repo: &Repository, commit: &Commit) -> Result<Self> {
        let author = commit.author();
        let author_label = format!(
            "{} <{}>",
            author.name().unwrap_or("Unknown"),
            author.email().unwrap_or("unknown@example.com")
        );

        Ok(Self {
            sha: commit.id().to_string(),
            message: commit.message().unwrap_or("").to_string(),
            author: author_label,
            authored_at: to_datetime(author.when())?,
            changed_files: changed_files(repo, commit)?,
        })
    }

    /// Returns true if this commit changed `path`.
    #[must_use]
    pub fn touches(&self, path: &str) -> bool {
        self.changed_files.iter().any(|f| f == path)
    }
}

/// Converts a git timestamp, keeping its offset when it is representable.
pub(crate) fn to_datetime(time: git2::Time) -> Result<DateTime<FixedOffset>> {
    let utc = DateTime::<Utc>::from_timestamp(time.seconds(), 0)
        .context("Invalid commit timestamp")?;
    Ok(match FixedOffset::east_opt(time.offset_minutes() * 60) {
        Some(offset) => utc.with_timezone(&offset),
        None => utc.fixed_offset(),
    })
}

/// Returns true if `commit` changed `path` relative to its first parent.
///
/// Limits the diff to `path`, so it is much cheaper than building the full
/// [`CommitInfo`] file list.
pub(crate) fn commit_touches(repo: &Repository, commit: &Commit, path: &str) -> Result<bool> {
    let mut options = DiffOptions::new();
    options.pathspec(path).disable_pathspec_match(true);
    let diff = first_parent_diff(repo, commit, Some(&mut options))?;
    Ok(diff.deltas().next().is_some())
}

/// Diff of `commit` against its first parent, or against the empty tree for root commits.
pub(crate) fn first_parent_diff<'r>(
    repo: &'r Repository,
    commit: &Commit,
    options: Option<&mut DiffOptions>,
) -> Result<Diff<'r>> {
    let commit_tree = commit.tree().context("Failed to get commit tree")?;
    let parent_tree = if commit.parent_count() > 0 {
        Some(
            commit
                .parent(0)
                .context("Failed to get parent commit")?
                .tree()
                .context("Failed to get parent tree")?,
        )
    } else {
        None
    };

    repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&commit_tree), options)
        .with_context(|| format!("Failed to diff commit {}", commit.id()))
}

fn changed_files(repo: &Repository, commit: &Commit) -> Result<Vec<String>> {
    let diff = first_parent_diff(repo, commit, None)?;

    let mut files = Vec::new();
    for delta in diff.deltas() {
        let paths = [delta.old_file().path(), delta.new_file().path()];
        for path in paths.into_iter().flatten() {
            if let Some(path) = path.to_str() {
                if !files.iter().any(|f| f == path) {
                    files.push(path.to_string());
                }
            }
        }
    }
    Ok(files)
}
