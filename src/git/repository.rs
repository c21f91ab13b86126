//! Git repository access for building diff bundles.

use std::path::Path;

use anyhow::{Context, Result};
use git2::{Commit, Diff, DiffFormat, Repository};

use crate::git::commit::first_parent_diff;

/// Git repository wrapper.
pub struct GitRepository {
    repo: Repository,
}

impl GitRepository {
    /// Opens the repository at `path`, searching parent directories.
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let repo = Repository::discover(path)
            .with_context(|| format!("Failed to open git repository: {}", path.display()))?;
        Ok(Self { repo })
    }

    /// Working directory, absent for bare repositories.
    pub fn workdir(&self) -> Option<&Path> {
        self.repo.workdir()
    }

    /// Returns the unified diff for a revision or range.
    ///
    /// `A..B` diffs the tree of `A` against the tree of `B`; a single
    /// revision diffs the commit against its first parent.
    pub fn diff_for_range(&self, range: &str) -> Result<String> {
        let diff = match range.split_once("..") {
            Some((start, end)) => {
                let start = self.resolve_commit(start)?;
                let end = self.resolve_commit(if end.is_empty() { "HEAD" } else { end })?;
                let start_tree = start.tree().context("Failed to get start tree")?;
                let end_tree = end.tree().context("Failed to get end tree")?;
                self.repo
                    .diff_tree_to_tree(Some(&start_tree), Some(&end_tree), None)
                    .with_context(|| format!("Failed to diff range {range}"))?
            }
            None => {
                let commit = self.resolve_commit(range)?;
                first_parent_diff(&self.repo, &commit, None)?
            }
        };
        render_patch(&diff)
    }

    /// Identifies the repository as `owner/name` from the `origin` remote,
    /// falling back to the working directory name.
    pub fn repository_identifier(&self) -> String {
        let from_origin = self
            .repo
            .find_remote("origin")
            .ok()
            .and_then(|remote| remote.url().and_then(repository_name_from_url));

        from_origin
            .or_else(|| {
                self.workdir()
                    .and_then(|dir| dir.file_name())
                    .and_then(|name| name.to_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "unknown".to_string())
    }

    fn resolve_commit(&self, spec: &str) -> Result<Commit<'_>> {
        self.repo
            .revparse_single(spec)
            .with_context(|| format!("Failed to parse revision: {spec}"))?
            .peel_to_commit()
            .with_context(|| format!("Revision is not a commit: {spec}"))
    }
}

fn render_patch(diff: &Diff<'_>) -> Result<String> {
    let mut patch = String::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        let content = std::str::from_utf8(line.content()).unwrap_or("<binary>\n");
        match line.origin() {
            origin @ ('+' | '-' | ' ') => {
                patch.push(origin);
                patch.push_str(content);
            }
            _ => patch.push_str(content),
        }
        true
    })
    .context("Failed to format diff")?;
    Ok(patch)
}

/// Extracts `owner/name` from an SSH or HTTPS remote URL.
pub fn repository_name_from_url(url: &str) -> Option<String> {
    let trimmed = url.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);

    let path = match trimmed.split_once("://") {
        Some((_, rest)) => rest.split_once('/').map(|(_, path)| path)?,
        None => trimmed.split_once(':').map(|(_, path)| path)?,
    };

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [.., owner, name] => Some(format!("{owner}/{name}")),
        _ => None,
    }
}
