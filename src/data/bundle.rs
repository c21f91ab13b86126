//! Diff bundles flowing into and out of context retrieval.

use serde::{Deserialize, Serialize};

use crate::data::context::{ContextMatch, ContextRetrievalResult};
use crate::git::diff_split;

/// Change record for one file in a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChangeRecord {
    /// Path to the file relative to repository root.
    pub path: String,
    /// Git status code (A=added, M=modified, D=deleted, R=renamed).
    pub status: String,
    /// Number of lines added.
    pub added_lines: usize,
    /// Number of lines removed.
    pub removed_lines: usize,
}

impl FileChangeRecord {
    /// Total lines touched in this file.
    #[must_use]
    pub fn changed_lines(&self) -> usize {
        self.added_lines + self.removed_lines
    }
}

/// A code change as seen by context retrieval: structured per-file records
/// plus the raw diff text they were derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffAnalysisBundle {
    /// Identifier of the repository the diff belongs to.
    pub repository: String,
    /// Per-file change records.
    pub files: Vec<FileChangeRecord>,
    /// Raw unified diff text.
    pub raw_diff: String,
}

impl DiffAnalysisBundle {
    /// Creates a bundle from already-structured records.
    pub fn new(
        repository: impl Into<String>,
        files: Vec<FileChangeRecord>,
        raw_diff: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            files,
            raw_diff: raw_diff.into(),
        }
    }

    /// Creates a bundle by parsing unified diff text.
    pub fn from_raw_diff(repository: impl Into<String>, raw_diff: impl Into<String>) -> Self {
        let raw_diff = raw_diff.into();
        let files = diff_split::parse_file_changes(&raw_diff);
        Self::new(repository, files, raw_diff)
    }

    /// Sum of added and removed lines across all files.
    #[must_use]
    pub fn total_changed_lines(&self) -> usize {
        self.files.iter().map(FileChangeRecord::changed_lines).sum()
    }

    /// Paths of every changed file, in diff order.
    pub fn changed_paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.path.as_str())
    }

    /// Returns true if `path` is one of the changed files.
    #[must_use]
    pub fn touches(&self, path: &str) -> bool {
        self.files.iter().any(|f| f.path == path)
    }
}

/// A diff bundle together with the context retrieved for it.
///
/// `context` is `None` when retrieval was skipped (disabled, not admitted,
/// no strategies enabled).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedDiffAnalysisBundle {
    bundle: DiffAnalysisBundle,
    context: Option<ContextRetrievalResult>,
}

impl EnrichedDiffAnalysisBundle {
    /// Wraps a bundle for which no context was retrieved.
    #[must_use]
    pub fn without_context(bundle: DiffAnalysisBundle) -> Self {
        Self {
            bundle,
            context: None,
        }
    }

    /// Wraps a bundle with a merged retrieval result.
    #[must_use]
    pub fn with_context(bundle: DiffAnalysisBundle, context: ContextRetrievalResult) -> Self {
        Self {
            bundle,
            context: Some(context),
        }
    }

    /// True when a result is attached and holds at least one match.
    #[must_use]
    pub fn has_context(&self) -> bool {
        self.context.as_ref().is_some_and(|c| !c.is_empty())
    }

    /// Number of merged matches, zero when no context is attached.
    #[must_use]
    pub fn context_match_count(&self) -> usize {
        self.context.as_ref().map_or(0, |c| c.matches().len())
    }

    /// The attached retrieval result, if any.
    #[must_use]
    pub fn context(&self) -> Option<&ContextRetrievalResult> {
        self.context.as_ref()
    }

    /// Iterates the merged matches; empty when no context is attached.
    pub fn context_matches(&self) -> impl Iterator<Item = &ContextMatch> {
        self.context.iter().flat_map(|c| c.matches().iter())
    }

    /// The original diff bundle.
    #[must_use]
    pub fn bundle(&self) -> &DiffAnalysisBundle {
        &self.bundle
    }
}
