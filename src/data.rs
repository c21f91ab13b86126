//! Data structures and serialization.

use serde::Serialize;

pub mod bundle;
pub mod context;
pub mod yaml;

pub use bundle::{DiffAnalysisBundle, EnrichedDiffAnalysisBundle, FileChangeRecord};
pub use context::{
    ContextMatch, ContextRetrievalMetadata, ContextRetrievalResult, MatchReason,
    HIGH_CONFIDENCE_THRESHOLD,
};
pub use yaml::*;

/// Output structure for the `retrieve` command.
///
/// Carries the structured diff summary and the merged context, but not the
/// raw diff text, which the caller already has.
#[derive(Debug, Clone, Serialize)]
pub struct ContextReport<'a> {
    /// Version information for the review-context tool.
    pub versions: VersionInfo,
    /// Repository identifier the diff belongs to.
    pub repository: &'a str,
    /// Total added plus removed lines.
    pub total_changed_lines: usize,
    /// Per-file change records.
    pub files: &'a [FileChangeRecord],
    /// Whether any context matches were found.
    pub has_context: bool,
    /// Merged retrieval result (absent when retrieval was skipped).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<&'a ContextRetrievalResult>,
}

impl<'a> ContextReport<'a> {
    /// Builds a report view over an enriched bundle.
    #[must_use]
    pub fn new(enriched: &'a EnrichedDiffAnalysisBundle) -> Self {
        let bundle = enriched.bundle();
        Self {
            versions: VersionInfo::default(),
            repository: &bundle.repository,
            total_changed_lines: bundle.total_changed_lines(),
            files: &bundle.files,
            has_context: enriched.has_context(),
            context: enriched.context(),
        }
    }
}

/// Version information.
#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    /// Version of the review-context tool.
    pub review_context: String,
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self {
            review_context: crate::VERSION.to_string(),
        }
    }
}
