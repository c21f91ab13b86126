//! Context match and retrieval result data structures.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retrieval::error::ContextError;

/// Confidence at or above which a match counts as high confidence.
pub const HIGH_CONFIDENCE_THRESHOLD: f64 = 0.75;

/// Why a file was judged relevant to a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchReason {
    /// The file was historically modified in the same commits as a changed file.
    CoChangeHistory,
    /// The change explicitly references the file.
    MetadataReference,
    /// The file is the conventional test (or source) companion of a changed file.
    TestCounterpart,
}

impl MatchReason {
    /// Returns the stable kebab-case label for this reason.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CoChangeHistory => "co-change-history",
            Self::MetadataReference => "metadata-reference",
            Self::TestCounterpart => "test-counterpart",
        }
    }
}

impl fmt::Display for MatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single file judged relevant to a code change.
///
/// Fields are private so the path and confidence invariants established by
/// [`ContextMatch::new`] hold for the lifetime of the value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextMatch {
    file_path: String,
    reason: MatchReason,
    confidence: f64,
    evidence: String,
}

impl ContextMatch {
    /// Creates a match, rejecting blank paths and confidences outside `0.0..=1.0`.
    pub fn new(
        file_path: impl Into<String>,
        reason: MatchReason,
        confidence: f64,
        evidence: impl Into<String>,
    ) -> Result<Self, ContextError> {
        let file_path = file_path.into();
        if file_path.trim().is_empty() {
            return Err(ContextError::BlankFilePath);
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ContextError::ConfidenceOutOfRange {
                file_path,
                confidence,
            });
        }

        Ok(Self {
            file_path,
            reason,
            confidence,
            evidence: evidence.into(),
        })
    }

    /// Path of the related file, relative to the repository root.
    #[must_use]
    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Why the file was matched.
    #[must_use]
    pub fn reason(&self) -> MatchReason {
        self.reason
    }

    /// Confidence in `0.0..=1.0`.
    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Human-readable justification.
    #[must_use]
    pub fn evidence(&self) -> &str {
        &self.evidence
    }

    /// Returns true when confidence reaches [`HIGH_CONFIDENCE_THRESHOLD`].
    #[must_use]
    pub fn is_high_confidence(&self) -> bool {
        self.confidence >= HIGH_CONFIDENCE_THRESHOLD
    }
}

/// Summary statistics for one retrieval run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextRetrievalMetadata {
    /// Name of the strategy (or `merged` for an enricher result).
    pub strategy_name: String,
    /// Wall-clock execution time.
    pub duration: Duration,
    /// Number of candidate files considered before filtering.
    pub candidates_evaluated: usize,
    /// Number of matches in the result.
    pub total_matches: usize,
    /// Number of matches at or above the high-confidence threshold.
    pub high_confidence_matches: usize,
    /// Matches per reason.
    pub reason_counts: BTreeMap<MatchReason, usize>,
    /// Strategies whose output contributed to the result, in priority order.
    pub contributing_strategies: Vec<String>,
}

/// Matches produced by one strategy execution, or the merge of several.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextRetrievalResult {
    matches: Vec<ContextMatch>,
    metadata: ContextRetrievalMetadata,
}

impl ContextRetrievalResult {
    /// Builds a single-strategy result, deriving the aggregate counts from `matches`.
    #[must_use]
    pub fn new(
        strategy_name: impl Into<String>,
        matches: Vec<ContextMatch>,
        candidates_evaluated: usize,
        duration: Duration,
    ) -> Self {
        let strategy_name = strategy_name.into();
        let contributing_strategies = vec![strategy_name.clone()];
        Self::with_contributors(
            strategy_name,
            matches,
            candidates_evaluated,
            duration,
            contributing_strategies,
        )
    }

    /// Builds a result attributed to an explicit list of contributing strategies.
    #[must_use]
    pub fn with_contributors(
        strategy_name: impl Into<String>,
        matches: Vec<ContextMatch>,
        candidates_evaluated: usize,
        duration: Duration,
        contributing_strategies: Vec<String>,
    ) -> Self {
        let mut reason_counts = BTreeMap::new();
        for m in &matches {
            *reason_counts.entry(m.reason()).or_insert(0) += 1;
        }
        let high_confidence_matches = matches.iter().filter(|m| m.is_high_confidence()).count();

        let metadata = ContextRetrievalMetadata {
            strategy_name: strategy_name.into(),
            duration,
            candidates_evaluated,
            total_matches: matches.len(),
            high_confidence_matches,
            reason_counts,
            contributing_strategies,
        };

        Self { matches, metadata }
    }

    /// Matches in relevance order.
    #[must_use]
    pub fn matches(&self) -> &[ContextMatch] {
        &self.matches
    }

    /// Run statistics.
    #[must_use]
    pub fn metadata(&self) -> &ContextRetrievalMetadata {
        &self.metadata
    }

    /// Returns true when the result holds no matches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Consumes the result and returns its matches.
    #[must_use]
    pub fn into_matches(self) -> Vec<ContextMatch> {
        self.matches
    }
}
