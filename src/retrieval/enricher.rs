//! Merging of per-strategy results into one enriched bundle.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::data::{
    ContextMatch, ContextRetrievalResult, DiffAnalysisBundle, EnrichedDiffAnalysisBundle,
};

/// Strategy name recorded on merged results.
pub const MERGED_STRATEGY_NAME: &str = "merged";

/// Merges strategy results and attaches them to diff bundles.
pub struct ContextEnricher;

impl ContextEnricher {
    /// Merges `results` (in priority order) and attaches the outcome to `bundle`.
    ///
    /// An empty `results` list still produces an attached, empty result.
    #[must_use]
    pub fn merge_results(
        bundle: DiffAnalysisBundle,
        results: Vec<ContextRetrievalResult>,
    ) -> EnrichedDiffAnalysisBundle {
        let merged = Self::merge(results);
        EnrichedDiffAnalysisBundle::with_context(bundle, merged)
    }

    /// Merges results into a single deduplicated result.
    ///
    /// Aggregate counts are recomputed over the surviving matches. Candidates
    /// evaluated are summed; the duration is the longest strategy duration
    /// since strategies run concurrently.
    #[must_use]
    pub fn merge(results: Vec<ContextRetrievalResult>) -> ContextRetrievalResult {
        let contributing_strategies: Vec<String> = results
            .iter()
            .map(|r| r.metadata().strategy_name.clone())
            .collect();
        let candidates_evaluated = results
            .iter()
            .map(|r| r.metadata().candidates_evaluated)
            .sum();
        let duration = results
            .iter()
            .map(|r| r.metadata().duration)
            .max()
            .unwrap_or(Duration::ZERO);

        let all_matches = results.into_iter().flat_map(ContextRetrievalResult::into_matches);
        let mut matches = deduplicate_matches(all_matches);
        sort_by_relevance(&mut matches);

        debug!(
            strategies = ?contributing_strategies,
            matches = matches.len(),
            "Merged context results"
        );

        ContextRetrievalResult::with_contributors(
            MERGED_STRATEGY_NAME,
            matches,
            candidates_evaluated,
            duration,
            contributing_strategies,
        )
    }
}

/// Collapses matches sharing a path, keeping the highest confidence.
///
/// A later match replaces an earlier one only when its confidence is strictly
/// greater, so exact ties keep the first-seen match. Survivors stay at the
/// position where their path first appeared.
pub fn deduplicate_matches(matches: impl IntoIterator<Item = ContextMatch>) -> Vec<ContextMatch> {
    let mut survivors: Vec<ContextMatch> = Vec::new();
    let mut index_by_path: HashMap<String, usize> = HashMap::new();

    for candidate in matches {
        match index_by_path.get(candidate.file_path()) {
            Some(&idx) => {
                if candidate.confidence() > survivors[idx].confidence() {
                    survivors[idx] = candidate;
                }
            }
            None => {
                index_by_path.insert(candidate.file_path().to_string(), survivors.len());
                survivors.push(candidate);
            }
        }
    }

    survivors
}

/// Orders matches by confidence descending, then path ascending.
pub fn sort_by_relevance(matches: &mut [ContextMatch]) {
    matches.sort_by(compare_relevance);
}

fn compare_relevance(a: &ContextMatch, b: &ContextMatch) -> Ordering {
    b.confidence()
        .total_cmp(&a.confidence())
        .then_with(|| a.file_path().cmp(b.file_path()))
}
