//! History-based context strategy.

use std::time::Instant;

use anyhow::Result;
use tracing::{debug, warn};

use crate::data::{ContextMatch, ContextRetrievalResult, DiffAnalysisBundle, MatchReason};
use crate::retrieval::cochange::{CoChangeAnalyzer, FileCoChange};
use crate::retrieval::enricher::{deduplicate_matches, sort_by_relevance};
use crate::retrieval::error::ContextError;
use crate::retrieval::strategy::{ContextStrategy, StrategyFuture};

/// Name used to enable this strategy in configuration.
pub const HISTORY_STRATEGY_NAME: &str = "history";

/// Finds files that were historically committed together with the changed files.
pub struct HistoryStrategy {
    analyzer: CoChangeAnalyzer,
}

impl HistoryStrategy {
    /// Creates the strategy around a co-change analyzer.
    pub fn new(analyzer: CoChangeAnalyzer) -> Self {
        Self { analyzer }
    }

    async fn retrieve(&self, bundle: &DiffAnalysisBundle) -> Result<ContextRetrievalResult> {
        let started = Instant::now();
        let targets: Vec<&str> = bundle.changed_paths().collect();

        let lookups = targets
            .iter()
            .map(|target| self.analyzer.analyze(&bundle.repository, target));
        let outcomes = futures::future::join_all(lookups).await;

        let mut analyses = Vec::with_capacity(outcomes.len());
        for (target, outcome) in targets.iter().zip(outcomes) {
            match outcome {
                Ok(analysis) => analyses.push(analysis),
                Err(e) => warn!(file = target, "Skipping co-change analysis: {e:#}"),
            }
        }
        if analyses.is_empty() && !targets.is_empty() {
            return Err(ContextError::HistoryUnavailable(targets.len()).into());
        }

        let candidates_evaluated = analyses.iter().map(|a| a.metrics.len()).sum();
        let mut matches = Vec::new();
        for analysis in &analyses {
            self.collect_matches(bundle, analysis, &mut matches)?;
        }

        let mut matches = deduplicate_matches(matches);
        sort_by_relevance(&mut matches);
        debug!(
            targets = targets.len(),
            candidates_evaluated,
            matches = matches.len(),
            "History strategy finished"
        );

        Ok(ContextRetrievalResult::new(
            HISTORY_STRATEGY_NAME,
            matches,
            candidates_evaluated,
            started.elapsed(),
        ))
    }

    /// Converts one target's metrics into matches, skipping weak candidates and
    /// files that are themselves part of the diff.
    fn collect_matches(
        &self,
        bundle: &DiffAnalysisBundle,
        analysis: &FileCoChange,
        out: &mut Vec<ContextMatch>,
    ) -> Result<()> {
        let min_count = self.analyzer.settings().min_co_change_count();
        for metric in &analysis.metrics {
            if metric.raw_co_change_count < min_count || bundle.touches(&metric.related_file) {
                continue;
            }
            let evidence = format!(
                "co-changed in {} of the last {} commits touching {}",
                metric.raw_co_change_count, analysis.commits_examined, analysis.target
            );
            out.push(ContextMatch::new(
                metric.related_file.clone(),
                MatchReason::CoChangeHistory,
                metric.normalized_score,
                evidence,
            )?);
        }
        Ok(())
    }
}

impl ContextStrategy for HistoryStrategy {
    fn retrieve_context<'a>(&'a self, bundle: &'a DiffAnalysisBundle) -> StrategyFuture<'a> {
        Box::pin(self.retrieve(bundle))
    }

    fn name(&self) -> &str {
        HISTORY_STRATEGY_NAME
    }

    fn priority(&self) -> i32 {
        10
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::HistorySettings;
    use crate::retrieval::test_utils::{bundle, commit, MockHistorySource};

    fn strategy(source: MockHistorySource, settings: HistorySettings) -> HistoryStrategy {
        HistoryStrategy::new(CoChangeAnalyzer::new(Arc::new(source), settings))
    }

    fn scenario_a_source() -> MockHistorySource {
        MockHistorySource::new().with_history(
            "A.java",
            vec![
                commit("1", &["A.java", "B.java"]),
                commit("2", &["A.java", "B.java", "C.java"]),
                commit("3", &["A.java", "B.java"]),
            ],
        )
    }

    #[tokio::test]
    async fn scores_co_changed_files() {
        let s = strategy(scenario_a_source(), HistorySettings::default());
        let result = s.retrieve_context(&bundle(&["A.java"], 5)).await.unwrap();

        let matches = result.matches();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].file_path(), "B.java");
        assert_eq!(matches[0].confidence(), 1.0);
        assert_eq!(matches[0].reason(), MatchReason::CoChangeHistory);
        assert_eq!(
            matches[0].evidence(),
            "co-changed in 3 of the last 3 commits touching A.java"
        );
        assert_eq!(matches[1].file_path(), "C.java");
        assert!((matches[1].confidence() - 0.33).abs() < 0.01);
        assert_eq!(matches[1].reason(), MatchReason::CoChangeHistory);
        assert_eq!(result.metadata().strategy_name, HISTORY_STRATEGY_NAME);
        assert_eq!(result.metadata().candidates_evaluated, 2);
    }

    #[tokio::test]
    async fn keeps_highest_confidence_across_targets() {
        // C is weak for A (1 of 2) but the strongest partner of D.
        let source = MockHistorySource::new()
            .with_history(
                "A.rs",
                vec![commit("1", &["A.rs", "B.rs", "C.rs"]), commit("2", &["A.rs", "B.rs"])],
            )
            .with_history("D.rs", vec![commit("3", &["D.rs", "C.rs"])]);
        let s = strategy(source, HistorySettings::default());

        let result = s.retrieve_context(&bundle(&["A.rs", "D.rs"], 1)).await.unwrap();
        let c = result
            .matches()
            .iter()
            .find(|m| m.file_path() == "C.rs")
            .unwrap();
        assert_eq!(c.confidence(), 1.0);
        assert!(c.evidence().ends_with("touching D.rs"));
        assert_eq!(result.matches().len(), 2);
    }

    #[tokio::test]
    async fn files_in_the_diff_are_not_reported() {
        let s = strategy(scenario_a_source(), HistorySettings::default());
        let result = s
            .retrieve_context(&bundle(&["A.java", "B.java"], 1))
            .await
            .unwrap();
        let paths: Vec<&str> = result.matches().iter().map(|m| m.file_path()).collect();
        assert_eq!(paths, vec!["C.java"]);
    }

    #[tokio::test]
    async fn min_co_change_count_filters_weak_candidates() {
        let settings = HistorySettings::new(50, None, 2).unwrap();
        let s = strategy(scenario_a_source(), settings);
        let result = s.retrieve_context(&bundle(&["A.java"], 1)).await.unwrap();
        assert_eq!(result.matches().len(), 1);
        assert_eq!(result.matches()[0].file_path(), "B.java");
    }

    #[tokio::test]
    async fn partial_history_failure_is_tolerated() {
        let source = scenario_a_source().failing_for("broken.rs");
        let s = strategy(source, HistorySettings::default());
        let result = s
            .retrieve_context(&bundle(&["A.java", "broken.rs"], 1))
            .await
            .unwrap();
        assert_eq!(result.matches().len(), 2);
    }

    #[tokio::test]
    async fn total_history_failure_is_an_error() {
        let source = MockHistorySource::new().failing_for("a.rs");
        let s = strategy(source, HistorySettings::default());
        let err = s.retrieve_context(&bundle(&["a.rs"], 1)).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ContextError>(),
            Some(ContextError::HistoryUnavailable(1))
        ));
    }

    #[tokio::test]
    async fn empty_bundle_yields_empty_result() {
        let s = strategy(MockHistorySource::new(), HistorySettings::default());
        let result = s.retrieve_context(&bundle(&[], 0)).await.unwrap();
        assert!(result.is_empty());
    }
}
