//! Co-change frequency calculation.
//!
//! Turns a window of commits touching a target file into normalized
//! relatedness scores for every other file those commits touched.

use std::collections::{BTreeMap, BTreeSet};

use crate::git::CommitInfo;

/// Co-change statistics for one candidate file.
#[derive(Debug, Clone, PartialEq)]
pub struct CoChangeMetrics {
    /// The candidate file.
    pub related_file: String,
    /// Number of commits in the window that touched both files.
    pub raw_co_change_count: usize,
    /// `raw_co_change_count` divided by the maximum count in the candidate set.
    pub normalized_score: f64,
}

/// Counts, per other file, how many commits touched it alongside `target`.
///
/// A file listed twice in one commit counts once for that commit.
#[must_use]
pub fn count_co_changes(target: &str, commits: &[CommitInfo]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for commit in commits {
        let others: BTreeSet<&str> = commit
            .changed_files
            .iter()
            .map(String::as_str)
            .filter(|path| *path != target)
            .collect();
        for path in others {
            *counts.entry(path.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

/// Normalizes raw counts against the largest count.
///
/// The most frequently co-changed file always scores exactly 1.0. Output is
/// ordered by count descending, then path ascending. An empty input, or one
/// with only zero counts, yields no metrics.
#[must_use]
pub fn calculate_frequencies(counts: &BTreeMap<String, usize>) -> Vec<CoChangeMetrics> {
    let max = counts.values().copied().max().unwrap_or(0);
    if max == 0 {
        return Vec::new();
    }

    let mut metrics: Vec<CoChangeMetrics> = counts
        .iter()
        .filter(|(_, &count)| count > 0)
        .map(|(path, &count)| CoChangeMetrics {
            related_file: path.clone(),
            raw_co_change_count: count,
            normalized_score: count as f64 / max as f64,
        })
        .collect();

    // BTreeMap iteration is already path-ascending; a stable sort keeps it as the tie-break.
    metrics.sort_by(|a, b| b.raw_co_change_count.cmp(&a.raw_co_change_count));
    metrics
}

/// Counts and normalizes in one step.
#[must_use]
pub fn co_change_metrics(target: &str, commits: &[CommitInfo]) -> Vec<CoChangeMetrics> {
    calculate_frequencies(&count_co_changes(target, commits))
}
