//! Shared test utilities for the `retrieval` module.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};

use crate::data::{ContextMatch, ContextRetrievalResult, DiffAnalysisBundle, FileChangeRecord, MatchReason};
use crate::git::CommitInfo;
use crate::retrieval::cochange::CommitHistorySource;
use crate::retrieval::strategy::{ContextStrategy, StrategyFuture};

/// Builds a commit touching `files`, dated deterministically from `sha`.
pub(crate) fn commit(sha: &str, files: &[&str]) -> CommitInfo {
    let offset = sha.bytes().map(i64::from).sum::<i64>();
    CommitInfo {
        sha: sha.to_string(),
        message: format!("commit {sha}"),
        author: "Test User <test@example.com>".to_string(),
        authored_at: fixed_time(1_700_000_000 + offset),
        changed_files: files.iter().map(|f| (*f).to_string()).collect(),
    }
}

fn fixed_time(secs: i64) -> DateTime<FixedOffset> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or_default()
        .fixed_offset()
}

/// Builds a bundle whose files each changed `lines_per_file` lines.
pub(crate) fn bundle(paths: &[&str], lines_per_file: usize) -> DiffAnalysisBundle {
    let files = paths
        .iter()
        .map(|p| FileChangeRecord {
            path: (*p).to_string(),
            status: "M".to_string(),
            added_lines: lines_per_file,
            removed_lines: 0,
        })
        .collect();
    DiffAnalysisBundle::new("acme/widgets", files, "")
}

/// Shorthand for a valid match.
pub(crate) fn context_match(path: &str, reason: MatchReason, confidence: f64) -> ContextMatch {
    ContextMatch::new(path, reason, confidence, format!("{reason} evidence for {path}"))
        .unwrap_or_else(|e| panic!("invalid test match: {e}"))
}

/// What a [`MockStrategy`] does when invoked.
#[derive(Clone)]
pub(crate) enum MockBehavior {
    /// Returns these matches after an optional delay.
    Succeed(Vec<ContextMatch>, Duration),
    /// Fails immediately.
    Fail(String),
    /// Never completes.
    Hang,
    /// Panics inside the strategy future.
    Panic,
}

/// Strategy double with a fixed behavior and an invocation counter.
pub(crate) struct MockStrategy {
    name: String,
    priority: i32,
    behavior: MockBehavior,
    calls: Arc<AtomicUsize>,
}

impl MockStrategy {
    pub(crate) fn new(name: &str, priority: i32, behavior: MockBehavior) -> Self {
        Self {
            name: name.to_string(),
            priority,
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn succeeding(name: &str, priority: i32, matches: Vec<ContextMatch>) -> Self {
        Self::new(name, priority, MockBehavior::Succeed(matches, Duration::ZERO))
    }

    /// Shared counter of how many times the strategy was invoked.
    pub(crate) fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl ContextStrategy for MockStrategy {
    fn retrieve_context<'a>(&'a self, _bundle: &'a DiffAnalysisBundle) -> StrategyFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior.clone();
        let name = self.name.clone();
        Box::pin(async move {
            match behavior {
                MockBehavior::Succeed(matches, delay) => {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    let candidates = matches.len();
                    Ok(ContextRetrievalResult::new(name, matches, candidates, delay))
                }
                MockBehavior::Fail(message) => Err(anyhow::anyhow!(message)),
                MockBehavior::Hang => {
                    std::future::pending::<()>().await;
                    unreachable!("pending future resolved")
                }
                MockBehavior::Panic => panic!("strategy {name} panicked"),
            }
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// In-memory commit history keyed by file path.
#[derive(Default)]
pub(crate) struct MockHistorySource {
    history: HashMap<String, Vec<CommitInfo>>,
    failing: HashSet<String>,
    requests: Mutex<Vec<(String, usize)>>,
}

impl MockHistorySource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers the commits returned for `path`.
    pub(crate) fn with_history(mut self, path: &str, commits: Vec<CommitInfo>) -> Self {
        self.history.insert(path.to_string(), commits);
        self
    }

    /// Makes lookups for `path` fail.
    pub(crate) fn failing_for(mut self, path: &str) -> Self {
        self.failing.insert(path.to_string());
        self
    }

    /// `(file_path, max_results)` pairs requested so far.
    pub(crate) fn requests(&self) -> Vec<(String, usize)> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl CommitHistorySource for MockHistorySource {
    fn commits_for<'a>(
        &'a self,
        _repository: &'a str,
        file_path: &'a str,
        _since: Option<DateTime<FixedOffset>>,
        max_results: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<CommitInfo>>> + Send + 'a>> {
        Box::pin(async move {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push((file_path.to_string(), max_results));
            }
            if self.failing.contains(file_path) {
                anyhow::bail!("history lookup failed for {file_path}");
            }
            let mut commits = self.history.get(file_path).cloned().unwrap_or_default();
            commits.truncate(max_results);
            Ok(commits)
        })
    }
}
