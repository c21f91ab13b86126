//! Metadata-based context strategy.
//!
//! A cheap structural heuristic: files the change explicitly references, and
//! the conventional test/source companions of the changed files. No history
//! is consulted.

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;
use std::time::Instant;

use anyhow::Result;
use regex::Regex;
use tracing::debug;

use crate::data::{ContextMatch, ContextRetrievalResult, DiffAnalysisBundle, MatchReason};
use crate::git::diff_split;
use crate::retrieval::enricher::{deduplicate_matches, sort_by_relevance};
use crate::retrieval::strategy::{ContextStrategy, StrategyFuture};

/// Name used to enable this strategy in configuration.
pub const METADATA_STRATEGY_NAME: &str = "metadata";

/// Confidence assigned to files explicitly referenced by added lines.
pub const REFERENCE_CONFIDENCE: f64 = 0.60;

/// Confidence assigned to test/source companions of changed files.
pub const COUNTERPART_CONFIDENCE: f64 = 0.50;

/// Source-file extensions recognised in references and counterpart naming.
const SOURCE_EXTENSIONS: &str =
    "rs|java|kt|kts|scala|go|py|rb|php|js|jsx|mjs|ts|tsx|c|h|cc|cpp|hpp|cs|swift|proto|sql|toml|ya?ml|json|xml";

// Path-like token with a recognised extension, e.g. `src/cli/git.rs` or `"config/app.yaml"`.
#[allow(clippy::unwrap_used)] // Compile-time constant regex pattern
static PATH_REFERENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"(?:^|[\s'"`(<\[=,:])((?:\.\.?/)?(?:[A-Za-z0-9_.\-]+/)*[A-Za-z0-9_\-][A-Za-z0-9_.\-]*\.(?:{SOURCE_EXTENSIONS}))\b"#
    ))
    .unwrap()
});

/// Finds explicitly referenced files and test counterparts of changed files.
pub struct MetadataStrategy {
    workspace_root: Option<PathBuf>,
}

impl MetadataStrategy {
    /// Creates the strategy.
    ///
    /// With a workspace root, candidates are checked for existence and test
    /// counterparts are proposed. Without one, only explicit references are
    /// reported, unverified.
    pub fn new(workspace_root: Option<PathBuf>) -> Self {
        Self { workspace_root }
    }

    async fn retrieve(&self, bundle: &DiffAnalysisBundle) -> Result<ContextRetrievalResult> {
        let started = Instant::now();

        let mut candidates: Vec<(String, MatchReason, String)> = Vec::new();
        for file_diff in diff_split::split_by_file(&bundle.raw_diff) {
            for reference in extract_references(file_diff.added_lines()) {
                let evidence = format!("referenced by added lines in {}", file_diff.path);
                for resolved in resolve_reference(&file_diff.path, &reference) {
                    candidates.push((resolved, MatchReason::MetadataReference, evidence.clone()));
                }
            }
        }
        if self.workspace_root.is_some() {
            for path in bundle.changed_paths() {
                for counterpart in test_counterparts(path) {
                    candidates.push((
                        counterpart,
                        MatchReason::TestCounterpart,
                        format!("conventional test companion of {path}"),
                    ));
                }
            }
        }

        candidates.retain(|(path, _, _)| !bundle.touches(path));
        let candidates_evaluated = candidates.len();

        let mut matches = Vec::new();
        for (path, reason, evidence) in candidates {
            if !self.exists(&path).await {
                continue;
            }
            let confidence = match reason {
                MatchReason::TestCounterpart => COUNTERPART_CONFIDENCE,
                _ => REFERENCE_CONFIDENCE,
            };
            matches.push(ContextMatch::new(path, reason, confidence, evidence)?);
        }

        let mut matches = deduplicate_matches(matches);
        sort_by_relevance(&mut matches);
        debug!(
            candidates_evaluated,
            matches = matches.len(),
            "Metadata strategy finished"
        );

        Ok(ContextRetrievalResult::new(
            METADATA_STRATEGY_NAME,
            matches,
            candidates_evaluated,
            started.elapsed(),
        ))
    }

    /// Checks a repository-relative path against the workspace root.
    async fn exists(&self, path: &str) -> bool {
        match &self.workspace_root {
            Some(root) => tokio::fs::try_exists(root.join(path))
                .await
                .unwrap_or(false),
            None => true,
        }
    }
}

impl ContextStrategy for MetadataStrategy {
    fn retrieve_context<'a>(&'a self, bundle: &'a DiffAnalysisBundle) -> StrategyFuture<'a> {
        Box::pin(self.retrieve(bundle))
    }

    fn name(&self) -> &str {
        METADATA_STRATEGY_NAME
    }

    fn priority(&self) -> i32 {
        20
    }
}

/// Extracts distinct path-like references from diff lines, in first-seen order.
fn extract_references<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut references: Vec<String> = Vec::new();
    for line in lines {
        for captures in PATH_REFERENCE_PATTERN.captures_iter(line) {
            let reference = &captures[1];
            if !references.iter().any(|r| r == reference) {
                references.push(reference.to_string());
            }
        }
    }
    references
}

/// Resolves a reference found in `source_file` to repository-relative candidates.
///
/// Explicitly relative references (`./x`, `../x`) resolve against the source
/// file's directory only. Bare names also try the source directory, since
/// sibling references are the common case. Every candidate is normalized, and
/// one that climbs above the repository root is dropped.
fn resolve_reference(source_file: &str, reference: &str) -> Vec<String> {
    let source_dir = Path::new(source_file).parent().unwrap_or(Path::new(""));

    if reference.starts_with("./") || reference.starts_with("../") {
        return normalize(&source_dir.join(reference)).into_iter().collect();
    }

    let mut resolved: Vec<String> = normalize(Path::new(reference)).into_iter().collect();
    if !reference.contains('/') && !source_dir.as_os_str().is_empty() {
        if let Some(sibling) = normalize(&source_dir.join(reference)) {
            resolved.push(sibling);
        }
    }
    resolved
}

/// Lexically normalizes `.` and `..` components; `None` if the path escapes the root.
fn normalize(path: &Path) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!parts.is_empty()).then(|| parts.join("/"))
}

/// Returns true if the path looks like a test file.
fn is_test_path(path: &str) -> bool {
    let file_name = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    path.starts_with("tests/")
        || path.contains("/tests/")
        || path.contains("/test/")
        || file_name.starts_with("test_")
        || file_name.contains("_test.")
        || file_name.contains(".test.")
        || file_name.contains(".spec.")
        || file_name.ends_with("Test.java")
        || file_name.ends_with("Test.kt")
}

/// Conventional companions of a file: tests for sources, sources for tests.
fn test_counterparts(path: &str) -> Vec<String> {
    let p = Path::new(path);
    let (Some(stem), Some(ext)) = (
        p.file_stem().and_then(|s| s.to_str()),
        p.extension().and_then(|e| e.to_str()),
    ) else {
        return Vec::new();
    };
    let dir = p
        .parent()
        .and_then(|d| d.to_str())
        .filter(|d| !d.is_empty());
    let in_dir = |name: String| match dir {
        Some(d) => format!("{d}/{name}"),
        None => name,
    };

    if is_test_path(path) {
        return source_counterparts(path, stem, ext, dir);
    }

    let mut counterparts = vec![
        in_dir(format!("{stem}_test.{ext}")),
        in_dir(format!("test_{stem}.{ext}")),
        in_dir(format!("{stem}.test.{ext}")),
        in_dir(format!("{stem}.spec.{ext}")),
        format!("tests/{stem}.{ext}"),
        format!("tests/test_{stem}.{ext}"),
    ];
    if matches!(ext, "java" | "kt") {
        counterparts.push(in_dir(format!("{stem}Test.{ext}")));
        if let Some(test_dir) = dir.and_then(|d| d.strip_prefix("src/main/")) {
            counterparts.push(format!("src/test/{test_dir}/{stem}Test.{ext}"));
        }
    }
    counterparts
}

/// Source companions of a test file.
fn source_counterparts(path: &str, stem: &str, ext: &str, dir: Option<&str>) -> Vec<String> {
    let source_stem = stem
        .strip_suffix("_test")
        .or_else(|| stem.strip_prefix("test_"))
        .or_else(|| stem.strip_suffix(".test"))
        .or_else(|| stem.strip_suffix(".spec"))
        .or_else(|| stem.strip_suffix("Test"))
        .unwrap_or(stem);

    let mut sources = Vec::new();
    if let Some(d) = dir {
        if source_stem != stem {
            sources.push(format!("{d}/{source_stem}.{ext}"));
        }
        if let Some(main_dir) = d.strip_prefix("src/test/") {
            sources.push(format!("src/main/{main_dir}/{source_stem}.{ext}"));
        }
    }
    if path.starts_with("tests/") {
        sources.push(format!("src/{source_stem}.{ext}"));
    }
    sources
}
