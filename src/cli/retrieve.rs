//! Retrieve command: runs context retrieval and prints the result as YAML.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use crate::config::{load_config, resolve_context_dir};
use crate::data::{to_yaml, ContextReport, DiffAnalysisBundle};
use crate::git::{GitHistorySource, GitRepository};
use crate::retrieval::{default_strategies, ContextOrchestrator};

/// Retrieve command options.
#[derive(Parser)]
pub struct RetrieveCommand {
    /// Commit or range to analyze (e.g., HEAD, HEAD~3..HEAD). Defaults to HEAD.
    #[arg(value_name = "COMMIT_RANGE", conflicts_with = "diff_file")]
    pub commit_range: Option<String>,

    /// Repository to read history from.
    #[arg(long, value_name = "PATH", default_value = ".")]
    pub repo: PathBuf,

    /// Reads the change from a unified diff file instead of a commit range.
    #[arg(long, value_name = "FILE")]
    pub diff_file: Option<PathBuf>,

    /// Repository identifier used for rollout bucketing. Defaults to the origin remote.
    #[arg(long, value_name = "ID")]
    pub repository_id: Option<String>,

    /// Configuration file, bypassing discovery.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Context directory searched for context.yaml.
    #[arg(long, value_name = "DIR")]
    pub context_dir: Option<PathBuf>,
}

impl RetrieveCommand {
    /// Executes the retrieve command.
    pub async fn execute(self) -> Result<()> {
        let context_dir = resolve_context_dir(self.context_dir.as_deref());
        let (config, source) = load_config(self.config.as_deref(), &context_dir)?;
        info!(%source, "Using context retrieval configuration");

        let repo = GitRepository::open_at(&self.repo)?;
        let raw_diff = match &self.diff_file {
            Some(path) => fs::read_to_string(path)
                .with_context(|| format!("Failed to read diff file: {}", path.display()))?,
            None => repo.diff_for_range(self.commit_range.as_deref().unwrap_or("HEAD"))?,
        };
        let repository = self
            .repository_id
            .clone()
            .unwrap_or_else(|| repo.repository_identifier());

        let checkout = repo.workdir().map(Path::to_path_buf).unwrap_or(self.repo);
        let workspace_root = config
            .metadata()
            .workspace_root
            .clone()
            .or_else(|| Some(checkout.clone()));

        let history_source = Arc::new(GitHistorySource::new(checkout));
        let strategies = default_strategies(&config, history_source, workspace_root);
        let orchestrator = ContextOrchestrator::new(config, strategies);

        let bundle = DiffAnalysisBundle::from_raw_diff(repository, raw_diff);
        let enriched = orchestrator.retrieve_enriched_context(bundle).await;

        let yaml = to_yaml(&ContextReport::new(&enriched))?;
        print!("{yaml}");
        Ok(())
    }
}
