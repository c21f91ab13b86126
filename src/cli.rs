//! CLI interface for review-context.

use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod config;
pub mod retrieve;

/// review-context: related-file context for code review.
#[derive(Parser)]
#[command(name = "review-context")]
#[command(about = "Finds files related to a code change for review", long_about = None)]
#[command(version)]
pub struct Cli {
    /// The main command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Main command categories.
#[derive(Subcommand)]
pub enum Commands {
    /// Retrieves context for a commit range or diff file.
    Retrieve(retrieve::RetrieveCommand),
    /// Configuration inspection.
    Config(config::ConfigCommand),
}

impl Cli {
    /// Executes the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Retrieve(retrieve_cmd) => retrieve_cmd.execute().await,
            Commands::Config(config_cmd) => config_cmd.execute(),
        }
    }
}
