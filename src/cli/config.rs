//! Configuration-related CLI commands.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::{load_config, resolve_context_dir};
use crate::data::to_yaml;

/// Configuration operations.
#[derive(Parser)]
pub struct ConfigCommand {
    /// Configuration subcommand to execute.
    #[command(subcommand)]
    pub command: ConfigSubcommands,
}

/// Configuration subcommands.
#[derive(Subcommand)]
pub enum ConfigSubcommands {
    /// Shows the effective, validated configuration.
    Show(ShowCommand),
}

/// Show command options.
#[derive(Parser)]
pub struct ShowCommand {
    /// Configuration file, bypassing discovery.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Context directory searched for context.yaml.
    #[arg(long, value_name = "DIR")]
    pub context_dir: Option<PathBuf>,
}

impl ConfigCommand {
    /// Executes the config command.
    pub fn execute(self) -> Result<()> {
        match self.command {
            ConfigSubcommands::Show(show_cmd) => show_cmd.execute(),
        }
    }
}

impl ShowCommand {
    /// Executes the show command.
    pub fn execute(self) -> Result<()> {
        let context_dir = resolve_context_dir(self.context_dir.as_deref());
        let (config, source) = load_config(self.config.as_deref(), &context_dir)?;

        println!("# Source: {source}");
        print!("{}", to_yaml(&config)?);
        Ok(())
    }
}
