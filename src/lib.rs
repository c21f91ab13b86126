//! # review-context
//!
//! Finds files related to a code change that a reviewer should see even
//! though the diff does not touch them.
//!
//! Independent strategies run concurrently over a diff, each bounded by its
//! own timeout. Failures are isolated, and the findings are merged by
//! confidence into an enriched bundle.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use review_context::config::ContextRetrievalConfig;
//! use review_context::data::DiffAnalysisBundle;
//! use review_context::git::GitHistorySource;
//! use review_context::retrieval::{default_strategies, ContextOrchestrator};
//!
//! # async fn run(raw_diff: String) {
//! let config = ContextRetrievalConfig::default();
//! let source = Arc::new(GitHistorySource::new("."));
//! let strategies = default_strategies(&config, source, None);
//! let orchestrator = ContextOrchestrator::new(config, strategies);
//!
//! let bundle = DiffAnalysisBundle::from_raw_diff("acme/widgets", raw_diff);
//! let enriched = orchestrator.retrieve_enriched_context(bundle).await;
//! for m in enriched.context_matches() {
//!     println!("{} {:.2}", m.file_path(), m.confidence());
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod data;
pub mod git;
pub mod retrieval;
pub mod utils;

pub use crate::cli::Cli;

/// The current version of review-context.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
