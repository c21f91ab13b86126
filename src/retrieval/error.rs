//! Context retrieval error handling.

use thiserror::Error;

/// Errors raised while building or retrieving context.
#[derive(Error, Debug)]
pub enum ContextError {
    /// A match was constructed with an empty or whitespace-only path.
    #[error("Context match file path must not be blank")]
    BlankFilePath,

    /// A match confidence fell outside `0.0..=1.0`.
    #[error("Confidence {confidence} for {file_path} is outside 0.0..=1.0")]
    ConfidenceOutOfRange {
        /// Path the match was built for.
        file_path: String,
        /// The rejected confidence.
        confidence: f64,
    },

    /// Commit history could not be fetched for any changed file.
    #[error("Commit history unavailable for all {0} changed file(s)")]
    HistoryUnavailable(usize),
}
