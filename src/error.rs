//! Unified error type for the filter engine.

use thiserror::Error;

/// All errors that can occur in filter and search operations.
///
/// Search-side failures are rendered through `Display` and stored on the
/// [`SearchResult`](crate::search::SearchResult) instead of being returned,
/// so a failing root or worker never aborts the session.
#[derive(Error, Debug)]
pub enum FilterError {
    /// The external search backend binary is missing
    #[error("{tool} is not installed.")]
    ToolUnavailable { tool: String },

    /// A per-root search failed
    #[error("{root}: {message}")]
    SearchFailed { root: String, message: String },

    /// Unexpected failure inside a background worker
    #[error("search worker failed: {0}")]
    WorkerFault(String),

    /// I/O error (process spawn, directory access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be read or parsed
    #[error("Invalid config at {path}: {message}")]
    Config { path: String, message: String },

    /// Argument validation error
    #[error("{0}")]
    InvalidArgs(String),
}

impl FilterError {
    /// Render a caught panic payload as a worker fault.
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        FilterError::WorkerFault(message)
    }
}
