//! Error types for paperfeed.
//!
//! Library crates use [`PaperfeedError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all paperfeed operations.
#[derive(Debug, thiserror::Error)]
pub enum PaperfeedError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while talking to a source. Never retried by the core.
    #[error("network error: {0}")]
    Network(String),

    /// A source response could not be structurally parsed.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// A source declined a capability. Not a failure.
    #[error("{source_name} does not support {operation}")]
    Unsupported {
        source_name: String,
        operation: &'static str,
    },

    /// A published timestamp could not be reduced to a calendar date.
    #[error("malformed date: {value:?}")]
    MalformedDate { value: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad CLI input, invalid reference, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PaperfeedError>;

impl PaperfeedError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// A source declining `operation`.
    pub fn unsupported(source_name: impl Into<String>, operation: &'static str) -> Self {
        Self::Unsupported {
            source_name: source_name.into(),
            operation,
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this is a declined capability rather than a failure.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    /// Whether this error only disqualifies a single entry.
    pub fn is_soft_skip(&self) -> bool {
        matches!(self, Self::MalformedDate { .. })
    }
}
