//! Error types for clipdesk.
//!
//! Library crates use [`ClipdeskError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Retrieval gaps (articles a lossy bulk fetch failed to capture) are not
//! errors — they are carried as data in the reconciliation outcome and
//! persisted for audit.

use std::path::PathBuf;

/// Top-level error type for all clipdesk operations.
#[derive(Debug, thiserror::Error)]
pub enum ClipdeskError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A checkpoint read or write failed. The in-memory state that triggered
    /// the write is still valid; the caller may retry the persist step.
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    /// A pool/selection mutation was given a stale index (e.g. a UI
    /// re-render raced the operation). No partial mutation occurred.
    #[error("index {index} out of range for category '{category}' (len {len})")]
    IndexOutOfRange {
        category: String,
        index: usize,
        len: usize,
    },

    /// A workflow operation was invoked from a stage that does not allow it.
    #[error("invalid stage transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// One or more curated titles could not be located in the report
    /// document. Fatal for the trim operation; no partial output is emitted.
    #[error("titles not found in report: {}", titles.join("; "))]
    TitleNotFound { titles: Vec<String> },

    /// A retrieval collaborator call failed outright (as opposed to
    /// silently omitting results, which is handled by reconciliation).
    #[error("retrieval error: {0}")]
    Retrieval(String),

    /// Data validation error (schema mismatch, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ClipdeskError>;

impl ClipdeskError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a checkpoint error from any displayable message.
    pub fn checkpoint(msg: impl Into<String>) -> Self {
        Self::Checkpoint(msg.into())
    }

    /// Create a retrieval error from any displayable message.
    pub fn retrieval(msg: impl Into<String>) -> Self {
        Self::Retrieval(msg.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ClipdeskError::config("missing instance 'daily'");
        assert_eq!(err.to_string(), "config error: missing instance 'daily'");

        let err = ClipdeskError::IndexOutOfRange {
            category: "finance".into(),
            index: 9,
            len: 3,
        };
        assert!(err.to_string().contains("index 9 out of range"));
        assert!(err.to_string().contains("finance"));
    }

    #[test]
    fn title_not_found_lists_all_titles() {
        let err = ClipdeskError::TitleNotFound {
            titles: vec!["Headline A".into(), "Headline B".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("Headline A"));
        assert!(msg.contains("Headline B"));
    }
}
