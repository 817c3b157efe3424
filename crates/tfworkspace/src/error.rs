//! Error types for workspace operations.
//!
//! Errors are categorized so that callers can tell a "try again on the next
//! poll" condition apart from a real failure of the provisioning tool.

use crate::operation::OperationKind;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Categories of workspace errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Another operation is still running, or the tracker was used out of order
    Precondition,
    /// The external command failed to start, exited non-zero or ran out of time
    Process,
    /// The state file or the plan log could not be read or understood
    Format,
    /// The resource does not exist (destroyed, or the refreshed state is empty)
    NotFound,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether polling again later can be expected to make progress.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Precondition | Self::Process)
    }
}

/// Errors that can occur while driving a workspace.
#[derive(Debug, Error)]
pub enum Error {
    /// An operation is in flight on this workspace
    #[error("{kind} operation that started at {started} is still running")]
    OperationInProgress {
        /// Kind of the running operation
        kind: OperationKind,
        /// When the running operation started
        started: DateTime<Utc>,
    },

    /// The tracker was asked for a transition its current state does not allow
    #[error("cannot {action} operation record in state {state}")]
    InvalidTransition {
        /// Attempted transition (`end`, `flush`)
        action: &'static str,
        /// State the record was in
        state: &'static str,
    },

    /// The command exited with a status that does not mean success
    #[error("cannot {operation}: {output}")]
    CommandFailed {
        /// Operation that ran the command
        operation: OperationKind,
        /// Exit status, if the process exited normally
        status: Option<i32>,
        /// Combined stdout and stderr
        output: String,
    },

    /// The command could not be started at all
    #[error("cannot execute {program}: {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying OS error
        source: std::io::Error,
    },

    /// The command outlived its deadline and was killed
    #[error("deadline exceeded, process killed: {output}")]
    Timeout {
        /// Output captured before the process was killed
        output: String,
    },

    /// The command was cancelled before it finished
    #[error("operation cancelled: {output}")]
    Cancelled {
        /// Output captured before the process was killed
        output: String,
    },

    /// The state file could not be read
    #[error("cannot read terraform state file {path}: {source}")]
    StateFile {
        /// Path of the state file
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// The state file is not a valid snapshot
    #[error("cannot unmarshal tfstate file: {0}")]
    Format(#[from] tfstate::Error),

    /// The plan log has no change summary event
    #[error("cannot find the change summary line in plan log: {output}")]
    ChangeSummaryMissing {
        /// Combined plan output that was scanned
        output: String,
    },

    /// The change summary event is not valid JSON
    #[error("cannot unmarshal change summary json: {0}")]
    ChangeSummary(#[source] serde_json::Error),

    /// The resource does not exist
    #[error("resource not found")]
    NotFound,

    /// The last background operation finished with an error
    #[error("{kind} operation failed: {source}")]
    OperationFailed {
        /// Kind of the failed operation
        kind: OperationKind,
        /// Error recorded by the background task
        source: Arc<Error>,
    },

    /// A file in the working directory could not be written or removed
    #[error("cannot write {path}: {source}")]
    WriteFile {
        /// Path that was being written
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::OperationInProgress { .. } | Error::InvalidTransition { .. } => {
                ErrorCategory::Precondition
            }
            Error::CommandFailed { .. }
            | Error::Spawn { .. }
            | Error::Timeout { .. }
            | Error::Cancelled { .. } => ErrorCategory::Process,
            Error::StateFile { .. }
            | Error::Format(_)
            | Error::ChangeSummaryMissing { .. }
            | Error::ChangeSummary(_) => ErrorCategory::Format,
            Error::NotFound => ErrorCategory::NotFound,
            Error::OperationFailed { source, .. } => source.category(),
            Error::WriteFile { .. } | Error::Io(_) => ErrorCategory::Other,
        }
    }

    /// Whether another operation is still running.
    pub fn is_precondition(&self) -> bool {
        self.category() == ErrorCategory::Precondition
    }

    /// Whether the resource is known to be gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }

    /// Whether polling again later can be expected to make progress.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

/// Result type for workspace operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        let busy = Error::OperationInProgress {
            kind: OperationKind::Apply,
            started: Utc::now(),
        };
        assert!(busy.is_precondition());
        assert!(busy.is_retryable());

        let failed = Error::CommandFailed {
            operation: OperationKind::Apply,
            status: Some(1),
            output: "Error: boom".to_string(),
        };
        assert_eq!(failed.category(), ErrorCategory::Process);
        assert!(failed.is_retryable());

        assert!(Error::NotFound.is_not_found());
        assert!(!Error::NotFound.is_retryable());

        let missing = Error::ChangeSummaryMissing {
            output: String::new(),
        };
        assert_eq!(missing.category(), ErrorCategory::Format);
    }

    #[test]
    fn test_operation_failed_inherits_category() {
        let err = Error::OperationFailed {
            kind: OperationKind::Destroy,
            source: Arc::new(Error::Timeout {
                output: String::new(),
            }),
        };
        assert_eq!(err.category(), ErrorCategory::Process);
        assert_eq!(
            err.to_string(),
            "destroy operation failed: deadline exceeded, process killed: "
        );
    }

    #[test]
    fn test_in_progress_message_names_kind() {
        let err = Error::OperationInProgress {
            kind: OperationKind::Apply,
            started: Utc::now(),
        };
        assert!(err.to_string().starts_with("apply operation that started at"));
    }
}
