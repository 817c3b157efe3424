//! Error types for the reconciliation adapter.

use tfworkspace::OperationKind;
use thiserror::Error;

/// Categories of adapter errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Another operation is running; poll again later
    Precondition,
    /// The provisioning tool failed
    Process,
    /// The snapshot or the plan log could not be understood
    Format,
    /// The resource does not exist
    NotFound,
    /// Configuration of the adapter itself is wrong
    Config,
    /// Other/unknown errors
    Other,
}

/// Errors surfaced by [`External`](crate::External) and its clients.
#[derive(Debug, Error)]
pub enum Error {
    /// A workspace call failed
    #[error("failed to {operation}: {source}")]
    Workspace {
        /// Adapter step that made the call
        operation: &'static str,
        /// Underlying workspace error
        #[source]
        source: tfworkspace::Error,
    },

    /// The snapshot could not be consumed
    #[error("cannot consume state during {operation}: {source}")]
    State {
        /// Adapter step that consumed the snapshot
        operation: &'static str,
        /// Underlying codec error
        #[source]
        source: tfstate::Error,
    },

    /// An operation of another kind is running on the resource's workspace
    #[error("{operation} operation is still in progress")]
    OperationInProgress {
        /// Kind of the running operation
        operation: OperationKind,
    },

    /// The destroy has been started or is still running
    #[error("still deleting")]
    StillDeleting,

    /// A sensitive attribute is not a base64 string
    #[error("cannot parse connection details: {key}: {reason}")]
    ConnectionDetails {
        /// Attribute name
        key: String,
        /// What was wrong with the value
        reason: String,
    },

    /// The resource identity cannot name a workspace directory
    #[error("invalid resource identity {uid:?}: not a single directory name")]
    InvalidUid {
        /// Offending identity
        uid: String,
    },

    /// The workspace configuration could not be rendered
    #[error("cannot render workspace configuration: {0}")]
    RenderConfig(#[source] serde_json::Error),

    /// An enabled-API pattern is not a valid regular expression
    #[error("failed to match GVK with pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// Offending pattern
        pattern: String,
        /// Regex compile error
        #[source]
        source: regex::Error,
    },
}

impl Error {
    /// Wrap a workspace error with the adapter step that produced it.
    pub fn workspace(operation: &'static str) -> impl FnOnce(tfworkspace::Error) -> Self {
        move |source| Self::Workspace { operation, source }
    }

    /// Wrap a codec error with the adapter step that produced it.
    pub fn state(operation: &'static str) -> impl FnOnce(tfstate::Error) -> Self {
        move |source| Self::State { operation, source }
    }

    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Workspace { source, .. } => match source.category() {
                tfworkspace::ErrorCategory::Precondition => ErrorCategory::Precondition,
                tfworkspace::ErrorCategory::Process => ErrorCategory::Process,
                tfworkspace::ErrorCategory::Format => ErrorCategory::Format,
                tfworkspace::ErrorCategory::NotFound => ErrorCategory::NotFound,
                tfworkspace::ErrorCategory::Other => ErrorCategory::Other,
            },
            Error::State { .. } | Error::ConnectionDetails { .. } => ErrorCategory::Format,
            Error::OperationInProgress { .. } | Error::StillDeleting => {
                ErrorCategory::Precondition
            }
            Error::RenderConfig(_) | Error::InvalidPattern { .. } | Error::InvalidUid { .. } => {
                ErrorCategory::Config
            }
        }
    }

    /// Whether another operation is still running.
    pub fn is_precondition(&self) -> bool {
        self.category() == ErrorCategory::Precondition
    }

    /// Whether the resource is known to be gone.
    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }

    /// Whether the caller should simply poll again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Precondition | ErrorCategory::Process
        )
    }
}

/// Result type for adapter operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_still_deleting_is_retryable() {
        assert!(Error::StillDeleting.is_retryable());
        assert!(Error::StillDeleting.is_precondition());
        assert_eq!(Error::StillDeleting.to_string(), "still deleting");
    }

    #[test]
    fn test_workspace_error_keeps_kind() {
        let err = Error::workspace("observe")(tfworkspace::Error::NotFound);
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "failed to observe: resource not found");

        let err = Error::workspace("apply")(tfworkspace::Error::CommandFailed {
            operation: OperationKind::Apply,
            status: Some(1),
            output: "Error: boom".to_string(),
        });
        assert_eq!(err.category(), ErrorCategory::Process);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_state_error_is_format() {
        let err = Error::state("create")(tfstate::Error::MissingField {
            field: "arn".to_string(),
        });
        assert_eq!(err.category(), ErrorCategory::Format);
        assert!(!err.is_retryable());
        assert!(err.to_string().starts_with("cannot consume state during create"));
    }

    #[test]
    fn test_invalid_uid_is_config() {
        let err = Error::InvalidUid {
            uid: "../x".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Config);
        assert!(!err.is_retryable());
    }
}
