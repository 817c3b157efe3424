//! Operation tracker
//!
//! An [`OperationRecord`] remembers the most recent operation issued against a
//! workspace. A record is *in flight* while it has a start time but no end
//! time, and *terminal* once the end time is set. A terminal record keeps its
//! outcome until somebody consumes it with [`OperationRecord::consume`] or
//! [`OperationRecord::flush`].

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Kind of operation run against a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Nothing has run since the last flush
    #[default]
    None,
    Apply,
    Destroy,
    Refresh,
    Plan,
}

impl OperationKind {
    /// Lowercase name used in logs and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Apply => "apply",
            Self::Destroy => "destroy",
            Self::Refresh => "refresh",
            Self::Plan => "plan",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The most recent operation of one workspace.
#[derive(Debug, Clone, Default)]
pub struct OperationRecord {
    kind: OperationKind,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    error: Option<Arc<Error>>,
}

impl OperationRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    /// Error the operation ended with, if any.
    pub fn error(&self) -> Option<&Arc<Error>> {
        self.error.as_ref()
    }

    /// Whether an operation has started and not yet ended.
    pub fn is_busy(&self) -> bool {
        self.start_time.is_some() && self.end_time.is_none()
    }

    /// Whether the recorded operation has ended (with or without error).
    pub fn is_terminal(&self) -> bool {
        self.end_time.is_some()
    }

    /// Whether the record is empty.
    pub fn is_idle(&self) -> bool {
        self.start_time.is_none()
    }

    /// Error to report when a caller tries to start work while busy.
    pub fn in_progress_error(&self) -> Error {
        Error::OperationInProgress {
            kind: self.kind,
            started: self.start_time.unwrap_or_else(Utc::now),
        }
    }

    /// Start a new operation.
    ///
    /// Overwrites a terminal record; fails if an operation is in flight.
    pub fn mark_start(&mut self, kind: OperationKind) -> Result<()> {
        if self.is_busy() {
            return Err(self.in_progress_error());
        }
        self.kind = kind;
        self.start_time = Some(Utc::now());
        self.end_time = None;
        self.error = None;
        Ok(())
    }

    /// End the in-flight operation, storing its error (`None` on success).
    pub fn mark_end(&mut self, error: Option<Error>) -> Result<()> {
        if !self.is_busy() {
            return Err(Error::InvalidTransition {
                action: "end",
                state: self.state_name(),
            });
        }
        self.end_time = Some(Utc::now());
        self.error = error.map(Arc::new);
        Ok(())
    }

    /// Reset the record so that a new operation may start.
    pub fn flush(&mut self) -> Result<()> {
        if self.is_busy() {
            return Err(Error::InvalidTransition {
                action: "flush",
                state: self.state_name(),
            });
        }
        *self = Self::default();
        Ok(())
    }

    /// Consume the outcome of a terminal record.
    ///
    /// - in flight: the in-progress precondition error
    /// - terminal with error: flushes and returns the error wrapped with the kind
    /// - terminal without error: flushes and returns the finished kind
    /// - idle: `Ok(None)`
    pub fn consume(&mut self) -> Result<Option<OperationKind>> {
        if self.is_busy() {
            return Err(self.in_progress_error());
        }
        if !self.is_terminal() {
            return Ok(None);
        }
        let kind = self.kind;
        let error = self.error.take();
        self.flush()?;
        match error {
            Some(source) => Err(Error::OperationFailed { kind, source }),
            None => Ok(Some(kind)),
        }
    }

    fn state_name(&self) -> &'static str {
        if self.is_busy() {
            "running"
        } else if self.is_terminal() {
            "terminal"
        } else {
            "idle"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_idle() {
        let record = OperationRecord::new();
        assert_eq!(record.kind(), OperationKind::None);
        assert!(record.is_idle());
        assert!(!record.is_busy());
        assert!(!record.is_terminal());
    }

    #[test]
    fn test_start_then_end() {
        let mut record = OperationRecord::new();
        record.mark_start(OperationKind::Apply).unwrap();
        assert!(record.is_busy());
        assert_eq!(record.kind(), OperationKind::Apply);

        record.mark_end(None).unwrap();
        assert!(!record.is_busy());
        assert!(record.is_terminal());
        assert!(record.error().is_none());
        assert!(record.end_time() >= record.start_time());
    }

    #[test]
    fn test_start_while_busy_fails() {
        let mut record = OperationRecord::new();
        record.mark_start(OperationKind::Apply).unwrap();

        let err = record.mark_start(OperationKind::Destroy).unwrap_err();
        assert!(matches!(
            err,
            Error::OperationInProgress {
                kind: OperationKind::Apply,
                ..
            }
        ));
        assert_eq!(record.kind(), OperationKind::Apply);
    }

    #[test]
    fn test_end_requires_running() {
        let mut record = OperationRecord::new();
        assert!(matches!(
            record.mark_end(None),
            Err(Error::InvalidTransition { action: "end", .. })
        ));
    }

    #[test]
    fn test_flush_requires_not_running() {
        let mut record = OperationRecord::new();
        record.mark_start(OperationKind::Destroy).unwrap();
        assert!(record.flush().is_err());

        record.mark_end(None).unwrap();
        record.flush().unwrap();
        assert!(record.is_idle());
        assert_eq!(record.kind(), OperationKind::None);
    }

    #[test]
    fn test_restart_clears_previous_error() {
        let mut record = OperationRecord::new();
        record.mark_start(OperationKind::Apply).unwrap();
        record.mark_end(Some(Error::NotFound)).unwrap();
        assert!(record.error().is_some());

        record.mark_start(OperationKind::Apply).unwrap();
        assert!(record.error().is_none());
        assert!(record.end_time().is_none());
    }

    #[test]
    fn test_consume_success() {
        let mut record = OperationRecord::new();
        assert_eq!(record.consume().unwrap(), None);

        record.mark_start(OperationKind::Destroy).unwrap();
        assert!(record.consume().unwrap_err().is_precondition());

        record.mark_end(None).unwrap();
        assert_eq!(record.consume().unwrap(), Some(OperationKind::Destroy));
        assert!(record.is_idle());
    }

    #[test]
    fn test_consume_failure_wraps_kind() {
        let mut record = OperationRecord::new();
        record.mark_start(OperationKind::Apply).unwrap();
        record
            .mark_end(Some(Error::CommandFailed {
                operation: OperationKind::Apply,
                status: Some(1),
                output: "Error: quota exceeded".to_string(),
            }))
            .unwrap();

        let err = record.consume().unwrap_err();
        assert!(err.to_string().starts_with("apply operation failed"));
        assert!(record.is_idle());
    }
}
