//! Backing clients of the adapter.
//!
//! The [`ExternalClient`] trait abstracts how operations reach the provisioning
//! tool, which allows:
//! - Workspace-backed execution via [`WorkspaceClient`](crate::WorkspaceClient)
//! - Scripted outcomes via [`FakeClient`](crate::FakeClient)

use crate::error::Result;
use crate::resource::Terraformed;
use std::fmt;
use tfstate::StateV4;

/// Mutation a client can report as running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    Create,
    Update,
    Delete,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// What a client knows about a resource right now.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// The check has not produced an answer yet
    Pending,
    /// A mutation is running or must be driven further
    InProgress(OperationType),
    /// There is nothing to observe
    Absent,
    /// A finished check with the snapshot it was based on
    Present {
        exists: bool,
        up_to_date: bool,
        state: StateV4,
    },
}

/// Progress of a mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// Started or still running
    Pending,
    /// Finished, with the snapshot it produced if there is one
    Done(Option<StateV4>),
}

/// Reaches the provisioning tool on behalf of the adapter.
///
/// Calls must return promptly; long work is started in the background and
/// reported as pending until it ends.
pub trait ExternalClient {
    /// Report the current observation of `resource`.
    fn observe<R: Terraformed + ?Sized>(&self, resource: &R) -> Result<Observation>;

    /// Drive `resource` towards its desired configuration.
    fn apply<R: Terraformed + ?Sized>(&self, resource: &R) -> Result<Progress>;

    /// Drive `resource` towards deletion; returns whether it is gone.
    fn destroy<R: Terraformed + ?Sized>(&self, resource: &R) -> Result<bool>;
}
