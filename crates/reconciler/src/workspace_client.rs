//! [`ExternalClient`] backed by Terraform workspaces.

use crate::client::{ExternalClient, Observation, OperationType, Progress};
use crate::error::{Error, Result};
use crate::resource::Terraformed;
use crate::store::WorkspaceStore;
use std::sync::Arc;
use tfworkspace::{CancellationToken, OperationKind, Workspace};

/// Drives one workspace per resource through a [`WorkspaceStore`].
///
/// Mutations run in the background. A poll that finds an operation in flight
/// reports it without touching the state file; the outcome of a finished
/// operation is consumed exactly once by the next call.
#[derive(Debug)]
pub struct WorkspaceClient {
    store: WorkspaceStore,
}

impl WorkspaceClient {
    pub fn new(store: WorkspaceStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &WorkspaceStore {
        &self.store
    }

    fn token(workspace: &Workspace) -> CancellationToken {
        CancellationToken::with_timeout(workspace.async_timeout())
    }

    fn running<R: Terraformed + ?Sized>(
        resource: &R,
        kind: OperationKind,
    ) -> Option<Observation> {
        match kind {
            // A first apply has nothing to observe until it ends. This reports
            // Pending rather than InProgress(Create), so observe answers
            // "not completed" instead of "completed, does not exist".
            OperationKind::Apply if resource.external_name().is_none() => {
                Some(Observation::Pending)
            }
            OperationKind::Apply => Some(Observation::InProgress(OperationType::Update)),
            OperationKind::Destroy => Some(Observation::InProgress(OperationType::Delete)),
            _ => None,
        }
    }
}

impl ExternalClient for WorkspaceClient {
    fn observe<R: Terraformed + ?Sized>(&self, resource: &R) -> Result<Observation> {
        let workspace = self.store.workspace_for(resource)?;
        let record = workspace.last_operation();

        if record.is_busy() {
            return Ok(Self::running(resource, record.kind()).unwrap_or(Observation::Pending));
        }
        if record.is_idle() && !workspace.has_state_file() {
            return Ok(Observation::Absent);
        }

        let token = Self::token(&workspace);
        let refreshed = match workspace.refresh(&token) {
            Ok(refreshed) => refreshed,
            Err(e) if e.is_not_found() => return Ok(Observation::Absent),
            Err(e) => return Err(Error::workspace("observe")(e)),
        };
        if refreshed.is_applying {
            return Ok(Self::running(resource, OperationKind::Apply).unwrap_or(Observation::Pending));
        }
        if refreshed.is_destroying {
            return Ok(Observation::InProgress(OperationType::Delete));
        }
        let Some(state) = refreshed.state else {
            return Ok(Observation::Absent);
        };

        let plan = workspace
            .plan(&token)
            .map_err(Error::workspace("observe"))?;
        log::debug!(
            "Observed {}: exists={} up_to_date={}",
            resource.uid(),
            plan.exists,
            plan.up_to_date
        );
        Ok(Observation::Present {
            exists: plan.exists,
            up_to_date: plan.up_to_date,
            state,
        })
    }

    fn apply<R: Terraformed + ?Sized>(&self, resource: &R) -> Result<Progress> {
        let workspace = self.store.workspace_for(resource)?;
        let record = workspace.last_operation();

        if record.is_busy() {
            return match record.kind() {
                OperationKind::Apply => Ok(Progress::Pending),
                operation => Err(Error::OperationInProgress { operation }),
            };
        }
        if record.is_terminal() && record.kind() == OperationKind::Apply {
            workspace
                .consume_last_operation()
                .map_err(Error::workspace("apply"))?;
            let state = workspace.read_state().map_err(Error::workspace("apply"))?;
            return Ok(Progress::Done(Some(state)));
        }
        if record.is_terminal() {
            workspace
                .consume_last_operation()
                .map_err(Error::workspace("apply"))?;
        }

        workspace.apply_async().map_err(Error::workspace("apply"))?;
        Ok(Progress::Pending)
    }

    fn destroy<R: Terraformed + ?Sized>(&self, resource: &R) -> Result<bool> {
        let workspace = self.store.workspace_for(resource)?;
        let record = workspace.last_operation();

        if record.is_busy() {
            return match record.kind() {
                OperationKind::Destroy => Ok(false),
                operation => Err(Error::OperationInProgress { operation }),
            };
        }
        if record.is_terminal() && record.kind() == OperationKind::Destroy {
            workspace
                .consume_last_operation()
                .map_err(Error::workspace("delete"))?;
            self.forget(resource.uid(), &workspace)?;
            return Ok(true);
        }
        if record.is_terminal() {
            // The resource is going away; an earlier failure no longer matters
            if let Err(e) = workspace.consume_last_operation() {
                log::warn!("Discarding outcome before deleting {}: {e}", resource.uid());
            }
        }

        if !has_resources(&workspace)? {
            log::info!("Nothing to destroy for {}", resource.uid());
            self.forget(resource.uid(), &workspace)?;
            return Ok(true);
        }

        workspace
            .destroy_async()
            .map_err(Error::workspace("delete"))?;
        Ok(false)
    }
}

impl WorkspaceClient {
    fn forget(&self, uid: &str, workspace: &Arc<Workspace>) -> Result<()> {
        log::debug!("Forgetting workspace {}", workspace.dir().display());
        self.store.remove(uid)
    }
}

fn has_resources(workspace: &Workspace) -> Result<bool> {
    if !workspace.has_state_file() {
        return Ok(false);
    }
    let state = workspace
        .read_state()
        .map_err(Error::workspace("delete"))?;
    Ok(state.has_resources())
}
