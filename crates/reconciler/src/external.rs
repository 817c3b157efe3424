//! The four calls a reconciliation loop makes against an external resource.
//!
//! Every call returns promptly. A mutation that is still running is reported as
//! not completed (or, for delete, as the retryable [`Error::StillDeleting`]) and
//! is picked up again on the next poll.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use crate::client::{ExternalClient, Observation, OperationType, Progress};
use crate::error::{Error, Result};
use crate::resource::{ConnectionDetails, Terraformed};
use serde_json::{Map, Value};
use tfstate::StateV4;

/// Outcome of [`External::observe`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObserveResult {
    /// False when the observation is not available yet; act on nothing
    pub completed: bool,
    pub exists: bool,
    pub up_to_date: bool,
    pub connection_details: ConnectionDetails,
}

/// Outcome of [`External::create`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateResult {
    pub completed: bool,
    /// The resource carries an external name after this call
    pub external_name_assigned: bool,
    pub connection_details: ConnectionDetails,
}

/// Outcome of [`External::update`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateResult {
    pub completed: bool,
    pub connection_details: ConnectionDetails,
}

/// Adapter between a reconciliation loop and an [`ExternalClient`].
#[derive(Debug)]
pub struct External<C> {
    client: C,
}

impl<C: ExternalClient> External<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Report whether the resource exists and matches its desired state.
    ///
    /// | Client observation | completed | exists | up_to_date |
    /// |---|---|---|---|
    /// | pending | false | | |
    /// | create in progress | true | false | |
    /// | update or delete in progress | true | true | false |
    /// | absent | true | false | |
    /// | present | true | from check | from check |
    pub fn observe<R: Terraformed + ?Sized>(&self, resource: &mut R) -> Result<ObserveResult> {
        match self.client.observe(resource)? {
            Observation::Pending => Ok(ObserveResult::default()),
            Observation::InProgress(OperationType::Create) => Ok(ObserveResult {
                completed: true,
                ..ObserveResult::default()
            }),
            Observation::InProgress(OperationType::Update | OperationType::Delete) => {
                Ok(ObserveResult {
                    completed: true,
                    exists: true,
                    up_to_date: false,
                    ..ObserveResult::default()
                })
            }
            Observation::Absent => Ok(ObserveResult {
                completed: true,
                ..ObserveResult::default()
            }),
            Observation::Present {
                exists,
                up_to_date,
                state,
            } => {
                let parse_id = resource.external_name().is_none();
                let connection_details = consume_state("observe", &state, resource, parse_id)?;
                Ok(ObserveResult {
                    completed: true,
                    exists,
                    up_to_date,
                    connection_details,
                })
            }
        }
    }

    /// Create the resource.
    ///
    /// Runs the same mutation as [`update`](Self::update); once it completes the
    /// external identifier is read from the snapshot.
    pub fn create<R: Terraformed + ?Sized>(&self, resource: &mut R) -> Result<CreateResult> {
        let update = self.mutate("create", resource, true)?;
        Ok(CreateResult {
            completed: update.completed,
            external_name_assigned: resource.external_name().is_some(),
            connection_details: update.connection_details,
        })
    }

    /// Update the resource in place.
    pub fn update<R: Terraformed + ?Sized>(&self, resource: &mut R) -> Result<UpdateResult> {
        self.mutate("update", resource, false)
    }

    /// Delete the resource.
    ///
    /// Returns [`Error::StillDeleting`] until the client reports it gone.
    pub fn delete<R: Terraformed + ?Sized>(&self, resource: &mut R) -> Result<()> {
        if self.client.destroy(resource)? {
            log::info!("Deleted {}", resource.uid());
            return Ok(());
        }
        Err(Error::StillDeleting)
    }

    fn mutate<R: Terraformed + ?Sized>(
        &self,
        operation: &'static str,
        resource: &mut R,
        parse_id: bool,
    ) -> Result<UpdateResult> {
        match self.client.apply(resource)? {
            Progress::Pending => Ok(UpdateResult::default()),
            Progress::Done(None) => Ok(UpdateResult {
                completed: true,
                ..UpdateResult::default()
            }),
            Progress::Done(Some(state)) => Ok(UpdateResult {
                completed: true,
                connection_details: consume_state(operation, &state, resource, parse_id)?,
            }),
        }
    }
}

/// Copy what a snapshot says about the resource onto the resource object.
///
/// Sets the external name (when `parse_id`), the observation and the persisted
/// encoded state, and returns the connection details.
pub fn consume_state<R: Terraformed + ?Sized>(
    operation: &'static str,
    state: &StateV4,
    resource: &mut R,
    parse_id: bool,
) -> Result<ConnectionDetails> {
    if parse_id {
        let id = tfstate::external_id(state, resource.terraform_resource_id_field())
            .map_err(Error::state(operation))?;
        log::debug!("External name of {} is {id}", resource.uid());
        resource.set_external_name(id);
    }

    resource.set_observation(state.attributes())?;
    let details = connection_details(&state.sensitive_attributes())?;

    let encoded = tfstate::encoded(state).map_err(Error::state(operation))?;
    resource.set_persisted_state(encoded);

    Ok(details)
}

/// Turn sensitive attributes into connection details.
///
/// Every value must be a base64 string; it is decoded into the raw secret.
pub fn connection_details(sensitive: &Map<String, Value>) -> Result<ConnectionDetails> {
    sensitive
        .iter()
        .map(|(key, value)| {
            let Value::String(encoded) = value else {
                return Err(Error::ConnectionDetails {
                    key: key.clone(),
                    reason: format!("expected a base64 string, found {value}"),
                });
            };
            let bytes = STANDARD
                .decode(encoded)
                .map_err(|e| Error::ConnectionDetails {
                    key: key.clone(),
                    reason: e.to_string(),
                })?;
            Ok((key.clone(), bytes))
        })
        .collect()
}
