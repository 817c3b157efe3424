//! # reconciler
//!
//! Observe/Create/Update/Delete for resources provisioned by Terraform.
//!
//! This crate provides functionality for:
//! - Answering a polling reconciliation loop without ever waiting on the tool
//! - Mapping in-flight and finished workspace operations onto call results
//! - Copying observed attributes, external names and secrets onto the resource
//! - Keeping one workspace per resource, restorable from persisted state
//! - Enabling resource kinds by regular expression
//!
//! ## Example
//!
//! ```no_run
//! use reconciler::{External, ManagedResource, WorkspaceClient, WorkspaceStore};
//!
//! let raw = std::fs::read("bucket.json").expect("read resource");
//! let mut resource: ManagedResource = serde_json::from_slice(&raw).expect("parse resource");
//!
//! let store = WorkspaceStore::new("/var/lib/tfjet/workspaces");
//! let external = External::new(WorkspaceClient::new(store));
//!
//! let observed = external.observe(&mut resource).expect("observe");
//! if observed.completed && !observed.exists {
//!     external.create(&mut resource).expect("create");
//! }
//! ```

#![warn(clippy::all)]

pub mod client;
pub mod error;
pub mod external;
pub mod fake;
pub mod gating;
pub mod resource;
pub mod store;
pub mod workspace_client;

pub use client::{ExternalClient, Observation, OperationType, Progress};
pub use error::{Error, ErrorCategory, Result};
pub use external::{
    CreateResult, External, ObserveResult, UpdateResult, connection_details, consume_state,
};
pub use fake::{FakeCall, FakeClient};
pub use gating::is_api_enabled;
pub use resource::{ConnectionDetails, GroupVersionKind, ManagedResource, Terraformed};
pub use store::{NotifierFactory, WorkspaceStore, render_config, validate_uid};
pub use workspace_client::WorkspaceClient;
