//! # tfstate
//!
//! Pure Rust codec for Terraform v4 state snapshots.
//!
//! This crate provides functionality for:
//! - Parsing `terraform.tfstate` files and writing them back without loss
//! - Reading the observed and sensitive attributes of the managed resource
//! - Looking up the resource's external identifier
//! - Converting a snapshot to and from a compact encoded string
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! let raw = std::fs::read(Path::new("terraform.tfstate")).expect("read state");
//! let state = tfstate::parse(&raw).expect("valid state");
//!
//! let id = tfstate::external_id(&state, "id").expect("id attribute");
//! println!("external id: {id}");
//!
//! for (key, value) in state.attributes() {
//!     println!("{key} = {value}");
//! }
//!
//! // Persist the snapshot as an opaque string and restore it later
//! let encoded = tfstate::encoded(&state).expect("encode");
//! let restored = tfstate::from_encoded(&encoded).expect("decode");
//! assert_eq!(restored, state);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
#[allow(missing_docs)]
pub mod types;

pub use codec::{encoded, external_id, from_encoded, parse, serialize};
pub use error::{Error, Result};
pub use types::{InstanceObjectStateV4, ResourceStateV4, StateV4};

/// Name of the state file the tool reads and writes in its working directory.
pub const STATE_FILE_NAME: &str = "terraform.tfstate";
