//! # tfworkspace
//!
//! Terraform working directories driven by a polling caller.
//!
//! This crate provides functionality for:
//! - Tracking the single operation allowed per working directory
//! - Running `apply`/`destroy` in the background with a deadline
//! - Synchronous `apply`, `destroy`, `refresh` and `plan`
//! - Swapping the process runner for a scripted fake in tests
//!
//! ## Example
//!
//! ```no_run
//! use tfworkspace::{CancellationToken, Workspace};
//!
//! let workspace = Workspace::new("/var/lib/tfjet/workspaces/bucket");
//! workspace.apply_async().expect("start apply");
//!
//! // Later, on the next poll:
//! let token = CancellationToken::new();
//! match workspace.refresh(&token) {
//!     Ok(result) if result.is_applying => println!("still applying"),
//!     Ok(result) => println!("refreshed: {:?}", result.state.map(|s| s.serial)),
//!     Err(e) if e.is_not_found() => println!("gone"),
//!     Err(e) => eprintln!("failed: {e}"),
//! }
//! ```

#![warn(clippy::all)]

pub mod cancel;
pub mod error;
pub mod exec;
pub mod operation;
pub mod workspace;

pub use cancel::CancellationToken;
pub use error::{Error, ErrorCategory, Result};
pub use exec::fake::{FakeResponse, FakeRunner};
pub use exec::process::ProcessRunner;
pub use exec::{CommandOutput, Invocation, Runner};
pub use operation::{OperationKind, OperationRecord};
pub use workspace::{
    ApplyResult, ChangeSummary, CONFIG_FILE_NAME, DEFAULT_ASYNC_TIMEOUT, DEFAULT_BINARY, Notifier,
    PlanResult, RefreshResult, Workspace, parse_change_summary,
};
