//! Terraform working directory for one managed resource.
//!
//! A [`Workspace`] runs at most one tracked operation at a time. Mutations can
//! be started in the background ([`Workspace::apply_async`],
//! [`Workspace::destroy_async`]) so that a polling caller never waits on the
//! tool; the outcome is picked up later through [`Workspace::refresh`].

use crate::cancel::CancellationToken;
use crate::error::{Error, Result};
use crate::exec::process::ProcessRunner;
use crate::exec::{CommandOutput, Invocation, Runner};
use crate::operation::{OperationKind, OperationRecord};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use tfstate::{STATE_FILE_NAME, StateV4};

/// Deadline for background operations.
pub const DEFAULT_ASYNC_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Program run when no binary is configured.
pub const DEFAULT_BINARY: &str = "terraform";

/// Configuration file the tool reads from the working directory.
pub const CONFIG_FILE_NAME: &str = "main.tf.json";

const APPLY_ARGS: &[&str] = &["apply", "-auto-approve", "-input=false", "-json"];
const SYNC_APPLY_ARGS: &[&str] = &[
    "apply",
    "-auto-approve",
    "-input=false",
    "-detailed-exitcode",
    "-json",
];
const DESTROY_ARGS: &[&str] = &["destroy", "-auto-approve", "-input=false", "-json"];
const REFRESH_ARGS: &[&str] = &[
    "apply",
    "-refresh-only",
    "-auto-approve",
    "-input=false",
    "-json",
];
const PLAN_ARGS: &[&str] = &["plan", "-refresh=false", "-input=false", "-json"];

/// `-detailed-exitcode` reports "succeeded with changes" as 2.
const DETAILED_EXIT_CODES: &[i32] = &[0, 2];

/// Callback fired from the background thread once an async operation ends.
///
/// It runs on the worker thread, so it must return quickly and must not call
/// back into the workspace.
pub type Notifier = Arc<dyn Fn() + Send + Sync>;

/// Result of a synchronous apply.
#[derive(Debug, Clone)]
pub struct ApplyResult {
    /// Snapshot written by the apply
    pub state: StateV4,
}

/// Result of [`Workspace::refresh`].
#[derive(Debug, Clone, Default)]
pub struct RefreshResult {
    /// A background apply is still running
    pub is_applying: bool,
    /// A background destroy is still running
    pub is_destroying: bool,
    /// Refreshed snapshot (`None` while an operation is running)
    pub state: Option<StateV4>,
}

/// Result of [`Workspace::plan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanResult {
    /// Nothing would be added
    pub exists: bool,
    /// Nothing would be changed in place
    pub up_to_date: bool,
}

/// Counts from the plan's `change_summary` event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ChangeSummary {
    #[serde(default)]
    pub add: u64,
    #[serde(default)]
    pub change: u64,
    #[serde(default)]
    pub remove: u64,
    #[serde(default)]
    pub import: u64,
}

#[derive(Deserialize)]
struct PlanEvent {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    changes: Option<ChangeSummary>,
}

/// Working directory and operation tracker of one resource.
pub struct Workspace {
    dir: PathBuf,
    record: Arc<Mutex<OperationRecord>>,
    runner: Arc<dyn Runner>,
    notifier: Option<Notifier>,
    binary: String,
    env: Vec<(String, String)>,
    async_timeout: Duration,
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("dir", &self.dir)
            .field("binary", &self.binary)
            .field("async_timeout", &self.async_timeout)
            .field("last_operation", &self.last_operation())
            .finish_non_exhaustive()
    }
}

impl Workspace {
    /// Create a workspace rooted at `dir` that runs the real tool.
    ///
    /// Nothing is touched on disk until a file is written.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            record: Arc::new(Mutex::new(OperationRecord::new())),
            runner: Arc::new(ProcessRunner::new()),
            notifier: None,
            binary: DEFAULT_BINARY.to_string(),
            env: Vec::new(),
            async_timeout: DEFAULT_ASYNC_TIMEOUT,
        }
    }

    /// Use `runner` to execute commands.
    pub fn with_runner(mut self, runner: Arc<dyn Runner>) -> Self {
        self.runner = runner;
        self
    }

    /// Fire `notifier` whenever a background operation ends.
    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Run `binary` instead of `terraform`.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Add environment variables for every command.
    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env.extend(env);
        self
    }

    /// Change the deadline of background operations.
    pub fn with_async_timeout(mut self, timeout: Duration) -> Self {
        self.async_timeout = timeout;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn async_timeout(&self) -> Duration {
        self.async_timeout
    }

    /// Path of the state file inside the working directory.
    pub fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE_NAME)
    }

    /// Path of the configuration file inside the working directory.
    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE_NAME)
    }

    /// Snapshot of the operation record.
    pub fn last_operation(&self) -> OperationRecord {
        self.lock().clone()
    }

    /// Whether a tracked operation is in flight.
    pub fn is_busy(&self) -> bool {
        self.lock().is_busy()
    }

    /// Consume the outcome of a finished background operation.
    ///
    /// See [`OperationRecord::consume`].
    pub fn consume_last_operation(&self) -> Result<Option<OperationKind>> {
        self.lock().consume()
    }

    /// Start `apply` in the background.
    pub fn apply_async(&self) -> Result<()> {
        self.start_async(OperationKind::Apply, APPLY_ARGS)
    }

    /// Start `destroy` in the background.
    ///
    /// Succeeds without starting anything if the current operation is already a
    /// destroy, whether it is still running or has finished.
    pub fn destroy_async(&self) -> Result<()> {
        if self.lock().kind() == OperationKind::Destroy {
            log::debug!("Destroy already tracked in {}", self.dir.display());
            return Ok(());
        }
        self.start_async(OperationKind::Destroy, DESTROY_ARGS)
    }

    fn start_async(&self, kind: OperationKind, args: &[&str]) -> Result<()> {
        let mut record = self.lock();
        record.mark_start(kind)?;

        let token = CancellationToken::with_timeout(self.async_timeout);
        let invocation = self.invocation(args);
        let shared = Arc::clone(&self.record);
        let runner = Arc::clone(&self.runner);
        let notifier = self.notifier.clone();
        let dir = self.dir.clone();

        log::info!("Starting {kind} in {}", self.dir.display());
        let spawned = thread::Builder::new()
            .name(format!("tfjet-{kind}"))
            .spawn(move || {
                let outcome = runner
                    .run(&invocation, &token)
                    .and_then(|out| check_status(kind, out, &[0]));
                let error = match outcome {
                    Ok(out) => {
                        log::debug!("{kind} output for {}:\n{}", dir.display(), out.output_str());
                        log::info!("Finished {kind} in {}", dir.display());
                        None
                    }
                    Err(e) => {
                        log::debug!("{kind} failed in {}: {e}", dir.display());
                        Some(e)
                    }
                };
                if let Err(e) = lock_record(&shared).mark_end(error) {
                    log::warn!("Cannot record end of {kind} in {}: {e}", dir.display());
                }
                if let Some(notify) = notifier {
                    notify();
                }
                token.cancel();
            });

        if let Err(source) = spawned {
            record.mark_end(None)?;
            record.flush()?;
            return Err(Error::Spawn {
                program: format!("{} worker thread", self.binary),
                source,
            });
        }
        Ok(())
    }

    /// Run `apply` to completion and return the resulting snapshot.
    ///
    /// Does not touch the operation record, but refuses to run while a
    /// background operation is in flight.
    pub fn apply(&self, token: &CancellationToken) -> Result<ApplyResult> {
        self.ensure_idle()?;
        let out = self.runner.run(&self.invocation(SYNC_APPLY_ARGS), token)?;
        check_status(OperationKind::Apply, out, DETAILED_EXIT_CODES)?;
        let state = self.read_state()?;
        Ok(ApplyResult { state })
    }

    /// Run `destroy` to completion.
    pub fn destroy(&self, token: &CancellationToken) -> Result<()> {
        self.ensure_idle()?;
        let out = self.runner.run(&self.invocation(DESTROY_ARGS), token)?;
        check_status(OperationKind::Destroy, out, &[0])?;
        Ok(())
    }

    /// Refresh the state, or report the background operation in flight.
    ///
    /// - in flight: flags only, no filesystem access
    /// - finished with an error: the error, wrapped with the operation kind
    /// - finished destroy: [`Error::NotFound`]
    /// - otherwise: refresh-only apply; an empty state is [`Error::NotFound`]
    pub fn refresh(&self, token: &CancellationToken) -> Result<RefreshResult> {
        {
            let mut record = self.lock();
            if record.is_busy() {
                return Ok(RefreshResult {
                    is_applying: record.kind() == OperationKind::Apply,
                    is_destroying: record.kind() == OperationKind::Destroy,
                    state: None,
                });
            }
            if record.consume()? == Some(OperationKind::Destroy) {
                return Err(Error::NotFound);
            }
        }

        let out = self.runner.run(&self.invocation(REFRESH_ARGS), token)?;
        check_status(OperationKind::Refresh, out, &[0])?;
        let state = self.read_state()?;
        if !state.has_resources() {
            return Err(Error::NotFound);
        }
        Ok(RefreshResult {
            state: Some(state),
            ..RefreshResult::default()
        })
    }

    /// Plan without refreshing and derive existence and drift from the counts.
    ///
    /// Nothing to add means the resource exists; nothing to change means it is
    /// up to date. Drift made outside the tool is not detected because the
    /// plan does not refresh.
    pub fn plan(&self, token: &CancellationToken) -> Result<PlanResult> {
        self.ensure_idle()?;
        let out = self.runner.run(&self.invocation(PLAN_ARGS), token)?;
        let out = check_status(OperationKind::Plan, out, &[0])?;
        let summary = parse_change_summary(&out.output)?;
        Ok(PlanResult {
            exists: summary.add == 0,
            up_to_date: summary.change == 0,
        })
    }

    /// Whether the state file exists.
    pub fn has_state_file(&self) -> bool {
        self.state_path().is_file()
    }

    /// Read and parse the state file.
    pub fn read_state(&self) -> Result<StateV4> {
        let path = self.state_path();
        log::debug!("Reading {}", path.display());
        let raw = fs::read(&path).map_err(|source| Error::StateFile { path, source })?;
        Ok(tfstate::parse(&raw)?)
    }

    /// Replace the state file, creating the directory if needed.
    pub fn write_state(&self, raw: &[u8]) -> Result<()> {
        self.write_file(&self.state_path(), raw)
    }

    /// Replace the configuration file, creating the directory if needed.
    pub fn write_config(&self, raw: &[u8]) -> Result<()> {
        self.write_file(&self.config_path(), raw)
    }

    /// Delete the working directory.
    ///
    /// Refused while an operation is in flight. A missing directory is fine.
    pub fn remove(&self) -> Result<()> {
        self.ensure_idle()?;
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {
                log::debug!("Removed {}", self.dir.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(Error::WriteFile {
                path: self.dir.clone(),
                source,
            }),
        }
    }

    fn write_file(&self, path: &Path, raw: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|source| Error::WriteFile {
            path: self.dir.clone(),
            source,
        })?;
        log::debug!("Writing {}", path.display());
        fs::write(path, raw).map_err(|source| Error::WriteFile {
            path: path.to_path_buf(),
            source,
        })
    }

    fn ensure_idle(&self) -> Result<()> {
        let record = self.lock();
        if record.is_busy() {
            return Err(record.in_progress_error());
        }
        Ok(())
    }

    fn invocation(&self, args: &[&str]) -> Invocation {
        Invocation::new(&self.binary, &self.dir)
            .args(args.iter().copied())
            .envs(&self.env)
    }

    fn lock(&self) -> MutexGuard<'_, OperationRecord> {
        lock_record(&self.record)
    }
}

fn lock_record(record: &Mutex<OperationRecord>) -> MutexGuard<'_, OperationRecord> {
    record.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn check_status(
    operation: OperationKind,
    out: CommandOutput,
    accepted: &[i32],
) -> Result<CommandOutput> {
    if out.exited_with(accepted) {
        return Ok(out);
    }
    Err(Error::CommandFailed {
        operation,
        status: out.status,
        output: out.output_str(),
    })
}

/// Find the `change_summary` event in a `-json` plan log.
pub fn parse_change_summary(log: &[u8]) -> Result<ChangeSummary> {
    let text = String::from_utf8_lossy(log);
    for line in text.lines() {
        if !line.contains("change_summary") {
            continue;
        }
        let event: PlanEvent = serde_json::from_str(line).map_err(Error::ChangeSummary)?;
        if event.kind == "change_summary" {
            return Ok(event.changes.unwrap_or_default());
        }
    }
    Err(Error::ChangeSummaryMissing {
        output: text.to_string(),
    })
}
