//! Scripted runner for tests.
//!
//! Responses are returned in the order they were queued. A response can be
//! *held*: the runner then blocks until [`FakeRunner::release`] is called, which
//! lets tests observe a workspace while a background operation is in flight.

use crate::cancel::CancellationToken;
use crate::error::{Error, Result};
use crate::exec::{CommandOutput, Invocation, Runner};
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;
use tfstate::STATE_FILE_NAME;

/// One scripted command result.
#[derive(Debug, Clone, Default)]
pub struct FakeResponse {
    output: String,
    status: i32,
    state: Option<Vec<u8>>,
    held: bool,
    spawn_error: bool,
}

impl FakeResponse {
    /// A successful run with the given output.
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Self::default()
        }
    }

    /// A run that exits with `status`.
    pub fn exit(status: i32, output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            status,
            ..Self::default()
        }
    }

    /// A program that cannot be started.
    pub fn spawn_error() -> Self {
        Self {
            spawn_error: true,
            ..Self::default()
        }
    }

    /// Write `state` to the working directory's state file before returning.
    pub fn with_state(mut self, state: impl Into<Vec<u8>>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Block until [`FakeRunner::release`] is called.
    pub fn held(mut self) -> Self {
        self.held = true;
        self
    }
}

#[derive(Debug, Default)]
struct Script {
    responses: VecDeque<FakeResponse>,
    invocations: Vec<Invocation>,
    releases: usize,
    waiting: usize,
}

/// Runner that replays queued [`FakeResponse`]s and records invocations.
///
/// With an empty queue every invocation succeeds with no output.
#[derive(Debug, Default)]
pub struct FakeRunner {
    script: Mutex<Script>,
    gate: Condvar,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response.
    pub fn push(&self, response: FakeResponse) -> &Self {
        self.lock().responses.push_back(response);
        self
    }

    /// Let one held invocation finish.
    pub fn release(&self) {
        self.lock().releases += 1;
        self.gate.notify_all();
    }

    /// Invocations seen so far, in order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.lock().invocations.clone()
    }

    /// Block until `count` invocations are waiting on [`release`](Self::release).
    ///
    /// Returns false if that does not happen within `timeout`.
    pub fn wait_for_held(&self, count: usize, timeout: Duration) -> bool {
        let guard = self.lock();
        let (guard, _) = self
            .gate
            .wait_timeout_while(guard, timeout, |s| s.waiting < count)
            .unwrap_or_else(|p| p.into_inner());
        guard.waiting >= count
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Runner for FakeRunner {
    fn run(&self, invocation: &Invocation, token: &CancellationToken) -> Result<CommandOutput> {
        let response = {
            let mut script = self.lock();
            script.invocations.push(invocation.clone());
            script.responses.pop_front().unwrap_or_default()
        };

        if response.spawn_error {
            return Err(Error::Spawn {
                program: invocation.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            });
        }

        if response.held {
            let mut script = self.lock();
            script.waiting += 1;
            self.gate.notify_all();
            while script.releases == 0 {
                if token.is_cancelled() {
                    script.waiting -= 1;
                    return Err(Error::Cancelled {
                        output: response.output,
                    });
                }
                if token.deadline_exceeded() {
                    script.waiting -= 1;
                    return Err(Error::Timeout {
                        output: response.output,
                    });
                }
                script = self
                    .gate
                    .wait_timeout(script, Duration::from_millis(10))
                    .map(|(guard, _)| guard)
                    .unwrap_or_else(|p| p.into_inner().0);
            }
            script.releases -= 1;
            script.waiting -= 1;
        }

        if let Some(state) = &response.state {
            let path = invocation.dir.join(STATE_FILE_NAME);
            std::fs::write(&path, state).map_err(|source| Error::WriteFile { path, source })?;
        }

        Ok(CommandOutput {
            output: response.output.into_bytes(),
            status: Some(response.status),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_replays_in_order_and_records() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new();
        runner
            .push(FakeResponse::success("first"))
            .push(FakeResponse::exit(1, "second"));

        let token = CancellationToken::new();
        let inv = Invocation::new("terraform", dir.path()).args(["apply"]);
        let first = runner.run(&inv, &token).unwrap();
        let second = runner.run(&inv, &token).unwrap();
        let third = runner.run(&inv, &token).unwrap();

        assert_eq!(first.output_str(), "first");
        assert_eq!(second.status, Some(1));
        assert!(third.success());
        assert_eq!(runner.invocations().len(), 3);
    }

    #[test]
    fn test_writes_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new();
        runner.push(FakeResponse::success("").with_state(br#"{"version":4}"#.to_vec()));

        runner
            .run(
                &Invocation::new("terraform", dir.path()),
                &CancellationToken::new(),
            )
            .unwrap();

        let written = std::fs::read_to_string(dir.path().join(STATE_FILE_NAME)).unwrap();
        assert_eq!(written, r#"{"version":4}"#);
    }

    #[test]
    fn test_held_response_waits_for_release() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(FakeRunner::new());
        runner.push(FakeResponse::success("done").held());

        let worker = {
            let runner = Arc::clone(&runner);
            let inv = Invocation::new("terraform", dir.path());
            thread::spawn(move || runner.run(&inv, &CancellationToken::new()))
        };

        assert!(runner.wait_for_held(1, Duration::from_secs(5)));
        assert!(!worker.is_finished());
        runner.release();

        let out = worker.join().unwrap().unwrap();
        assert_eq!(out.output_str(), "done");
    }

    #[test]
    fn test_held_response_honours_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new();
        runner.push(FakeResponse::success("").held());

        let token = CancellationToken::new();
        token.cancel();
        let err = runner
            .run(&Invocation::new("terraform", dir.path()), &token)
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled { .. }));
    }

    #[test]
    fn test_held_response_honours_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new();
        runner.push(FakeResponse::success("partial").held());

        let token = CancellationToken::with_timeout(Duration::from_millis(20));
        let err = runner
            .run(&Invocation::new("terraform", dir.path()), &token)
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { output } if output == "partial"));
    }
}
