//! Real process runner using `std::process`.

use crate::cancel::CancellationToken;
use crate::error::{Error, Result};
use crate::exec::{CommandOutput, Invocation, Runner};
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How often a running child is checked for exit, cancellation and deadline.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runner that spawns real processes.
///
/// stdout and stderr are drained concurrently into one buffer, so the captured
/// output keeps the order in which chunks arrived.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    poll_interval: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl ProcessRunner {
    /// Create a runner with the default poll interval.
    pub fn new() -> Self {
        Self::default()
    }

    /// Change how often the child is polled.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

enum Wait {
    Exited(ExitStatus),
    Cancelled,
    TimedOut,
}

impl Runner for ProcessRunner {
    fn run(&self, invocation: &Invocation, token: &CancellationToken) -> Result<CommandOutput> {
        log::debug!(
            "Running `{}` in {}",
            invocation.command_line(),
            invocation.dir.display()
        );

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.dir)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                program: invocation.program.clone(),
                source,
            })?;

        let combined = Arc::new(Mutex::new(Vec::new()));
        let mut collectors = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            collectors.push(collect(stdout, Arc::clone(&combined)));
        }
        if let Some(stderr) = child.stderr.take() {
            collectors.push(collect(stderr, Arc::clone(&combined)));
        }

        match self.wait(&mut child, token)? {
            Wait::Exited(status) => {
                for collector in collectors {
                    if collector.join().is_err() {
                        log::warn!("Output collector for `{}` panicked", invocation.program);
                    }
                }
                let output = lock(&combined).clone();
                Ok(CommandOutput {
                    output,
                    status: status.code(),
                })
            }
            // Grandchildren may still hold the pipes open, so the collectors
            // are left detached and only what arrived so far is reported.
            Wait::Cancelled => Err(Error::Cancelled {
                output: String::from_utf8_lossy(&lock(&combined)).to_string(),
            }),
            Wait::TimedOut => Err(Error::Timeout {
                output: String::from_utf8_lossy(&lock(&combined)).to_string(),
            }),
        }
    }
}

impl ProcessRunner {
    fn wait(&self, child: &mut Child, token: &CancellationToken) -> Result<Wait> {
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Wait::Exited(status));
            }
            if token.is_cancelled() {
                kill(child);
                return Ok(Wait::Cancelled);
            }
            if token.deadline_exceeded() {
                kill(child);
                return Ok(Wait::TimedOut);
            }
            let nap = token
                .remaining()
                .map_or(self.poll_interval, |left| left.min(self.poll_interval));
            thread::sleep(nap.max(Duration::from_millis(1)));
        }
    }
}

fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        log::debug!("Failed to kill child process: {e}");
    }
    if let Err(e) = child.wait() {
        log::warn!("Failed to reap killed child process: {e}");
    }
}

fn collect<R>(mut stream: R, sink: Arc<Mutex<Vec<u8>>>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = [0u8; 8192];
        loop {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => lock(&sink).extend_from_slice(&buf[..n]),
            }
        }
    })
}

fn lock(sink: &Mutex<Vec<u8>>) -> std::sync::MutexGuard<'_, Vec<u8>> {
    match sink.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh(script: &str, dir: &std::path::Path) -> Invocation {
        Invocation::new("sh", dir).args(["-c", script])
    }

    #[test]
    fn test_captures_stdout_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new().with_poll_interval(Duration::from_millis(5));

        let out = runner
            .run(
                &sh("echo to-stdout; echo to-stderr 1>&2", dir.path()),
                &CancellationToken::new(),
            )
            .unwrap();

        assert!(out.success());
        let text = out.output_str();
        assert!(text.contains("to-stdout"));
        assert!(text.contains("to-stderr"));
    }

    #[test]
    fn test_non_zero_exit_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new().with_poll_interval(Duration::from_millis(5));

        let out = runner
            .run(&sh("echo changes; exit 2", dir.path()), &CancellationToken::new())
            .unwrap();

        assert_eq!(out.status, Some(2));
        assert!(out.exited_with(&[0, 2]));
    }

    #[test]
    fn test_runs_in_dir_with_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new().with_poll_interval(Duration::from_millis(5));
        let env = vec![("TFJET_TEST_VALUE".to_string(), "from-override".to_string())];

        let out = runner
            .run(
                &sh("pwd; echo $TFJET_TEST_VALUE; echo $PATH", dir.path()).envs(&env),
                &CancellationToken::new(),
            )
            .unwrap();

        let text = out.output_str();
        let canonical = dir.path().canonicalize().unwrap();
        assert!(text.contains(canonical.file_name().unwrap().to_str().unwrap()));
        assert!(text.contains("from-override"));
        // PATH is inherited, so the third line is not empty
        assert!(text.lines().nth(2).is_some_and(|l| !l.trim().is_empty()));
    }

    #[test]
    fn test_deadline_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new().with_poll_interval(Duration::from_millis(5));
        let token = CancellationToken::with_timeout(Duration::from_millis(100));

        let started = Instant::now();
        let err = runner
            .run(&sh("echo started; sleep 30", dir.path()), &token)
            .unwrap_err();

        assert!(matches!(err, Error::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(20));
    }

    #[test]
    fn test_cancel_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new().with_poll_interval(Duration::from_millis(5));
        let token = CancellationToken::new();
        token.cancel();

        let err = runner
            .run(&sh("sleep 30", dir.path()), &token)
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled { .. }));
    }

    #[test]
    fn test_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProcessRunner::new()
            .run(
                &Invocation::new("tfjet-definitely-not-a-binary", dir.path()),
                &CancellationToken::new(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
    }
}
