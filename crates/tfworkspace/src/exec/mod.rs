//! Command execution abstraction.
//!
//! The [`Runner`] trait is the only place the workspace touches processes,
//! which allows:
//! - Real execution via [`process::ProcessRunner`]
//! - Deterministic test doubles via [`fake::FakeRunner`]

pub mod fake;
pub mod process;

use crate::cancel::CancellationToken;
use crate::error::Result;
use std::path::{Path, PathBuf};

/// A fully described command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to execute
    pub program: String,
    /// Arguments, without the program name
    pub args: Vec<String>,
    /// Working directory
    pub dir: PathBuf,
    /// Variables added on top of the inherited environment
    pub env: Vec<(String, String)>,
}

impl Invocation {
    /// Create an invocation of `program` in `dir` with no arguments.
    pub fn new(program: impl Into<String>, dir: impl AsRef<Path>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            dir: dir.as_ref().to_path_buf(),
            env: Vec::new(),
        }
    }

    /// Append arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add environment overrides.
    pub fn envs(mut self, env: &[(String, String)]) -> Self {
        self.env.extend(env.iter().cloned());
        self
    }

    /// The command line as it would be typed in a shell (for logs).
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Whether the arguments contain `flag`.
    pub fn has_arg(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Combined stdout and stderr, in arrival order
    pub output: Vec<u8>,
    /// Exit code (`None` if the process was terminated by a signal)
    pub status: Option<i32>,
}

impl CommandOutput {
    /// Whether the process exited with status 0.
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Whether the exit status is one of `accepted`.
    pub fn exited_with(&self, accepted: &[i32]) -> bool {
        self.status.is_some_and(|code| accepted.contains(&code))
    }

    /// Output as (lossy) UTF-8.
    pub fn output_str(&self) -> String {
        String::from_utf8_lossy(&self.output).to_string()
    }
}

/// Runs external commands.
pub trait Runner: Send + Sync {
    /// Run `invocation` to completion.
    ///
    /// A non-zero exit status is not an error at this level; it is reported in
    /// [`CommandOutput::status`]. Errors are reserved for a process that could
    /// not be started, or that was killed because `token` was cancelled or its
    /// deadline passed.
    fn run(&self, invocation: &Invocation, token: &CancellationToken) -> Result<CommandOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_builder() {
        let env = vec![("TF_IN_AUTOMATION".to_string(), "1".to_string())];
        let inv = Invocation::new("terraform", "/tmp/ws")
            .args(["plan", "-refresh=false"])
            .envs(&env);

        assert_eq!(inv.command_line(), "terraform plan -refresh=false");
        assert!(inv.has_arg("-refresh=false"));
        assert!(!inv.has_arg("-json"));
        assert_eq!(inv.env, env);
        assert_eq!(inv.dir, PathBuf::from("/tmp/ws"));
    }

    #[test]
    fn test_output_status() {
        let out = CommandOutput {
            output: b"done".to_vec(),
            status: Some(2),
        };
        assert!(!out.success());
        assert!(out.exited_with(&[0, 2]));
        assert!(!out.exited_with(&[0]));
        assert_eq!(out.output_str(), "done");

        let killed = CommandOutput {
            output: Vec::new(),
            status: None,
        };
        assert!(!killed.exited_with(&[0]));
    }
}
