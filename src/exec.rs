//! Subprocess execution behind a swappable [`Executor`].
use std::fmt;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::sync::Arc;

use anyhow::{Context as _, Result};

/// Result of a command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    /// Captured standard output (empty when inherited).
    pub stdout: String,
    /// Captured standard error (empty when inherited).
    pub stderr: String,
    /// Whether the process exited with status zero.
    pub success: bool,
    /// Exit code, if the process was not killed by a signal.
    pub code: Option<i32>,
}

impl ExecResult {
    /// A successful result with no output.
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            success: true,
            code: Some(0),
        }
    }

    /// A failed result with the given exit code.
    #[must_use]
    pub const fn failed(code: i32) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            success: false,
            code: Some(code),
        }
    }
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

/// A fully-resolved command line plus the process settings to run it with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to spawn.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Working directory; inherits the current one when `None`.
    pub cwd: Option<PathBuf>,
    /// Complete environment; inherits the current one when `None`.
    pub env: Option<Arc<[(String, String)]>>,
    /// Connect the child to our standard input.
    pub stdin: bool,
    /// Let the child write to our standard output.
    pub stdout: bool,
    /// Let the child write to our standard error.
    pub stderr: bool,
}

impl CommandSpec {
    /// A command with no arguments and captured output.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Append arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Inherit all three standard streams.
    #[must_use]
    pub const fn interactive(mut self) -> Self {
        self.stdin = true;
        self.stdout = true;
        self.stderr = true;
        self
    }

    /// The command line as a single display string.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runs commands and locates programs.
///
/// Production code uses [`SystemExecutor`]; tests substitute a mock so that
/// conditions and directives can be exercised without spawning processes.
#[cfg_attr(test, mockall::automock)]
pub trait Executor: Send + Sync {
    /// Run `command` to completion.
    ///
    /// A non-zero exit is reported through [`ExecResult::success`], not as an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns an error if the process could not be spawned.
    fn run(&self, command: &CommandSpec) -> Result<ExecResult>;

    /// Resolve `program` on `PATH`.
    fn which(&self, program: &str) -> Option<PathBuf>;
}

/// [`Executor`] that spawns real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn run(&self, command: &CommandSpec) -> Result<ExecResult> {
        let stdio = |inherit: bool| {
            if inherit {
                Stdio::inherit()
            } else {
                Stdio::null()
            }
        };

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(stdio(command.stdin))
            .stdout(stdio(command.stdout))
            .stderr(stdio(command.stderr));
        if let Some(dir) = &command.cwd {
            cmd.current_dir(dir);
        }
        if let Some(env) = &command.env {
            cmd.env_clear();
            cmd.envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }

        let output = cmd
            .output()
            .with_context(|| format!("failed to execute: {}", command.program))?;
        Ok(ExecResult::from(output))
    }

    fn which(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }
}

/// Cloneable, debuggable handle to a shared [`Executor`].
#[derive(Clone)]
pub struct ExecutorHandle(Arc<dyn Executor>);

impl ExecutorHandle {
    /// Wrap an executor.
    #[must_use]
    pub fn new(executor: impl Executor + 'static) -> Self {
        Self(Arc::new(executor))
    }

    /// Handle backed by [`SystemExecutor`].
    #[must_use]
    pub fn system() -> Self {
        Self::new(SystemExecutor)
    }
}

impl std::ops::Deref for ExecutorHandle {
    type Target = dyn Executor;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl fmt::Debug for ExecutorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorHandle").finish_non_exhaustive()
    }
}
