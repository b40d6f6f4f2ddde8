//! External command execution.
//!
//! Everything debrel does ends in a child process. Configured commands are
//! templates run through `sh -c` after `{var}` interpolation; fixed tools
//! (`git`, `ssh`, `scp`) are spawned directly with an argument vector.

use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from running an external command.
#[derive(Error, Debug)]
pub enum ShellError {
    /// The command could not be spawned at all.
    #[error("failed to execute `{command}`: {source}")]
    Exec {
        /// The command line that was attempted.
        command: String,
        /// Spawn error.
        source: std::io::Error,
    },

    /// The command exited with a non-zero status.
    #[error("`{command}` failed: {stderr}")]
    Failed {
        /// The command line that failed.
        command: String,
        /// Exit code, if the process was not killed by a signal.
        exit_code: Option<i32>,
        /// Captured stderr, trimmed.
        stderr: String,
    },
}

/// Result alias for command execution.
pub type ShellResult<T> = Result<T, ShellError>;

/// Variables substituted into command templates.
///
/// Each `{name}` occurrence is replaced by its value; unknown placeholders
/// are left untouched.
#[derive(Debug, Clone, Default)]
pub struct Vars<'a> {
    pairs: Vec<(&'a str, String)>,
}

impl<'a> Vars<'a> {
    /// An empty variable set.
    pub const fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Add a variable.
    #[must_use]
    pub fn with(mut self, name: &'a str, value: impl Into<String>) -> Self {
        self.pairs.push((name, value.into()));
        self
    }

    /// Replace `{var}` placeholders in `template`.
    pub fn interpolate(&self, template: &str) -> String {
        self.pairs
            .iter()
            .fold(template.to_string(), |acc, (name, value)| {
                acc.replace(&format!("{{{name}}}"), value)
            })
    }
}

/// Run a command template through `sh -c` and return its stdout.
#[instrument(skip(vars), fields(%cwd))]
pub fn run_template(template: &str, vars: &Vars<'_>, cwd: &Utf8Path) -> ShellResult<String> {
    let command = vars.interpolate(template);
    debug!(%command, "running shell command");

    let mut cmd = Command::new("sh");
    cmd.args(["-c", &command]).current_dir(cwd.as_std_path());
    capture(cmd, command)
}

/// Spawn `program` with `args` directly and return its stdout.
pub fn run_program(program: &str, args: &[&str], cwd: &Utf8Path) -> ShellResult<String> {
    let command = render(program, args);
    debug!(%command, %cwd, "running program");

    let mut cmd = Command::new(program);
    cmd.args(args).current_dir(cwd.as_std_path());
    capture(cmd, command)
}

/// Local tools the release workflow shells out to.
pub const REQUIRED_TOOLS: &[&str] = &["git", "gbp", "dh_listpackages", "make", "ssh", "scp"];

/// Where a required tool was found on `PATH`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolStatus {
    /// Binary name.
    pub name: &'static str,
    /// Resolved path, `None` when missing.
    pub path: Option<Utf8PathBuf>,
}

/// Look up every entry of [`REQUIRED_TOOLS`].
pub fn required_tools() -> Vec<ToolStatus> {
    REQUIRED_TOOLS
        .iter()
        .map(|&name| ToolStatus {
            name,
            path: which::which(name)
                .ok()
                .and_then(|p| Utf8PathBuf::from_path_buf(p).ok()),
        })
        .collect()
}

fn capture(mut cmd: Command, command: String) -> ShellResult<String> {
    let output = cmd.output().map_err(|source| ShellError::Exec {
        command: command.clone(),
        source,
    })?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        Err(ShellError::Failed {
            command,
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

fn render(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}
