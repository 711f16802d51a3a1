//! Subprocess execution
//!
//! Every external command cairn issues (clone, download, package install,
//! post-fetch hooks, the build engine itself) goes through [`CommandRunner`],
//! so callers can substitute a scripted runner in tests.

use crate::{FetchError, FetchResult};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::debug;

/// A program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory (inherited when unset)
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

impl ShellCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
        }
    }

    /// `sh -c <script>`
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("sh").arg("-c").arg(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Path argument, rendered lossily
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.display().to_string())
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Result of a finished process
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code (-1 when terminated by a signal)
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Capability to run a command to completion
pub trait CommandRunner {
    /// Run `command`; a non-zero exit is reported in the output, not as an error
    fn run(&self, command: &ShellCommand) -> FetchResult<CommandOutput>;

    /// Run `command` and fail on a non-zero exit
    fn run_checked(&self, command: &ShellCommand) -> FetchResult<CommandOutput> {
        let output = self.run(command)?;
        if !output.success() {
            return Err(FetchError::CommandFailed {
                command: command.to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, command: &ShellCommand) -> FetchResult<CommandOutput> {
        (**self).run(command)
    }
}

/// Runs commands with `std::process::Command`, capturing output
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &ShellCommand) -> FetchResult<CommandOutput> {
        debug!(command = %command, cwd = ?command.cwd, "running command");
        let start = Instant::now();

        let mut process = Command::new(&command.program);
        process
            .args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &command.cwd {
            process.current_dir(cwd);
        }

        let output = process
            .spawn()
            .and_then(|child| child.wait_with_output())
            .map_err(|e| FetchError::Spawn {
                command: command.to_string(),
                error: e.to_string(),
            })?;

        let result = CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            elapsed: start.elapsed(),
        };
        debug!(
            command = %command,
            exit_code = result.exit_code,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "command finished"
        );
        Ok(result)
    }
}
