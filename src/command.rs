//! External process execution.

use crate::{Error, Result};
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::process::{Command, Stdio};
use tracing::debug;

/// A program plus arguments, printable the way an operator would type it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<OsString>,
    pub capture_stdout: bool,
}

impl ShellCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            capture_stdout: true,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Let the child write to our stdout instead of capturing it.
    pub fn inherit_stdout(mut self) -> Self {
        self.capture_stdout = false;
        self
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            if arg.is_empty() || arg.contains(|c: char| c.is_whitespace() || c == '\'' || c == '"') {
                write!(f, " '{}'", arg.replace('\'', r"'\''"))?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    /// Human-readable exit status, e.g. `exit status: 1`.
    pub status: String,
    pub stdout: String,
    /// Copy of what the child wrote to stderr, already echoed to ours.
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            status: "exit status: 0".to_string(),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32) -> Self {
        Self {
            success: false,
            status: format!("exit status: {}", code),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }

    /// Exit status, followed by the child's stderr when it wrote any.
    pub fn failure_reason(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.status.clone()
        } else {
            format!("{}: {}", self.status, stderr)
        }
    }
}

/// Runs external programs on behalf of the copy strategies.
pub trait CommandRunner {
    /// Run to completion. A non-zero exit is reported through
    /// `CommandOutput::success`, not as an error; only failing to spawn
    /// the program is an error.
    fn run(&self, command: &ShellCommand) -> Result<CommandOutput>;
}

/// Spawns real processes. The child's stderr is echoed to ours once it
/// exits, and kept in the output.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, command: &ShellCommand) -> Result<CommandOutput> {
        debug!("Running: {}", command);

        let stdout = if command.capture_stdout {
            Stdio::piped()
        } else {
            Stdio::inherit()
        };

        let output = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| Error::Command {
                program: command.program.clone(),
                source,
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !stderr.is_empty() {
            eprint!("{}", stderr);
        }

        Ok(CommandOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr,
        })
    }
}
