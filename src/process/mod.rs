//! Process runner for external tool invocations
//!
//! Every external command goes through [`ProcessRunner::run`], which makes
//! sure the working directory exists, prints a reproducible trace line
//! (`[<cwd>] $ <command>`) and turns non-zero exits into
//! [`CtError::ExternalCommandFailed`] when checking is enabled.

mod executor;

pub use executor::{Executor, SystemExecutor};

use crate::error::{CtError, CtResult};
use crate::paths;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// POSIX single-quote escaping: replace `'` with `'\''`.
pub fn shell_escape(s: &str) -> String {
    s.replace('\'', "'\\''")
}

/// Quote a single token for a POSIX shell.
///
/// Tokens made only of characters a shell never interprets are returned
/// unchanged so traces stay readable.
pub fn quote(token: &str) -> String {
    if token.is_empty() {
        return "''".to_string();
    }
    let safe = token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./_-".contains(c));
    if safe {
        token.to_string()
    } else {
        format!("'{}'", shell_escape(token))
    }
}

/// Quote and join a token list into one shell command line.
pub fn quote_command<S: AsRef<str>>(tokens: &[S]) -> String {
    tokens
        .iter()
        .map(|t| quote(t.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// A fully resolved external command: program, arguments and working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to execute
    pub program: String,
    /// Arguments passed to the program
    pub args: Vec<String>,
    /// Absolute working directory
    pub cwd: PathBuf,
}

impl Invocation {
    /// The quoted command line (program followed by its arguments)
    pub fn command_line(&self) -> String {
        let mut tokens = Vec::with_capacity(self.args.len() + 1);
        tokens.push(self.program.as_str());
        tokens.extend(self.args.iter().map(String::as_str));
        quote_command(&tokens)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] $ {}", self.cwd.display(), self.command_line())
    }
}

/// Output handling for a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Capture stdout instead of streaming it to the terminal
    pub capture_stdout: bool,
    /// Capture stderr instead of streaming it to the terminal
    pub capture_stderr: bool,
    /// Fail on a non-zero exit code
    pub check: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            capture_stdout: false,
            capture_stderr: false,
            check: true,
        }
    }
}

impl RunOptions {
    /// Stream output and fail on non-zero exit
    pub fn checked() -> Self {
        Self::default()
    }

    /// Stream output and report non-zero exit codes as a normal result
    pub fn unchecked() -> Self {
        Self {
            check: false,
            ..Self::default()
        }
    }

    /// Capture both streams and fail on non-zero exit
    pub fn captured() -> Self {
        Self {
            capture_stdout: true,
            capture_stderr: true,
            check: true,
        }
    }
}

/// Result of a finished external command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    /// Trimmed stdout, present only when captured
    pub stdout: Option<String>,
    /// Trimmed stderr, present only when captured
    pub stderr: Option<String>,
}

impl ProcessOutput {
    /// Whether the process exited with code 0
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs external commands through an [`Executor`]
#[derive(Clone)]
pub struct ProcessRunner {
    executor: Arc<dyn Executor>,
}

impl ProcessRunner {
    /// Create a runner that spawns real processes
    pub fn new() -> Self {
        Self::with_executor(Arc::new(SystemExecutor))
    }

    /// Create a runner on top of a custom executor
    pub fn with_executor(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }

    /// Run `program args...` in `cwd` (current directory when `None`).
    pub async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: Option<&Path>,
        options: RunOptions,
    ) -> CtResult<ProcessOutput> {
        let base = paths::current_dir()?;
        let cwd = match cwd {
            Some(dir) => paths::absolutize(dir, &base),
            None => base,
        };
        self.executor.prepare_dir(&cwd).await?;

        let invocation = Invocation {
            program: program.to_string(),
            args: args.to_vec(),
            cwd,
        };

        println!("{}", invocation);
        std::io::stdout().flush().ok();

        let output = self.executor.execute(&invocation, &options).await?;
        debug!("Command exited with {:?}", output.exit_code);

        if options.check && !output.success() {
            if let Some(stdout) = &output.stdout {
                println!("{}", stdout);
            }
            if let Some(stderr) = &output.stderr {
                eprintln!("{}", stderr);
            }
            let command = invocation.command_line();
            return Err(match output.exit_code {
                Some(exit_code) => CtError::ExternalCommandFailed { command, exit_code },
                None => CtError::ProcessSignaled { command },
            });
        }

        Ok(output)
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}
