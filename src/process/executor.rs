//! Process executor abstraction
//!
//! The runner never spawns processes itself. It hands a resolved
//! [`Invocation`] to an [`Executor`], which allows the real tokio-based
//! implementation to be swapped for a recording one in tests.

use crate::error::{CtError, CtResult};
use crate::process::{Invocation, ProcessOutput, RunOptions};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Abstract process executor interface
#[async_trait]
pub trait Executor: Send + Sync {
    /// Make sure the working directory exists (including parents)
    async fn prepare_dir(&self, dir: &Path) -> CtResult<()> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| CtError::io(format!("creating directory {}", dir.display()), e))
    }

    /// Run the invocation to completion
    async fn execute(
        &self,
        invocation: &Invocation,
        options: &RunOptions,
    ) -> CtResult<ProcessOutput>;
}

/// Executor that spawns real child processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

fn stdio(capture: bool) -> Stdio {
    if capture {
        Stdio::piped()
    } else {
        Stdio::inherit()
    }
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

#[async_trait]
impl Executor for SystemExecutor {
    async fn execute(
        &self,
        invocation: &Invocation,
        options: &RunOptions,
    ) -> CtResult<ProcessOutput> {
        debug!("Executing: {} {:?}", invocation.program, invocation.args);

        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdin(Stdio::inherit())
            .stdout(stdio(options.capture_stdout))
            .stderr(stdio(options.capture_stderr))
            .output()
            .await
            .map_err(|e| CtError::spawn(invocation.command_line(), e))?;

        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stdout: options.capture_stdout.then(|| decode(&output.stdout)),
            stderr: options.capture_stderr.then(|| decode(&output.stderr)),
        })
    }
}
