//! Test doubles shared by unit tests

use crate::error::{CtError, CtResult};
use crate::process::{Executor, Invocation, ProcessOutput, RunOptions};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Inspect output of a typical recipe
pub const INSPECT_JSON: &str = r#"{
    "name": "ConanTools",
    "version": "0.1.1-post7+ga21edb7f08",
    "url": "https://github.com/niosHD/ConanTools",
    "homepage": null,
    "license": "MIT",
    "generators": ["txt"],
    "build_policy": "missing",
    "settings": null
}"#;

#[derive(Default)]
struct MockState {
    invocations: Vec<Invocation>,
    prepared: Vec<PathBuf>,
    exit_code: i32,
    queued: VecDeque<i32>,
    inspect_json: String,
    inspect_by_path: HashMap<String, String>,
    inspect_calls: usize,
    inspect_failures: VecDeque<i32>,
    generated: Option<(String, String)>,
}

/// Executor that records invocations instead of spawning processes.
///
/// Directory creation is skipped, `inspect --json <file>` writes the canned
/// metadata to `<file>` unless a failure is queued for it, and every other
/// command returns the next queued exit code (or the default one).
pub struct MockExecutor {
    state: Mutex<MockState>,
}

impl MockExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockState {
                inspect_json: INSPECT_JSON.to_string(),
                ..MockState::default()
            }),
        })
    }

    pub fn set_exit_code(&self, code: i32) {
        self.state.lock().unwrap().exit_code = code;
    }

    /// Exit code for the next non-inspect command only
    pub fn push_exit_code(&self, code: i32) {
        self.state.lock().unwrap().queued.push_back(code);
    }

    pub fn set_inspect_json(&self, json: &str) {
        self.state.lock().unwrap().inspect_json = json.to_string();
    }

    /// Fail the next `inspect` call with `code`, writing nothing
    pub fn fail_next_inspect(&self, code: i32) {
        self.state.lock().unwrap().inspect_failures.push_back(code);
    }

    /// Inspect output for one recipe path only
    pub fn set_inspect_json_for(&self, recipe: &str, json: &str) {
        self.state
            .lock()
            .unwrap()
            .inspect_by_path
            .insert(recipe.to_string(), json.to_string());
    }

    /// File written into the working directory of every `install` call
    pub fn set_generated_file(&self, name: &str, contents: &str) {
        self.state.lock().unwrap().generated = Some((name.to_string(), contents.to_string()));
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.state.lock().unwrap().invocations.clone()
    }

    /// Invocations other than metadata inspection
    pub fn commands(&self) -> Vec<Invocation> {
        self.invocations()
            .into_iter()
            .filter(|i| i.args.first().map(String::as_str) != Some("inspect"))
            .collect()
    }

    /// Arguments of each non-inspect invocation joined by spaces
    pub fn command_args(&self) -> Vec<String> {
        self.commands().iter().map(|i| i.args.join(" ")).collect()
    }

    pub fn traces(&self) -> Vec<String> {
        self.commands().iter().map(ToString::to_string).collect()
    }

    pub fn inspect_calls(&self) -> usize {
        self.state.lock().unwrap().inspect_calls
    }

    pub fn prepared_dirs(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().prepared.clone()
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn prepare_dir(&self, dir: &Path) -> CtResult<()> {
        self.state.lock().unwrap().prepared.push(dir.to_path_buf());
        Ok(())
    }

    async fn execute(
        &self,
        invocation: &Invocation,
        _options: &RunOptions,
    ) -> CtResult<ProcessOutput> {
        let mut state = self.state.lock().unwrap();
        state.invocations.push(invocation.clone());

        if invocation.args.first().map(String::as_str) == Some("inspect") {
            state.inspect_calls += 1;
            if let Some(code) = state.inspect_failures.pop_front() {
                return Ok(ProcessOutput {
                    exit_code: Some(code),
                    stdout: Some(String::new()),
                    stderr: Some(String::new()),
                });
            }
            let json = invocation
                .args
                .get(1)
                .and_then(|recipe| state.inspect_by_path.get(recipe))
                .unwrap_or(&state.inspect_json);
            if let Some(target) = invocation.args.get(3) {
                std::fs::write(target, json)
                    .map_err(|e| CtError::io("writing mock inspect output", e))?;
            }
            return Ok(ProcessOutput {
                exit_code: Some(0),
                stdout: None,
                stderr: None,
            });
        }

        let exit_code = state.queued.pop_front().unwrap_or(state.exit_code);
        if exit_code == 0 && invocation.args.first().map(String::as_str) == Some("install") {
            if let Some((name, contents)) = &state.generated {
                std::fs::write(invocation.cwd.join(name), contents)
                    .map_err(|e| CtError::io("writing mock generated file", e))?;
            }
        }

        Ok(ProcessOutput {
            exit_code: Some(exit_code),
            stdout: None,
            stderr: None,
        })
    }
}
