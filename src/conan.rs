//! Conan tool handle and build argument formatting
//!
//! [`Conan`] bundles the external program name, the process runner and the
//! fallback build settings. It is cheap to clone and is shared by every
//! recipe, reference and workspace operation.

use crate::config::Config;
use crate::error::{CtError, CtResult};
use crate::paths;
use crate::process::{quote_command, Executor, ProcessOutput, ProcessRunner, RunOptions};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

/// Default external program
pub const DEFAULT_CONAN_CMD: &str = "conan";

/// Build policy used when neither the call nor the defaults name one
pub const DEFAULT_BUILD_POLICY: &str = "outdated";

/// Fallback profiles and build policy for calls that do not specify them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildDefaults {
    /// Profiles applied when a call passes none
    pub profiles: Vec<String>,
    /// Build tokens applied when a call passes none
    pub build: Vec<String>,
}

impl BuildDefaults {
    fn profiles(&self, explicit: Option<&Vec<String>>) -> Vec<String> {
        explicit.cloned().unwrap_or_else(|| self.profiles.clone())
    }

    fn build(&self, explicit: Option<&Vec<String>>) -> Vec<String> {
        match explicit {
            Some(build) => build.clone(),
            None if self.build.is_empty() => vec![DEFAULT_BUILD_POLICY.to_string()],
            None => self.build.clone(),
        }
    }
}

/// Profiles, build policy, remotes and options of a build-like command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildArgs {
    /// Remotes passed with `--remote`
    pub remotes: Vec<String>,
    /// Profiles passed with `--profile` (`None` = use defaults)
    pub profiles: Option<Vec<String>>,
    /// Build tokens passed with `--build` (`None` = use defaults)
    pub build: Option<Vec<String>>,
    /// Options passed with `-o key=value`, in insertion order
    pub options: IndexMap<String, String>,
}

impl BuildArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remote(mut self, remote: impl Into<String>) -> Self {
        self.remotes.push(remote.into());
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profiles.get_or_insert_with(Vec::new).push(profile.into());
        self
    }

    /// Add a build token; an empty token renders as a bare `--build`
    pub fn build_policy(mut self, token: impl Into<String>) -> Self {
        self.build.get_or_insert_with(Vec::new).push(token.into());
        self
    }

    /// Never build anything from source
    pub fn no_build(mut self) -> Self {
        self.build = Some(Vec::new());
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Flatten into `[subcommand, positional..., --profile p..., --build b...,
    /// --remote r..., -o k=v...]`.
    pub fn format(
        &self,
        subcommand: &str,
        positional: &[String],
        defaults: &BuildDefaults,
    ) -> Vec<String> {
        let mut args = vec![subcommand.to_string()];
        args.extend(positional.iter().cloned());

        for profile in defaults.profiles(self.profiles.as_ref()) {
            args.push("--profile".to_string());
            args.push(profile);
        }
        for token in defaults.build(self.build.as_ref()) {
            args.push("--build".to_string());
            if !token.is_empty() {
                args.push(token);
            }
        }
        for remote in &self.remotes {
            args.push("--remote".to_string());
            args.push(remote.clone());
        }
        for (key, value) in &self.options {
            args.push("-o".to_string());
            args.push(format!("{}={}", key, value));
        }

        args
    }
}

struct Inner {
    program: String,
    runner: ProcessRunner,
    defaults: BuildDefaults,
}

/// Handle to the external conan executable
#[derive(Clone)]
pub struct Conan {
    inner: Arc<Inner>,
}

impl fmt::Debug for Conan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conan")
            .field("program", &self.inner.program)
            .field("defaults", &self.inner.defaults)
            .finish()
    }
}

impl Conan {
    /// Create a handle that spawns `program`
    pub fn new(program: impl Into<String>, defaults: BuildDefaults) -> Self {
        Self::with_runner(program, defaults, ProcessRunner::new())
    }

    /// Create a handle on top of a custom executor
    pub fn with_executor(
        program: impl Into<String>,
        defaults: BuildDefaults,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self::with_runner(program, defaults, ProcessRunner::with_executor(executor))
    }

    fn with_runner(
        program: impl Into<String>,
        defaults: BuildDefaults,
        runner: ProcessRunner,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                program: program.into(),
                runner,
                defaults,
            }),
        }
    }

    /// Create a handle from the loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.conan.command.clone(), config.build_defaults())
    }

    /// Format build arguments against this handle's defaults
    pub fn build_args(
        &self,
        subcommand: &str,
        positional: &[String],
        args: &BuildArgs,
    ) -> Vec<String> {
        args.format(subcommand, positional, &self.inner.defaults)
    }

    /// Run a checked conan command with streamed output
    pub async fn run(&self, args: &[String], cwd: Option<&Path>) -> CtResult<ProcessOutput> {
        self.run_with(args, cwd, RunOptions::checked()).await
    }

    /// Run a conan command with explicit output handling
    pub async fn run_with(
        &self,
        args: &[String],
        cwd: Option<&Path>,
        options: RunOptions,
    ) -> CtResult<ProcessOutput> {
        self.inner.runner.run(&self.inner.program, args, cwd, options).await
    }

    /// Quoted command line for `conan args...`
    pub fn command_line(&self, args: &[String]) -> String {
        let mut tokens = vec![self.inner.program.clone()];
        tokens.extend(args.iter().cloned());
        quote_command(&tokens)
    }

    /// Write `ct_<basename>.sh` into `dir`, reproducing `conan args...`
    /// run from `cwd` with the current process environment.
    pub async fn write_script(
        &self,
        dir: &Path,
        basename: &str,
        args: &[String],
        cwd: Option<&Path>,
    ) -> CtResult<PathBuf> {
        let env: BTreeMap<String, String> = std::env::vars_os()
            .map(|(k, v)| (k.to_string_lossy().into_owned(), v.to_string_lossy().into_owned()))
            .collect();
        self.write_script_with_env(dir, basename, args, cwd, &env).await
    }

    /// Like [`Conan::write_script`] with an explicit environment
    pub async fn write_script_with_env(
        &self,
        dir: &Path,
        basename: &str,
        args: &[String],
        cwd: Option<&Path>,
        env: &BTreeMap<String, String>,
    ) -> CtResult<PathBuf> {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| CtError::io(format!("creating directory {}", dir.display()), e))?;

        let base = paths::current_dir()?;
        let cwd = match cwd {
            Some(dir) => paths::absolutize(dir, &base),
            None => base,
        };

        let mut script = String::from("#!/bin/sh\n");
        for (key, value) in env {
            script.push_str(&quote_command(&["export".to_string(), format!("{}={}", key, value)]));
            script.push('\n');
        }
        script.push_str(&quote_command(&["cd".to_string(), cwd.display().to_string()]));
        script.push('\n');
        script.push_str(&self.command_line(args));
        script.push('\n');

        let path = dir.join(format!("ct_{}.sh", basename));
        fs::write(&path, script)
            .await
            .map_err(|e| CtError::io(format!("writing script {}", path.display()), e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = fs::metadata(&path)
                .await
                .map_err(|e| CtError::io(format!("reading metadata of {}", path.display()), e))?;
            let mut mode = metadata.permissions().mode();
            // copy read bits to execute bits
            mode |= (mode & 0o444) >> 2;
            fs::set_permissions(&path, std::fs::Permissions::from_mode(mode))
                .await
                .map_err(|e| CtError::io(format!("setting permissions of {}", path.display()), e))?;
        }

        debug!("Wrote script {}", path.display());
        Ok(path)
    }
}
