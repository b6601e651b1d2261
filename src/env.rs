//! Execution environment of installed packages
//!
//! Packages export environment variables (`deps_env_info`) through the json
//! generator. [`PackageEnv`] collects them for a set of references and runs
//! commands with the merged environment.

use crate::conan::{BuildArgs, Conan};
use crate::error::{CtError, CtResult};
use crate::import::render_ini;
use crate::process::quote_command;
use crate::reference::Reference;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Separator of list-valued variables such as `PATH`
#[cfg(windows)]
pub const PATH_SEPARATOR: &str = ";";
#[cfg(not(windows))]
pub const PATH_SEPARATOR: &str = ":";

const BUILD_INFO_FILE: &str = "conanbuildinfo.json";

/// Environment exported by a set of packages
#[derive(Debug, Clone)]
pub struct PackageEnv {
    conan: Conan,
    references: Vec<Reference>,
    profiles: Option<Vec<String>>,
}

impl PackageEnv {
    pub fn new(conan: Conan, references: Vec<Reference>) -> Self {
        Self {
            conan,
            references,
            profiles: None,
        }
    }

    /// Profiles used to install the packages (`None` = conan defaults)
    pub fn with_profiles(mut self, profiles: Vec<String>) -> Self {
        self.profiles = Some(profiles);
        self
    }

    fn conanfile(&self) -> String {
        let requires = self.references.iter().map(ToString::to_string).collect();
        render_ini(&[("requires", requires), ("generators", vec!["json".to_string()])])
    }

    /// Install the packages in a scratch directory and return their `deps_env_info`.
    ///
    /// Missing binaries are never built.
    pub async fn env_info(&self) -> CtResult<Map<String, Value>> {
        let scratch = tempfile::Builder::new()
            .prefix("ct-exec-")
            .tempdir()
            .map_err(|e| CtError::io("creating exec scratch directory", e))?;
        let conanfile = scratch.path().join("conanfile.txt");
        tokio::fs::write(&conanfile, self.conanfile())
            .await
            .map_err(|e| CtError::io(format!("writing {}", conanfile.display()), e))?;

        let args = BuildArgs {
            profiles: self.profiles.clone(),
            build: Some(Vec::new()),
            ..BuildArgs::default()
        };
        let args = self
            .conan
            .build_args("install", &[conanfile.to_string_lossy().into_owned()], &args);
        self.conan.run(&args, Some(scratch.path())).await?;

        let info_path = scratch.path().join(BUILD_INFO_FILE);
        let content = tokio::fs::read_to_string(&info_path)
            .await
            .map_err(|e| CtError::io(format!("reading {}", info_path.display()), e))?;
        let mut info: Map<String, Value> = serde_json::from_str(&content)?;

        match info.remove("deps_env_info") {
            Some(Value::Object(env)) => Ok(env),
            Some(Value::Null) | None => Ok(Map::new()),
            Some(_) => Err(CtError::FieldNotFound {
                field: "deps_env_info".to_string(),
            }),
        }
    }

    /// Process environment extended with the packages' variables
    pub async fn environment(&self) -> CtResult<BTreeMap<String, String>> {
        let mut env: BTreeMap<String, String> = std::env::vars_os()
            .map(|(k, v)| (k.to_string_lossy().into_owned(), v.to_string_lossy().into_owned()))
            .collect();
        merge_env_info(&mut env, &self.env_info().await?);
        Ok(env)
    }

    /// Run `command` in `cwd` with the package environment, returning its exit code
    pub async fn exec(&self, command: &[String], cwd: &Path) -> CtResult<i32> {
        let env = self.environment().await?;
        run_in_env(command, &env, cwd).await
    }
}

/// Merge exported variables into `env`.
///
/// Lists are joined with [`PATH_SEPARATOR`] and prepended to an existing
/// value; scalars replace it.
pub fn merge_env_info(env: &mut BTreeMap<String, String>, info: &Map<String, Value>) {
    for (key, value) in info {
        let value = match value {
            Value::Array(items) => {
                let mut parts: Vec<String> = items.iter().map(scalar).collect();
                if let Some(existing) = env.get(key) {
                    parts.push(existing.clone());
                }
                parts.join(PATH_SEPARATOR)
            }
            other => scalar(other),
        };
        debug!("{}={}", key, value);
        env.insert(key.clone(), value);
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Spawn `command` with exactly `env` and inherited stdio
pub async fn run_in_env(
    command: &[String],
    env: &BTreeMap<String, String>,
    cwd: &Path,
) -> CtResult<i32> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| CtError::InvalidOption("empty command".to_string()))?;
    let line = quote_command(command);
    info!("[{}] $ {}", cwd.display(), line);

    let status = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .env_clear()
        .envs(env)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|e| CtError::spawn(line.clone(), e))?;

    status
        .code()
        .ok_or(CtError::ProcessSignaled { command: line })
}
