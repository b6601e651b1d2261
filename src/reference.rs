//! Package references
//!
//! A [`Reference`] is the `name/version@user/channel` identity of a package.
//! It is a plain value; operations that talk to conan take the [`Conan`]
//! handle explicitly.

use crate::conan::{BuildArgs, Conan};
use crate::error::{CtError, CtResult};
use crate::process::RunOptions;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Identity of a package instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference {
    name: String,
    version: String,
    user: String,
    channel: String,
}

/// Field overrides for [`Reference::clone_with`] and [`Reference::create_alias`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceOverrides {
    pub name: Option<String>,
    pub version: Option<String>,
    pub user: Option<String>,
    pub channel: Option<String>,
}

impl ReferenceOverrides {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }
}

impl Reference {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        user: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            user: user.into(),
            channel: channel.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// New reference with some fields replaced; `self` is left untouched.
    ///
    /// Empty overrides keep the current value.
    pub fn clone_with(&self, overrides: &ReferenceOverrides) -> Self {
        fn pick(value: &Option<String>, current: &str) -> String {
            value
                .as_deref()
                .filter(|s| !s.is_empty())
                .unwrap_or(current)
                .to_string()
        }

        Self {
            name: pick(&overrides.name, &self.name),
            version: pick(&overrides.version, &self.version),
            user: pick(&overrides.user, &self.user),
            channel: pick(&overrides.channel, &self.channel),
        }
    }

    /// Whether the recipe is known to the local cache
    pub async fn exists_locally(&self, conan: &Conan) -> CtResult<bool> {
        let args = vec!["search".to_string(), self.to_string()];
        let output = conan.run_with(&args, None, RunOptions::unchecked()).await?;
        Ok(output.success())
    }

    /// Whether the recipe is known to `remote`
    pub async fn exists_on_remote(&self, conan: &Conan, remote: &str) -> CtResult<bool> {
        let args = vec![
            "search".to_string(),
            self.to_string(),
            "--remote".to_string(),
            remote.to_string(),
        ];
        let output = conan.run_with(&args, None, RunOptions::unchecked()).await?;
        Ok(output.success())
    }

    /// Download only the recipe, optionally from a specific remote
    pub async fn download_recipe(&self, conan: &Conan, remote: Option<&str>) -> CtResult<()> {
        let mut args = vec!["download".to_string(), self.to_string(), "--recipe".to_string()];
        if let Some(remote) = remote {
            args.push("--remote".to_string());
            args.push(remote.to_string());
        }
        conan.run(&args, None).await?;
        Ok(())
    }

    /// Install the package (and its dependencies) into `cwd`
    pub async fn install(
        &self,
        conan: &Conan,
        args: &BuildArgs,
        cwd: Option<&Path>,
    ) -> CtResult<()> {
        let args = conan.build_args("install", &[self.to_string()], args);
        conan.run(&args, cwd).await?;
        Ok(())
    }

    /// Associate the reference with `remote`
    pub async fn register_remote(&self, conan: &Conan, remote: &str) -> CtResult<()> {
        let args = vec![
            "remote".to_string(),
            "add_ref".to_string(),
            self.to_string(),
            remote.to_string(),
        ];
        conan.run(&args, None).await?;
        Ok(())
    }

    /// Create an alias pointing at this reference and return the alias
    pub async fn create_alias(
        &self,
        conan: &Conan,
        overrides: &ReferenceOverrides,
    ) -> CtResult<Reference> {
        let alias = self.clone_with(overrides);
        debug!("Aliasing {} as {}", self, alias);
        let args = vec!["alias".to_string(), alias.to_string(), self.to_string()];
        conan.run(&args, None).await?;
        Ok(alias)
    }

    /// Upload the recipe and all binaries to `remote`
    pub async fn upload_all(&self, conan: &Conan, remote: &str) -> CtResult<()> {
        let args = vec![
            "upload".to_string(),
            self.to_string(),
            "--remote".to_string(),
            remote.to_string(),
            "--all".to_string(),
            "-c".to_string(),
        ];
        conan.run(&args, None).await?;
        Ok(())
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}/{}", self.name, self.version, self.user, self.channel)
    }
}

impl FromStr for Reference {
    type Err = CtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CtError::InvalidReference(s.to_string());

        let (package, namespace) = s.split_once('@').ok_or_else(invalid)?;
        let (name, version) = package.split_once('/').ok_or_else(invalid)?;
        let (user, channel) = namespace.split_once('/').ok_or_else(invalid)?;

        let parts = [name, version, user, channel];
        if parts.iter().any(|p| p.is_empty() || p.contains(['/', '@'])) {
            return Err(invalid());
        }

        Ok(Self::new(name, version, user, channel))
    }
}
