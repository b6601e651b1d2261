//! Configuration management for conan-tools

pub mod schema;

pub use schema::{BuildConfig, ConanConfig, Config, LayoutConfig, LayoutKind};

use crate::error::{CtError, CtResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Name of the project-local config file
pub const LOCAL_CONFIG_FILE: &str = ".ct.toml";

/// Environment variable overriding `conan.command`
pub const ENV_CONAN_CMD: &str = "CT_CONAN_CMD";

/// Environment variable overriding `build.create_local`
pub const ENV_CREATE_LOCAL: &str = "CT_CREATE_LOCAL";

/// Interpret a boolean flag; anything outside the falsy set counts as true
pub fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "off" | "no" | "n" | "f"
    )
}

impl Config {
    /// Apply `CT_CONAN_CMD` and `CT_CREATE_LOCAL` from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(command) = lookup(ENV_CONAN_CMD).filter(|c| !c.is_empty()) {
            debug!("{} overrides conan command: {}", ENV_CONAN_CMD, command);
            self.conan.command = command;
        }
        if let Some(flag) = lookup(ENV_CREATE_LOCAL) {
            self.build.create_local = parse_flag(&flag);
        }
    }
}

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("conan-tools")
            .join("config.toml")
    }

    /// Find the nearest `.ct.toml` in `start` or one of its ancestors
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(LOCAL_CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Load configuration, falling back to defaults if the file does not exist
    pub async fn load(&self) -> CtResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> CtResult<Config> {
        let content = read_file(path).await?;
        toml::from_str(&content).map_err(|e| CtError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Load the global config with `local` deep-merged over it
    pub async fn load_merged(&self, local: Option<&Path>) -> CtResult<Config> {
        let Some(local) = local else {
            return self.load().await;
        };

        let mut merged = if self.config_path.exists() {
            parse_table(&self.config_path).await?
        } else {
            toml::Value::Table(toml::map::Map::new())
        };
        merge_values(&mut merged, parse_table(local).await?);
        debug!("Merged local config {}", local.display());

        merged.try_into().map_err(|e: toml::de::Error| CtError::ConfigInvalid {
            path: local.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> CtResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            CtError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> CtResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| CtError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_file(path: &Path) -> CtResult<String> {
    fs::read_to_string(path)
        .await
        .map_err(|e| CtError::io(format!("reading config from {}", path.display()), e))
}

async fn parse_table(path: &Path) -> CtResult<toml::Value> {
    let content = read_file(path).await?;
    content
        .parse::<toml::Table>()
        .map(toml::Value::Table)
        .map_err(|e| CtError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Merge `overlay` into `base`: tables recursively, everything else replaced
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nonexistent.toml");
        let manager = ConfigManager::with_path(path);

        let config = manager.load().await.unwrap();
        assert_eq!(config.conan.command, "conan");
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");
        let manager = ConfigManager::with_path(path);

        let mut config = Config::default();
        config.conan.command = "/opt/conan/bin/conan".to_string();
        config.build.write_scripts = true;

        manager.save(&config).await.unwrap();
        let loaded = manager.load().await.unwrap();

        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn invalid_file_is_reported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[build]\nprofiles = 3\n").unwrap();

        let err = ConfigManager::with_path(path).load().await.unwrap_err();
        assert!(matches!(err, CtError::ConfigInvalid { .. }));
    }

    #[tokio::test]
    async fn local_config_merges_over_global() {
        let temp = TempDir::new().unwrap();
        let global = temp.path().join("config.toml");
        std::fs::write(
            &global,
            concat!(
                "[build]\nprofiles = [\"gcc.p\"]\nwrite_scripts = true\n\n",
                "[layout]\nbuild_dir = \"out\"\n",
            ),
        )
        .unwrap();
        let local = temp.path().join(LOCAL_CONFIG_FILE);
        std::fs::write(&local, "[build]\nprofiles = [\"clang.p\"]\n").unwrap();

        let config = ConfigManager::with_path(global)
            .load_merged(Some(&local))
            .await
            .unwrap();

        assert_eq!(config.build.profiles, ["clang.p"]);
        assert!(config.build.write_scripts);
        assert_eq!(config.layout.build_dir, "out");
    }

    #[tokio::test]
    async fn local_config_without_global() {
        let temp = TempDir::new().unwrap();
        let local = temp.path().join(LOCAL_CONFIG_FILE);
        std::fs::write(&local, "[layout]\nkind = \"temporary\"\n").unwrap();

        let config = ConfigManager::with_path(temp.path().join("missing.toml"))
            .load_merged(Some(&local))
            .await
            .unwrap();
        assert_eq!(config.layout.kind, LayoutKind::Temporary);
    }

    #[test]
    fn find_local_config_walks_up() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(ConfigManager::find_local_config(&nested), None);

        std::fs::write(temp.path().join(LOCAL_CONFIG_FILE), "").unwrap();
        assert_eq!(
            ConfigManager::find_local_config(&nested),
            Some(temp.path().join(LOCAL_CONFIG_FILE))
        );
    }

    #[test]
    fn flags_use_falsy_set() {
        for value in ["0", "false", "OFF", "no", "N", "f", " False "] {
            assert!(!parse_flag(value), "{value} should be false");
        }
        for value in ["1", "true", "yes", "on", "anything"] {
            assert!(parse_flag(value), "{value} should be true");
        }
    }

    #[test]
    fn env_overrides() {
        let env: HashMap<&str, &str> =
            HashMap::from([(ENV_CONAN_CMD, "/usr/local/bin/conan"), (ENV_CREATE_LOCAL, "yes")]);
        let mut config = Config::default();
        config.apply_env_with(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.conan.command, "/usr/local/bin/conan");
        assert!(config.build.create_local);

        config.apply_env_with(|key| (key == ENV_CREATE_LOCAL).then(|| "off".to_string()));
        assert!(!config.build.create_local);
        assert_eq!(config.conan.command, "/usr/local/bin/conan");
    }

    #[test]
    #[serial]
    fn env_overrides_from_process() {
        std::env::set_var(ENV_CONAN_CMD, "/env/conan");
        std::env::set_var(ENV_CREATE_LOCAL, "1");
        let mut config = Config::default();
        config.apply_env();
        std::env::remove_var(ENV_CONAN_CMD);
        std::env::remove_var(ENV_CREATE_LOCAL);

        assert_eq!(config.conan.command, "/env/conan");
        assert!(config.build.create_local);
    }
}
