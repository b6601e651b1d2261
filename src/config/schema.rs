//! Configuration schema for conan-tools
//!
//! Configuration is stored at `~/.config/conan-tools/config.toml`, optionally
//! overlaid by a project-local `.ct.toml`.

use crate::conan::{BuildDefaults, DEFAULT_CONAN_CMD};
use crate::layout::{
    Layout, LayoutDirs, RelativeLayout, TemporaryLayout, DEFAULT_BUILD_DIR, DEFAULT_PKG_DIR,
    DEFAULT_SRC_DIR,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// External tool settings
    pub conan: ConanConfig,

    /// Build defaults
    pub build: BuildConfig,

    /// Folder layout of the local workflow
    pub layout: LayoutConfig,
}

/// External tool settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConanConfig {
    /// Program name or path of the conan executable
    pub command: String,
}

impl Default for ConanConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_CONAN_CMD.to_string(),
        }
    }
}

/// Build defaults applied when a call does not specify them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Fallback profiles
    pub profiles: Vec<String>,

    /// Fallback build tokens (empty: "outdated")
    pub policy: Vec<String>,

    /// Build step by step in the layout folders instead of the conan cache
    pub create_local: bool,

    /// Write a companion shell script for every lifecycle step
    pub write_scripts: bool,
}

/// Layout strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    /// Folders next to the recipe or below a root
    #[default]
    Relative,
    /// A fresh temporary directory per recipe
    Temporary,
}

/// Folder layout settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub kind: LayoutKind,

    /// Common root (relative layouts only)
    pub root: Option<PathBuf>,

    /// Offset below the recipe directory or the root (relative layouts only)
    pub offset: Option<PathBuf>,

    pub src_dir: String,
    pub build_dir: String,
    pub pkg_dir: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            kind: LayoutKind::Relative,
            root: None,
            offset: None,
            src_dir: DEFAULT_SRC_DIR.to_string(),
            build_dir: DEFAULT_BUILD_DIR.to_string(),
            pkg_dir: DEFAULT_PKG_DIR.to_string(),
        }
    }
}

impl LayoutConfig {
    fn dirs(&self) -> LayoutDirs {
        LayoutDirs {
            src_dir: self.src_dir.clone(),
            build_dir: self.build_dir.clone(),
            pkg_dir: self.pkg_dir.clone(),
        }
    }

    /// Build a layout of `kind` with the configured folder names
    pub fn build(&self, kind: LayoutKind) -> Layout {
        match kind {
            LayoutKind::Relative => {
                let mut layout = RelativeLayout::new().with_dirs(self.dirs());
                layout.root = self.root.clone();
                layout.offset = self.offset.clone();
                layout.into()
            }
            LayoutKind::Temporary => TemporaryLayout::with_dirs(self.dirs()).into(),
        }
    }
}

impl Config {
    /// Fallback profiles and build policy for the conan handle
    pub fn build_defaults(&self) -> BuildDefaults {
        BuildDefaults {
            profiles: self.build.profiles.clone(),
            build: self.build.policy.clone(),
        }
    }

    /// The configured layout
    pub fn layout(&self) -> Layout {
        self.layout.build(self.layout.kind)
    }
}
