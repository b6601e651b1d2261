//! Error types for conan-tools
//!
//! All modules use `CtResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for conan-tools operations
pub type CtResult<T> = Result<T, CtError>;

/// All errors that can occur in conan-tools
#[derive(Error, Debug)]
pub enum CtError {
    // External tool errors
    #[error("Executing command \"{command}\" failed! (returncode={exit_code})")]
    ExternalCommandFailed { command: String, exit_code: i32 },

    #[error("Command \"{command}\" was terminated by a signal")]
    ProcessSignaled { command: String },

    #[error("Failed to start command \"{command}\": {source}")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // Recipe errors
    #[error("Field not found in recipe metadata: {field}")]
    FieldNotFound { field: String },

    #[error("Cannot determine a source folder for recipe {}", recipe.display())]
    MissingSourceFolder { recipe: PathBuf },

    #[error("Recipe {} has no parent directory to derive a layout root from", recipe.display())]
    NoRecipeDirectory { recipe: PathBuf },

    #[error("Recipe not found: {}", .0.display())]
    RecipeNotFound(PathBuf),

    #[error("Invalid reference \"{0}\", expected name/version@user/channel")]
    InvalidReference(String),

    #[error("Invalid option \"{0}\", expected KEY=VALUE")]
    InvalidOption(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl CtError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a spawn error for a command that could not be started
    pub fn spawn(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandSpawn {
            command: command.into(),
            source,
        }
    }

    /// Exit code reported by a failed external command, if any
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::ExternalCommandFailed { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::CommandSpawn { .. } => {
                Some("Is conan installed? Set CT_CONAN_CMD or --conan-cmd to its path")
            }
            Self::InvalidReference(_) => Some("Example: zlib/1.2.13@user/stable"),
            Self::MissingSourceFolder { .. } => Some("Pass an explicit source folder"),
            Self::NoRecipeDirectory { .. } => {
                Some("Configure a layout root or pass explicit folders")
            }
            Self::ConfigInvalid { .. } => Some("Run: ct config show"),
            _ => None,
        }
    }
}
