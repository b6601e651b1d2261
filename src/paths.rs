//! Lexical path helpers
//!
//! Paths handed to conan are compared and printed verbatim, so they are
//! normalized lexically (no symlink resolution, no filesystem access).

use crate::error::{CtError, CtResult};
use std::path::{Component, Path, PathBuf};

/// Collapse `.` and `..` components without touching the filesystem.
///
/// `..` at the root stays at the root, matching POSIX `normpath` semantics
/// for absolute paths.
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                let at_root = normalized.parent().is_none() && normalized.has_root();
                let ends_in_parent = matches!(
                    normalized.components().next_back(),
                    Some(Component::ParentDir) | None
                );
                if at_root {
                    // "/.." is "/"
                } else if ends_in_parent {
                    normalized.push("..");
                } else {
                    normalized.pop();
                }
            }
            Component::Normal(c) => normalized.push(c),
        }
    }

    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}

/// Resolve `path` against `base` (when relative) and normalize the result.
pub fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&base.join(path))
    }
}

/// Current working directory of the process
pub fn current_dir() -> CtResult<PathBuf> {
    std::env::current_dir().map_err(|e| CtError::io("getting current directory", e))
}
