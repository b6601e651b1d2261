//! Package import files
//!
//! An [`ImportFile`] is a generated `conanfile.txt` that requires a set of
//! packages and copies their whole content into the install folder.

use crate::conan::{BuildArgs, Conan};
use crate::error::{CtError, CtResult};
use crate::reference::Reference;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::debug;

/// Render INI sections whose entries are bare keys without values
pub(crate) fn render_ini<S: AsRef<str>>(sections: &[(S, Vec<String>)]) -> String {
    let mut out = String::new();
    for (name, entries) in sections {
        out.push('[');
        out.push_str(name.as_ref());
        out.push_str("]\n");
        for entry in entries {
            out.push_str(entry);
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

enum Location {
    /// Removed when the import file is dropped
    Scratch(TempPath),
    Kept(PathBuf),
}

/// Generated conanfile importing complete packages
pub struct ImportFile {
    location: Location,
    packages: IndexMap<String, Reference>,
}

impl ImportFile {
    /// Import file in a scratch location
    pub fn scratch() -> CtResult<Self> {
        let path = tempfile::Builder::new()
            .prefix("ct-import-")
            .suffix(".txt")
            .tempfile()
            .map_err(|e| CtError::io("creating import file", e))?
            .into_temp_path();
        Ok(Self {
            location: Location::Scratch(path),
            packages: IndexMap::new(),
        })
    }

    /// Import file at `path`, left in place afterwards
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            location: Location::Kept(path.into()),
            packages: IndexMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        match &self.location {
            Location::Scratch(path) => &**path,
            Location::Kept(path) => path,
        }
    }

    /// Add a package; a later package with the same name replaces the earlier one
    pub fn add_package(&mut self, reference: Reference) {
        self.packages.insert(reference.name().to_string(), reference);
    }

    pub fn render(&self) -> String {
        let requires = self.packages.values().map(ToString::to_string).collect();
        let imports = self
            .packages
            .keys()
            .map(|name| format!("., * -> . @ root_package={}", name))
            .collect();
        render_ini(&[("requires", requires), ("imports", imports)])
    }

    /// Write the file and run `conan install` on it in `cwd`
    pub async fn install(
        &self,
        conan: &Conan,
        args: &BuildArgs,
        cwd: Option<&Path>,
    ) -> CtResult<()> {
        let path = self.path();
        tokio::fs::write(path, self.render())
            .await
            .map_err(|e| CtError::io(format!("writing import file {}", path.display()), e))?;
        debug!("Importing {} package(s) via {}", self.packages.len(), path.display());

        let args = conan.build_args("install", &[path.to_string_lossy().into_owned()], args);
        conan.run(&args, cwd).await?;
        Ok(())
    }
}
