//! Multi-recipe workspaces
//!
//! A [`Workspace`] builds several recipes as one editable session. Its
//! install step writes two descriptor files into the workspace build folder:
//!
//! - `layout.txt`: build and source folder of every package (INI)
//! - `ws.yml`: editable packages, the layout file and the root references
//!
//! and then runs `conan workspace install ws.yml`.

use crate::conan::{BuildArgs, Conan};
use crate::error::{CtError, CtResult};
use crate::import::render_ini;
use crate::paths;
use crate::recipe::{Recipe, ReferenceRequest, StepOptions};
use crate::reference::Reference;
use indexmap::IndexMap;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::info;

/// File name of the layout descriptor
pub const LAYOUT_FILE: &str = "layout.txt";
/// File name of the workspace descriptor
pub const WORKSPACE_FILE: &str = "ws.yml";

#[derive(Debug, Serialize)]
struct Editable {
    path: PathBuf,
}

#[derive(Debug, Serialize)]
struct WorkspaceFile {
    editables: IndexMap<String, Editable>,
    layout: String,
    root: Vec<String>,
}

/// Ordered set of recipes built together
#[derive(Debug, Clone)]
pub struct Workspace {
    conan: Conan,
    recipes: Vec<Arc<Recipe>>,
}

impl Workspace {
    pub fn new(conan: Conan, recipes: Vec<Arc<Recipe>>) -> Self {
        Self { conan, recipes }
    }

    pub fn recipes(&self) -> &[Arc<Recipe>] {
        &self.recipes
    }

    /// References of all members, in member order
    pub async fn references(&self, user: &str, channel: &str) -> CtResult<Vec<Reference>> {
        let request = ReferenceRequest::new(user, channel);
        let mut references = Vec::with_capacity(self.recipes.len());
        for recipe in &self.recipes {
            references.push(recipe.reference(&request).await?);
        }
        Ok(references)
    }

    async fn layout_file(&self, references: &[Reference]) -> CtResult<String> {
        let mut sections = Vec::with_capacity(references.len() * 2);
        for (recipe, reference) in self.recipes.iter().zip(references) {
            let layout = recipe.layout();
            let build_folder = layout.build_folder(recipe).await?;
            let src_folder = layout.src_folder(recipe).await?;
            sections.push((
                format!("{}:build_folder", reference),
                vec![build_folder.display().to_string()],
            ));
            sections.push((
                format!("{}:source_folder", reference),
                vec![src_folder.display().to_string()],
            ));
        }
        Ok(render_ini(&sections))
    }

    fn workspace_file(&self, references: &[Reference]) -> CtResult<String> {
        let mut editables = IndexMap::new();
        for (recipe, reference) in self.recipes.iter().zip(references) {
            let path = recipe
                .directory()
                .ok_or_else(|| CtError::MissingSourceFolder {
                    recipe: recipe.path().to_path_buf(),
                })?
                .to_path_buf();
            editables.insert(reference.to_string(), Editable { path });
        }

        let file = WorkspaceFile {
            editables,
            layout: LAYOUT_FILE.to_string(),
            root: references.iter().map(ToString::to_string).collect(),
        };
        Ok(serde_yaml::to_string(&file)?)
    }

    /// Write the descriptor files and run `conan workspace install` in
    /// `ws_build_folder` (default: the current directory), which is returned.
    pub async fn install(
        &self,
        user: &str,
        channel: &str,
        ws_build_folder: Option<&Path>,
        args: &BuildArgs,
        write_script: bool,
    ) -> CtResult<PathBuf> {
        let base = paths::current_dir()?;
        let ws_build_folder = match ws_build_folder {
            Some(dir) => paths::absolutize(dir, &base),
            None => base,
        };
        fs::create_dir_all(&ws_build_folder).await.map_err(|e| {
            CtError::io(
                format!("creating directory {}", ws_build_folder.display()),
                e,
            )
        })?;

        let references = self.references(user, channel).await?;

        let layout_path = ws_build_folder.join(LAYOUT_FILE);
        let layout = self.layout_file(&references).await?;
        fs::write(&layout_path, layout)
            .await
            .map_err(|e| CtError::io(format!("writing {}", layout_path.display()), e))?;

        let ws_path = ws_build_folder.join(WORKSPACE_FILE);
        let descriptor = self.workspace_file(&references)?;
        fs::write(&ws_path, descriptor)
            .await
            .map_err(|e| CtError::io(format!("writing {}", ws_path.display()), e))?;

        let mut command = vec!["workspace".to_string()];
        command.extend(
            self.conan
                .build_args("install", &[ws_path.to_string_lossy().into_owned()], args),
        );

        info!("Installing workspace of {} recipe(s)", self.recipes.len());
        if write_script {
            self.conan
                .write_script(&ws_build_folder, "ws-install", &command, Some(&ws_build_folder))
                .await?;
        }
        self.conan.run(&command, Some(&ws_build_folder)).await?;
        Ok(ws_build_folder)
    }

    /// Fetch sources of every member with external sources
    pub async fn source(&self, write_script: bool) -> CtResult<()> {
        let steps = StepOptions::new().write_script(write_script);
        for recipe in self.recipes.iter().filter(|r| r.external_source()) {
            recipe.source(&steps).await?;
        }
        Ok(())
    }

    /// Install, fetch sources, then build and package every member in list order.
    ///
    /// Members are exported with `export-pkg` unless they all share `pkg_folder`.
    pub async fn create_local(
        &self,
        user: &str,
        channel: &str,
        ws_build_folder: Option<&Path>,
        args: &BuildArgs,
        pkg_folder: Option<&Path>,
        write_script: bool,
    ) -> CtResult<Vec<Reference>> {
        self.install(user, channel, ws_build_folder, args, write_script)
            .await?;
        self.source(write_script).await?;

        let mut steps = StepOptions::new().write_script(write_script);
        steps.pkg_folder = pkg_folder.map(Path::to_path_buf);
        let request = ReferenceRequest::new(user, channel);

        let mut exported = Vec::new();
        for recipe in &self.recipes {
            recipe.build(&steps).await?;
            recipe.package(&steps).await?;
            if pkg_folder.is_none() {
                exported.push(recipe.export_pkg(&request, args, &steps).await?);
            }
        }
        Ok(exported)
    }
}
