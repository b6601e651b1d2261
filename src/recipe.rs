//! Recipes and their build lifecycle
//!
//! A [`Recipe`] points at a conanfile and knows how to drive it through
//! conan, either in one `create` call (cache-based workflow) or step by step
//! (`install` -> `source` -> `build` -> `package` -> `export-pkg`) into the
//! folders of a [`Layout`] (local workflow).
//!
//! Recipe metadata is read once via `conan inspect` and cached for the
//! lifetime of the recipe. [`RecipeRegistry`] memoizes recipes per path so
//! repeated lookups share that cache.

use crate::conan::{BuildArgs, Conan};
use crate::error::{CtError, CtResult};
use crate::import::ImportFile;
use crate::layout::Layout;
use crate::paths;
use crate::process::RunOptions;
use crate::reference::Reference;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;
use tracing::{debug, info};

fn arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// User, channel and optional name/version overrides for a recipe reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceRequest {
    pub user: String,
    pub channel: String,
    pub name: Option<String>,
    pub version: Option<String>,
}

impl ReferenceRequest {
    pub fn new(user: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            channel: channel.into(),
            name: None,
            version: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// Folder overrides and side effects of the local workflow steps
#[derive(Debug, Clone, Default)]
pub struct StepOptions {
    /// Layout used instead of the recipe's own
    pub layout: Option<Arc<Layout>>,
    pub src_folder: Option<PathBuf>,
    pub build_folder: Option<PathBuf>,
    pub pkg_folder: Option<PathBuf>,
    /// Working directory of `create` and `export-pkg`
    pub cwd: Option<PathBuf>,
    /// Write a `ct_<step>.sh` reproduction script into the layout root
    pub write_script: bool,
}

impl StepOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layout(mut self, layout: Arc<Layout>) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn src_folder(mut self, dir: impl Into<PathBuf>) -> Self {
        self.src_folder = Some(dir.into());
        self
    }

    pub fn build_folder(mut self, dir: impl Into<PathBuf>) -> Self {
        self.build_folder = Some(dir.into());
        self
    }

    pub fn pkg_folder(mut self, dir: impl Into<PathBuf>) -> Self {
        self.pkg_folder = Some(dir.into());
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn write_script(mut self, enabled: bool) -> Self {
        self.write_script = enabled;
        self
    }
}

/// A conanfile plus its source and layout policy
#[derive(Debug)]
pub struct Recipe {
    conan: Conan,
    path: PathBuf,
    external_source: bool,
    layout: Arc<Layout>,
    metadata: OnceCell<Map<String, Value>>,
}

impl Recipe {
    /// Create a recipe, resolving a relative `path` against the current directory
    pub fn new(conan: Conan, path: impl AsRef<Path>) -> CtResult<Self> {
        let base = paths::current_dir()?;
        Ok(Self::in_dir(conan, path, &base))
    }

    /// Create a recipe, resolving a relative `path` against `cwd`
    pub fn in_dir(conan: Conan, path: impl AsRef<Path>, cwd: &Path) -> Self {
        Self {
            conan,
            path: paths::absolutize(path.as_ref(), cwd),
            external_source: false,
            layout: Arc::new(Layout::default()),
            metadata: OnceCell::new(),
        }
    }

    /// Mark the sources as fetched by the recipe instead of living next to it
    pub fn with_external_source(mut self, external_source: bool) -> Self {
        self.external_source = external_source;
        self
    }

    pub fn with_layout(mut self, layout: Arc<Layout>) -> Self {
        self.layout = layout;
        self
    }

    /// Absolute path of the conanfile
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the conanfile
    pub fn directory(&self) -> Option<&Path> {
        self.path.parent()
    }

    pub fn external_source(&self) -> bool {
        self.external_source
    }

    pub fn layout(&self) -> &Arc<Layout> {
        &self.layout
    }

    /// All metadata fields, inspecting the recipe on first use
    pub async fn metadata(&self) -> CtResult<&Map<String, Value>> {
        self.metadata.get_or_try_init(|| self.inspect()).await
    }

    async fn inspect(&self) -> CtResult<Map<String, Value>> {
        // Removed when dropped, on success and on error.
        let scratch = tempfile::Builder::new()
            .prefix("ct-inspect-")
            .suffix(".json")
            .tempfile()
            .map_err(|e| CtError::io("creating inspect scratch file", e))?
            .into_temp_path();

        let args = vec![
            "inspect".to_string(),
            arg(&self.path),
            "--json".to_string(),
            arg(&scratch),
        ];
        self.conan.run_with(&args, None, RunOptions::captured()).await?;

        let content = tokio::fs::read_to_string(&scratch)
            .await
            .map_err(|e| CtError::io(format!("reading {}", scratch.display()), e))?;
        let fields: Map<String, Value> = serde_json::from_str(&content)?;
        debug!("Inspected {} ({} fields)", self.path.display(), fields.len());
        Ok(fields)
    }

    /// A single metadata field
    pub async fn field(&self, name: &str) -> CtResult<&Value> {
        self.metadata()
            .await?
            .get(name)
            .ok_or_else(|| CtError::FieldNotFound {
                field: name.to_string(),
            })
    }

    /// A metadata field rendered as text; `null` counts as missing
    pub async fn field_string(&self, name: &str) -> CtResult<String> {
        match self.field(name).await? {
            Value::String(s) => Ok(s.clone()),
            Value::Null => Err(CtError::FieldNotFound {
                field: name.to_string(),
            }),
            other => Ok(other.to_string()),
        }
    }

    /// Reference of the package built from this recipe
    pub async fn reference(&self, request: &ReferenceRequest) -> CtResult<Reference> {
        let name = match request.name.as_deref().filter(|s| !s.is_empty()) {
            Some(name) => name.to_string(),
            None => self.field_string("name").await?,
        };
        let version = match request.version.as_deref().filter(|s| !s.is_empty()) {
            Some(version) => version.to_string(),
            None => self.field_string("version").await?,
        };
        Ok(Reference::new(name, version, &request.user, &request.channel))
    }

    fn layout_for<'a>(&'a self, steps: &'a StepOptions) -> &'a Layout {
        steps.layout.as_deref().unwrap_or(self.layout.as_ref())
    }

    async fn src_folder_for(&self, steps: &StepOptions) -> CtResult<PathBuf> {
        match &steps.src_folder {
            Some(dir) => Ok(dir.clone()),
            None => self.layout_for(steps).src_folder(self).await,
        }
    }

    async fn build_folder_for(&self, steps: &StepOptions) -> CtResult<PathBuf> {
        match &steps.build_folder {
            Some(dir) => Ok(dir.clone()),
            None => self.layout_for(steps).build_folder(self).await,
        }
    }

    async fn pkg_folder_for(&self, steps: &StepOptions) -> CtResult<PathBuf> {
        match &steps.pkg_folder {
            Some(dir) => Ok(dir.clone()),
            None => self.layout_for(steps).pkg_folder(self).await,
        }
    }

    async fn run_step(
        &self,
        step: &str,
        args: &[String],
        cwd: Option<&Path>,
        steps: &StepOptions,
    ) -> CtResult<()> {
        if steps.write_script {
            let root = self.layout_for(steps).root(self).await?;
            self.conan.write_script(&root, step, args, cwd).await?;
        }
        self.conan.run(args, cwd).await?;
        Ok(())
    }

    /// `conan install <recipe>` into the build folder
    pub async fn install(&self, args: &BuildArgs, steps: &StepOptions) -> CtResult<()> {
        let build_folder = self.build_folder_for(steps).await?;
        let args = self.conan.build_args("install", &[arg(&self.path)], args);
        info!("Installing dependencies of {}", self.path.display());
        self.run_step("install", &args, Some(&build_folder), steps).await
    }

    /// `conan source` into the source folder (external sources only)
    pub async fn source(&self, steps: &StepOptions) -> CtResult<()> {
        let src_folder = self.src_folder_for(steps).await?;
        let build_folder = self.build_folder_for(steps).await?;
        let args = vec![
            "source".to_string(),
            arg(&self.path),
            format!("--source-folder={}", arg(&src_folder)),
        ];
        self.run_step("source", &args, Some(&build_folder), steps).await
    }

    async fn folder_step(&self, step: &str, steps: &StepOptions) -> CtResult<()> {
        let src_folder = self.src_folder_for(steps).await?;
        let build_folder = self.build_folder_for(steps).await?;
        let pkg_folder = self.pkg_folder_for(steps).await?;
        let args = vec![
            step.to_string(),
            arg(&self.path),
            format!("--source-folder={}", arg(&src_folder)),
            format!("--package-folder={}", arg(&pkg_folder)),
        ];
        self.run_step(step, &args, Some(&build_folder), steps).await
    }

    /// `conan build` in the build folder
    pub async fn build(&self, steps: &StepOptions) -> CtResult<()> {
        self.folder_step("build", steps).await
    }

    /// `conan package` from the build folder into the package folder
    pub async fn package(&self, steps: &StepOptions) -> CtResult<()> {
        self.folder_step("package", steps).await
    }

    /// `conan export-pkg` of the package folder; never builds or contacts a remote
    pub async fn export_pkg(
        &self,
        request: &ReferenceRequest,
        args: &BuildArgs,
        steps: &StepOptions,
    ) -> CtResult<Reference> {
        let pkg_folder = self.pkg_folder_for(steps).await?;
        let reference = self.reference(request).await?;
        let args = BuildArgs {
            remotes: Vec::new(),
            build: Some(Vec::new()),
            ..args.clone()
        };
        let args = self.conan.build_args(
            "export-pkg",
            &[
                arg(&self.path),
                reference.to_string(),
                format!("--package-folder={}", arg(&pkg_folder)),
            ],
            &args,
        );
        self.run_step("export-pkg", &args, steps.cwd.as_deref(), steps).await?;
        Ok(reference)
    }

    /// `conan export` of the recipe
    pub async fn export(&self, request: &ReferenceRequest) -> CtResult<Reference> {
        let reference = self.reference(request).await?;
        let args = vec!["export".to_string(), arg(&self.path), reference.to_string()];
        self.conan.run(&args, None).await?;
        Ok(reference)
    }

    /// `conan create`: build the package inside the conan cache
    pub async fn create(
        &self,
        request: &ReferenceRequest,
        args: &BuildArgs,
        cwd: Option<&Path>,
    ) -> CtResult<Reference> {
        let reference = self.reference(request).await?;
        let args = self
            .conan
            .build_args("create", &[arg(&self.path), reference.to_string()], args);
        info!("Creating {}", reference);
        self.conan.run(&args, cwd).await?;
        Ok(reference)
    }

    /// Build the package step by step in the layout folders, then export it.
    ///
    /// `export-pkg` runs in `steps.cwd`, or the build folder when unset.
    /// Earlier steps are not rolled back when a later one fails.
    pub async fn create_local(
        &self,
        request: &ReferenceRequest,
        args: &BuildArgs,
        steps: &StepOptions,
    ) -> CtResult<Reference> {
        self.install(args, steps).await?;
        if self.external_source {
            self.source(steps).await?;
        }
        self.build(steps).await?;
        self.package(steps).await?;

        let mut export_steps = steps.clone();
        if export_steps.cwd.is_none() {
            export_steps.cwd = Some(self.build_folder_for(steps).await?);
        }
        self.export_pkg(request, args, &export_steps).await
    }

    /// Dispatch to [`Recipe::create_local`] or [`Recipe::create`]
    pub async fn create_with(
        &self,
        request: &ReferenceRequest,
        args: &BuildArgs,
        steps: &StepOptions,
        local: bool,
    ) -> CtResult<Reference> {
        if local {
            self.create_local(request, args, steps).await
        } else {
            self.create(request, args, steps.cwd.as_deref()).await
        }
    }

    /// Import the package content into `pkg_folder`, building it first if
    /// no prebuilt package can be installed.
    pub async fn import(
        &self,
        request: &ReferenceRequest,
        args: &BuildArgs,
        pkg_folder: &Path,
        steps: &StepOptions,
        local: bool,
    ) -> CtResult<Reference> {
        let reference = self.reference(request).await?;
        let mut import = ImportFile::scratch()?;
        import.add_package(reference.clone());

        let import_args = BuildArgs {
            build: Some(Vec::new()),
            ..args.clone()
        };

        match import.install(&self.conan, &import_args, Some(pkg_folder)).await {
            Ok(()) => return Ok(reference),
            Err(CtError::ExternalCommandFailed { .. }) => {
                info!("No prebuilt {}, building it", reference);
            }
            Err(e) => return Err(e),
        }

        self.create_with(request, args, steps, local).await?;
        import.install(&self.conan, &import_args, Some(pkg_folder)).await?;
        Ok(reference)
    }
}

/// Memoizes one [`Recipe`] per absolute conanfile path
#[derive(Debug)]
pub struct RecipeRegistry {
    conan: Conan,
    recipes: Mutex<HashMap<PathBuf, Arc<Recipe>>>,
}

impl RecipeRegistry {
    pub fn new(conan: Conan) -> Self {
        Self {
            conan,
            recipes: Mutex::default(),
        }
    }

    /// Shared recipe for `path` (resolved against `cwd` or the current directory)
    pub fn get(&self, path: &Path, cwd: Option<&Path>) -> CtResult<Arc<Recipe>> {
        let path = self.resolve(path, cwd)?;
        if !path.exists() {
            return Err(CtError::RecipeNotFound(path));
        }
        Ok(self.entry(path))
    }

    /// Metadata field of the recipe at `path`, `None` if the file does not exist
    pub async fn field(
        &self,
        path: &Path,
        field: &str,
        cwd: Option<&Path>,
    ) -> CtResult<Option<Value>> {
        let path = self.resolve(path, cwd)?;
        if !path.exists() {
            return Ok(None);
        }
        let recipe = self.entry(path);
        let value = recipe.field(field).await?.clone();
        Ok(Some(value))
    }

    /// Number of cached recipes
    pub fn len(&self) -> usize {
        self.recipes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn resolve(&self, path: &Path, cwd: Option<&Path>) -> CtResult<PathBuf> {
        let base = match cwd {
            Some(dir) => dir.to_path_buf(),
            None => paths::current_dir()?,
        };
        Ok(paths::absolutize(path, &base))
    }

    fn entry(&self, path: PathBuf) -> Arc<Recipe> {
        let mut recipes = self.recipes.lock().unwrap_or_else(PoisonError::into_inner);
        recipes
            .entry(path.clone())
            .or_insert_with(|| Arc::new(Recipe::in_dir(self.conan.clone(), &path, Path::new("/"))))
            .clone()
    }
}
