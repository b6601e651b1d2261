//! Package layouts
//!
//! A layout maps a recipe to the source, build and package folders used by
//! the local workflow. Two strategies exist:
//!
//! - [`RelativeLayout`]: folders next to the recipe (or under an explicit
//!   root), deterministic and side-effect free.
//! - [`TemporaryLayout`]: one fresh temporary directory per recipe, removed
//!   when the layout is dropped or closed.
//!
//! Recipes without external sources always use their own directory as
//! source folder.

use crate::error::{CtError, CtResult};
use crate::paths;
use crate::recipe::Recipe;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Default source subdirectory
pub const DEFAULT_SRC_DIR: &str = "_source";
/// Default build subdirectory
pub const DEFAULT_BUILD_DIR: &str = "_build";
/// Default package subdirectory
pub const DEFAULT_PKG_DIR: &str = "_install";

/// Subdirectory names below a layout root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutDirs {
    pub src_dir: String,
    pub build_dir: String,
    pub pkg_dir: String,
}

impl Default for LayoutDirs {
    fn default() -> Self {
        Self {
            src_dir: DEFAULT_SRC_DIR.to_string(),
            build_dir: DEFAULT_BUILD_DIR.to_string(),
            pkg_dir: DEFAULT_PKG_DIR.to_string(),
        }
    }
}

/// Folders relative to the recipe location or an explicit root.
///
/// Without a root, the recipe directory (moved by `offset`, if any) is the
/// layout root. With a root, the offset defaults to the package name so one
/// layout can serve several recipes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelativeLayout {
    pub root: Option<PathBuf>,
    pub offset: Option<PathBuf>,
    pub dirs: LayoutDirs,
}

impl RelativeLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_offset(mut self, offset: impl Into<PathBuf>) -> Self {
        self.offset = Some(offset.into());
        self
    }

    pub fn with_dirs(mut self, dirs: LayoutDirs) -> Self {
        self.dirs = dirs;
        self
    }

    async fn root(&self, recipe: &Recipe) -> CtResult<PathBuf> {
        let root = match &self.root {
            None => {
                let dir = recipe.directory().ok_or_else(|| CtError::NoRecipeDirectory {
                    recipe: recipe.path().to_path_buf(),
                })?;
                let offset = self.offset.clone().unwrap_or_else(|| PathBuf::from("."));
                dir.join(offset)
            }
            Some(root) => {
                let offset = match &self.offset {
                    Some(offset) => offset.clone(),
                    None => PathBuf::from(recipe.field_string("name").await?),
                };
                root.join(offset)
            }
        };
        Ok(paths::normalize(&root))
    }
}

/// One temporary directory per recipe, alive as long as the layout
#[derive(Debug, Default)]
pub struct TemporaryLayout {
    pub dirs: LayoutDirs,
    allocated: Mutex<HashMap<PathBuf, TempDir>>,
}

impl TemporaryLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dirs(dirs: LayoutDirs) -> Self {
        Self {
            dirs,
            allocated: Mutex::default(),
        }
    }

    fn lookup(&self, recipe: &Recipe) -> Option<PathBuf> {
        self.allocated
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(recipe.path())
            .map(|dir| dir.path().to_path_buf())
    }

    async fn root(&self, recipe: &Recipe) -> CtResult<PathBuf> {
        if let Some(root) = self.lookup(recipe) {
            return Ok(root);
        }

        let name = recipe.field_string("name").await?;
        let dir = tempfile::Builder::new()
            .prefix("ct-")
            .suffix(&format!("-{}", name))
            .tempdir()
            .map_err(|e| CtError::io(format!("creating temporary layout for {}", name), e))?;
        debug!("Allocated {} for {}", dir.path().display(), recipe.path().display());

        let mut allocated = self.allocated.lock().unwrap_or_else(PoisonError::into_inner);
        let dir = allocated.entry(recipe.path().to_path_buf()).or_insert(dir);
        Ok(dir.path().to_path_buf())
    }

    /// Number of directories currently allocated
    pub fn allocated(&self) -> usize {
        self.allocated.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Remove every allocated directory, reporting the first failure.
    ///
    /// Dropping the layout removes them as well but ignores errors.
    pub fn close(self) -> CtResult<()> {
        let allocated = self
            .allocated
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);

        let mut first_error = None;
        for (recipe, dir) in allocated {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!("Failed to remove {} ({}): {}", path.display(), recipe.display(), e);
                first_error.get_or_insert(CtError::io(format!("removing {}", path.display()), e));
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Folder layout strategy
#[derive(Debug)]
pub enum Layout {
    Relative(RelativeLayout),
    Temporary(TemporaryLayout),
}

impl Default for Layout {
    fn default() -> Self {
        Self::Relative(RelativeLayout::default())
    }
}

impl From<RelativeLayout> for Layout {
    fn from(layout: RelativeLayout) -> Self {
        Self::Relative(layout)
    }
}

impl From<TemporaryLayout> for Layout {
    fn from(layout: TemporaryLayout) -> Self {
        Self::Temporary(layout)
    }
}

impl Layout {
    fn dirs(&self) -> &LayoutDirs {
        match self {
            Self::Relative(layout) => &layout.dirs,
            Self::Temporary(layout) => &layout.dirs,
        }
    }

    /// Root directory holding the folders of `recipe`
    pub async fn root(&self, recipe: &Recipe) -> CtResult<PathBuf> {
        match self {
            Self::Relative(layout) => layout.root(recipe).await,
            Self::Temporary(layout) => layout.root(recipe).await,
        }
    }

    /// Source folder: below the root for external sources, else the recipe directory
    pub async fn src_folder(&self, recipe: &Recipe) -> CtResult<PathBuf> {
        if recipe.external_source() {
            Ok(self.root(recipe).await?.join(&self.dirs().src_dir))
        } else {
            recipe
                .directory()
                .map(Path::to_path_buf)
                .ok_or_else(|| CtError::MissingSourceFolder {
                    recipe: recipe.path().to_path_buf(),
                })
        }
    }

    pub async fn build_folder(&self, recipe: &Recipe) -> CtResult<PathBuf> {
        Ok(self.root(recipe).await?.join(&self.dirs().build_dir))
    }

    pub async fn pkg_folder(&self, recipe: &Recipe) -> CtResult<PathBuf> {
        Ok(self.root(recipe).await?.join(&self.dirs().pkg_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conan::{BuildDefaults, Conan};
    use crate::testing::MockExecutor;
    use std::sync::Arc;

    fn conan(mock: &Arc<MockExecutor>) -> Conan {
        Conan::with_executor("conan", BuildDefaults::default(), mock.clone())
    }

    #[tokio::test]
    async fn relative_defaults_to_recipe_directory() {
        let mock = MockExecutor::new();
        let recipe = Recipe::new(conan(&mock), "/tmp/foobar.py").unwrap();
        let layout = Layout::default();

        assert_eq!(layout.root(&recipe).await.unwrap(), PathBuf::from("/tmp"));
        assert_eq!(layout.src_folder(&recipe).await.unwrap(), PathBuf::from("/tmp"));
        assert_eq!(layout.build_folder(&recipe).await.unwrap(), PathBuf::from("/tmp/_build"));
        assert_eq!(layout.pkg_folder(&recipe).await.unwrap(), PathBuf::from("/tmp/_install"));
        assert_eq!(mock.inspect_calls(), 0);
    }

    #[tokio::test]
    async fn relative_is_idempotent() {
        let mock = MockExecutor::new();
        let recipe = Recipe::new(conan(&mock), "/tmp/foobar.py")
            .unwrap()
            .with_external_source(true);
        let layout = Layout::default();

        let first = layout.build_folder(&recipe).await.unwrap();
        let second = layout.build_folder(&recipe).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(layout.src_folder(&recipe).await.unwrap(), PathBuf::from("/tmp/_source"));
    }

    #[tokio::test]
    async fn relative_dir_rename_changes_only_that_folder() {
        let mock = MockExecutor::new();
        let recipe = Recipe::new(conan(&mock), "/tmp/foobar.py")
            .unwrap()
            .with_external_source(true);
        let default = Layout::default();
        let renamed = Layout::from(RelativeLayout::new().with_dirs(LayoutDirs {
            build_dir: "out".to_string(),
            ..LayoutDirs::default()
        }));

        assert_eq!(renamed.build_folder(&recipe).await.unwrap(), PathBuf::from("/tmp/out"));
        assert_eq!(
            renamed.src_folder(&recipe).await.unwrap(),
            default.src_folder(&recipe).await.unwrap()
        );
        assert_eq!(
            renamed.pkg_folder(&recipe).await.unwrap(),
            default.pkg_folder(&recipe).await.unwrap()
        );
    }

    #[tokio::test]
    async fn relative_offset_moves_root() {
        let mock = MockExecutor::new();
        let recipe = Recipe::new(conan(&mock), "/work/pkg/conanfile.py").unwrap();
        let layout = Layout::from(RelativeLayout::new().with_offset("../build"));

        assert_eq!(
            layout.build_folder(&recipe).await.unwrap(),
            PathBuf::from("/work/build/_build")
        );
    }

    #[tokio::test]
    async fn relative_root_uses_package_name_as_offset() {
        let mock = MockExecutor::new();
        let recipe = Recipe::new(conan(&mock), "/src/foobar.py").unwrap();
        let layout = Layout::from(RelativeLayout::new().with_root("/builds"));

        assert_eq!(
            layout.build_folder(&recipe).await.unwrap(),
            PathBuf::from("/builds/ConanTools/_build")
        );
        assert_eq!(layout.src_folder(&recipe).await.unwrap(), PathBuf::from("/src"));
    }

    #[tokio::test]
    async fn missing_recipe_directory_has_no_source_folder() {
        let mock = MockExecutor::new();
        let recipe = Recipe::new(conan(&mock), "/").unwrap();
        let err = Layout::default().src_folder(&recipe).await.unwrap_err();
        assert!(matches!(err, CtError::MissingSourceFolder { .. }));

        let err = Layout::default().build_folder(&recipe).await.unwrap_err();
        assert!(matches!(err, CtError::NoRecipeDirectory { .. }));
    }

    #[tokio::test]
    async fn temporary_allocates_once_per_recipe() {
        let mock = MockExecutor::new();
        let conan = conan(&mock);
        let first = Recipe::new(conan.clone(), "/a/foobar.py")
            .unwrap()
            .with_external_source(true);
        let second = Recipe::new(conan, "/b/foobar.py").unwrap();
        let layout = Layout::from(TemporaryLayout::new());

        let root = layout.root(&first).await.unwrap();
        assert!(root.is_dir());
        assert_eq!(layout.root(&first).await.unwrap(), root);
        assert_eq!(layout.src_folder(&first).await.unwrap(), root.join("_source"));

        let other = layout.root(&second).await.unwrap();
        assert_ne!(other, root);
        assert_eq!(layout.src_folder(&second).await.unwrap(), PathBuf::from("/b"));

        drop(layout);
        assert!(!root.exists());
        assert!(!other.exists());
    }

    #[tokio::test]
    async fn temporary_close_removes_directories() {
        let mock = MockExecutor::new();
        let recipe = Recipe::new(conan(&mock), "/a/foobar.py").unwrap();
        let layout = TemporaryLayout::new();

        let root = layout.root(&recipe).await.unwrap();
        assert_eq!(layout.allocated(), 1);
        assert!(root.file_name().unwrap().to_string_lossy().ends_with("-ConanTools"));

        layout.close().unwrap();
        assert!(!root.exists());
    }
}
