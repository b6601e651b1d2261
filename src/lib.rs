//! conan-tools - scripting helpers for the conan package manager
//!
//! Models package references, recipe metadata, build folder layouts and
//! multi-recipe workspaces, and turns them into sequences of conan
//! invocations with a reproducible `[cwd] $ command` trace.

pub mod cli;
pub mod conan;
pub mod config;
pub mod env;
pub mod error;
pub mod import;
pub mod layout;
pub mod paths;
pub mod process;
pub mod recipe;
pub mod reference;
pub mod workspace;

#[cfg(test)]
mod testing;

pub use conan::{BuildArgs, BuildDefaults, Conan};
pub use error::{CtError, CtResult};
pub use layout::{Layout, LayoutDirs, RelativeLayout, TemporaryLayout};
pub use recipe::{Recipe, RecipeRegistry, ReferenceRequest, StepOptions};
pub use reference::{Reference, ReferenceOverrides};
pub use workspace::Workspace;
