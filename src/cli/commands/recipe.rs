//! Recipe commands - inspect, create, export and import

use crate::cli::args::{CreateArgs, ExportArgs, ImportArgs, InspectArgs, WorkflowOpts};
use crate::conan::Conan;
use crate::config::{Config, LayoutKind};
use crate::error::{CtError, CtResult};
use crate::layout::Layout;
use crate::recipe::{Recipe, StepOptions};
use console::style;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Layout selected on the command line, else the configured one
pub(crate) fn select_layout(config: &Config, kind: Option<LayoutKind>) -> Arc<Layout> {
    let layout = match kind {
        Some(kind) => config.layout.build(kind),
        None => config.layout(),
    };
    Arc::new(layout)
}

/// Remove temporary layout folders once the last recipe using them is gone
pub(crate) fn release_layout(layout: Arc<Layout>) -> CtResult<()> {
    match Arc::try_unwrap(layout) {
        Ok(Layout::Temporary(layout)) => layout.close(),
        Ok(Layout::Relative(_)) => Ok(()),
        Err(_) => {
            debug!("Layout still shared, removal deferred to drop");
            Ok(())
        }
    }
}

fn open_recipe(
    conan: Conan,
    path: &Path,
    workflow: &WorkflowOpts,
    layout: Arc<Layout>,
) -> CtResult<Recipe> {
    Ok(Recipe::new(conan, path)?
        .with_external_source(workflow.external_source)
        .with_layout(layout))
}

fn steps(config: &Config, workflow: &WorkflowOpts) -> StepOptions {
    StepOptions::new().write_script(workflow.script || config.build.write_scripts)
}

/// Execute the inspect command
///
/// Stdout also carries the `[cwd] $ conan inspect ...` trace; `--output`
/// writes the bare JSON to a file instead.
pub async fn inspect(args: InspectArgs, config: &Config) -> CtResult<()> {
    let recipe = Recipe::new(Conan::from_config(config), &args.recipe)?;
    let metadata = recipe.metadata().await?;

    let selected = if args.fields.is_empty() {
        metadata.clone()
    } else {
        let mut selected = Map::new();
        for field in &args.fields {
            let value = metadata.get(field).ok_or_else(|| CtError::FieldNotFound {
                field: field.clone(),
            })?;
            selected.insert(field.clone(), value.clone());
        }
        selected
    };

    let json = serde_json::to_string_pretty(&Value::Object(selected))?;
    match &args.output {
        Some(path) => {
            tokio::fs::write(path, format!("{}\n", json))
                .await
                .map_err(|e| CtError::io(format!("writing {}", path.display()), e))?;
            debug!("Wrote metadata to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Execute the create command
pub async fn create(args: CreateArgs, config: &Config) -> CtResult<()> {
    let layout = select_layout(config, args.workflow.layout);
    let recipe = open_recipe(
        Conan::from_config(config),
        &args.recipe,
        &args.workflow,
        layout.clone(),
    )?;
    let local = args.workflow.local || config.build.create_local;

    let reference = recipe
        .create_with(
            &args.identity.request(),
            &args.build.build_args(),
            &steps(config, &args.workflow),
            local,
        )
        .await?;

    drop(recipe);
    release_layout(layout)?;

    eprintln!("{} {}", style("Created").green().bold(), reference);
    println!("{}", reference);
    Ok(())
}

/// Execute the export command
pub async fn export(args: ExportArgs, config: &Config) -> CtResult<()> {
    let recipe = Recipe::new(Conan::from_config(config), &args.recipe)?;
    let reference = recipe.export(&args.identity.request()).await?;
    println!("{}", reference);
    Ok(())
}

/// Execute the import command
pub async fn import(args: ImportArgs, config: &Config) -> CtResult<()> {
    let layout = select_layout(config, args.workflow.layout);
    let recipe = open_recipe(
        Conan::from_config(config),
        &args.recipe,
        &args.workflow,
        layout.clone(),
    )?;
    let local = args.workflow.local || config.build.create_local;

    let reference = recipe
        .import(
            &args.identity.request(),
            &args.build.build_args(),
            &args.pkg_folder,
            &steps(config, &args.workflow),
            local,
        )
        .await?;

    drop(recipe);
    release_layout(layout)?;

    eprintln!(
        "{} {} into {}",
        style("Imported").green().bold(),
        reference,
        args.pkg_folder.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockExecutor;

    #[test]
    fn select_layout_prefers_command_line() {
        let config = Config::default();
        assert!(matches!(*select_layout(&config, None), Layout::Relative(_)));
        assert!(matches!(
            *select_layout(&config, Some(LayoutKind::Temporary)),
            Layout::Temporary(_)
        ));
    }

    #[tokio::test]
    async fn release_layout_removes_temporary_folders() {
        let mock = MockExecutor::new();
        let conan = Conan::with_executor("conan", Default::default(), mock.clone());
        let layout = select_layout(&Config::default(), Some(LayoutKind::Temporary));
        let recipe = Recipe::new(conan, "/a/conanfile.py")
            .unwrap()
            .with_layout(layout.clone());

        let root = layout.root(&recipe).await.unwrap();
        assert!(root.exists());

        drop(recipe);
        release_layout(layout).unwrap();
        assert!(!root.exists());
    }
}
