//! Workspace command - build several recipes as one editable workspace

use crate::cli::args::WorkspaceArgs;
use crate::cli::commands::recipe::{release_layout, select_layout};
use crate::conan::Conan;
use crate::config::Config;
use crate::error::CtResult;
use crate::paths;
use crate::recipe::Recipe;
use crate::workspace::Workspace;
use console::style;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Member paths in order, each with its external-source flag
fn members(args: &WorkspaceArgs, cwd: &Path) -> Vec<(PathBuf, bool)> {
    let external: Vec<PathBuf> = args
        .external
        .iter()
        .map(|p| paths::absolutize(p, cwd))
        .collect();

    let mut members: Vec<(PathBuf, bool)> = args
        .recipes
        .iter()
        .map(|p| {
            let path = paths::absolutize(p, cwd);
            let is_external = external.contains(&path);
            (path, is_external)
        })
        .collect();

    for path in external {
        if !members.iter().any(|(member, _)| *member == path) {
            members.push((path, true));
        }
    }
    members
}

/// Execute the workspace command
pub async fn execute(args: WorkspaceArgs, config: &Config) -> CtResult<()> {
    let cwd = paths::current_dir()?;
    let conan = Conan::from_config(config);
    let layout = select_layout(config, args.layout);

    let recipes = members(&args, &cwd)
        .into_iter()
        .map(|(path, external)| {
            Arc::new(
                Recipe::in_dir(conan.clone(), path, &cwd)
                    .with_external_source(external)
                    .with_layout(layout.clone()),
            )
        })
        .collect::<Vec<_>>();
    let workspace = Workspace::new(conan, recipes);

    let exported = workspace
        .create_local(
            &args.user,
            &args.channel,
            args.build_folder.as_deref(),
            &args.build.build_args(),
            args.pkg_folder.as_deref(),
            args.script || config.build.write_scripts,
        )
        .await?;

    let count = workspace.recipes().len();
    drop(workspace);
    release_layout(layout)?;

    for reference in &exported {
        println!("{}", reference);
    }
    eprintln!("{} {} package(s)", style("Built").green().bold(), count);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::{Cli, Commands};
    use clap::Parser;

    fn parse(argv: &[&str]) -> WorkspaceArgs {
        match Cli::parse_from(argv).command {
            Commands::Workspace(args) => args,
            _ => panic!("expected Workspace command"),
        }
    }

    #[test]
    fn external_members_are_flagged_or_appended() {
        let args = parse(&[
            "ct", "workspace", "a/conanfile.py", "b/conanfile.py", "-u", "u", "-c", "c",
            "--external", "b/conanfile.py", "--external", "/x/conanfile.py",
        ]);

        assert_eq!(
            members(&args, Path::new("/ws")),
            vec![
                (PathBuf::from("/ws/a/conanfile.py"), false),
                (PathBuf::from("/ws/b/conanfile.py"), true),
                (PathBuf::from("/x/conanfile.py"), true),
            ]
        );
    }
}
