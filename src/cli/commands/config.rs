//! Config command - show or initialize configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::CtResult;
use console::style;

/// Execute the config command
pub async fn execute(args: ConfigArgs, config: &Config, manager: &ConfigManager) -> CtResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => show_path(manager),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
    }

    Ok(())
}

fn show_config(config: &Config) -> CtResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn show_path(manager: &ConfigManager) {
    println!("{}", manager.path().display());
}

async fn init_config(manager: &ConfigManager, force: bool) -> CtResult<()> {
    let path = manager.path();

    if path.exists() && !force {
        eprintln!(
            "{} Config already exists at {}",
            style("!").yellow().bold(),
            path.display()
        );
        eprintln!("  {}", style("Use --force to overwrite").dim());
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    eprintln!(
        "{} Configuration initialized: {}",
        style("✓").green().bold(),
        path.display()
    );

    Ok(())
}
