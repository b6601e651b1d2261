//! ct - conan scripting helpers
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use conan_tools::cli::commands;
use conan_tools::cli::{Cli, Commands};
use conan_tools::config::ConfigManager;
use conan_tools::error::CtResult;
use conan_tools::paths;
use console::style;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> CtResult<ExitCode> {
    let cli = Cli::parse();

    // 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("ct=warn,conan_tools=warn"),
        1 => EnvFilter::new("ct=info,conan_tools=info"),
        _ => EnvFilter::new("ct=debug,conan_tools=debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    // Find local config unless --no-local is set
    let local_config_path = if cli.no_local {
        debug!("Local config discovery disabled (--no-local)");
        None
    } else {
        let found = ConfigManager::find_local_config(&paths::current_dir()?);
        if let Some(ref path) = found {
            debug!("Found local config: {}", path.display());
        }
        found
    };

    let mut config = config_manager
        .load_merged(local_config_path.as_deref())
        .await?;
    config.apply_env();
    if let Some(command) = cli.conan_cmd {
        config.conan.command = command;
    }

    let done = |result: CtResult<()>| result.map(|()| ExitCode::SUCCESS);

    match cli.command {
        Commands::Inspect(args) => done(commands::recipe::inspect(args, &config).await),
        Commands::Create(args) => done(commands::recipe::create(args, &config).await),
        Commands::Export(args) => done(commands::recipe::export(args, &config).await),
        Commands::Import(args) => done(commands::recipe::import(args, &config).await),
        Commands::Exists(args) => commands::reference::exists(args, &config).await,
        Commands::Download(args) => done(commands::reference::download(args, &config).await),
        Commands::Upload(args) => done(commands::reference::upload(args, &config).await),
        Commands::SetRemote(args) => done(commands::reference::set_remote(args, &config).await),
        Commands::Alias(args) => done(commands::reference::alias(args, &config).await),
        Commands::Workspace(args) => done(commands::workspace(args, &config).await),
        Commands::Exec(args) => commands::exec(args, &config).await,
        Commands::Config(args) => done(commands::config(args, &config, &config_manager).await),
    }
}
