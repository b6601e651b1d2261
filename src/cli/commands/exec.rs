//! Exec command - run a command in the environment of packages

use crate::cli::args::ExecArgs;
use crate::conan::Conan;
use crate::config::Config;
use crate::env::PackageEnv;
use crate::error::CtResult;
use crate::paths;
use std::process::ExitCode;
use tracing::debug;

/// Execute the exec command, exiting with the status of the command
pub async fn execute(args: ExecArgs, config: &Config) -> CtResult<ExitCode> {
    let cwd = paths::current_dir()?;
    let mut package_env = PackageEnv::new(Conan::from_config(config), args.references);
    if !args.profiles.is_empty() {
        package_env = package_env.with_profiles(args.profiles);
    }

    let code = package_env.exec(&args.command, &cwd).await?;
    debug!("Command exited with {}", code);
    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}
