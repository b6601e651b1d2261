//! Reference commands - exists, download, upload, set-remote and alias

use crate::cli::args::{AliasArgs, DownloadArgs, ExistsArgs, SetRemoteArgs, UploadArgs};
use crate::conan::Conan;
use crate::config::Config;
use crate::error::CtResult;
use crate::reference::ReferenceOverrides;
use console::style;
use std::process::ExitCode;

/// Execute the exists command; exits 1 when the reference is unknown
pub async fn exists(args: ExistsArgs, config: &Config) -> CtResult<ExitCode> {
    let conan = Conan::from_config(config);
    let found = match &args.remote {
        Some(remote) => args.reference.exists_on_remote(&conan, remote).await?,
        None => args.reference.exists_locally(&conan).await?,
    };
    let location = args.remote.as_deref().unwrap_or("local cache");

    if found {
        eprintln!("{} {} in {}", style("found").green(), args.reference, location);
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("{} {} in {}", style("not found").yellow(), args.reference, location);
        Ok(ExitCode::FAILURE)
    }
}

/// Execute the download command
pub async fn download(args: DownloadArgs, config: &Config) -> CtResult<()> {
    let conan = Conan::from_config(config);
    args.reference
        .download_recipe(&conan, args.remote.as_deref())
        .await
}

/// Execute the upload command
pub async fn upload(args: UploadArgs, config: &Config) -> CtResult<()> {
    let conan = Conan::from_config(config);
    args.reference.upload_all(&conan, &args.remote).await?;
    eprintln!("{} {} to {}", style("Uploaded").green().bold(), args.reference, args.remote);
    Ok(())
}

/// Execute the set-remote command
pub async fn set_remote(args: SetRemoteArgs, config: &Config) -> CtResult<()> {
    let conan = Conan::from_config(config);
    args.reference.register_remote(&conan, &args.remote).await
}

/// Execute the alias command; prints the alias reference
pub async fn alias(args: AliasArgs, config: &Config) -> CtResult<()> {
    let conan = Conan::from_config(config);
    let overrides = ReferenceOverrides {
        name: args.name,
        version: args.alias_version,
        user: args.user,
        channel: args.channel,
    };
    let alias = args.reference.create_alias(&conan, &overrides).await?;
    println!("{}", alias);
    Ok(())
}
