//! CLI argument definitions using clap derive

use crate::conan::BuildArgs;
use crate::config::LayoutKind;
use crate::recipe::ReferenceRequest;
use crate::reference::Reference;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// ct - scripting helpers for the conan package manager
///
/// Creates, imports and publishes packages, either in the conan cache or
/// step by step in local build folders.
#[derive(Parser, Debug)]
#[command(name = "ct")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(long, global = true, env = "CT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local .ct.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,

    /// Conan executable (overrides config and CT_CONAN_CMD)
    #[arg(long, global = true)]
    pub conan_cmd: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print recipe metadata as JSON
    Inspect(InspectArgs),

    /// Create a package from a recipe
    Create(CreateArgs),

    /// Export a recipe into the conan cache
    Export(ExportArgs),

    /// Copy the content of a package into a folder, building it if needed
    Import(ImportArgs),

    /// Check whether a reference is known locally or on a remote
    Exists(ExistsArgs),

    /// Download a recipe
    Download(DownloadArgs),

    /// Upload a recipe and all its binaries
    Upload(UploadArgs),

    /// Associate a reference with a remote
    SetRemote(SetRemoteArgs),

    /// Create an alias of a reference
    Alias(AliasArgs),

    /// Build several recipes as one editable workspace
    Workspace(WorkspaceArgs),

    /// Run a command in the environment of packages
    Exec(ExecArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Package identity for recipe commands
#[derive(Args, Debug, Clone)]
pub struct IdentityArgs {
    /// Package user
    #[arg(short, long)]
    pub user: String,

    /// Package channel
    #[arg(short, long)]
    pub channel: String,

    /// Override the recipe name
    #[arg(long)]
    pub name: Option<String>,

    /// Override the recipe version
    #[arg(long = "version")]
    pub pkg_version: Option<String>,
}

impl IdentityArgs {
    pub fn request(&self) -> ReferenceRequest {
        ReferenceRequest {
            user: self.user.clone(),
            channel: self.channel.clone(),
            name: self.name.clone(),
            version: self.pkg_version.clone(),
        }
    }
}

/// Profiles, build policy, remotes and options
#[derive(Args, Debug, Clone, Default)]
pub struct BuildOpts {
    /// Remote to use (repeatable)
    #[arg(short = 'r', long = "remote")]
    pub remotes: Vec<String>,

    /// Profile name or file (repeatable, default from config)
    #[arg(short = 'p', long = "profile")]
    pub profiles: Vec<String>,

    /// Build policy (repeatable, bare -b builds everything)
    #[arg(short = 'b', long = "build", num_args = 0..=1, default_missing_value = "")]
    pub build: Vec<String>,

    /// Package option (KEY=VALUE, repeatable)
    #[arg(short = 'o', long = "option", value_parser = parse_option)]
    pub options: Vec<(String, String)>,
}

impl BuildOpts {
    /// Unset profile and build lists fall back to the configured defaults
    pub fn build_args(&self) -> BuildArgs {
        BuildArgs {
            remotes: self.remotes.clone(),
            profiles: (!self.profiles.is_empty()).then(|| self.profiles.clone()),
            build: (!self.build.is_empty()).then(|| self.build.clone()),
            options: self.options.iter().cloned().collect(),
        }
    }
}

/// Workflow and layout selection
#[derive(Args, Debug, Clone, Default)]
pub struct WorkflowOpts {
    /// Build step by step in layout folders instead of the conan cache
    #[arg(long)]
    pub local: bool,

    /// The recipe fetches its sources itself
    #[arg(long)]
    pub external_source: bool,

    /// Layout of the local build folders (default from config)
    #[arg(long, value_enum)]
    pub layout: Option<LayoutKind>,

    /// Write a ct_<step>.sh script for every step
    #[arg(long)]
    pub script: bool,
}

/// Arguments for the inspect command
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Recipe file
    pub recipe: PathBuf,

    /// Fields to print (all when omitted)
    pub fields: Vec<String>,

    /// Write the JSON to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the create command
#[derive(Parser, Debug)]
pub struct CreateArgs {
    /// Recipe file
    pub recipe: PathBuf,

    #[command(flatten)]
    pub identity: IdentityArgs,

    #[command(flatten)]
    pub build: BuildOpts,

    #[command(flatten)]
    pub workflow: WorkflowOpts,
}

/// Arguments for the export command
#[derive(Parser, Debug)]
pub struct ExportArgs {
    /// Recipe file
    pub recipe: PathBuf,

    #[command(flatten)]
    pub identity: IdentityArgs,
}

/// Arguments for the import command
#[derive(Parser, Debug)]
pub struct ImportArgs {
    /// Recipe file
    pub recipe: PathBuf,

    /// Destination of the package content
    #[arg(long)]
    pub pkg_folder: PathBuf,

    #[command(flatten)]
    pub identity: IdentityArgs,

    #[command(flatten)]
    pub build: BuildOpts,

    #[command(flatten)]
    pub workflow: WorkflowOpts,
}

/// Arguments for the exists command
#[derive(Parser, Debug)]
pub struct ExistsArgs {
    /// Package reference (name/version@user/channel)
    pub reference: Reference,

    /// Search this remote instead of the local cache
    #[arg(short, long)]
    pub remote: Option<String>,
}

/// Arguments for the download command
#[derive(Parser, Debug)]
pub struct DownloadArgs {
    /// Package reference (name/version@user/channel)
    pub reference: Reference,

    /// Remote to download from
    #[arg(short, long)]
    pub remote: Option<String>,
}

/// Arguments for the upload command
#[derive(Parser, Debug)]
pub struct UploadArgs {
    /// Package reference (name/version@user/channel)
    pub reference: Reference,

    /// Destination remote
    #[arg(short, long)]
    pub remote: String,
}

/// Arguments for the set-remote command
#[derive(Parser, Debug)]
pub struct SetRemoteArgs {
    /// Package reference (name/version@user/channel)
    pub reference: Reference,

    /// Remote name
    pub remote: String,
}

/// Arguments for the alias command
#[derive(Parser, Debug)]
pub struct AliasArgs {
    /// Referenced package (name/version@user/channel)
    pub reference: Reference,

    /// Alias name
    #[arg(long)]
    pub name: Option<String>,

    /// Alias version
    #[arg(long = "version")]
    pub alias_version: Option<String>,

    /// Alias user
    #[arg(long)]
    pub user: Option<String>,

    /// Alias channel
    #[arg(long)]
    pub channel: Option<String>,
}

/// Arguments for the workspace command
#[derive(Parser, Debug)]
pub struct WorkspaceArgs {
    /// Member recipes, built in this order
    #[arg(required = true)]
    pub recipes: Vec<PathBuf>,

    /// Member whose recipe fetches its sources (repeatable; appended if not listed)
    #[arg(long)]
    pub external: Vec<PathBuf>,

    /// Package user
    #[arg(short, long)]
    pub user: String,

    /// Package channel
    #[arg(short, long)]
    pub channel: String,

    /// Folder receiving layout.txt and ws.yml (default: current directory)
    #[arg(long)]
    pub build_folder: Option<PathBuf>,

    /// Package every member into this folder instead of exporting them
    #[arg(long)]
    pub pkg_folder: Option<PathBuf>,

    /// Layout of the member build folders (default from config)
    #[arg(long, value_enum)]
    pub layout: Option<LayoutKind>,

    /// Write a ct_<step>.sh script for every step
    #[arg(long)]
    pub script: bool,

    #[command(flatten)]
    pub build: BuildOpts,
}

/// Arguments for the exec command
#[derive(Parser, Debug)]
pub struct ExecArgs {
    /// Profile name or file (repeatable)
    #[arg(short = 'p', long = "profile")]
    pub profiles: Vec<String>,

    /// Package providing environment variables (repeatable)
    #[arg(short = 'r', long = "reference")]
    pub references: Vec<Reference>,

    /// Command and arguments to run
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Parse a package option in KEY=VALUE format
fn parse_option(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE format: no '=' found in '{s}'"))?;
    if key.is_empty() {
        return Err(format!("invalid KEY=VALUE format: empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
