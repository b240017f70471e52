use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sitefleet")]
#[command(version)]
#[command(about = "Deploy a catalog of sites with atomic release cutover", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the settings file (default: ./sitefleet.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List all catalog entries
    List(ListArgs),

    /// Deploy one site
    Deploy(DeployArgs),

    /// Deploy every catalog entry
    DeployAll(DeployAllArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Host selection, shared by the deploy commands
#[derive(Args, Clone)]
pub struct HostArgs {
    /// Deploy to the host with this label
    #[arg(long, value_name = "LABEL")]
    pub host: Option<String>,

    /// Deploy to the first host tagged with this stage
    #[arg(long, value_name = "STAGE")]
    pub stage: Option<String>,
}

#[derive(Args)]
pub struct ListArgs {
    /// Only show entries from this declaration source
    #[arg(long, value_name = "SOURCE")]
    pub source: Option<String>,
}

#[derive(Args)]
pub struct DeployArgs {
    /// Site to deploy
    #[arg(long, value_name = "NAME")]
    pub site: String,

    /// Constrain resolution to this declaration source
    #[arg(long, value_name = "SOURCE")]
    pub source: Option<String>,

    /// Remove a stale deploy lock before starting
    #[arg(long)]
    pub unlock: bool,

    #[command(flatten)]
    pub host: HostArgs,
}

#[derive(Args)]
pub struct DeployAllArgs {
    /// Only deploy entries from this declaration source
    #[arg(long, value_name = "SOURCE")]
    pub source: Option<String>,

    /// Remove stale deploy locks before each site
    #[arg(long)]
    pub unlock: bool,

    /// Continue with remaining sites when one fails
    #[arg(long)]
    pub keep_going: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    #[command(flatten)]
    pub host: HostArgs,
}
