use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tfjet")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Drive Terraform-backed managed resources", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: <config dir>/config.toml)
    #[arg(long, global = true, env = "TFJET_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Report whether the resource exists and is up to date
    Observe(ResourceArgs),

    /// Create the resource and wait until the apply ends
    Create(ResourceArgs),

    /// Update the resource and wait until the apply ends
    Update(ResourceArgs),

    /// Delete the resource and wait until the destroy ends
    Delete(ResourceArgs),

    /// Run controller-style steps: observe, then create/update/delete as needed
    Reconcile(ReconcileArgs),

    /// Print the state persisted on the resource
    State(StateArgs),

    /// Plan the resource and report existence and drift
    Plan(ResourceArgs),

    /// Show the resolved configuration
    Config,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct ResourceArgs {
    /// Resource file (JSON)
    pub file: PathBuf,
}

#[derive(Args)]
pub struct ReconcileArgs {
    /// Resource file (JSON)
    pub file: PathBuf,

    /// Drive the resource towards deletion
    #[arg(long)]
    pub delete: bool,

    /// Keep stepping until nothing is left to do
    #[arg(short, long)]
    pub wait: bool,

    /// Seconds between polls while an operation runs
    #[arg(long, default_value = "5")]
    pub interval: u64,

    /// Give up after this many steps (0: no limit)
    #[arg(long, default_value = "0")]
    pub max_steps: u32,
}

#[derive(Args)]
pub struct StateArgs {
    /// Resource file (JSON)
    pub file: PathBuf,

    /// Print the decoded snapshot as JSON
    #[arg(long)]
    pub raw: bool,

    /// Include sensitive attribute values
    #[arg(long)]
    pub show_sensitive: bool,
}
