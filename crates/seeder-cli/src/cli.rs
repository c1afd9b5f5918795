use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "seeder",
    about = "Seeder: stores, chunks and relays transactions between peers",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file. Defaults apply when it does not exist.
    #[arg(short, long, global = true, default_value = "seeder.toml")]
    pub config: PathBuf,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the node and its HTTP server
    Serve(ServeArgs),
    /// Print the effective configuration
    Config(ConfigArgs),
    /// Read records from the configured store
    Inspect(InspectArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Listen address, overriding the config file
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Print built-in defaults instead of the loaded file
    #[arg(long)]
    pub default: bool,
}

#[derive(Args)]
pub struct InspectArgs {
    #[command(subcommand)]
    pub target: InspectTarget,
}

#[derive(Subcommand)]
pub enum InspectTarget {
    /// Offset counter and record counts per bucket
    Summary,
    /// A stored transaction record
    Tx { id: String },
    /// A live or persisted task
    Task { task_type: String, id: String },
    /// The chunk stored at an absolute offset
    Chunk { offset: u64 },
    /// Tasks that will resume on next start
    Pending,
}
