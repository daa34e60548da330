use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "proxyfetch")]
#[command(about = "Fetch URLs through a rotating pool of proxies", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $PROXYFETCH_CONFIG or config/proxyfetch.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a URL and write the body to stdout or a file
    Fetch(FetchArgs),
    /// Seed the pool from the proxy file and print its stats as JSON
    Stats,
    /// Validate configuration and count usable proxy entries
    Check,
}

#[derive(clap::Args, Debug)]
pub struct FetchArgs {
    /// URL to fetch
    pub url: String,

    /// Write the body to this file instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Override the configured attempt budget
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Fail on non-2xx responses
    #[arg(long)]
    pub fail_on_status: bool,
}
