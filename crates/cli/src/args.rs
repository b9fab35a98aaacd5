//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// shellcache - offline application-shell cache
///
/// Drives the cache engine against a real origin: install and activate
/// generations, route individual requests, inspect what is stored.
#[derive(Parser, Debug)]
#[command(name = "shellcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SHELLCACHE_CONFIG_FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Populate the configured generation from the origin
    Install,

    /// Delete every generation other than the configured one
    Activate,

    /// Route one request through the engine
    Fetch(FetchArgs),

    /// List stored generations with their entry counts
    Generations,
}

#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// URL to request, absolute or relative to the origin
    pub url: String,

    /// Send as a top-level navigation
    #[arg(long)]
    pub navigate: bool,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Write the response body to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
