//! Command-line argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "spinride", version, about = "Indoor bike workout recorder")]
pub struct Cli {
    /// Path to config TOML (defaults to the platform data directory)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Console log level (error|warn|info|debug|trace), overridden by RUST_LOG
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to a bike and record a workout until Ctrl-C
    Ride {
        /// Stop automatically after this many seconds
        #[arg(long, value_name = "SECS")]
        duration_secs: Option<u64>,
    },
    /// Print the Strava authorization URL
    StravaAuth,
    /// Exchange a Strava authorization code and store the token
    StravaToken {
        /// Code from the redirect URL
        #[arg(long)]
        code: String,
    },
    /// Show the config file location
    Config {
        /// Write a default config if none exists
        #[arg(long)]
        init: bool,
    },
}
