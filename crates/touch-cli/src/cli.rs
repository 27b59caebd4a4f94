//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Reusable watch connection arguments
#[derive(Debug, Clone, Default, Args)]
pub struct ConnectArgs {
    /// Only connect to watches whose name contains this (case-insensitive)
    #[arg(short, long, env = "TOUCH_NAME_FILTER")]
    pub name: Option<String>,

    /// Connection timeout in seconds
    #[arg(short = 'T', long)]
    pub timeout: Option<u64>,

    /// Link check interval in milliseconds
    #[arg(long)]
    pub monitor_interval: Option<u64>,

    /// Subscribe to a custom characteristic, as UUID=FORMAT with a Python
    /// struct format (can be repeated)
    #[arg(long = "custom-data", value_name = "UUID=FORMAT")]
    pub custom_data: Vec<String>,

    /// Use this config file instead of the default location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Parser)]
#[command(name = "touch-sdk")]
#[command(author, version, about = "CLI for Touch SDK smartwatches", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List nearby watches without connecting
    Scan {
        /// Scan timeout in seconds
        #[arg(short, long, default_value = "10")]
        timeout: u64,

        /// Only list watches whose name contains this (case-insensitive)
        #[arg(short, long, env = "TOUCH_NAME_FILTER")]
        name: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Connect to a watch and print its events
    Watch {
        #[command(flatten)]
        connect: ConnectArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Also print sensor frames (about 100 per second)
        #[arg(long)]
        sensors: bool,
    },

    /// Relay raw updates as base64 lines on stdout, and write base64 lines
    /// from stdin to the watch
    Stream {
        #[command(flatten)]
        connect: ConnectArgs,

        /// Do not read input from stdin
        #[arg(long)]
        no_input: bool,
    },

    /// Show the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the config file location
    Path,
    /// Print the effective configuration
    Show {
        /// Read this config file instead of the default location
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
    /// Write a default config file if none exists
    Init,
}
