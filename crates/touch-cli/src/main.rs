mod cli;
mod commands;
mod config;
mod format;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::{cmd_config, cmd_scan, cmd_stream, cmd_watch};
use format::FormatOptions;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine readable.
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!cli.no_color)
        .init();

    let opts = FormatOptions::new(cli.no_color);

    match cli.command {
        Commands::Scan {
            timeout,
            name,
            format,
        } => cmd_scan(timeout, name.as_deref(), format, cli.quiet, &opts).await,
        Commands::Watch {
            connect,
            format,
            sensors,
        } => {
            let config = config::resolve(&connect)?;
            cmd_watch(config, format, cli.quiet, &opts.with_sensors(sensors)).await
        }
        Commands::Stream { connect, no_input } => {
            let config = config::resolve(&connect)?;
            cmd_stream(config, no_input).await
        }
        Commands::Config { action } => cmd_config(action),
    }
}
