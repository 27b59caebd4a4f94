//! Scan command implementation.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use touch_core::{BleTransport, ConnectionConfig, DiscoveredDevice, Scanner, Transport};
use tracing::debug;

use crate::cli::OutputFormat;
use crate::format::{FormatOptions, format_scan_json, format_scan_text};

pub async fn cmd_scan(
    timeout: u64,
    name: Option<&str>,
    format: OutputFormat,
    quiet: bool,
    opts: &FormatOptions,
) -> Result<()> {
    if !quiet && format == OutputFormat::Text {
        eprintln!("Scanning for watches... ({}s)", timeout);
    }

    let transport = BleTransport::new(ConnectionConfig::default())
        .await
        .context("Failed to open Bluetooth adapter")?;
    let devices = collect(&transport, name, Duration::from_secs(timeout)).await?;

    let content = match format {
        OutputFormat::Text => format_scan_text(&devices, opts),
        OutputFormat::Json => format_scan_json(&devices)?,
    };
    io::stdout().write_all(content.as_bytes())?;

    if devices.is_empty() && !quiet && format == OutputFormat::Text {
        eprintln!("Make sure the Touch SDK app is open on the watch and Bluetooth is on.");
    }
    Ok(())
}

/// Gather distinct watches until `duration` elapses or Ctrl-C is pressed.
async fn collect<T: Transport>(
    transport: &T,
    name: Option<&str>,
    duration: Duration,
) -> Result<Vec<DiscoveredDevice>> {
    let mut ads = transport
        .advertisements()
        .await
        .context("Failed to start scan")?;
    let mut scanner = Scanner::new(name);
    scanner.start();

    let mut devices = Vec::new();
    let deadline = tokio::time::sleep(duration);
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(deadline, interrupt);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = &mut interrupt => break,
            adv = ads.next() => match adv {
                Some(adv) => {
                    if let Some(device) = scanner.on_advertisement(&adv) {
                        debug!("Found {} ({})", device.name, device.address);
                        devices.push(device);
                    }
                }
                None => break,
            },
        }
    }

    transport.stop_scan().await.context("Failed to stop scan")?;
    devices.sort_by(|a, b| b.rssi.cmp(&a.rssi));
    Ok(devices)
}
