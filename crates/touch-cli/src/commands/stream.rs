//! Stream command implementation.
//!
//! A byte-level bridge for other programs: every protobuf update from the
//! approved watch is written to stdout as one base64 line, and every base64
//! line read from stdin is written to the watch's input characteristic.

use std::io::{self, Write};

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use prost::Message;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use touch_core::proto::Update;
use touch_core::{DiscoveredDevice, Watch, WatchConfig, WatchHandle, WatchHandler};
use tracing::{info, warn};

/// Forwards raw updates to the output task.
struct StreamRelay {
    lines: mpsc::UnboundedSender<String>,
}

impl WatchHandler for StreamRelay {
    fn on_connect(&mut self, device: &DiscoveredDevice) {
        info!("Connected to {} ({})", device.name, device.address);
    }

    fn on_disconnect(&mut self, device: &DiscoveredDevice) {
        info!("Disconnected from {}", device.address);
    }

    fn on_frame(&mut self, update: &Update) {
        let _ = self.lines.send(STANDARD.encode(update.encode_to_vec()));
    }
}

/// Decode one stdin line, `None` for blank lines.
fn decode_line(line: &str) -> Result<Option<Vec<u8>>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let data = STANDARD
        .decode(line)
        .with_context(|| format!("Invalid base64 input: {}", line))?;
    Ok(Some(data))
}

async fn relay_input(handle: WatchHandle) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match decode_line(&line) {
            Ok(Some(data)) => {
                if handle.send_raw(data).is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => warn!("{:#}", e),
        }
    }
    Ok(())
}

pub async fn cmd_stream(config: WatchConfig, no_input: bool) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let watch = Watch::new(config).context("Invalid configuration")?;
    let handle = watch.handle();
    let run = tokio::spawn(watch.run(StreamRelay { lines: tx }));

    let stopper = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stopper.stop();
        }
    });

    if !no_input {
        let input = handle.clone();
        tokio::spawn(async move {
            if let Err(e) = relay_input(input).await {
                warn!("Reading stdin failed: {:#}", e);
            }
        });
    }

    let mut stdout = io::stdout();
    while let Some(line) = rx.recv().await {
        if writeln!(stdout, "{}", line)
            .and_then(|()| stdout.flush())
            .is_err()
        {
            handle.stop();
            break;
        }
    }

    run.await
        .context("Watch task panicked")?
        .context("Watch connection failed")
}
