//! Watch command implementation.
//!
//! Connects through the library's approval flow and prints every event the
//! approved watch produces until Ctrl-C.

use std::io::{self, Write};

use anyhow::{Context, Result};
use tokio::sync::broadcast::error::RecvError;
use touch_core::{EventDispatcher, EventForwarder, EventReceiver, Watch, WatchConfig};
use tracing::warn;

use crate::cli::OutputFormat;
use crate::format::{FormatOptions, format_event_json, format_event_text, is_shown};

pub async fn cmd_watch(
    config: WatchConfig,
    format: OutputFormat,
    quiet: bool,
    opts: &FormatOptions,
) -> Result<()> {
    let events = EventDispatcher::default();
    let rx = events.subscribe();

    let watch = Watch::new(config).context("Invalid configuration")?;
    let handle = watch.handle();
    let run = tokio::spawn(watch.run(EventForwarder::new(events)));

    let stopper = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stopper.stop();
        }
    });

    if !quiet {
        eprintln!("Waiting for a watch to accept the connection... (Ctrl-C to stop)");
    }

    if let Err(e) = print_events(rx, format, opts).await {
        // Most likely a closed pipe; nothing left to print to.
        warn!("Output failed: {}", e);
        handle.stop();
    }

    run.await
        .context("Watch task panicked")?
        .context("Watch connection failed")
}

/// Print events until the sender side goes away.
async fn print_events(
    mut rx: EventReceiver,
    format: OutputFormat,
    opts: &FormatOptions,
) -> Result<()> {
    let mut stdout = io::stdout();
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!("Output fell behind, skipped {} events", skipped);
                continue;
            }
            Err(RecvError::Closed) => return Ok(()),
        };
        if !is_shown(&event, opts) {
            continue;
        }
        let line = match format {
            OutputFormat::Text => format_event_text(&event, opts),
            OutputFormat::Json => format_event_json(&event)?,
        };
        stdout.write_all(line.as_bytes())?;
        stdout.flush()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use touch_core::WatchEvent;

    #[tokio::test]
    async fn test_print_events_ends_when_sender_dropped() {
        let events = EventDispatcher::new(16);
        let rx = events.subscribe();
        events.send(WatchEvent::Tap);
        drop(events);

        print_events(rx, OutputFormat::Json, &FormatOptions::new(true))
            .await
            .unwrap();
    }
}
