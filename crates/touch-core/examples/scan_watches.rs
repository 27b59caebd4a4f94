//! Example: Scanning for Touch SDK Watches
//!
//! Lists watches advertising the interaction service without connecting
//! to any of them.
//!
//! Run with: `cargo run --example scan_watches`

use std::time::Duration;

use futures::StreamExt;
use touch_core::{BleTransport, ConnectionConfig, Scanner, Transport};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    println!("Scanning for watches for 10 seconds...");
    println!();

    let transport = BleTransport::new(ConnectionConfig::default()).await?;
    let mut ads = transport.advertisements().await?;
    let mut scanner = Scanner::new(None);
    scanner.start();

    let mut found = 0;
    let deadline = tokio::time::sleep(Duration::from_secs(10));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            Some(adv) = ads.next() => {
                if let Some(device) = scanner.on_advertisement(&adv) {
                    found += 1;
                    let rssi = device
                        .rssi
                        .map(|r| format!("{} dBm", r))
                        .unwrap_or_else(|| "N/A".to_string());
                    println!("  {}", if device.name.is_empty() { "Unknown" } else { &device.name });
                    println!("    Identifier: {}", device.address);
                    println!("    RSSI: {}", rssi);
                    println!();
                }
            }
        }
    }

    transport.stop_scan().await?;

    if found == 0 {
        println!("No watches found.");
        println!();
        println!("Make sure:");
        println!("  - The Touch SDK app is open on the watch");
        println!("  - Bluetooth is enabled on this computer");
        println!("  - The watch is within range");
    }

    Ok(())
}
