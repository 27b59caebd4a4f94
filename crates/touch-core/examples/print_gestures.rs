//! Example: Printing Gestures
//!
//! Connects to the first watch that accepts the connection and prints its
//! gestures. Each tap triggers a short vibration.
//!
//! Run with: `cargo run --example print_gestures`

use touch_core::{GestureType, Watch, WatchConfig, WatchHandle, WatchHandler};

struct Gestures {
    handle: WatchHandle,
}

impl WatchHandler for Gestures {
    fn on_connect(&mut self, device: &touch_core::DiscoveredDevice) {
        println!("Connected to {}", device.name);
    }

    fn on_gesture(&mut self, gesture: GestureType) {
        if gesture != GestureType::None {
            println!("Gesture: {}", gesture);
        }
    }

    fn on_tap(&mut self) {
        if let Err(e) = self.handle.trigger_haptics(0.8, 50) {
            eprintln!("Haptics failed: {}", e);
        }
    }

    fn on_rotary(&mut self, direction: i32) {
        println!("Rotary: {:+}", direction);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let watch = Watch::new(WatchConfig::new())?;
    let handler = Gestures {
        handle: watch.handle(),
    };

    println!("Accept the connection on your watch. Press Ctrl-C to quit.");
    watch.start(handler)?;
    Ok(())
}
