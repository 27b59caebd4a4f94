//! Host-side BLE driver for Touch SDK smartwatches.
//!
//! A watch running the Touch SDK app streams motion sensors, recognized
//! gestures, touch screen, rotary and button input over a protobuf
//! characteristic. This crate finds such watches, connects to every
//! candidate, and sticks with the first one whose user accepts the
//! connection on the watch. Its data is decoded and delivered to a
//! [`WatchHandler`].
//!
//! # Features
//!
//! - **Discovery**: Scan for watches advertising the interaction service
//! - **Approval race**: First watch to accept wins, the rest are dropped
//! - **Liveness**: Silent link loss is detected and scanning resumes
//! - **Callbacks or events**: Implement [`WatchHandler`] or drain
//!   [`WatchEvent`]s through an [`EventForwarder`]
//! - **Control**: Haptics, model selection and raw input via [`WatchHandle`]
//! - **Custom characteristics**: Unpack extra characteristics with Python
//!   `struct` format strings
//!
//! # Quick Start
//!
//! ```no_run
//! use touch_core::{Watch, WatchConfig, WatchHandler};
//! use touch_core::types::SensorFrame;
//!
//! struct Printer;
//!
//! impl WatchHandler for Printer {
//!     fn on_sensors(&mut self, frame: &SensorFrame) {
//!         println!("gyro: {:?}", frame.angular_velocity);
//!     }
//!
//!     fn on_tap(&mut self) {
//!         println!("tap!");
//!     }
//! }
//!
//! fn main() -> touch_core::Result<()> {
//!     let watch = Watch::new(WatchConfig::new().name_filter("Galaxy"))?;
//!     // Blocks until Ctrl-C.
//!     watch.start(Printer)
//! }
//! ```
//!
//! # Platform Differences
//!
//! On macOS, CoreBluetooth hides MAC addresses; watches are identified by
//! the peripheral UUID it assigns instead. The identifier is stable for a
//! given watch on a given Mac.

pub mod ble;
pub mod codec;
mod connector;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod handler;
pub mod mock;
pub mod proto;
pub mod scan;
pub mod transport;
pub mod watch;

// Re-export types and uuid modules from touch-types
pub use touch_types::types;
pub use touch_types::uuid;

// Core exports
pub use ble::{BleLink, BleTransport, ConnectionConfig};
pub use codec::{ClientInfo, ControlMessage, Decoded, decode_events, decode_update};
pub use dispatcher::Dispatcher;
pub use error::{ConnectionFailureReason, Error, Result};
pub use events::{EventDispatcher, EventForwarder, EventReceiver, EventSender, WatchEvent};
pub use handler::WatchHandler;
pub use scan::{Advertisement, DiscoveredDevice, Scanner};
pub use transport::{Link, NotificationStream, Transport};
pub use watch::{DEFAULT_MONITOR_INTERVAL, Watch, WatchConfig, WatchHandle};

// Re-export from touch-types
pub use touch_types::uuid as uuids;
pub use touch_types::{
    ArmDirection, CustomDataFormat, CustomValue, DeviceInfo, GestureSet, GestureType, Hand,
    InfoPatch, ParseError, Quaternion, SensorFrame, TouchPhase, Vector3,
};
