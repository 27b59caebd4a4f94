//! Platform-agnostic types for Touch SDK compatible wearables.
//!
//! This crate holds the data model shared by the BLE driver in `touch-core`
//! and anything that consumes its events:
//!
//! - Gesture, hand and touch enums with their wire values
//! - [`SensorFrame`] and the arm-direction projection
//! - [`DeviceInfo`] with partial updates through [`InfoPatch`]
//! - Unpacking of custom characteristic payloads
//! - UUID constants for the GATT services
//!
//! # Example
//!
//! ```
//! use touch_types::{DeviceInfo, Hand, InfoPatch};
//!
//! let mut info = DeviceInfo::default();
//! info.apply(&InfoPatch {
//!     hand: Hand::Right,
//!     battery_percent: Some(75),
//!     ..Default::default()
//! });
//! assert_eq!(info.battery_percent, 75);
//! ```

pub mod custom;
pub mod error;
pub mod types;
pub mod uuid;

pub use custom::{ByteOrder, CustomDataFormat, CustomValue};
pub use error::{ParseError, ParseResult};
pub use types::{
    ArmDirection, DeviceInfo, GestureSet, GestureType, Hand, InfoPatch, Quaternion, SensorFrame,
    TouchPhase, Vector3,
};
pub use uuid as uuids;
