//! Core types for Touch SDK wearable data.

use core::fmt;
use std::collections::BTreeSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// The wrist the watch is worn on.
///
/// Wire values: `NONE = 0`, `RIGHT = 1`, `LEFT = 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Hand {
    /// Unknown, or a battery-only info update.
    #[default]
    None,
    /// Worn on the right wrist.
    Right,
    /// Worn on the left wrist.
    Left,
}

impl Hand {
    /// Map a wire value to a hand. Unknown values map to [`Hand::None`].
    #[must_use]
    pub fn from_wire(value: i32) -> Self {
        match value {
            1 => Hand::Right,
            2 => Hand::Left,
            _ => Hand::None,
        }
    }

    /// The wire value of this hand.
    #[must_use]
    pub fn as_wire(self) -> i32 {
        match self {
            Hand::None => 0,
            Hand::Right => 1,
            Hand::Left => 2,
        }
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hand::None => write!(f, "none"),
            Hand::Right => write!(f, "right"),
            Hand::Left => write!(f, "left"),
        }
    }
}

/// A gesture class the watch-side classifier can report.
///
/// The classification itself happens on the watch; the host only decodes
/// the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
#[non_exhaustive]
#[repr(i32)]
pub enum GestureType {
    /// No gesture.
    None = 0,
    /// Index finger pinch tap.
    Tap = 1,
    /// Fist clench.
    Clench = 2,
    /// Tap on a surface.
    SurfaceTap = 3,
    /// Pinch and hold.
    PinchHold = 4,
}

impl GestureType {
    /// Every known gesture type, in wire order.
    pub const ALL: [GestureType; 5] = [
        GestureType::None,
        GestureType::Tap,
        GestureType::Clench,
        GestureType::SurfaceTap,
        GestureType::PinchHold,
    ];

    /// The wire value of this gesture type.
    #[must_use]
    pub fn as_wire(self) -> i32 {
        self as i32
    }

    /// Map a wire value to a gesture type, if known.
    #[must_use]
    pub fn from_wire(value: i32) -> Option<Self> {
        Self::try_from(value).ok()
    }
}

impl TryFrom<i32> for GestureType {
    type Error = ParseError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        GestureType::ALL
            .into_iter()
            .find(|g| g.as_wire() == value)
            .ok_or(ParseError::UnknownGesture(value))
    }
}

impl fmt::Display for GestureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GestureType::None => write!(f, "NONE"),
            GestureType::Tap => write!(f, "TAP"),
            GestureType::Clench => write!(f, "CLENCH"),
            GestureType::SurfaceTap => write!(f, "SURFACE_TAP"),
            GestureType::PinchHold => write!(f, "PINCH_HOLD"),
        }
    }
}

/// A gesture model: the set of gesture types a classifier recognizes.
pub type GestureSet = BTreeSet<GestureType>;

/// A 3-component vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean length.
    #[must_use]
    pub fn norm(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit vector in the same direction, or `None` for a zero vector.
    #[must_use]
    pub fn normalized(&self) -> Option<Self> {
        let norm = self.norm();
        if norm == 0.0 || !norm.is_finite() {
            return None;
        }
        Some(Self::new(self.x / norm, self.y / norm, self.z / norm))
    }
}

impl From<(f32, f32, f32)> for Vector3 {
    fn from((x, y, z): (f32, f32, f32)) -> Self {
        Self::new(x, y, z)
    }
}

/// An orientation quaternion, `(x, y, z, w)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

/// One motion sensor sample from the watch.
///
/// The wire format may batch several samples per notification; only the
/// newest one of a batch is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorFrame {
    /// Linear acceleration in m/s².
    pub acceleration: Vector3,
    /// Gravity vector in m/s².
    pub gravity: Vector3,
    /// Angular velocity in rad/s.
    pub angular_velocity: Vector3,
    /// Device orientation.
    pub orientation: Quaternion,
    /// Magnetic field in µT, when the watch reports it.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub magnetic_field: Option<Vector3>,
    /// Magnetometer calibration offsets, when the watch reports them.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub magnetic_field_calibration: Option<Vector3>,
    /// Watch-side timestamp in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// A 2D pointing delta derived from the gyroscope and gravity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ArmDirection {
    pub dx: f32,
    pub dy: f32,
}

impl SensorFrame {
    /// Project the angular velocity into a 2D pointer delta.
    ///
    /// The gravity vector is normalized and used to compensate for how the
    /// wrist is turned; the vertical axis is mirrored for the left hand.
    /// A zero gravity vector yields a zero delta.
    ///
    /// ```
    /// use touch_types::{Hand, SensorFrame, Vector3};
    ///
    /// let frame = SensorFrame {
    ///     gravity: Vector3::new(0.0, 0.0, 9.81),
    ///     angular_velocity: Vector3::new(0.0, 2.0, 0.0),
    ///     ..Default::default()
    /// };
    /// let delta = frame.arm_direction_change(Hand::Right);
    /// assert_eq!(delta.dx, 0.0);
    /// assert!((delta.dy + 2.0).abs() < 1e-6);
    /// ```
    #[must_use]
    pub fn arm_direction_change(&self, hand: Hand) -> ArmDirection {
        let Some(g) = self.gravity.normalized() else {
            return ArmDirection::default();
        };

        let avx = -self.angular_velocity.z;
        let avy = -self.angular_velocity.y;
        let sign = if hand == Hand::Left { -1.0 } else { 1.0 };

        ArmDirection {
            dx: avx * g.z + avy * g.y,
            dy: sign * (avy * g.z - avx * g.y),
        }
    }
}

/// Latest known metadata about the connected watch.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceInfo {
    pub hand: Hand,
    /// Battery charge in percent, `-1` when unknown.
    pub battery_percent: i32,
    /// Touch screen resolution `(width, height)`, if the watch has one.
    pub screen_resolution: Option<(f32, f32)>,
    pub haptics_available: bool,
    pub app_id: String,
    pub app_version: String,
    pub device_name: String,
    pub manufacturer: String,
    /// Free-text description of the active model.
    pub model_info: String,
    pub available_models: Vec<GestureSet>,
    pub active_model: GestureSet,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            hand: Hand::None,
            battery_percent: -1,
            screen_resolution: None,
            haptics_available: false,
            app_id: String::new(),
            app_version: String::new(),
            device_name: String::new(),
            manufacturer: String::new(),
            model_info: String::new(),
            available_models: Vec::new(),
            active_model: GestureSet::new(),
        }
    }
}

/// A partial [`DeviceInfo`] update as carried by one wire message.
///
/// `None` fields are absent from the message and leave the current value
/// untouched.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InfoPatch {
    /// [`Hand::None`] marks a battery-only update.
    pub hand: Hand,
    pub battery_percent: Option<i32>,
    pub screen_resolution: Option<(f32, f32)>,
    pub haptics_available: Option<bool>,
    pub app_id: Option<String>,
    pub app_version: Option<String>,
    pub device_name: Option<String>,
    pub manufacturer: Option<String>,
    pub model_info: Option<String>,
    pub available_models: Option<Vec<GestureSet>>,
    pub active_model: Option<GestureSet>,
}

impl InfoPatch {
    /// Whether this update only carries the battery level.
    #[must_use]
    pub fn is_battery_only(&self) -> bool {
        self.hand == Hand::None
    }
}

impl DeviceInfo {
    /// Merge a partial update into this info, field by field.
    ///
    /// A battery-only patch updates nothing but the battery level, even if
    /// other fields happen to be set.
    pub fn apply(&mut self, patch: &InfoPatch) {
        if let Some(battery) = patch.battery_percent {
            self.battery_percent = battery;
        }

        if patch.is_battery_only() {
            return;
        }

        self.hand = patch.hand;

        fn merge<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        if patch.screen_resolution.is_some() {
            self.screen_resolution = patch.screen_resolution;
        }
        merge(&mut self.haptics_available, &patch.haptics_available);
        merge(&mut self.app_id, &patch.app_id);
        merge(&mut self.app_version, &patch.app_version);
        merge(&mut self.device_name, &patch.device_name);
        merge(&mut self.manufacturer, &patch.manufacturer);
        merge(&mut self.model_info, &patch.model_info);
        merge(&mut self.available_models, &patch.available_models);
        merge(&mut self.active_model, &patch.active_model);
    }
}

/// Phase of a touch screen event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TouchPhase {
    Down,
    Up,
    Move,
    Cancel,
}

impl TouchPhase {
    /// Map a wire touch event type (`BEGIN = 1` .. `CANCEL = 4`).
    ///
    /// `NONE` and unknown values have no phase.
    #[must_use]
    pub fn from_wire(value: i32) -> Option<Self> {
        match value {
            1 => Some(TouchPhase::Down),
            2 => Some(TouchPhase::Up),
            3 => Some(TouchPhase::Move),
            4 => Some(TouchPhase::Cancel),
            _ => None,
        }
    }
}
