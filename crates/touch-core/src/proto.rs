//! Wire schema of the Touch SDK protobuf service.
//!
//! Messages on `PROTOBUF_OUTPUT` are [`Update`]s; messages written to
//! `PROTOBUF_INPUT` are [`InputUpdate`]s. Field numbers match the schema the
//! watch app is built against, so these definitions must not be renumbered.

// --- Common ---

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Vec2 {
    #[prost(float, tag = "1")]
    pub x: f32,
    #[prost(float, tag = "2")]
    pub y: f32,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Vec3 {
    #[prost(float, tag = "1")]
    pub x: f32,
    #[prost(float, tag = "2")]
    pub y: f32,
    #[prost(float, tag = "3")]
    pub z: f32,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Quat {
    #[prost(float, tag = "1")]
    pub x: f32,
    #[prost(float, tag = "2")]
    pub y: f32,
    #[prost(float, tag = "3")]
    pub z: f32,
    #[prost(float, tag = "4")]
    pub w: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum GestureType {
    None = 0,
    Tap = 1,
    Clench = 2,
    SurfaceTap = 3,
    PinchHold = 4,
}

/// A gesture model, as the set of gestures it recognizes.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Model {
    #[prost(enumeration = "GestureType", repeated, tag = "1")]
    pub gestures: Vec<i32>,
}

// --- Watch to host ---

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Info {
    #[prost(enumeration = "info::Hand", tag = "1")]
    pub hand: i32,
    #[prost(string, tag = "2")]
    pub app_id: String,
    #[prost(string, tag = "3")]
    pub app_version: String,
    #[prost(message, repeated, tag = "4")]
    pub available_models: Vec<Model>,
    #[prost(message, optional, tag = "5")]
    pub active_model: Option<Model>,
    #[prost(string, tag = "6")]
    pub manufacturer: String,
    #[prost(string, tag = "7")]
    pub device_name: String,
    #[prost(int32, tag = "8")]
    pub battery_percentage: i32,
    #[prost(message, optional, tag = "9")]
    pub touch_screen_resolution: Option<Vec2>,
    #[prost(bool, tag = "10")]
    pub haptics_available: bool,
    #[prost(string, tag = "11")]
    pub model_info: String,
}

pub mod info {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Hand {
        None = 0,
        Right = 1,
        Left = 2,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SensorFrame {
    #[prost(message, optional, tag = "1")]
    pub gyro: Option<Vec3>,
    #[prost(message, optional, tag = "2")]
    pub acc: Option<Vec3>,
    #[prost(message, optional, tag = "3")]
    pub grav: Option<Vec3>,
    #[prost(message, optional, tag = "4")]
    pub quat: Option<Quat>,
    #[prost(int32, tag = "5")]
    pub delta_time: i32,
    #[prost(message, optional, tag = "6")]
    pub mag: Option<Vec3>,
    #[prost(message, optional, tag = "7")]
    pub mag_cal: Option<Vec3>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Gesture {
    #[prost(enumeration = "GestureType", tag = "1")]
    pub r#type: i32,
    #[prost(int32, tag = "2")]
    pub delta_time: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TouchEvent {
    #[prost(enumeration = "touch_event::TouchEventType", tag = "1")]
    pub event_type: i32,
    #[prost(int32, tag = "2")]
    pub action_index: i32,
    #[prost(int32, repeated, tag = "3")]
    pub pointer_ids: Vec<i32>,
    #[prost(message, repeated, tag = "4")]
    pub coords: Vec<Vec2>,
    #[prost(int32, tag = "5")]
    pub delta_time: i32,
}

pub mod touch_event {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum TouchEventType {
        None = 0,
        Begin = 1,
        End = 2,
        Move = 3,
        Cancel = 4,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RotaryEvent {
    #[prost(int32, tag = "1")]
    pub step: i32,
    #[prost(int32, tag = "2")]
    pub delta_time: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ButtonEvent {
    #[prost(int32, tag = "1")]
    pub id: i32,
    #[prost(int32, tag = "2")]
    pub delta_time: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProbabilityEntry {
    #[prost(enumeration = "GestureType", tag = "1")]
    pub label: i32,
    #[prost(float, tag = "2")]
    pub probability: f32,
}

/// One notification on the output characteristic.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Update {
    #[prost(message, repeated, tag = "1")]
    pub sensor_frames: Vec<SensorFrame>,
    #[prost(message, repeated, tag = "2")]
    pub gestures: Vec<Gesture>,
    #[prost(message, repeated, tag = "3")]
    pub touch_events: Vec<TouchEvent>,
    #[prost(message, repeated, tag = "4")]
    pub button_events: Vec<ButtonEvent>,
    #[prost(message, repeated, tag = "5")]
    pub rotary_events: Vec<RotaryEvent>,
    #[prost(enumeration = "update::Signal", repeated, tag = "6")]
    pub signals: Vec<i32>,
    #[prost(int32, tag = "7")]
    pub delta_time: i32,
    #[prost(int64, tag = "8")]
    pub unix_time: i64,
    #[prost(message, optional, tag = "9")]
    pub info: Option<Info>,
    #[prost(message, repeated, tag = "10")]
    pub probabilities: Vec<ProbabilityEntry>,
    #[prost(float, tag = "16")]
    pub pressure: f32,
}

pub mod update {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Signal {
        None = 0,
        Disconnect = 1,
        ConnectApproved = 2,
        DescriptionUpdate = 3,
    }
}

// --- Host to watch ---

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HapticEvent {
    #[prost(enumeration = "haptic_event::HapticType", tag = "1")]
    pub r#type: i32,
    #[prost(float, tag = "2")]
    pub intensity: f32,
    #[prost(int32, tag = "3")]
    pub length: i32,
}

pub mod haptic_event {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum HapticType {
        Cancel = 0,
        Oneshot = 1,
        Pattern = 2,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientInfo {
    #[prost(string, tag = "1")]
    pub app_name: String,
    #[prost(string, tag = "2")]
    pub device_name: String,
    #[prost(string, tag = "3")]
    pub os: String,
}

/// One write to the input characteristic.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InputUpdate {
    #[prost(message, optional, tag = "1")]
    pub haptic_event: Option<HapticEvent>,
    #[prost(message, optional, tag = "2")]
    pub client_info: Option<ClientInfo>,
    #[prost(message, optional, tag = "3")]
    pub model_request: Option<Model>,
}
