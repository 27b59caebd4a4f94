//! Decoding of watch updates and encoding of host control messages.
//!
//! Decoding is split in two steps: [`decode_update`] turns one notification
//! into the raw [`Update`] message, and [`decode_events`] flattens it into
//! the ordered list of [`Decoded`] events the dispatcher fans out. The order
//! of that list is the order in which handler callbacks fire.

use std::collections::BTreeMap;

use prost::Message;
use serde::{Deserialize, Serialize};

use touch_types::{
    GestureSet, GestureType, Hand, InfoPatch, Quaternion, SensorFrame, TouchPhase, Vector3,
};

use crate::error::Result;
use crate::proto::{self, Update, update::Signal};

/// Button id of the watch's back button.
pub const BACK_BUTTON_ID: i32 = 0;

/// Longest haptic pulse the watch accepts, in milliseconds.
pub const MAX_HAPTIC_DURATION_MS: i32 = 5000;

/// Decode one notification payload from the output characteristic.
///
/// An empty payload is a valid, empty update.
pub fn decode_update(data: &[u8]) -> Result<Update> {
    Ok(Update::decode(data)?)
}

/// Whether the update asks the host to disconnect.
///
/// Before approval this means the watch declined the connection.
pub fn has_disconnect_signal(update: &Update) -> bool {
    update
        .signals
        .iter()
        .any(|s| *s == Signal::Disconnect as i32)
}

/// One event carried by an update.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Classifier output, always present (possibly empty).
    Probabilities(BTreeMap<GestureType, f32>),
    /// Newest sensor frame of the batch.
    Sensors(SensorFrame),
    Gesture(GestureType),
    Tap,
    Touch { phase: TouchPhase, x: f32, y: f32 },
    BackButton,
    /// Rotation direction, with the sign flipped relative to the wire.
    Rotary(i32),
    Info(InfoPatch),
    /// Air pressure in hPa.
    Pressure(f32),
}

/// Flatten an update into its events, in callback order.
pub fn decode_events(update: &Update) -> Vec<Decoded> {
    let mut events = Vec::new();

    let probabilities = update
        .probabilities
        .iter()
        .filter_map(|p| GestureType::from_wire(p.label).map(|g| (g, p.probability)))
        .collect();
    events.push(Decoded::Probabilities(probabilities));

    if let Some(frame) = update.sensor_frames.last() {
        events.push(Decoded::Sensors(sensor_frame(frame, update.unix_time)));
    }

    if update.gestures.is_empty() {
        events.push(Decoded::Gesture(GestureType::None));
    }
    for gesture in &update.gestures {
        let Some(kind) = GestureType::from_wire(gesture.r#type) else {
            continue;
        };
        events.push(Decoded::Gesture(kind));
        if kind == GestureType::Tap {
            events.push(Decoded::Tap);
        }
    }

    for touch in &update.touch_events {
        let (Some(phase), Some(point)) = (TouchPhase::from_wire(touch.event_type), touch.coords.first())
        else {
            continue;
        };
        events.push(Decoded::Touch {
            phase,
            x: point.x,
            y: point.y,
        });
    }

    if update.button_events.iter().any(|b| b.id == BACK_BUTTON_ID) {
        events.push(Decoded::BackButton);
    }

    for rotary in &update.rotary_events {
        events.push(Decoded::Rotary(rotary.step.saturating_neg()));
    }

    if let Some(info) = &update.info {
        events.push(Decoded::Info(info_patch(info)));
    }

    if update.pressure != 0.0 {
        events.push(Decoded::Pressure(update.pressure));
    }

    events
}

fn vector(v: Option<&proto::Vec3>) -> Vector3 {
    v.map(|v| Vector3::new(v.x, v.y, v.z)).unwrap_or_default()
}

fn sensor_frame(frame: &proto::SensorFrame, timestamp: i64) -> SensorFrame {
    let quat = frame.quat.unwrap_or_default();
    SensorFrame {
        acceleration: vector(frame.acc.as_ref()),
        gravity: vector(frame.grav.as_ref()),
        angular_velocity: vector(frame.gyro.as_ref()),
        orientation: Quaternion {
            x: quat.x,
            y: quat.y,
            z: quat.z,
            w: quat.w,
        },
        magnetic_field: frame.mag.as_ref().map(|v| vector(Some(v))),
        magnetic_field_calibration: frame.mag_cal.as_ref().map(|v| vector(Some(v))),
        timestamp,
    }
}

fn gesture_set(model: &proto::Model) -> GestureSet {
    model
        .gestures
        .iter()
        .filter_map(|g| GestureType::from_wire(*g))
        .collect()
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Convert a wire `Info` into a patch. Proto3 default values count as absent.
pub(crate) fn info_patch(info: &proto::Info) -> InfoPatch {
    InfoPatch {
        hand: Hand::from_wire(info.hand),
        battery_percent: (info.battery_percentage != 0).then_some(info.battery_percentage),
        screen_resolution: info.touch_screen_resolution.map(|r| (r.x, r.y)),
        haptics_available: info.haptics_available.then_some(true),
        app_id: non_empty(&info.app_id),
        app_version: non_empty(&info.app_version),
        device_name: non_empty(&info.device_name),
        manufacturer: non_empty(&info.manufacturer),
        model_info: non_empty(&info.model_info),
        available_models: (!info.available_models.is_empty())
            .then(|| info.available_models.iter().map(gesture_set).collect()),
        active_model: info.active_model.as_ref().map(gesture_set),
    }
}

/// Identification the host sends to a watch during the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub app_name: String,
    pub device_name: String,
    pub os: String,
}

impl ClientInfo {
    /// Describe the current process and host.
    ///
    /// The app name is the executable name, the device name is the host
    /// name. Either falls back to a generic value if unavailable.
    pub fn from_host() -> Self {
        let app_name = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "touch-sdk".to_string());
        let device_name = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());

        Self {
            app_name,
            device_name,
            os: std::env::consts::OS.to_string(),
        }
    }
}

/// An outbound message for the watch's input characteristic.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    ClientInfo(ClientInfo),
    /// One-shot vibration. Values are clamped when encoded.
    HapticTrigger { intensity: f32, duration_ms: i64 },
    /// Ask the watch to switch to the model recognizing these gestures.
    ModelRequest(GestureSet),
}

impl ControlMessage {
    /// Build the wire message, clamping haptic parameters into range.
    pub fn to_input_update(&self) -> proto::InputUpdate {
        let mut input = proto::InputUpdate::default();
        match self {
            ControlMessage::ClientInfo(info) => {
                input.client_info = Some(proto::ClientInfo {
                    app_name: info.app_name.clone(),
                    device_name: info.device_name.clone(),
                    os: info.os.clone(),
                });
            }
            ControlMessage::HapticTrigger {
                intensity,
                duration_ms,
            } => {
                let intensity = if intensity.is_nan() {
                    0.0
                } else {
                    intensity.clamp(0.0, 1.0)
                };
                // Clamped into [0, 5000] first, so the cast is lossless.
                let length = (*duration_ms).clamp(0, i64::from(MAX_HAPTIC_DURATION_MS)) as i32;
                input.haptic_event = Some(proto::HapticEvent {
                    r#type: proto::haptic_event::HapticType::Oneshot as i32,
                    intensity,
                    length,
                });
            }
            ControlMessage::ModelRequest(gestures) => {
                input.model_request = Some(proto::Model {
                    gestures: gestures.iter().map(|g| g.as_wire()).collect(),
                });
            }
        }
        input
    }

    /// Serialize for writing to the input characteristic.
    pub fn encode(&self) -> Vec<u8> {
        self.to_input_update().encode_to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn vec3(x: f32, y: f32, z: f32) -> Option<proto::Vec3> {
        Some(proto::Vec3 { x, y, z })
    }

    fn frame(gyro_y: f32) -> proto::SensorFrame {
        proto::SensorFrame {
            gyro: vec3(0.0, gyro_y, 0.0),
            acc: vec3(0.1, 0.2, 0.3),
            grav: vec3(0.0, 0.0, 9.81),
            quat: Some(proto::Quat {
                x: 0.0,
                y: 0.0,
                z: 0.0,
                w: 1.0,
            }),
            ..Default::default()
        }
    }

    fn tap() -> proto::Gesture {
        proto::Gesture {
            r#type: GestureType::Tap.as_wire(),
            delta_time: 0,
        }
    }

    #[test]
    fn test_empty_update_decodes() {
        let update = decode_update(&[]).unwrap();
        assert_eq!(update, Update::default());
        assert!(!has_disconnect_signal(&update));

        let events = decode_events(&update);
        assert_eq!(
            events,
            vec![
                Decoded::Probabilities(BTreeMap::new()),
                Decoded::Gesture(GestureType::None),
            ]
        );
    }

    #[test]
    fn test_garbage_fails_to_decode() {
        assert!(decode_update(&[0x0a, 0xff, 0xff]).is_err());
    }

    #[test]
    fn test_disconnect_signal() {
        let update = Update {
            signals: vec![Signal::ConnectApproved as i32, Signal::Disconnect as i32],
            ..Default::default()
        };
        let bytes = update.encode_to_vec();
        assert!(has_disconnect_signal(&decode_update(&bytes).unwrap()));

        let update = Update {
            signals: vec![Signal::DescriptionUpdate as i32],
            ..Default::default()
        };
        assert!(!has_disconnect_signal(&update));
    }

    #[test]
    fn test_last_sensor_frame_and_tap() {
        let update = Update {
            sensor_frames: vec![frame(1.0), frame(2.0), frame(3.0)],
            gestures: vec![tap()],
            unix_time: 1_700_000_000_000,
            ..Default::default()
        };
        let events = decode_events(&update);

        let sensors: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Decoded::Sensors(f) => Some(*f),
                _ => None,
            })
            .collect();
        assert_eq!(sensors.len(), 1);
        assert_eq!(sensors[0].angular_velocity.y, 3.0);
        assert_eq!(sensors[0].timestamp, 1_700_000_000_000);

        let taps = events.iter().filter(|e| **e == Decoded::Tap).count();
        let gestures = events
            .iter()
            .filter(|e| **e == Decoded::Gesture(GestureType::Tap))
            .count();
        assert_eq!(taps, 1);
        assert_eq!(gestures, 1);
    }

    #[test]
    fn test_event_order() {
        let update = Update {
            sensor_frames: vec![frame(1.0)],
            gestures: vec![tap()],
            touch_events: vec![proto::TouchEvent {
                event_type: proto::touch_event::TouchEventType::Begin as i32,
                coords: vec![proto::Vec2 { x: 10.0, y: 20.0 }, proto::Vec2 { x: 1.0, y: 2.0 }],
                ..Default::default()
            }],
            button_events: vec![proto::ButtonEvent { id: 0, delta_time: 0 }],
            rotary_events: vec![proto::RotaryEvent { step: 1, delta_time: 0 }],
            info: Some(proto::Info {
                hand: proto::info::Hand::Right as i32,
                ..Default::default()
            }),
            pressure: 1013.25,
            ..Default::default()
        };

        let events = decode_events(&update);
        let kinds: Vec<&str> = events
            .iter()
            .map(|e| match e {
                Decoded::Probabilities(_) => "probabilities",
                Decoded::Sensors(_) => "sensors",
                Decoded::Gesture(_) => "gesture",
                Decoded::Tap => "tap",
                Decoded::Touch { .. } => "touch",
                Decoded::BackButton => "back",
                Decoded::Rotary(_) => "rotary",
                Decoded::Info(_) => "info",
                Decoded::Pressure(_) => "pressure",
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "probabilities",
                "sensors",
                "gesture",
                "tap",
                "touch",
                "back",
                "rotary",
                "info",
                "pressure"
            ]
        );
        assert!(events.contains(&Decoded::Touch {
            phase: TouchPhase::Down,
            x: 10.0,
            y: 20.0
        }));
    }

    #[test]
    fn test_rotary_sign_inverted() {
        let update = Update {
            rotary_events: vec![
                proto::RotaryEvent { step: 1, delta_time: 0 },
                proto::RotaryEvent { step: -1, delta_time: 0 },
            ],
            ..Default::default()
        };
        let rotary: Vec<_> = decode_events(&update)
            .into_iter()
            .filter_map(|e| match e {
                Decoded::Rotary(d) => Some(d),
                _ => None,
            })
            .collect();
        assert_eq!(rotary, vec![-1, 1]);
    }

    #[test]
    fn test_back_button_only_for_id_zero() {
        let update = Update {
            button_events: vec![proto::ButtonEvent { id: 3, delta_time: 0 }],
            ..Default::default()
        };
        assert!(!decode_events(&update).contains(&Decoded::BackButton));

        let update = Update {
            button_events: vec![
                proto::ButtonEvent { id: 0, delta_time: 0 },
                proto::ButtonEvent { id: 0, delta_time: 5 },
            ],
            ..Default::default()
        };
        let backs = decode_events(&update)
            .into_iter()
            .filter(|e| *e == Decoded::BackButton)
            .count();
        assert_eq!(backs, 1);
    }

    #[test]
    fn test_zero_pressure_is_absent() {
        let events = decode_events(&Update::default());
        assert!(!events.iter().any(|e| matches!(e, Decoded::Pressure(_))));

        let update = Update {
            pressure: 998.5,
            ..Default::default()
        };
        assert!(decode_events(&update).contains(&Decoded::Pressure(998.5)));
    }

    #[test]
    fn test_touch_without_coordinates_is_skipped() {
        let update = Update {
            touch_events: vec![proto::TouchEvent {
                event_type: proto::touch_event::TouchEventType::End as i32,
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(
            !decode_events(&update)
                .iter()
                .any(|e| matches!(e, Decoded::Touch { .. }))
        );
    }

    #[test]
    fn test_probabilities() {
        let update = Update {
            probabilities: vec![
                proto::ProbabilityEntry {
                    label: GestureType::Tap.as_wire(),
                    probability: 0.8,
                },
                proto::ProbabilityEntry {
                    label: 77,
                    probability: 0.1,
                },
            ],
            ..Default::default()
        };
        let Decoded::Probabilities(map) = &decode_events(&update)[0] else {
            panic!("probabilities must come first");
        };
        assert_eq!(map.len(), 1);
        assert_eq!(map[&GestureType::Tap], 0.8);
    }

    #[test]
    fn test_info_patch_defaults_are_absent() {
        let info = proto::Info {
            hand: proto::info::Hand::Left as i32,
            app_id: "com.example".into(),
            available_models: vec![proto::Model {
                gestures: vec![1, 2, 2],
            }],
            touch_screen_resolution: Some(proto::Vec2 { x: 396.0, y: 484.0 }),
            ..Default::default()
        };
        let patch = info_patch(&info);
        assert_eq!(patch.hand, Hand::Left);
        assert_eq!(patch.app_id.as_deref(), Some("com.example"));
        assert_eq!(patch.app_version, None);
        assert_eq!(patch.battery_percent, None);
        assert_eq!(patch.haptics_available, None);
        assert_eq!(patch.active_model, None);
        assert_eq!(patch.screen_resolution, Some((396.0, 484.0)));
        assert_eq!(
            patch.available_models,
            Some(vec![GestureSet::from([GestureType::Tap, GestureType::Clench])])
        );
    }

    #[test]
    fn test_magnetometer_optional() {
        let mut with_mag = frame(0.0);
        with_mag.mag = vec3(20.0, -5.0, 40.0);
        let update = Update {
            sensor_frames: vec![with_mag],
            ..Default::default()
        };
        let Some(Decoded::Sensors(frame)) = decode_events(&update).into_iter().nth(1) else {
            panic!("expected sensors");
        };
        assert_eq!(frame.magnetic_field, Some(Vector3::new(20.0, -5.0, 40.0)));
        assert_eq!(frame.magnetic_field_calibration, None);
    }

    #[test]
    fn test_haptic_clamping() {
        let high = ControlMessage::HapticTrigger {
            intensity: 1.5,
            duration_ms: 9000,
        }
        .to_input_update()
        .haptic_event
        .unwrap();
        assert_eq!(high.intensity, 1.0);
        assert_eq!(high.length, 5000);
        assert_eq!(high.r#type, proto::haptic_event::HapticType::Oneshot as i32);

        let low = ControlMessage::HapticTrigger {
            intensity: -0.2,
            duration_ms: -10,
        }
        .to_input_update()
        .haptic_event
        .unwrap();
        assert_eq!(low.intensity, 0.0);
        assert_eq!(low.length, 0);
    }

    #[test]
    fn test_haptic_encode_roundtrip() {
        let bytes = ControlMessage::HapticTrigger {
            intensity: 0.5,
            duration_ms: 250,
        }
        .encode();
        let decoded = proto::InputUpdate::decode(bytes.as_slice()).unwrap();
        let haptic = decoded.haptic_event.unwrap();
        assert_eq!(haptic.intensity, 0.5);
        assert_eq!(haptic.length, 250);
        assert!(decoded.client_info.is_none());
    }

    #[test]
    fn test_model_request_collapses_duplicates() {
        let gestures: GestureSet = [GestureType::Tap, GestureType::Tap, GestureType::Clench]
            .into_iter()
            .collect();
        let input = ControlMessage::ModelRequest(gestures).to_input_update();
        let mut wire = input.model_request.unwrap().gestures;
        wire.sort_unstable();
        assert_eq!(wire, vec![1, 2]);
    }

    #[test]
    fn test_client_info_encoding() {
        let info = ClientInfo {
            app_name: "touch".into(),
            device_name: "laptop".into(),
            os: "linux".into(),
        };
        let bytes = ControlMessage::ClientInfo(info).encode();
        let decoded = proto::InputUpdate::decode(bytes.as_slice()).unwrap();
        let client = decoded.client_info.unwrap();
        assert_eq!(client.app_name, "touch");
        assert_eq!(client.device_name, "laptop");
        assert_eq!(client.os, "linux");
    }

    #[test]
    fn test_client_info_from_host() {
        let info = ClientInfo::from_host();
        assert!(!info.app_name.is_empty());
        assert_eq!(info.os, std::env::consts::OS);
    }

    proptest! {
        #[test]
        fn decode_never_panics(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            if let Ok(update) = decode_update(&data) {
                let _ = decode_events(&update);
            }
        }

        #[test]
        fn haptic_always_in_range(intensity in any::<f32>(), duration in any::<i64>()) {
            let haptic = ControlMessage::HapticTrigger { intensity, duration_ms: duration }
                .to_input_update()
                .haptic_event
                .unwrap();
            prop_assert!((0.0..=1.0).contains(&haptic.intensity));
            prop_assert!((0..=MAX_HAPTIC_DURATION_MS).contains(&haptic.length));
        }
    }
}
