//! Fan-out of decoded updates to a [`WatchHandler`].
//!
//! The dispatcher owns the [`DeviceInfo`] of the approved watch. It applies
//! info patches, derives the arm-direction signal and calls the handler in
//! the order of [`decode_events`].

use std::collections::HashMap;

use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use touch_types::{CustomDataFormat, DeviceInfo, TouchPhase};

use crate::codec::{Decoded, decode_events, info_patch};
use crate::handler::WatchHandler;
use crate::proto::Update;
use crate::scan::DiscoveredDevice;

pub struct Dispatcher<H> {
    handler: H,
    info: DeviceInfo,
    info_tx: watch::Sender<DeviceInfo>,
    custom_data: HashMap<Uuid, CustomDataFormat>,
    device: Option<DiscoveredDevice>,
}

impl<H: WatchHandler> Dispatcher<H> {
    pub fn new(handler: H, custom_data: HashMap<Uuid, CustomDataFormat>) -> Self {
        let (info_tx, _) = watch::channel(DeviceInfo::default());
        Self::with_info_sender(handler, custom_data, info_tx)
    }

    /// Publish device info snapshots on an existing channel.
    pub fn with_info_sender(
        handler: H,
        custom_data: HashMap<Uuid, CustomDataFormat>,
        info_tx: watch::Sender<DeviceInfo>,
    ) -> Self {
        Self {
            handler,
            info: DeviceInfo::default(),
            info_tx,
            custom_data,
            device: None,
        }
    }

    /// Snapshots of the device info, updated after every change.
    pub fn info_receiver(&self) -> watch::Receiver<DeviceInfo> {
        self.info_tx.subscribe()
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Custom characteristics to subscribe after approval.
    pub fn custom_characteristics(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.custom_data.keys().copied()
    }

    /// A watch was approved. `initial` is the update read from the output
    /// characteristic, if the read succeeded.
    pub fn approved(&mut self, device: &DiscoveredDevice, initial: Option<&Update>) {
        self.info = DeviceInfo::default();
        self.device = Some(device.clone());

        if let Some(update) = initial {
            self.handler.on_frame(update);
            if let Some(info) = &update.info {
                self.info.apply(&info_patch(info));
            }
        }
        self.publish_info();

        self.handler.on_connect(device);
    }

    /// The approved watch is gone.
    pub fn disconnected(&mut self) {
        if let Some(device) = self.device.take() {
            self.handler.on_disconnect(&device);
        }
    }

    /// Dispatch one update from the approved watch.
    pub fn dispatch(&mut self, update: &Update) {
        self.handler.on_frame(update);

        for event in decode_events(update) {
            match event {
                Decoded::Probabilities(map) => self.handler.on_gesture_probability(&map),
                Decoded::Sensors(frame) => {
                    self.handler.on_sensors(&frame);
                    // Hand as known before this update's info is applied.
                    let delta = frame.arm_direction_change(self.info.hand);
                    self.handler.on_arm_direction_change(delta.dx, delta.dy);
                }
                Decoded::Gesture(gesture) => self.handler.on_gesture(gesture),
                Decoded::Tap => self.handler.on_tap(),
                Decoded::Touch { phase, x, y } => match phase {
                    TouchPhase::Down => self.handler.on_touch_down(x, y),
                    TouchPhase::Up => self.handler.on_touch_up(x, y),
                    TouchPhase::Move => self.handler.on_touch_move(x, y),
                    TouchPhase::Cancel => self.handler.on_touch_cancel(x, y),
                },
                Decoded::BackButton => self.handler.on_back_button(),
                Decoded::Rotary(direction) => self.handler.on_rotary(direction),
                Decoded::Info(patch) => {
                    self.info.apply(&patch);
                    self.publish_info();
                    self.handler.on_info_update(&self.info);
                }
                Decoded::Pressure(pressure) => self.handler.on_pressure(pressure),
            }
        }
    }

    /// Unpack and dispatch a notification from a custom characteristic.
    ///
    /// Payloads that do not fit the configured format are dropped.
    pub fn custom_data(&mut self, characteristic: Uuid, data: &[u8]) {
        let Some(format) = self.custom_data.get(&characteristic) else {
            debug!(%characteristic, "Notification from unconfigured characteristic");
            return;
        };
        match format.unpack(data) {
            Ok(values) => self.handler.on_custom_data(characteristic, &values),
            Err(e) => warn!(%characteristic, format = %format, error = %e, "Dropping custom data"),
        }
    }

    fn publish_info(&self) {
        self.info_tx.send_replace(self.info.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto;
    use std::collections::BTreeMap;
    use touch_types::{CustomValue, GestureType, Hand, SensorFrame};

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
        frames: Vec<SensorFrame>,
        arm: Vec<(f32, f32)>,
        custom: Vec<(Uuid, Vec<CustomValue>)>,
    }

    impl WatchHandler for Recorder {
        fn on_connect(&mut self, device: &DiscoveredDevice) {
            self.calls.push(format!("connect:{}", device.address));
        }
        fn on_disconnect(&mut self, device: &DiscoveredDevice) {
            self.calls.push(format!("disconnect:{}", device.address));
        }
        fn on_frame(&mut self, _update: &Update) {
            self.calls.push("frame".into());
        }
        fn on_sensors(&mut self, frame: &SensorFrame) {
            self.calls.push("sensors".into());
            self.frames.push(*frame);
        }
        fn on_arm_direction_change(&mut self, dx: f32, dy: f32) {
            self.calls.push("arm".into());
            self.arm.push((dx, dy));
        }
        fn on_gesture_probability(&mut self, _p: &BTreeMap<GestureType, f32>) {
            self.calls.push("probability".into());
        }
        fn on_tap(&mut self) {
            self.calls.push("tap".into());
        }
        fn on_gesture(&mut self, gesture: GestureType) {
            self.calls.push(format!("gesture:{gesture}"));
        }
        fn on_rotary(&mut self, direction: i32) {
            self.calls.push(format!("rotary:{direction}"));
        }
        fn on_info_update(&mut self, info: &DeviceInfo) {
            self.calls.push(format!("info:{}", info.hand));
        }
        fn on_custom_data(&mut self, characteristic: Uuid, values: &[CustomValue]) {
            self.custom.push((characteristic, values.to_vec()));
        }
    }

    fn device() -> DiscoveredDevice {
        DiscoveredDevice {
            address: "AA".into(),
            name: "Watch".into(),
            rssi: None,
        }
    }

    fn info_update(hand: proto::info::Hand) -> Update {
        Update {
            info: Some(proto::Info {
                hand: hand as i32,
                battery_percentage: 64,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn sensor_update(gyro_y: f32) -> proto::SensorFrame {
        proto::SensorFrame {
            gyro: Some(proto::Vec3 {
                x: 0.0,
                y: gyro_y,
                z: 0.0,
            }),
            grav: Some(proto::Vec3 {
                x: 0.0,
                y: 0.0,
                z: 9.81,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_approved_applies_initial_info() {
        let mut dispatcher = Dispatcher::new(Recorder::default(), HashMap::new());
        let rx = dispatcher.info_receiver();

        dispatcher.approved(&device(), Some(&info_update(proto::info::Hand::Left)));

        assert_eq!(dispatcher.info().hand, Hand::Left);
        assert_eq!(dispatcher.info().battery_percent, 64);
        assert_eq!(rx.borrow().hand, Hand::Left);
        assert_eq!(dispatcher.handler().calls, vec!["frame", "connect:AA"]);
    }

    #[test]
    fn test_approved_takes_only_info_from_initial_read() {
        let mut dispatcher = Dispatcher::new(Recorder::default(), HashMap::new());
        let mut initial = info_update(proto::info::Hand::Right);
        initial.gestures = vec![proto::Gesture {
            r#type: GestureType::Tap.as_wire(),
            delta_time: 0,
        }];

        dispatcher.approved(&device(), Some(&initial));

        assert_eq!(dispatcher.info().hand, Hand::Right);
        assert_eq!(dispatcher.handler().calls, vec!["frame", "connect:AA"]);
    }

    #[test]
    fn test_approved_without_initial_read() {
        let mut dispatcher = Dispatcher::new(Recorder::default(), HashMap::new());
        dispatcher.approved(&device(), None);
        assert_eq!(dispatcher.info(), &DeviceInfo::default());
        assert_eq!(dispatcher.handler().calls, vec!["connect:AA"]);
    }

    #[test]
    fn test_last_frame_tap_and_gesture() {
        let mut dispatcher = Dispatcher::new(Recorder::default(), HashMap::new());
        dispatcher.dispatch(&Update {
            sensor_frames: vec![sensor_update(1.0), sensor_update(2.0), sensor_update(3.0)],
            gestures: vec![proto::Gesture {
                r#type: GestureType::Tap.as_wire(),
                delta_time: 0,
            }],
            ..Default::default()
        });

        let recorder = dispatcher.handler();
        assert_eq!(recorder.frames.len(), 1);
        assert_eq!(recorder.frames[0].angular_velocity.y, 3.0);
        assert_eq!(recorder.calls.iter().filter(|c| *c == "tap").count(), 1);
        assert_eq!(
            recorder.calls.iter().filter(|c| *c == "gesture:TAP").count(),
            1
        );
        assert_eq!(
            recorder.calls,
            vec!["frame", "probability", "sensors", "arm", "gesture:TAP", "tap"]
        );
    }

    #[test]
    fn test_arm_direction_uses_hand_before_update() {
        let mut dispatcher = Dispatcher::new(Recorder::default(), HashMap::new());
        let mut update = info_update(proto::info::Hand::Left);
        update.sensor_frames = vec![sensor_update(2.0)];

        // Hand is still unknown when the sensors are processed.
        dispatcher.dispatch(&update);
        assert_eq!(dispatcher.handler().arm[0], (0.0, -2.0));
        assert_eq!(dispatcher.info().hand, Hand::Left);

        // Next frame sees the left hand and mirrors dy.
        dispatcher.dispatch(&Update {
            sensor_frames: vec![sensor_update(2.0)],
            ..Default::default()
        });
        assert_eq!(dispatcher.handler().arm[1], (0.0, 2.0));
    }

    #[test]
    fn test_info_update_callback_after_merge() {
        let mut dispatcher = Dispatcher::new(Recorder::default(), HashMap::new());
        let rx = dispatcher.info_receiver();
        dispatcher.dispatch(&info_update(proto::info::Hand::Right));

        assert!(
            dispatcher
                .handler()
                .calls
                .contains(&"info:right".to_string())
        );
        assert_eq!(rx.borrow().battery_percent, 64);
    }

    #[test]
    fn test_rotary_direction() {
        let mut dispatcher = Dispatcher::new(Recorder::default(), HashMap::new());
        dispatcher.dispatch(&Update {
            rotary_events: vec![proto::RotaryEvent { step: 1, delta_time: 0 }],
            ..Default::default()
        });
        assert!(
            dispatcher
                .handler()
                .calls
                .contains(&"rotary:-1".to_string())
        );
    }

    #[test]
    fn test_disconnect_only_after_connect() {
        let mut dispatcher = Dispatcher::new(Recorder::default(), HashMap::new());
        dispatcher.disconnected();
        assert!(dispatcher.handler().calls.is_empty());

        dispatcher.approved(&device(), None);
        dispatcher.disconnected();
        dispatcher.disconnected();
        assert_eq!(
            dispatcher.handler().calls,
            vec!["connect:AA", "disconnect:AA"]
        );
    }

    #[test]
    fn test_custom_data_unpacked() {
        let uuid = Uuid::from_u128(0x4b574af1);
        let format = CustomDataFormat::parse(">h<h").unwrap();
        let mut dispatcher =
            Dispatcher::new(Recorder::default(), HashMap::from([(uuid, format)]));
        assert_eq!(dispatcher.custom_characteristics().collect::<Vec<_>>(), vec![uuid]);

        dispatcher.custom_data(uuid, &[0x00, 0x01, 0x01, 0x00]);
        // Wrong length is dropped.
        dispatcher.custom_data(uuid, &[0x00]);
        // Unknown characteristic is ignored.
        dispatcher.custom_data(Uuid::nil(), &[0x00, 0x01, 0x01, 0x00]);

        assert_eq!(
            dispatcher.handler().custom,
            vec![(uuid, vec![CustomValue::Int(1), CustomValue::Int(1)])]
        );
    }
}
