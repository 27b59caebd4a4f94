//! The callback interface for watch events.

use std::collections::BTreeMap;

use uuid::Uuid;

use touch_types::{CustomValue, DeviceInfo, GestureType, SensorFrame};

use crate::proto::Update;
use crate::scan::DiscoveredDevice;

/// Receives events from the approved watch.
///
/// Every method has an empty default, so implementors override only what
/// they need. All callbacks run on the connector task, one at a time and in
/// the order the watch sent the data; they must not block. To talk back to
/// the watch from a callback, keep a [`WatchHandle`](crate::WatchHandle)
/// in the handler.
///
/// # Example
///
/// ```
/// use touch_core::WatchHandler;
///
/// struct TapCounter(u32);
///
/// impl WatchHandler for TapCounter {
///     fn on_tap(&mut self) {
///         self.0 += 1;
///     }
/// }
/// ```
#[allow(unused_variables)]
pub trait WatchHandler: Send + 'static {
    /// A watch accepted the connection. Initial device info is available.
    fn on_connect(&mut self, device: &DiscoveredDevice) {}

    /// The approved watch went away.
    fn on_disconnect(&mut self, device: &DiscoveredDevice) {}

    /// Every decoded update, before it is split into the callbacks below.
    ///
    /// Also called once at approval with the update read from the output
    /// characteristic.
    fn on_frame(&mut self, update: &Update) {}

    /// Newest motion sensor sample.
    fn on_sensors(&mut self, frame: &SensorFrame) {}

    /// Pointer-style delta derived from the gyroscope, see
    /// [`SensorFrame::arm_direction_change`].
    fn on_arm_direction_change(&mut self, dx: f32, dy: f32) {}

    /// Air pressure in hPa.
    fn on_pressure(&mut self, pressure: f32) {}

    /// Classifier output per gesture type. Called for every update, with an
    /// empty map when the watch sent none.
    fn on_gesture_probability(&mut self, probabilities: &BTreeMap<GestureType, f32>) {}

    /// A tap gesture was recognized.
    fn on_tap(&mut self) {}

    /// A gesture was recognized. Updates without gestures report
    /// [`GestureType::None`].
    fn on_gesture(&mut self, gesture: GestureType) {}

    fn on_touch_down(&mut self, x: f32, y: f32) {}

    fn on_touch_up(&mut self, x: f32, y: f32) {}

    fn on_touch_move(&mut self, x: f32, y: f32) {}

    fn on_touch_cancel(&mut self, x: f32, y: f32) {}

    /// The back button was pressed or released.
    fn on_back_button(&mut self) {}

    /// The rotary input turned; `direction` is positive clockwise.
    fn on_rotary(&mut self, direction: i32) {}

    /// A configured custom characteristic sent data.
    fn on_custom_data(&mut self, characteristic: Uuid, values: &[CustomValue]) {}

    /// Device info changed.
    fn on_info_update(&mut self, info: &DeviceInfo) {}
}

impl<H: WatchHandler + ?Sized> WatchHandler for Box<H> {
    fn on_connect(&mut self, device: &DiscoveredDevice) {
        (**self).on_connect(device)
    }
    fn on_disconnect(&mut self, device: &DiscoveredDevice) {
        (**self).on_disconnect(device)
    }
    fn on_frame(&mut self, update: &Update) {
        (**self).on_frame(update)
    }
    fn on_sensors(&mut self, frame: &SensorFrame) {
        (**self).on_sensors(frame)
    }
    fn on_arm_direction_change(&mut self, dx: f32, dy: f32) {
        (**self).on_arm_direction_change(dx, dy)
    }
    fn on_pressure(&mut self, pressure: f32) {
        (**self).on_pressure(pressure)
    }
    fn on_gesture_probability(&mut self, probabilities: &BTreeMap<GestureType, f32>) {
        (**self).on_gesture_probability(probabilities)
    }
    fn on_tap(&mut self) {
        (**self).on_tap()
    }
    fn on_gesture(&mut self, gesture: GestureType) {
        (**self).on_gesture(gesture)
    }
    fn on_touch_down(&mut self, x: f32, y: f32) {
        (**self).on_touch_down(x, y)
    }
    fn on_touch_up(&mut self, x: f32, y: f32) {
        (**self).on_touch_up(x, y)
    }
    fn on_touch_move(&mut self, x: f32, y: f32) {
        (**self).on_touch_move(x, y)
    }
    fn on_touch_cancel(&mut self, x: f32, y: f32) {
        (**self).on_touch_cancel(x, y)
    }
    fn on_back_button(&mut self) {
        (**self).on_back_button()
    }
    fn on_rotary(&mut self, direction: i32) {
        (**self).on_rotary(direction)
    }
    fn on_custom_data(&mut self, characteristic: Uuid, values: &[CustomValue]) {
        (**self).on_custom_data(characteristic, values)
    }
    fn on_info_update(&mut self, info: &DeviceInfo) {
        (**self).on_info_update(info)
    }
}

/// A handler that ignores everything.
impl WatchHandler for () {}
