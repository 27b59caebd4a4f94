//! Watch events as data.
//!
//! [`EventForwarder`] is a [`WatchHandler`] that turns every callback into a
//! [`WatchEvent`] on a broadcast channel, for applications that would rather
//! drain a queue than implement callbacks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use touch_types::{CustomValue, DeviceInfo, GestureType, SensorFrame, TouchPhase};

use crate::handler::WatchHandler;
use crate::scan::DiscoveredDevice;

/// Events emitted by the approved watch.
///
/// All events are serializable for logging and IPC.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum WatchEvent {
    Connected { device: DiscoveredDevice },
    Disconnected { device: DiscoveredDevice },
    Sensors { frame: SensorFrame },
    ArmDirection { dx: f32, dy: f32 },
    Pressure { pressure: f32 },
    GestureProbability { probabilities: BTreeMap<GestureType, f32> },
    Tap,
    Gesture { gesture: GestureType },
    Touch { phase: TouchPhase, x: f32, y: f32 },
    BackButton,
    Rotary { direction: i32 },
    CustomData {
        characteristic: Uuid,
        values: Vec<CustomValue>,
    },
    InfoUpdate { info: Box<DeviceInfo> },
}

/// Sender for watch events.
pub type EventSender = broadcast::Sender<WatchEvent>;

/// Receiver for watch events.
pub type EventReceiver = broadcast::Receiver<WatchEvent>;

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: WatchEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the sender for direct use.
    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        // Sensor frames arrive at up to ~100 Hz.
        Self::new(1024)
    }
}

/// A [`WatchHandler`] publishing every callback as a [`WatchEvent`].
///
/// Slow receivers lag and lose the oldest events, as with any broadcast
/// channel; the watch connection is never slowed down by a consumer.
///
/// # Example
///
/// ```
/// use touch_core::{EventDispatcher, EventForwarder};
///
/// let events = EventDispatcher::default();
/// let mut rx = events.subscribe();
/// let handler = EventForwarder::new(events.clone());
/// # let _ = (&mut rx, handler);
/// ```
#[derive(Debug, Clone)]
pub struct EventForwarder {
    events: EventDispatcher,
}

impl EventForwarder {
    pub fn new(events: EventDispatcher) -> Self {
        Self { events }
    }
}

impl WatchHandler for EventForwarder {
    fn on_connect(&mut self, device: &DiscoveredDevice) {
        self.events.send(WatchEvent::Connected {
            device: device.clone(),
        });
    }

    fn on_disconnect(&mut self, device: &DiscoveredDevice) {
        self.events.send(WatchEvent::Disconnected {
            device: device.clone(),
        });
    }

    fn on_sensors(&mut self, frame: &SensorFrame) {
        self.events.send(WatchEvent::Sensors { frame: *frame });
    }

    fn on_arm_direction_change(&mut self, dx: f32, dy: f32) {
        self.events.send(WatchEvent::ArmDirection { dx, dy });
    }

    fn on_pressure(&mut self, pressure: f32) {
        self.events.send(WatchEvent::Pressure { pressure });
    }

    fn on_gesture_probability(&mut self, probabilities: &BTreeMap<GestureType, f32>) {
        self.events.send(WatchEvent::GestureProbability {
            probabilities: probabilities.clone(),
        });
    }

    fn on_tap(&mut self) {
        self.events.send(WatchEvent::Tap);
    }

    fn on_gesture(&mut self, gesture: GestureType) {
        self.events.send(WatchEvent::Gesture { gesture });
    }

    fn on_touch_down(&mut self, x: f32, y: f32) {
        self.events.send(WatchEvent::Touch {
            phase: TouchPhase::Down,
            x,
            y,
        });
    }

    fn on_touch_up(&mut self, x: f32, y: f32) {
        self.events.send(WatchEvent::Touch {
            phase: TouchPhase::Up,
            x,
            y,
        });
    }

    fn on_touch_move(&mut self, x: f32, y: f32) {
        self.events.send(WatchEvent::Touch {
            phase: TouchPhase::Move,
            x,
            y,
        });
    }

    fn on_touch_cancel(&mut self, x: f32, y: f32) {
        self.events.send(WatchEvent::Touch {
            phase: TouchPhase::Cancel,
            x,
            y,
        });
    }

    fn on_back_button(&mut self) {
        self.events.send(WatchEvent::BackButton);
    }

    fn on_rotary(&mut self, direction: i32) {
        self.events.send(WatchEvent::Rotary { direction });
    }

    fn on_custom_data(&mut self, characteristic: Uuid, values: &[CustomValue]) {
        self.events.send(WatchEvent::CustomData {
            characteristic,
            values: values.to_vec(),
        });
    }

    fn on_info_update(&mut self, info: &DeviceInfo) {
        self.events.send(WatchEvent::InfoUpdate {
            info: Box::new(info.clone()),
        });
    }
}
