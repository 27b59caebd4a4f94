//! Output formatting for text and JSON output.

use anyhow::Result;
use owo_colors::OwoColorize;
use serde::Serialize;
use touch_core::{DeviceInfo, DiscoveredDevice, TouchPhase, WatchEvent};

/// Formatting options for output.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    /// Disable colored output.
    pub no_color: bool,
    /// Include sensor frames and derived motion in watch output.
    pub sensors: bool,
}

impl FormatOptions {
    pub fn new(no_color: bool) -> Self {
        Self {
            no_color,
            sensors: false,
        }
    }

    pub fn with_sensors(mut self, sensors: bool) -> Self {
        self.sensors = sensors;
        self
    }
}

fn json_line<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)? + "\n")
}

fn phase_label(phase: TouchPhase) -> &'static str {
    match phase {
        TouchPhase::Down => "down",
        TouchPhase::Up => "up",
        TouchPhase::Move => "move",
        TouchPhase::Cancel => "cancel",
    }
}

fn device_label(device: &DiscoveredDevice) -> String {
    if device.name.is_empty() {
        device.address.clone()
    } else {
        format!("{} ({})", device.name, device.address)
    }
}

// ============================================================================
// Scan output
// ============================================================================

#[must_use]
pub fn format_scan_text(devices: &[DiscoveredDevice], opts: &FormatOptions) -> String {
    if devices.is_empty() {
        return "No watches found\n".to_string();
    }

    let name_width = devices
        .iter()
        .map(|d| d.name.len())
        .max()
        .unwrap_or(0)
        .max("NAME".len());

    let mut output = String::new();
    let header = format!("{:<name_width$}  {:<36}  RSSI", "NAME", "ADDRESS");
    if opts.no_color {
        output.push_str(&header);
    } else {
        output.push_str(&header.bold().to_string());
    }
    output.push('\n');

    for device in devices {
        let name = if device.name.is_empty() {
            "-"
        } else {
            device.name.as_str()
        };
        let rssi = device
            .rssi
            .map(|r| format!("{} dBm", r))
            .unwrap_or_else(|| "-".to_string());
        output.push_str(&format!(
            "{:<name_width$}  {:<36}  {}\n",
            name, device.address, rssi
        ));
    }
    output
}

pub fn format_scan_json(devices: &[DiscoveredDevice]) -> Result<String> {
    Ok(serde_json::to_string_pretty(devices)? + "\n")
}

// ============================================================================
// Watch output
// ============================================================================

/// Whether an event is printed with the given options.
#[must_use]
pub fn is_shown(event: &WatchEvent, opts: &FormatOptions) -> bool {
    match event {
        WatchEvent::Sensors { .. } | WatchEvent::ArmDirection { .. } => opts.sensors,
        _ => true,
    }
}

pub fn format_event_json(event: &WatchEvent) -> Result<String> {
    json_line(event)
}

/// One line of human readable output for an event.
#[must_use]
pub fn format_event_text(event: &WatchEvent, opts: &FormatOptions) -> String {
    let line = match event {
        WatchEvent::Connected { device } => {
            let text = format!("Connected to {}", device_label(device));
            if opts.no_color {
                text
            } else {
                text.green().bold().to_string()
            }
        }
        WatchEvent::Disconnected { device } => {
            let text = format!("Disconnected from {}", device_label(device));
            if opts.no_color {
                text
            } else {
                text.yellow().bold().to_string()
            }
        }
        WatchEvent::Sensors { frame } => format!(
            "sensors  acc=({:.2}, {:.2}, {:.2}) gyro=({:.2}, {:.2}, {:.2}) t={}",
            frame.acceleration.x,
            frame.acceleration.y,
            frame.acceleration.z,
            frame.angular_velocity.x,
            frame.angular_velocity.y,
            frame.angular_velocity.z,
            frame.timestamp
        ),
        WatchEvent::ArmDirection { dx, dy } => format!("arm      dx={:.3} dy={:.3}", dx, dy),
        WatchEvent::Pressure { pressure } => format!("pressure {:.2} hPa", pressure),
        WatchEvent::GestureProbability { probabilities } => {
            let parts: Vec<String> = probabilities
                .iter()
                .map(|(gesture, p)| format!("{}={:.2}", gesture, p))
                .collect();
            format!("probability {}", parts.join(" "))
        }
        WatchEvent::Tap => {
            if opts.no_color {
                "tap".to_string()
            } else {
                "tap".cyan().bold().to_string()
            }
        }
        WatchEvent::Gesture { gesture } => format!("gesture  {}", gesture),
        WatchEvent::Touch { phase, x, y } => {
            format!("touch    {} ({:.0}, {:.0})", phase_label(*phase), x, y)
        }
        WatchEvent::BackButton => "back button".to_string(),
        WatchEvent::Rotary { direction } => format!("rotary   {:+}", direction),
        WatchEvent::CustomData {
            characteristic,
            values,
        } => {
            let parts: Vec<String> = values.iter().map(ToString::to_string).collect();
            format!("custom   {} [{}]", characteristic, parts.join(", "))
        }
        WatchEvent::InfoUpdate { info } => format_info_text(info),
        _ => format!("{:?}", event),
    };
    line + "\n"
}

fn format_info_text(info: &DeviceInfo) -> String {
    let mut parts = vec![format!("hand={}", info.hand)];
    if info.battery_percent >= 0 {
        parts.push(format!("battery={}%", info.battery_percent));
    }
    if !info.device_name.is_empty() {
        parts.push(format!("device={}", info.device_name));
    }
    if !info.app_version.is_empty() {
        parts.push(format!("app={}", info.app_version));
    }
    if !info.active_model.is_empty() {
        let gestures: Vec<String> = info.active_model.iter().map(ToString::to_string).collect();
        parts.push(format!("model={}", gestures.join("+")));
    }
    format!("info     {}", parts.join(" "))
}
