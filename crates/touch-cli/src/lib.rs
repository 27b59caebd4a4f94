//! Command-line interface for Touch SDK smartwatches.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scan` | List nearby watches without connecting |
//! | `watch` | Connect to the first watch that accepts and print its events |
//! | `stream` | Relay raw protobuf updates as base64 lines over stdin/stdout |
//! | `config` | Show or create the configuration file |
//!
//! # Output Formats
//!
//! - **Text** (default): Human-readable colored output
//! - **JSON**: One JSON object per line, tagged with `type`
//!
//! # Configuration
//!
//! The CLI reads `~/.config/touch-sdk/config.toml` (or platform equivalent):
//!
//! - `name_filter`: Only connect to watches whose name contains this
//! - `monitor_interval_ms`: Link check interval
//! - `connect_timeout_secs`: Connection timeout
//! - `[custom_data]`: Table of characteristic UUID to struct format
//!
//! Command-line flags take precedence over the file.
//!
//! # Environment Variables
//!
//! - `TOUCH_NAME_FILTER`: Default name filter (overridden by `--name`)
//! - `NO_COLOR`: Disable colored output when set
//!
//! # Examples
//!
//! ```bash
//! touch-sdk scan
//! touch-sdk watch --name galaxy --format json
//! touch-sdk watch --custom-data 00002a19-0000-1000-8000-00805f9b34fb=<B
//! touch-sdk stream < commands.b64
//! ```

// Re-export core dependencies for convenience
pub use touch_core;
pub use touch_types;
