//! Entry point: configure, run and control a watch connection.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use touch_types::{CustomDataFormat, DeviceInfo, GestureSet};

use crate::ble::{BleTransport, ConnectionConfig};
use crate::codec::{ClientInfo, ControlMessage};
use crate::connector::{Connector, Request};
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::handler::WatchHandler;
use crate::scan::Scanner;
use crate::transport::Transport;
use crate::uuid::{PROTOBUF_INPUT, PROTOBUF_OUTPUT};

/// Default period of the link liveness check.
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(2);

/// Configuration for a [`Watch`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use touch_core::WatchConfig;
/// use uuid::Uuid;
///
/// let config = WatchConfig::new()
///     .name_filter("Galaxy")
///     .monitor_interval(Duration::from_secs(1))
///     .custom_data(Uuid::from_u128(0x1234), "<3f");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Only connect to watches whose name contains this, case-insensitive.
    pub name_filter: Option<String>,
    /// How often to check that connected links are still up.
    pub monitor_interval: Duration,
    /// Custom characteristics to subscribe, with their `struct` formats.
    pub custom_data: HashMap<Uuid, String>,
    /// Identification sent to each watch on first connect.
    pub client_info: ClientInfo,
    /// Transport timeouts.
    pub connection: ConnectionConfig,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            name_filter: None,
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
            custom_data: HashMap::new(),
            client_info: ClientInfo::from_host(),
            connection: ConnectionConfig::default(),
        }
    }
}

impl WatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn name_filter(mut self, filter: impl Into<String>) -> Self {
        self.name_filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    /// Subscribe to a custom characteristic and unpack its notifications
    /// with a Python `struct` format string.
    #[must_use]
    pub fn custom_data(mut self, characteristic: Uuid, format: impl Into<String>) -> Self {
        self.custom_data.insert(characteristic, format.into());
        self
    }

    #[must_use]
    pub fn client_info(mut self, client_info: ClientInfo) -> Self {
        self.client_info = client_info;
        self
    }

    #[must_use]
    pub fn connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }

    /// Check the configuration, parsing every custom data format.
    pub fn validate(&self) -> Result<()> {
        self.custom_formats().map(|_| ())
    }

    fn custom_formats(&self) -> Result<HashMap<Uuid, CustomDataFormat>> {
        if self.monitor_interval.is_zero() {
            return Err(Error::invalid_config("monitor interval must be non-zero"));
        }
        if self.connection.connection_timeout.is_zero() {
            return Err(Error::invalid_config("connection timeout must be non-zero"));
        }

        self.custom_data
            .iter()
            .map(|(uuid, format)| {
                if *uuid == PROTOBUF_OUTPUT || *uuid == PROTOBUF_INPUT {
                    return Err(Error::invalid_config(format!(
                        "{uuid} is a protocol characteristic"
                    )));
                }
                let parsed = CustomDataFormat::parse(format).map_err(|e| {
                    Error::invalid_config(format!("custom data format for {uuid}: {e}"))
                })?;
                Ok((*uuid, parsed))
            })
            .collect()
    }
}

/// Controls a running [`Watch`].
///
/// Cheap to clone and safe to use from inside handler callbacks: every
/// method only queues work for the connector task.
#[derive(Debug, Clone)]
pub struct WatchHandle {
    requests: mpsc::UnboundedSender<Request>,
    cancel: CancellationToken,
    info: tokio::sync::watch::Receiver<DeviceInfo>,
}

impl WatchHandle {
    /// Stop scanning, disconnect every watch and end the run.
    ///
    /// Calling this more than once, or before anything connected, is fine.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Whether [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Vibrate the watch once.
    ///
    /// `intensity` is clamped to `0.0..=1.0`, `duration_ms` to `0..=5000`.
    pub fn trigger_haptics(&self, intensity: f32, duration_ms: i64) -> Result<()> {
        self.send(Request::Control(ControlMessage::HapticTrigger {
            intensity,
            duration_ms,
        }))
    }

    /// Ask the watch to switch to a model recognizing these gestures.
    pub fn request_model(&self, gestures: GestureSet) -> Result<()> {
        self.send(Request::Control(ControlMessage::ModelRequest(gestures)))
    }

    /// Write an encoded `InputUpdate` to the watch as is.
    pub fn send_raw(&self, data: Vec<u8>) -> Result<()> {
        self.send(Request::Raw(data))
    }

    /// Latest known info of the approved watch.
    pub fn device_info(&self) -> DeviceInfo {
        self.info.borrow().clone()
    }

    fn send(&self, request: Request) -> Result<()> {
        if self.is_stopped() {
            return Err(Error::Cancelled);
        }
        self.requests.send(request).map_err(|_| Error::Cancelled)
    }
}

/// A connection to the first watch that accepts.
///
/// # Example
///
/// ```no_run
/// use touch_core::{Watch, WatchConfig, WatchHandler};
///
/// struct Taps;
///
/// impl WatchHandler for Taps {
///     fn on_tap(&mut self) {
///         println!("tap");
///     }
/// }
///
/// #[tokio::main]
/// async fn main() -> touch_core::Result<()> {
///     let watch = Watch::new(WatchConfig::new())?;
///     watch.run(Taps).await
/// }
/// ```
pub struct Watch {
    config: WatchConfig,
    custom_formats: HashMap<Uuid, CustomDataFormat>,
    handle: WatchHandle,
    requests: mpsc::UnboundedReceiver<Request>,
    info_tx: tokio::sync::watch::Sender<DeviceInfo>,
}

impl std::fmt::Debug for Watch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watch")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Watch {
    /// Validate the configuration and prepare a run.
    pub fn new(config: WatchConfig) -> Result<Self> {
        let custom_formats = config.custom_formats()?;
        let (requests_tx, requests) = mpsc::unbounded_channel();
        let (info_tx, info_rx) = tokio::sync::watch::channel(DeviceInfo::default());

        Ok(Self {
            config,
            custom_formats,
            handle: WatchHandle {
                requests: requests_tx,
                cancel: CancellationToken::new(),
                info: info_rx,
            },
            requests,
            info_tx,
        })
    }

    /// A handle to control the run, usable before and during it.
    pub fn handle(&self) -> WatchHandle {
        self.handle.clone()
    }

    /// Scan, connect and dispatch events to `handler` until stopped.
    pub async fn run<H: WatchHandler>(self, handler: H) -> Result<()> {
        let transport = BleTransport::new(self.config.connection.clone()).await?;
        self.run_with_transport(transport, handler).await
    }

    /// Like [`run`](Self::run) over any [`Transport`].
    pub async fn run_with_transport<T, H>(self, transport: T, handler: H) -> Result<()>
    where
        T: Transport,
        H: WatchHandler,
    {
        let Watch {
            config,
            custom_formats,
            handle,
            requests,
            info_tx,
        } = self;

        let dispatcher = Dispatcher::with_info_sender(handler, custom_formats, info_tx);
        let scanner = Scanner::new(config.name_filter.as_deref());
        let client_info = ControlMessage::ClientInfo(config.client_info);

        Connector::new(
            transport,
            dispatcher,
            scanner,
            &client_info,
            config.monitor_interval,
        )
        .run(requests, handle.cancel)
        .await
    }

    /// Run on a new runtime, blocking the current thread until stopped or
    /// Ctrl-C is pressed.
    pub fn start<H: WatchHandler>(self, handler: H) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;

        runtime.block_on(async move {
            let handle = self.handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupted");
                    handle.stop();
                }
            });
            self.run(handler).await
        })
    }
}
