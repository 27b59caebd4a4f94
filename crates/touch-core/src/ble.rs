//! btleplug implementation of [`Transport`] and [`Link`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ConnectionFailureReason, Error, Result};
use crate::scan::Advertisement;
use crate::transport::{Link, NotificationStream, Transport};
use crate::uuid::INTERACTION_SERVICE;

/// Default timeout for BLE characteristic read operations.
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for BLE characteristic write operations.
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for BLE connection operations.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default timeout for service discovery.
const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for BLE connection timeouts.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use touch_core::ConnectionConfig;
///
/// let config = ConnectionConfig::default()
///     .connection_timeout(Duration::from_secs(20))
///     .read_timeout(Duration::from_secs(15));
/// assert_eq!(config.connection_timeout, Duration::from_secs(20));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Timeout for establishing a BLE connection.
    pub connection_timeout: Duration,
    /// Timeout for BLE read operations.
    pub read_timeout: Duration,
    /// Timeout for BLE write and subscribe operations.
    pub write_timeout: Duration,
    /// Timeout for service discovery after connection.
    pub discovery_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connection_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
        }
    }
}

impl ConnectionConfig {
    /// Create a new connection config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the read timeout.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the write timeout.
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the service discovery timeout.
    #[must_use]
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }
}

/// Get the first available Bluetooth adapter.
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    adapters
        .into_iter()
        .next()
        .ok_or_else(|| Error::connection_failed(None, ConnectionFailureReason::AdapterUnavailable))
}

/// Format a peripheral id without the `PeripheralId(..)` wrapper.
fn format_peripheral_id(id: &PeripheralId) -> String {
    format!("{:?}", id)
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .to_string()
}

/// The address to identify a device by. macOS hides MAC addresses and
/// reports all zeros, in which case the peripheral id is used instead.
fn create_identifier(address: &str, peripheral_id: &PeripheralId) -> String {
    if address == "00:00:00:00:00:00" {
        format_peripheral_id(peripheral_id)
    } else {
        address.to_string()
    }
}

/// Transport backed by the system Bluetooth adapter.
pub struct BleTransport {
    adapter: Adapter,
    config: ConnectionConfig,
    /// Peripherals seen while scanning, by identifier.
    peripherals: Arc<Mutex<HashMap<String, Peripheral>>>,
}

impl std::fmt::Debug for BleTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BleTransport {
    /// Use the first available adapter.
    pub async fn new(config: ConnectionConfig) -> Result<Self> {
        Ok(Self::with_adapter(get_adapter().await?, config))
    }

    /// Use a specific adapter.
    pub fn with_adapter(adapter: Adapter, config: ConnectionConfig) -> Self {
        Self {
            adapter,
            config,
            peripherals: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn find_peripheral(&self, address: &str) -> Result<Peripheral> {
        if let Some(peripheral) = self.peripherals.lock().await.get(address) {
            return Ok(peripheral.clone());
        }

        // Not seen through our own event stream; ask the adapter.
        for peripheral in self.adapter.peripherals().await? {
            let props = peripheral.properties().await?;
            let id = props
                .map(|p| create_identifier(&p.address.to_string(), &peripheral.id()))
                .unwrap_or_else(|| format_peripheral_id(&peripheral.id()));
            if id == address {
                return Ok(peripheral);
            }
        }

        Err(Error::connection_failed(
            Some(address.to_string()),
            ConnectionFailureReason::OutOfRange,
        ))
    }
}

#[async_trait]
impl Transport for BleTransport {
    type Link = BleLink;

    async fn advertisements(&self) -> Result<BoxStream<'static, Advertisement>> {
        let events = self.adapter.events().await?;
        self.adapter
            .start_scan(ScanFilter {
                services: vec![INTERACTION_SERVICE],
            })
            .await?;
        info!("Scanning for watches");

        let adapter = self.adapter.clone();
        let peripherals = Arc::clone(&self.peripherals);

        let stream = events.filter_map(move |event| {
            let adapter = adapter.clone();
            let peripherals = Arc::clone(&peripherals);
            async move {
                let id = match event {
                    CentralEvent::DeviceDiscovered(id)
                    | CentralEvent::DeviceUpdated(id)
                    | CentralEvent::ManufacturerDataAdvertisement { id, .. }
                    | CentralEvent::ServicesAdvertisement { id, .. } => id,
                    _ => return None,
                };

                let peripheral = adapter.peripheral(&id).await.ok()?;
                let props = peripheral.properties().await.ok()??;
                let address = create_identifier(&props.address.to_string(), &id);

                peripherals
                    .lock()
                    .await
                    .insert(address.clone(), peripheral);

                Some(Advertisement {
                    address,
                    local_name: props.local_name,
                    manufacturer_data: props.manufacturer_data,
                    services: props.services,
                    rssi: props.rssi,
                })
            }
        });

        Ok(stream.boxed())
    }

    async fn stop_scan(&self) -> Result<()> {
        self.adapter.stop_scan().await?;
        Ok(())
    }

    #[tracing::instrument(level = "info", skip(self), fields(connect_timeout = ?self.config.connection_timeout))]
    async fn connect(&self, address: &str) -> Result<BleLink> {
        let peripheral = self.find_peripheral(address).await?;

        debug!("Connecting to device...");
        timeout(self.config.connection_timeout, peripheral.connect())
            .await
            .map_err(|_| Error::timeout("connect to device", self.config.connection_timeout))??;

        debug!("Discovering services...");
        if let Err(e) = timeout(self.config.discovery_timeout, peripheral.discover_services())
            .await
            .map_err(|_| Error::timeout("discover services", self.config.discovery_timeout))
            .and_then(|r| r.map_err(Error::from))
        {
            // Leave no half-open connection behind.
            let _ = peripheral.disconnect().await;
            return Err(e);
        }

        let services = peripheral.services();
        let mut characteristics = HashMap::new();
        for service in &services {
            for characteristic in &service.characteristics {
                characteristics.insert(characteristic.uuid, characteristic.clone());
            }
        }
        debug!(
            services = services.len(),
            characteristics = characteristics.len(),
            "Services discovered"
        );

        Ok(BleLink {
            peripheral,
            address: address.to_string(),
            service_count: services.len(),
            characteristics,
            config: self.config.clone(),
        })
    }
}

/// A btleplug connection to one watch.
pub struct BleLink {
    peripheral: Peripheral,
    address: String,
    service_count: usize,
    /// Characteristics by UUID, built once after service discovery.
    characteristics: HashMap<Uuid, Characteristic>,
    config: ConnectionConfig,
}

impl std::fmt::Debug for BleLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleLink")
            .field("address", &self.address)
            .field("characteristics", &self.characteristics.len())
            .finish_non_exhaustive()
    }
}

impl BleLink {
    fn find_characteristic(&self, uuid: Uuid) -> Result<&Characteristic> {
        self.characteristics
            .get(&uuid)
            .ok_or_else(|| Error::characteristic_not_found(uuid.to_string(), self.service_count))
    }
}

#[async_trait]
impl Link for BleLink {
    fn address(&self) -> &str {
        &self.address
    }

    async fn write(&self, uuid: Uuid, data: &[u8]) -> Result<()> {
        let characteristic = self.find_characteristic(uuid)?;
        timeout(
            self.config.write_timeout,
            self.peripheral
                .write(characteristic, data, WriteType::WithResponse),
        )
        .await
        .map_err(|_| {
            Error::timeout(
                format!("write characteristic {}", uuid),
                self.config.write_timeout,
            )
        })?
        .map_err(|e| Error::write_failed(uuid, e.to_string()))
    }

    async fn read(&self, uuid: Uuid) -> Result<Vec<u8>> {
        let characteristic = self.find_characteristic(uuid)?;
        let data = timeout(self.config.read_timeout, self.peripheral.read(characteristic))
            .await
            .map_err(|_| {
                Error::timeout(
                    format!("read characteristic {}", uuid),
                    self.config.read_timeout,
                )
            })??;
        Ok(data)
    }

    async fn subscribe(&self, uuid: Uuid) -> Result<NotificationStream> {
        let characteristic = self.find_characteristic(uuid)?;

        // Take the stream before enabling notifications so the first one is
        // not missed.
        let notifications = self.peripheral.notifications().await?;
        timeout(
            self.config.write_timeout,
            self.peripheral.subscribe(characteristic),
        )
        .await
        .map_err(|_| {
            Error::timeout(
                format!("subscribe to {}", uuid),
                self.config.write_timeout,
            )
        })??;

        Ok(notifications
            .filter_map(move |n| async move { (n.uuid == uuid).then_some(n.value) })
            .boxed())
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn disconnect(&self) -> Result<()> {
        if !self.is_connected().await {
            return Ok(());
        }
        if let Err(e) = self.peripheral.disconnect().await {
            warn!(address = %self.address, error = %e, "Disconnect failed");
            return Err(e.into());
        }
        Ok(())
    }
}
