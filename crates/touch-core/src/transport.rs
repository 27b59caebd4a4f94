//! The BLE seam.
//!
//! The connector only talks to the radio through [`Transport`] and [`Link`].
//! [`crate::ble`] implements them on top of btleplug, [`crate::mock`] in
//! memory for tests.

use async_trait::async_trait;
use futures::stream::BoxStream;
use uuid::Uuid;

use crate::error::Result;
use crate::scan::Advertisement;

/// A stream of notification payloads from one characteristic.
pub type NotificationStream = BoxStream<'static, Vec<u8>>;

/// Access to the radio: scanning and establishing connections.
///
/// # Example
///
/// ```ignore
/// use futures::StreamExt;
/// use touch_core::transport::Transport;
///
/// async fn first_address<T: Transport>(transport: &T) -> touch_core::Result<Option<String>> {
///     let mut ads = transport.advertisements().await?;
///     Ok(ads.next().await.map(|adv| adv.address))
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Connection handle produced by [`connect`](Self::connect).
    type Link: Link;

    /// Start scanning and return every advertisement received.
    ///
    /// Filtering and deduplication are left to [`crate::scan::Scanner`].
    async fn advertisements(&self) -> Result<BoxStream<'static, Advertisement>>;

    /// Stop the radio scan.
    async fn stop_scan(&self) -> Result<()>;

    /// Connect to a previously advertised device and discover its services.
    async fn connect(&self, address: &str) -> Result<Self::Link>;
}

/// An established connection to one watch.
#[async_trait]
pub trait Link: Send + Sync + 'static {
    /// Address of the connected device.
    fn address(&self) -> &str;

    /// Write a value to a characteristic, waiting for the response.
    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<()>;

    /// Read a characteristic value.
    async fn read(&self, characteristic: Uuid) -> Result<Vec<u8>>;

    /// Enable notifications on a characteristic.
    ///
    /// The stream ends when the link goes down.
    async fn subscribe(&self, characteristic: Uuid) -> Result<NotificationStream>;

    /// Whether the underlying connection is still up.
    async fn is_connected(&self) -> bool;

    /// Tear the connection down. Disconnecting twice is not an error.
    async fn disconnect(&self) -> Result<()>;
}
