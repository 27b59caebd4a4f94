//! In-memory transport for testing.
//!
//! [`MockTransport`] implements [`Transport`] without any radio. Tests
//! register [`MockWatch`]es, make them advertise, push notification frames
//! and simulate silent link loss, then observe what the connector wrote.
//!
//! # Features
//!
//! - **Failure injection**: fail connect, write, read or subscribe per watch
//! - **Latency simulation**: delay connects to open race windows
//! - **Write log**: every value written to a watch is recorded

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use prost::Message;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{ConnectionFailureReason, Error, Result};
use crate::proto::Update;
use crate::scan::Advertisement;
use crate::transport::{Link, NotificationStream, Transport};
use crate::uuid::{INTERACTION_SERVICE, MANUFACTURER_NAME_KEY, PROTOBUF_OUTPUT};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn receiver_stream<T: Send + 'static>(rx: mpsc::UnboundedReceiver<T>) -> BoxStream<'static, T> {
    futures::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|v| (v, rx)) }).boxed()
}

/// A simulated watch.
///
/// Cloning yields another handle to the same watch.
#[derive(Clone)]
pub struct MockWatch {
    state: Arc<WatchState>,
}

struct WatchState {
    address: String,
    name: String,
    connected: AtomicBool,
    connect_count: AtomicU32,
    disconnect_count: AtomicU32,
    connect_latency_ms: AtomicU64,
    fail_connect: AtomicBool,
    fail_write: AtomicBool,
    fail_read: AtomicBool,
    fail_subscribe: AtomicBool,
    writes: Mutex<Vec<(Uuid, Vec<u8>)>>,
    values: Mutex<HashMap<Uuid, Vec<u8>>>,
    subscribers: Mutex<HashMap<Uuid, Vec<mpsc::UnboundedSender<Vec<u8>>>>>,
}

impl std::fmt::Debug for MockWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockWatch")
            .field("address", &self.state.address)
            .field("name", &self.state.name)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl MockWatch {
    /// Create a watch with the given address and advertised name.
    pub fn new(address: &str, name: &str) -> Self {
        Self {
            state: Arc::new(WatchState {
                address: address.to_string(),
                name: name.to_string(),
                connected: AtomicBool::new(false),
                connect_count: AtomicU32::new(0),
                disconnect_count: AtomicU32::new(0),
                connect_latency_ms: AtomicU64::new(0),
                fail_connect: AtomicBool::new(false),
                fail_write: AtomicBool::new(false),
                fail_read: AtomicBool::new(false),
                fail_subscribe: AtomicBool::new(false),
                writes: Mutex::new(Vec::new()),
                values: Mutex::new(HashMap::new()),
                subscribers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Get the watch address.
    pub fn address(&self) -> &str {
        &self.state.address
    }

    /// The advertisement this watch broadcasts.
    pub fn advertisement(&self) -> Advertisement {
        Advertisement {
            address: self.state.address.clone(),
            local_name: None,
            manufacturer_data: HashMap::from([(
                MANUFACTURER_NAME_KEY,
                self.state.name.as_bytes().to_vec(),
            )]),
            services: vec![INTERACTION_SERVICE],
            rssi: Some(-55),
        }
    }

    /// Whether a host is currently connected.
    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    /// Number of successful connects.
    pub fn connect_count(&self) -> u32 {
        self.state.connect_count.load(Ordering::SeqCst)
    }

    /// Number of host-initiated disconnects.
    pub fn disconnect_count(&self) -> u32 {
        self.state.disconnect_count.load(Ordering::SeqCst)
    }

    /// Delay every connect by this long.
    pub fn set_connect_latency(&self, latency: Duration) {
        self.state
            .connect_latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Make connects fail.
    pub fn set_fail_connect(&self, fail: bool) {
        self.state.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Make writes fail.
    pub fn set_fail_write(&self, fail: bool) {
        self.state.fail_write.store(fail, Ordering::SeqCst);
    }

    /// Make reads fail.
    pub fn set_fail_read(&self, fail: bool) {
        self.state.fail_read.store(fail, Ordering::SeqCst);
    }

    /// Make subscribes fail.
    pub fn set_fail_subscribe(&self, fail: bool) {
        self.state.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    /// Set the value returned when a characteristic is read.
    pub fn set_value(&self, characteristic: Uuid, value: Vec<u8>) {
        lock(&self.state.values).insert(characteristic, value);
    }

    /// Values written by the host, in order.
    pub fn writes(&self) -> Vec<(Uuid, Vec<u8>)> {
        lock(&self.state.writes).clone()
    }

    /// Values written by the host to one characteristic, in order.
    pub fn writes_to(&self, characteristic: Uuid) -> Vec<Vec<u8>> {
        lock(&self.state.writes)
            .iter()
            .filter(|(uuid, _)| *uuid == characteristic)
            .map(|(_, data)| data.clone())
            .collect()
    }

    /// Whether the host has enabled notifications on a characteristic.
    pub fn is_subscribed(&self, characteristic: Uuid) -> bool {
        lock(&self.state.subscribers)
            .get(&characteristic)
            .is_some_and(|subs| subs.iter().any(|tx| !tx.is_closed()))
    }

    /// Send a raw notification. Returns whether anyone was subscribed.
    pub fn notify(&self, characteristic: Uuid, value: &[u8]) -> bool {
        if !self.is_connected() {
            return false;
        }
        let mut subscribers = lock(&self.state.subscribers);
        let Some(subs) = subscribers.get_mut(&characteristic) else {
            return false;
        };
        subs.retain(|tx| tx.send(value.to_vec()).is_ok());
        !subs.is_empty()
    }

    /// Send an update on the output characteristic.
    pub fn send_update(&self, update: &Update) -> bool {
        self.notify(PROTOBUF_OUTPUT, &update.encode_to_vec())
    }

    /// Simulate a silent radio drop: the link reports disconnected but no
    /// notification stream ends.
    pub fn drop_link(&self) {
        self.state.connected.store(false, Ordering::SeqCst);
    }

    async fn connect(&self) -> Result<()> {
        let latency = self.state.connect_latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(Error::connection_failed(
                Some(self.state.address.clone()),
                ConnectionFailureReason::Timeout,
            ));
        }

        self.state.connected.store(true, Ordering::SeqCst);
        self.state.connect_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn check_connected(&self) -> Result<()> {
        if !self.is_connected() {
            Err(Error::NotConnected)
        } else {
            Ok(())
        }
    }
}

/// An in-memory [`Transport`].
///
/// Cloning yields another handle to the same radio, so a test can keep one
/// while the connector owns the other.
///
/// # Example
///
/// ```
/// use touch_core::mock::{MockTransport, MockWatch};
///
/// let transport = MockTransport::new();
/// let watch = MockWatch::new("AA:BB", "Galaxy Watch");
/// transport.add_watch(&watch);
/// transport.advertise(&watch);
/// ```
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<RadioState>,
}

struct RadioState {
    ads_tx: mpsc::UnboundedSender<Advertisement>,
    ads_rx: Mutex<Option<mpsc::UnboundedReceiver<Advertisement>>>,
    watches: Mutex<HashMap<String, MockWatch>>,
    scan_stopped: AtomicBool,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("watches", &lock(&self.state.watches).len())
            .field("scan_stopped", &self.scan_stopped())
            .finish()
    }
}

impl MockTransport {
    /// Create an empty transport.
    pub fn new() -> Self {
        let (ads_tx, ads_rx) = mpsc::unbounded_channel();
        Self {
            state: Arc::new(RadioState {
                ads_tx,
                ads_rx: Mutex::new(Some(ads_rx)),
                watches: Mutex::new(HashMap::new()),
                scan_stopped: AtomicBool::new(false),
            }),
        }
    }

    /// Make a watch connectable.
    pub fn add_watch(&self, watch: &MockWatch) {
        lock(&self.state.watches).insert(watch.address().to_string(), watch.clone());
    }

    /// Deliver one advertisement of a watch.
    pub fn advertise(&self, watch: &MockWatch) {
        self.push_advertisement(watch.advertisement());
    }

    /// Deliver an arbitrary advertisement.
    pub fn push_advertisement(&self, adv: Advertisement) {
        // The receiver is gone once the run has ended.
        let _ = self.state.ads_tx.send(adv);
    }

    /// Whether [`Transport::stop_scan`] has been called.
    pub fn scan_stopped(&self) -> bool {
        self.state.scan_stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Link = MockLink;

    async fn advertisements(&self) -> Result<BoxStream<'static, Advertisement>> {
        let rx = lock(&self.state.ads_rx)
            .take()
            .ok_or_else(|| Error::invalid_config("mock advertisements already taken"))?;
        Ok(receiver_stream(rx))
    }

    async fn stop_scan(&self) -> Result<()> {
        self.state.scan_stopped.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn connect(&self, address: &str) -> Result<MockLink> {
        let watch = lock(&self.state.watches).get(address).cloned().ok_or_else(|| {
            Error::connection_failed(
                Some(address.to_string()),
                ConnectionFailureReason::OutOfRange,
            )
        })?;
        watch.connect().await?;
        Ok(MockLink { watch })
    }
}

/// Connection to a [`MockWatch`].
#[derive(Debug)]
pub struct MockLink {
    watch: MockWatch,
}

#[async_trait]
impl Link for MockLink {
    fn address(&self) -> &str {
        self.watch.address()
    }

    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<()> {
        self.watch.check_connected()?;
        if self.watch.state.fail_write.load(Ordering::SeqCst) {
            return Err(Error::write_failed(characteristic, "mock write failure"));
        }
        lock(&self.watch.state.writes).push((characteristic, data.to_vec()));
        Ok(())
    }

    async fn read(&self, characteristic: Uuid) -> Result<Vec<u8>> {
        self.watch.check_connected()?;
        if self.watch.state.fail_read.load(Ordering::SeqCst) {
            return Err(Error::timeout(
                format!("read characteristic {}", characteristic),
                Duration::from_secs(10),
            ));
        }
        Ok(lock(&self.watch.state.values)
            .get(&characteristic)
            .cloned()
            .unwrap_or_default())
    }

    async fn subscribe(&self, characteristic: Uuid) -> Result<NotificationStream> {
        self.watch.check_connected()?;
        if self.watch.state.fail_subscribe.load(Ordering::SeqCst) {
            return Err(Error::characteristic_not_found(characteristic.to_string(), 1));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.watch.state.subscribers)
            .entry(characteristic)
            .or_default()
            .push(tx);
        Ok(receiver_stream(rx))
    }

    async fn is_connected(&self) -> bool {
        self.watch.is_connected()
    }

    async fn disconnect(&self) -> Result<()> {
        if self.watch.state.connected.swap(false, Ordering::SeqCst) {
            self.watch
                .state
                .disconnect_count
                .fetch_add(1, Ordering::SeqCst);
        }
        // Ends every notification stream.
        lock(&self.watch.state.subscribers).clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_connect_and_disconnect() {
        let transport = MockTransport::new();
        let watch = MockWatch::new("AA", "Watch");
        transport.add_watch(&watch);

        let link = transport.connect("AA").await.unwrap();
        assert!(watch.is_connected());
        assert!(link.is_connected().await);
        assert_eq!(watch.connect_count(), 1);

        link.disconnect().await.unwrap();
        link.disconnect().await.unwrap();
        assert!(!watch.is_connected());
        assert_eq!(watch.disconnect_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_unknown_address() {
        let transport = MockTransport::new();
        let err = transport.connect("nope").await.unwrap_err();
        assert!(matches!(err, Error::ConnectionFailed { .. }));
    }

    #[tokio::test]
    async fn test_mock_fail_connect() {
        let transport = MockTransport::new();
        let watch = MockWatch::new("AA", "Watch");
        watch.set_fail_connect(true);
        transport.add_watch(&watch);

        assert!(transport.connect("AA").await.is_err());
        assert!(!watch.is_connected());
    }

    #[tokio::test]
    async fn test_mock_notifications() {
        let transport = MockTransport::new();
        let watch = MockWatch::new("AA", "Watch");
        transport.add_watch(&watch);
        let link = transport.connect("AA").await.unwrap();

        let mut stream = link.subscribe(PROTOBUF_OUTPUT).await.unwrap();
        assert!(watch.is_subscribed(PROTOBUF_OUTPUT));
        assert!(watch.notify(PROTOBUF_OUTPUT, &[1, 2, 3]));
        assert_eq!(stream.next().await, Some(vec![1, 2, 3]));

        link.disconnect().await.unwrap();
        assert_eq!(stream.next().await, None);
        assert!(!watch.notify(PROTOBUF_OUTPUT, &[4]));
    }

    #[tokio::test]
    async fn test_mock_writes_recorded() {
        let transport = MockTransport::new();
        let watch = MockWatch::new("AA", "Watch");
        transport.add_watch(&watch);
        let link = transport.connect("AA").await.unwrap();

        link.write(PROTOBUF_OUTPUT, &[9]).await.unwrap();
        assert_eq!(watch.writes_to(PROTOBUF_OUTPUT), vec![vec![9]]);

        watch.set_fail_write(true);
        assert!(link.write(PROTOBUF_OUTPUT, &[10]).await.is_err());
        assert_eq!(watch.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_drop_link() {
        let transport = MockTransport::new();
        let watch = MockWatch::new("AA", "Watch");
        transport.add_watch(&watch);
        let link = transport.connect("AA").await.unwrap();

        watch.drop_link();
        assert!(!link.is_connected().await);
        assert!(matches!(link.read(PROTOBUF_OUTPUT).await, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn test_mock_advertisements_taken_once() {
        let transport = MockTransport::new();
        let watch = MockWatch::new("AA", "Watch");
        transport.advertise(&watch);

        let mut ads = transport.advertisements().await.unwrap();
        let adv = ads.next().await.unwrap();
        assert_eq!(adv.address, "AA");
        assert_eq!(adv.name().as_deref(), Some("Watch"));

        assert!(transport.advertisements().await.is_err());
    }
}
