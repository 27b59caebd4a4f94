//! The connection state machine.
//!
//! A single task owns every session, the approved slot, the scanner and the
//! dispatcher. Transport work that may take long runs in child tasks which
//! report back as [`Step`]s; notification streams are drained by forwarder
//! tasks into the same loop, so all state changes and callbacks happen in
//! one place and in arrival order.
//!
//! Per watch the session moves through:
//!
//! ```text
//! Connecting -> HandshakeSent -> AwaitingApproval -> Approved
//!      \              \                 \                \
//!       +--------------+-----------------+----------------+--> cleanup
//! ```
//!
//! The first watch to approve wins; every other session is disconnected and
//! the scanner pauses until the approved watch is gone.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::codec::{ControlMessage, decode_update, has_disconnect_signal};
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::handler::WatchHandler;
use crate::proto::Update;
use crate::scan::{Advertisement, DiscoveredDevice, Scanner};
use crate::transport::{Link, NotificationStream, Transport};
use crate::uuid::{PROTOBUF_INPUT, PROTOBUF_OUTPUT};

/// Outbound traffic queued by a [`WatchHandle`](crate::WatchHandle).
#[derive(Debug)]
pub(crate) enum Request {
    Control(ControlMessage),
    Raw(Vec<u8>),
}

/// Where a session is in the connection sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionState {
    /// Transport connect in progress.
    Connecting,
    /// Client info written, subscribing to the output characteristic.
    HandshakeSent,
    /// Waiting for the user to accept the connection on the watch.
    AwaitingApproval,
    /// The watch accepted; its frames are dispatched.
    Approved,
}

struct Session<L> {
    id: u64,
    device: DiscoveredDevice,
    state: SessionState,
    link: Option<Arc<L>>,
    /// Forwarder tasks feeding this session's notifications.
    tasks: Vec<AbortHandle>,
}

/// Result of a child task.
enum Step<L> {
    Connected {
        session: u64,
        address: String,
        result: Result<L>,
    },
    Handshaken {
        session: u64,
        address: String,
        result: Result<NotificationStream>,
        sent_client_info: bool,
    },
}

enum Notification {
    Data {
        session: u64,
        address: String,
        characteristic: Uuid,
        data: Vec<u8>,
    },
    Ended {
        session: u64,
        address: String,
        characteristic: Uuid,
    },
}

pub(crate) struct Connector<T: Transport, H> {
    transport: Arc<T>,
    dispatcher: Dispatcher<H>,
    scanner: Scanner,
    sessions: HashMap<String, Session<T::Link>>,
    /// Address of the approved session.
    approved: Option<String>,
    /// Addresses that already received our client info during this run.
    informed: HashSet<String>,
    tasks: JoinSet<Step<T::Link>>,
    notify_tx: mpsc::UnboundedSender<Notification>,
    notify_rx: mpsc::UnboundedReceiver<Notification>,
    client_info: Vec<u8>,
    monitor_interval: Duration,
    next_session: u64,
    stopping: bool,
}

impl<T: Transport, H: WatchHandler> Connector<T, H> {
    pub(crate) fn new(
        transport: T,
        dispatcher: Dispatcher<H>,
        scanner: Scanner,
        client_info: &ControlMessage,
        monitor_interval: Duration,
    ) -> Self {
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        Self {
            transport: Arc::new(transport),
            dispatcher,
            scanner,
            sessions: HashMap::new(),
            approved: None,
            informed: HashSet::new(),
            tasks: JoinSet::new(),
            notify_tx,
            notify_rx,
            client_info: client_info.encode(),
            monitor_interval,
            next_session: 0,
            stopping: false,
        }
    }

    /// Drive the state machine until `cancel` fires.
    pub(crate) async fn run(
        mut self,
        mut requests: mpsc::UnboundedReceiver<Request>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let mut ads = self.transport.advertisements().await?.fuse();
        self.scanner.start();

        let mut monitor = tokio::time::interval(self.monitor_interval);
        monitor.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                Some(joined) = self.tasks.join_next() => {
                    match joined {
                        Ok(step) => self.on_step(step).await,
                        Err(e) if e.is_cancelled() => {}
                        Err(e) => warn!(error = %e, "Connection task failed"),
                    }
                }
                Some(notification) = self.notify_rx.recv() => {
                    self.on_notification(notification).await;
                }
                Some(request) = requests.recv() => self.on_request(request).await,
                Some(adv) = ads.next() => self.on_advertisement(adv),
                _ = monitor.tick() => self.check_links().await,
            }
        }

        self.shutdown().await;
        Ok(())
    }

    fn on_advertisement(&mut self, adv: Advertisement) {
        let Some(device) = self.scanner.on_advertisement(&adv) else {
            return;
        };
        if self.sessions.contains_key(&device.address) {
            debug!(address = %device.address, "Already tracking watch");
            return;
        }

        info!(address = %device.address, name = %device.name, rssi = ?device.rssi, "Found watch");
        self.next_session += 1;
        let id = self.next_session;

        let transport = Arc::clone(&self.transport);
        let address = device.address.clone();
        self.tasks.spawn(async move {
            let result = transport.connect(&address).await;
            Step::Connected {
                session: id,
                address,
                result,
            }
        });

        self.sessions.insert(
            device.address.clone(),
            Session {
                id,
                device,
                state: SessionState::Connecting,
                link: None,
                tasks: Vec::new(),
            },
        );
    }

    async fn on_step(&mut self, step: Step<T::Link>) {
        match step {
            Step::Connected {
                session,
                address,
                result,
            } => {
                let Some(tracked) = self
                    .sessions
                    .get_mut(&address)
                    .filter(|s| s.id == session)
                else {
                    if let Ok(link) = result {
                        debug!(address = %address, "Dropping connection of closed session");
                        disconnect(&link).await;
                    }
                    return;
                };

                match result {
                    Ok(link) => {
                        debug!(address = %address, "Connected, starting handshake");
                        let link = Arc::new(link);
                        tracked.link = Some(Arc::clone(&link));
                        tracked.state = SessionState::HandshakeSent;

                        let client_info = (!self.informed.contains(&address))
                            .then(|| self.client_info.clone());
                        self.tasks.spawn(async move {
                            let sent_client_info = client_info.is_some();
                            let result = handshake(&*link, client_info.as_deref()).await;
                            Step::Handshaken {
                                session,
                                address,
                                result,
                                sent_client_info,
                            }
                        });
                    }
                    Err(e) => {
                        log_failure(&address, &e, "Connection failed");
                        self.cleanup(&address).await;
                    }
                }
            }
            Step::Handshaken {
                session,
                address,
                result,
                sent_client_info,
            } => {
                let Some(tracked) = self
                    .sessions
                    .get_mut(&address)
                    .filter(|s| s.id == session)
                else {
                    return;
                };

                match result {
                    Ok(stream) => {
                        if sent_client_info {
                            self.informed.insert(address.clone());
                        }
                        tracked.state = SessionState::AwaitingApproval;
                        tracked.tasks.push(spawn_forwarder(
                            self.notify_tx.clone(),
                            session,
                            address.clone(),
                            PROTOBUF_OUTPUT,
                            stream,
                        ));
                        info!(address = %address, "Waiting for the connection to be accepted on the watch");
                    }
                    Err(e) => {
                        log_failure(&address, &e, "Handshake failed");
                        self.cleanup(&address).await;
                    }
                }
            }
        }
    }

    async fn on_notification(&mut self, notification: Notification) {
        match notification {
            Notification::Data {
                session,
                address,
                characteristic,
                data,
            } => {
                let Some(state) = self.session_state(&address, session) else {
                    return;
                };

                if characteristic != PROTOBUF_OUTPUT {
                    if state == SessionState::Approved {
                        self.dispatcher.custom_data(characteristic, &data);
                    }
                    return;
                }

                let update = match decode_update(&data) {
                    Ok(update) => update,
                    Err(e) => {
                        warn!(address = %address, error = %e, "Dropping undecodable frame");
                        return;
                    }
                };

                match state {
                    SessionState::AwaitingApproval => {
                        if has_disconnect_signal(&update) {
                            info!(address = %address, "Connection declined on the watch");
                            self.cleanup(&address).await;
                        } else if self.approved.is_some() {
                            info!(
                                address = %address,
                                approved = ?self.approved,
                                "Another watch is already connected"
                            );
                            self.cleanup(&address).await;
                        } else {
                            self.approve(&address, update).await;
                        }
                    }
                    SessionState::Approved => {
                        if has_disconnect_signal(&update) {
                            info!(address = %address, "Watch requested disconnect");
                            self.cleanup(&address).await;
                        } else {
                            self.dispatcher.dispatch(&update);
                        }
                    }
                    SessionState::Connecting | SessionState::HandshakeSent => {
                        debug!(address = %address, ?state, "Frame before handshake completed");
                    }
                }
            }
            Notification::Ended {
                session,
                address,
                characteristic,
            } => {
                if characteristic == PROTOBUF_OUTPUT
                    && self.session_state(&address, session).is_some()
                {
                    info!(address = %address, "Notification stream ended");
                    self.cleanup(&address).await;
                }
            }
        }
    }

    async fn approve(&mut self, address: &str, update: Update) {
        let Some(session) = self.sessions.get_mut(address) else {
            return;
        };
        let Some(link) = session.link.clone() else {
            return;
        };
        session.state = SessionState::Approved;
        let id = session.id;
        let device = session.device.clone();

        info!(address = %address, name = %device.name, "Connection approved");
        self.approved = Some(address.to_string());
        self.scanner.stop();

        let others: Vec<String> = self
            .sessions
            .keys()
            .filter(|a| a.as_str() != address)
            .cloned()
            .collect();
        for other in others {
            debug!(address = %other, "Disconnecting in favour of the approved watch");
            self.cleanup(&other).await;
        }

        let initial = match link.read(PROTOBUF_OUTPUT).await {
            Ok(data) => decode_update(&data)
                .inspect_err(|e| warn!(error = %e, "Initial device info is undecodable"))
                .ok(),
            Err(e) => {
                warn!(error = %e, "Failed to read initial device info");
                None
            }
        };
        self.dispatcher.approved(&device, initial.as_ref());

        let custom: Vec<Uuid> = self.dispatcher.custom_characteristics().collect();
        for characteristic in custom {
            match link.subscribe(characteristic).await {
                Ok(stream) => {
                    let task = spawn_forwarder(
                        self.notify_tx.clone(),
                        id,
                        address.to_string(),
                        characteristic,
                        stream,
                    );
                    match self.sessions.get_mut(address) {
                        Some(session) => session.tasks.push(task),
                        None => task.abort(),
                    }
                }
                Err(e) => warn!(%characteristic, error = %e, "Failed to subscribe to custom characteristic"),
            }
        }

        self.dispatcher.dispatch(&update);
    }

    async fn on_request(&mut self, request: Request) {
        let data = match request {
            Request::Control(message) => {
                debug!(?message, "Sending control message");
                message.encode()
            }
            Request::Raw(data) => data,
        };

        let Some(link) = self
            .approved
            .as_ref()
            .and_then(|a| self.sessions.get(a))
            .and_then(|s| s.link.clone())
        else {
            debug!("No approved watch, dropping outbound message");
            return;
        };

        if let Err(e) = link.write(PROTOBUF_INPUT, &data).await {
            warn!(address = %link.address(), error = %e, "Write to watch failed");
        }
    }

    /// Clean up sessions whose link went down without the stream ending.
    async fn check_links(&mut self) {
        let mut lost = Vec::new();
        for (address, session) in &self.sessions {
            if let Some(link) = &session.link
                && !link.is_connected().await
            {
                lost.push(address.clone());
            }
        }
        for address in lost {
            info!(address = %address, "Connection lost");
            self.cleanup(&address).await;
        }
    }

    async fn cleanup(&mut self, address: &str) {
        let Some(session) = self.sessions.remove(address) else {
            return;
        };

        for task in &session.tasks {
            task.abort();
        }
        if let Some(link) = &session.link {
            disconnect(link.as_ref()).await;
        }
        self.scanner.forget(address);

        if self.approved.as_deref() == Some(address) {
            self.approved = None;
            info!(address = %address, name = %session.device.name, "Watch disconnected");
            self.dispatcher.disconnected();
        } else {
            debug!(address = %address, state = ?session.state, "Session closed");
        }

        if self.approved.is_none() && !self.stopping {
            self.scanner.start();
        }
    }

    async fn shutdown(&mut self) {
        info!("Stopping");
        self.stopping = true;
        self.scanner.stop();

        let addresses: Vec<String> = self.sessions.keys().cloned().collect();
        for address in addresses {
            self.cleanup(&address).await;
        }

        // Connections that completed but were never reported.
        self.tasks.abort_all();
        while let Some(joined) = self.tasks.join_next().await {
            if let Ok(Step::Connected {
                result: Ok(link), ..
            }) = joined
            {
                disconnect(&link).await;
            }
        }

        if let Err(e) = self.transport.stop_scan().await {
            warn!(error = %e, "Failed to stop scanning");
        }
    }

    fn session_state(&self, address: &str, id: u64) -> Option<SessionState> {
        self.sessions
            .get(address)
            .filter(|s| s.id == id)
            .map(|s| s.state)
    }
}

async fn disconnect<L: Link>(link: &L) {
    if let Err(e) = link.disconnect().await {
        debug!(address = %link.address(), error = %e, "Disconnect failed");
    }
}

/// Transient failures are routine while watches come and go.
fn log_failure(address: &str, error: &Error, message: &str) {
    if error.is_transient() {
        debug!(address = %address, error = %error, "{}", message);
    } else {
        warn!(address = %address, error = %error, "{}", message);
    }
}

async fn handshake<L: Link>(link: &L, client_info: Option<&[u8]>) -> Result<NotificationStream> {
    if let Some(data) = client_info {
        link.write(PROTOBUF_INPUT, data).await?;
    }
    link.subscribe(PROTOBUF_OUTPUT).await
}

fn spawn_forwarder(
    tx: mpsc::UnboundedSender<Notification>,
    session: u64,
    address: String,
    characteristic: Uuid,
    mut stream: NotificationStream,
) -> AbortHandle {
    tokio::spawn(async move {
        while let Some(data) = stream.next().await {
            let sent = tx.send(Notification::Data {
                session,
                address: address.clone(),
                characteristic,
                data,
            });
            if sent.is_err() {
                return;
            }
        }
        let _ = tx.send(Notification::Ended {
            session,
            address,
            characteristic,
        });
    })
    .abort_handle()
}
