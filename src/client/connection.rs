//! Connection state machine and client API.
//!
//! [`SocketClient`] is the public handle; [`ConnectionDriver`] is the
//! event loop task that owns the transport and is the only place that
//! mutates connection state while a session is live.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected --connect()--> Connecting --handshake ok--> HandshakeInFlight
//!     --transport open--> Open --close()/fatal error--> Closing --> Disconnected
//! ```
//!
//! Entering `Open` arms the heartbeat monitor and flushes packets
//! queued while connecting, in FIFO order. Reaching `Disconnected` is
//! terminal until the caller issues a new `connect()`; the engine never
//! reconnects on its own.
//!
//! # Event Loop
//!
//! The driver task `select!`s over three sources:
//!
//! - Transport events (inbound packets, disconnects, errors)
//! - Caller commands (sends, disconnect requests)
//! - The heartbeat deadline

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::{Codec, HandshakeClient, Packet, PacketType, SessionInfo};
use crate::transport::{
    PollingTransport, Transport, TransportEvent, TransportKind, WebSocketTransport,
    select_transport,
};

use super::ack::AckRegistry;
use super::config::ConnectionConfig;
use super::delegate::{AckCallback, SocketDelegate};
use super::heartbeat::HeartbeatMonitor;
use super::namespace::NamespaceRegistry;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of one connection.
///
/// All components read it; only the connection driver mutates it while
/// a session is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No session; `connect()` may be called.
    #[default]
    Disconnected,
    /// Handshake request in flight.
    Connecting,
    /// Handshake done, transport opening.
    HandshakeInFlight,
    /// Transport open, session live.
    Open,
    /// Teardown in progress.
    Closing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::HandshakeInFlight => "handshake-in-flight",
            Self::Open => "open",
            Self::Closing => "closing",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Command
// ============================================================================

/// Caller commands for the connection driver.
enum Command {
    /// Send a packet over the transport.
    Send(Packet),
    /// Tear the connection down.
    Disconnect {
        /// Skip the courtesy disconnect packet.
        forced: bool,
        /// Signalled once teardown completes.
        done: Option<oneshot::Sender<()>>,
    },
}

// ============================================================================
// ClientInner
// ============================================================================

/// State shared between the client handle and the driver task.
struct ClientInner {
    /// Immutable connection configuration.
    config: ConnectionConfig,
    /// Root delegate for connection-level callbacks.
    delegate: Arc<dyn SocketDelegate>,
    /// Lifecycle state.
    state: Mutex<ConnectionState>,
    /// Command channel into the driver (present while a session lives).
    command_tx: Mutex<Option<mpsc::UnboundedSender<Command>>>,
    /// Packets queued before `Open` is reached, in call order.
    queue: Mutex<Vec<Packet>>,
    /// Pending acknowledgement callbacks.
    acks: Mutex<AckRegistry>,
    /// Namespace bindings sharing this connection.
    namespaces: Mutex<NamespaceRegistry>,
    /// Session negotiated by the last successful handshake.
    session: Mutex<Option<SessionInfo>>,
    /// Set by `disconnect()` while a connect attempt is still in flight.
    connect_cancelled: AtomicBool,
}

// ============================================================================
// SocketClient
// ============================================================================

/// socket.io client handle.
///
/// Cheap to clone; all clones share one connection.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use socketio_client::{ConnectionConfig, NoopDelegate, SocketClient};
///
/// # async fn example() -> socketio_client::Result<()> {
/// let config = ConnectionConfig::builder()
///     .host("localhost")
///     .port(3000)
///     .build()?;
/// let client = SocketClient::new(config, Arc::new(NoopDelegate));
///
/// client.connect().await?;
/// client.send_message("hello", None)?;
/// client.disconnect().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SocketClient {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for SocketClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketClient")
            .field("host", &self.inner.config.host())
            .field("port", &self.inner.config.port())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SocketClient - Lifecycle
// ============================================================================

impl SocketClient {
    /// Creates a client for the given configuration and root delegate.
    ///
    /// The delegate is registered for the default namespace and, when
    /// the configuration names one, for the configured namespace.
    #[must_use]
    pub fn new(config: ConnectionConfig, delegate: Arc<dyn SocketDelegate>) -> Self {
        let mut namespaces = NamespaceRegistry::new();
        namespaces.register("", Arc::clone(&delegate));
        if !config.namespace().is_empty() {
            namespaces.register(config.namespace(), Arc::clone(&delegate));
        }

        let acks = AckRegistry::new(config.return_all_data_from_ack());

        Self {
            inner: Arc::new(ClientInner {
                config,
                delegate,
                state: Mutex::new(ConnectionState::Disconnected),
                command_tx: Mutex::new(None),
                queue: Mutex::new(Vec::new()),
                acks: Mutex::new(acks),
                namespaces: Mutex::new(namespaces),
                session: Mutex::new(None),
                connect_cancelled: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the connection configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    /// Returns `true` while the session is open.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Returns the negotiated session info, if a session is live.
    #[must_use]
    pub fn session(&self) -> Option<SessionInfo> {
        self.inner.session.lock().clone()
    }

    /// Returns the number of unresolved acknowledgement callbacks.
    #[inline]
    #[must_use]
    pub fn pending_acks(&self) -> usize {
        self.inner.acks.lock().pending()
    }

    /// Establishes a connection: handshake, transport selection,
    /// transport open.
    ///
    /// Resolves once the state machine reaches `Open`; the server's
    /// connect confirmation is reported through
    /// [`SocketDelegate::on_connect`]. Packets sent while connecting
    /// are queued and flushed in call order on `Open`.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionInProgress`] when not `Disconnected`
    /// - [`Error::Unauthorized`], [`Error::InvalidConnectionData`],
    ///   [`Error::HandshakeFailed`] for handshake failures
    /// - [`Error::TransportsNotSupported`] when no transport overlaps
    /// - transport errors when the selected transport cannot open
    pub async fn connect(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if *state != ConnectionState::Disconnected {
                return Err(Error::connection_in_progress(state.to_string()));
            }
            *state = ConnectionState::Connecting;
        }
        self.inner.connect_cancelled.store(false, Ordering::SeqCst);

        match self.connect_inner().await {
            Ok(()) => Ok(()),
            Err(e) => {
                *self.inner.state.lock() = ConnectionState::Disconnected;
                *self.inner.command_tx.lock() = None;
                // Handshake-phase failures are reported once, to the caller.
                let stranded: Vec<Packet> = self.inner.queue.lock().drain(..).collect();
                for packet in stranded {
                    self.inner.delegate.on_error(&Error::data_not_sent(format!(
                        "{} packet stranded by failed connect",
                        packet.packet_type.name()
                    )));
                }
                Err(e)
            }
        }
    }

    async fn connect_inner(&self) -> Result<()> {
        let config = &self.inner.config;
        info!(host = config.host(), port = config.port(), "Connecting");

        let session = HandshakeClient::new().perform(config).await?;
        if self.inner.connect_cancelled.swap(false, Ordering::SeqCst) {
            return Err(Error::transport_closed("connect attempt cancelled"));
        }
        *self.inner.state.lock() = ConnectionState::HandshakeInFlight;

        let kind = select_transport(&session, config.force_polling())?;
        let codec = Codec::new(config.version());
        debug!(transport = kind.name(), sid = %session.sid, "Transport selected");

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut transport: Box<dyn Transport> = match kind {
            TransportKind::WebSocket => Box::new(WebSocketTransport::new(
                config.websocket_url(&session.sid),
                event_tx,
            )),
            TransportKind::Polling => Box::new(PollingTransport::new(
                config.polling_url(&session.sid),
                codec,
                event_tx,
            )),
        };

        tokio::time::timeout(config.connect_timeout(), transport.open())
            .await
            .map_err(|_| Error::transport_closed("transport open timed out"))??;

        if self.inner.connect_cancelled.swap(false, Ordering::SeqCst) {
            transport.close().await;
            return Err(Error::transport_closed("connect attempt cancelled"));
        }

        *self.inner.session.lock() = Some(session);

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        *self.inner.command_tx.lock() = Some(command_tx);
        *self.inner.state.lock() = ConnectionState::Open;

        let driver = ConnectionDriver::new(Arc::clone(&self.inner), transport);
        tokio::spawn(driver.run(command_rx, event_rx));

        info!(transport = kind.name(), "Connection open");
        Ok(())
    }

    /// Disconnects gracefully: a disconnect packet is sent best-effort
    /// before teardown. Resolves once teardown completes. No-op when
    /// already disconnected.
    ///
    /// Called while a connect attempt is still in flight, it flags the
    /// attempt to abort; the pending `connect()` then returns
    /// [`Error::TransportClosed`].
    pub async fn disconnect(&self) {
        let command_tx = self.inner.command_tx.lock().clone();
        let Some(command_tx) = command_tx else {
            self.cancel_pending_connect();
            return;
        };

        let (done_tx, done_rx) = oneshot::channel();
        if command_tx
            .send(Command::Disconnect {
                forced: false,
                done: Some(done_tx),
            })
            .is_ok()
        {
            let _ = done_rx.await;
        }
    }

    /// Disconnects immediately, skipping the courtesy packet.
    ///
    /// Like [`SocketClient::disconnect`], this aborts a connect attempt
    /// that has not reached `Open` yet.
    pub fn disconnect_forced(&self) {
        let command_tx = self.inner.command_tx.lock().clone();
        match command_tx {
            Some(command_tx) => {
                let _ = command_tx.send(Command::Disconnect {
                    forced: true,
                    done: None,
                });
            }
            None => self.cancel_pending_connect(),
        }
    }

    fn cancel_pending_connect(&self) {
        let state = self.state();
        if matches!(
            state,
            ConnectionState::Connecting | ConnectionState::HandshakeInFlight
        ) {
            debug!(%state, "Disconnect during connect, flagging cancellation");
            self.inner.connect_cancelled.store(true, Ordering::SeqCst);
        }
    }
}

// ============================================================================
// SocketClient - Sending
// ============================================================================

impl SocketClient {
    /// Sends a plain text message on the configured namespace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataCouldNotBeSend`] when disconnected.
    pub fn send_message(&self, text: impl Into<String>, ack: Option<AckCallback>) -> Result<()> {
        let namespace = self.inner.config.namespace().to_string();
        self.send_message_for_namespace(&namespace, text, ack)
    }

    /// Sends a plain text message on an explicit namespace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataCouldNotBeSend`] when disconnected.
    pub fn send_message_for_namespace(
        &self,
        endpoint: &str,
        text: impl Into<String>,
        ack: Option<AckCallback>,
    ) -> Result<()> {
        self.dispatch_send(Packet::message(text), endpoint, ack)
    }

    /// Sends a JSON message on the configured namespace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the value cannot be serialized, or
    /// [`Error::DataCouldNotBeSend`] when disconnected.
    pub fn send_json(&self, value: &Value, ack: Option<AckCallback>) -> Result<()> {
        let namespace = self.inner.config.namespace().to_string();
        self.send_json_for_namespace(&namespace, value, ack)
    }

    /// Sends a JSON message on an explicit namespace.
    ///
    /// # Errors
    ///
    /// Same as [`SocketClient::send_json`].
    pub fn send_json_for_namespace(
        &self,
        endpoint: &str,
        value: &Value,
        ack: Option<AckCallback>,
    ) -> Result<()> {
        self.dispatch_send(Packet::json_message(value)?, endpoint, ack)
    }

    /// Sends a named event on the configured namespace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataCouldNotBeSend`] when disconnected.
    pub fn send_event(
        &self,
        name: impl Into<String>,
        args: Vec<Value>,
        ack: Option<AckCallback>,
    ) -> Result<()> {
        let namespace = self.inner.config.namespace().to_string();
        self.send_event_for_namespace(&namespace, name, args, ack)
    }

    /// Sends a named event on an explicit namespace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataCouldNotBeSend`] when disconnected.
    pub fn send_event_for_namespace(
        &self,
        endpoint: &str,
        name: impl Into<String>,
        args: Vec<Value>,
        ack: Option<AckCallback>,
    ) -> Result<()> {
        self.dispatch_send(Packet::event(name, args), endpoint, ack)
    }

    /// Answers a server packet that requested an acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the args cannot be serialized, or
    /// [`Error::DataCouldNotBeSend`] when disconnected.
    pub fn send_acknowledgement(&self, ack_id: &str, args: &[Value]) -> Result<()> {
        let namespace = self.inner.config.namespace().to_string();
        self.dispatch_send(Packet::ack_reply(ack_id, args)?, &namespace, None)
    }

    /// Tags, registers the ack entry, and routes the packet by state.
    fn dispatch_send(
        &self,
        packet: Packet,
        endpoint: &str,
        ack: Option<AckCallback>,
    ) -> Result<()> {
        let mut packet = packet.with_endpoint(endpoint);
        let mut ack_id = None;
        if let Some(callback) = ack {
            // Entry exists before the packet reaches the codec.
            let id = self.inner.acks.lock().register(callback);
            packet = packet.with_ack_request(id.clone());
            ack_id = Some(id);
        }

        let state = self.state();
        let result = match state {
            ConnectionState::Open => match self.inner.command_tx.lock().clone() {
                Some(command_tx) => command_tx
                    .send(Command::Send(packet))
                    .map_err(|_| Error::data_not_sent("connection closed")),
                None => Err(Error::data_not_sent("connection closed")),
            },
            ConnectionState::Connecting | ConnectionState::HandshakeInFlight => {
                self.inner.queue.lock().push(packet);
                Ok(())
            }
            ConnectionState::Disconnected | ConnectionState::Closing => {
                Err(Error::data_not_sent(format!("connection is {state}")))
            }
        };

        // A packet that never left must not leave an ack entry pending.
        if let (Err(_), Some(id)) = (&result, ack_id) {
            self.inner.acks.lock().unregister(&id);
        }
        result
    }
}

// ============================================================================
// SocketClient - Namespaces
// ============================================================================

impl SocketClient {
    /// Registers a delegate for a namespace endpoint.
    ///
    /// When a session is live a connect packet for the endpoint is sent
    /// immediately; otherwise it is sent on the next `connect()`. The
    /// server's connect echo marks the binding active and triggers
    /// [`SocketDelegate::on_connect`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConnectionData`] for an endpoint not
    /// starting with `/`.
    pub fn register_namespace(
        &self,
        endpoint: &str,
        delegate: Arc<dyn SocketDelegate>,
    ) -> Result<()> {
        if endpoint.is_empty() || !endpoint.starts_with('/') {
            return Err(Error::invalid_connection_data(format!(
                "namespace must start with '/': {endpoint:?}"
            )));
        }

        self.inner.namespaces.lock().register(endpoint, delegate);
        debug!(endpoint, "Namespace registered");

        if self.state() != ConnectionState::Disconnected {
            // Best-effort; queued while connecting.
            let _ = self.dispatch_send(Packet::new(PacketType::Connect), endpoint, None);
        }
        Ok(())
    }

    /// Unregisters a namespace, sending a namespace disconnect packet
    /// best-effort when a session is live. Returns `true` if a binding
    /// existed.
    pub fn unregister_namespace(&self, endpoint: &str) -> bool {
        if self.is_connected() {
            let _ = self.dispatch_send(Packet::new(PacketType::Disconnect), endpoint, None);
        }
        let removed = self.inner.namespaces.lock().unregister(endpoint);
        if removed {
            debug!(endpoint, "Namespace unregistered");
        }
        removed
    }

    /// Returns `true` if the endpoint is bound and server-confirmed.
    #[must_use]
    pub fn is_namespace_connected(&self, endpoint: &str) -> bool {
        self.inner.namespaces.lock().is_connected(endpoint)
    }
}

// ============================================================================
// ConnectionDriver
// ============================================================================

/// Event loop owning the transport for one session.
struct ConnectionDriver {
    inner: Arc<ClientInner>,
    codec: Codec,
    transport: Box<dyn Transport>,
    monitor: HeartbeatMonitor,
}

impl ConnectionDriver {
    /// Builds a driver for an already-open transport.
    fn new(inner: Arc<ClientInner>, transport: Box<dyn Transport>) -> Self {
        let codec = Codec::new(inner.config.version());
        let heartbeat = inner
            .session
            .lock()
            .as_ref()
            .and_then(|s| s.heartbeat_timeout);
        Self {
            inner,
            codec,
            transport,
            monitor: HeartbeatMonitor::new(heartbeat),
        }
    }

    /// Runs the event loop until teardown.
    async fn run(
        mut self,
        mut command_rx: mpsc::UnboundedReceiver<Command>,
        mut event_rx: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        self.monitor.arm();

        // Announce every registered non-default namespace, then flush
        // the pre-open queue in call order.
        let endpoints: Vec<String> = {
            let namespaces = self.inner.namespaces.lock();
            namespaces
                .endpoints()
                .into_iter()
                .filter(|e| !e.is_empty())
                .collect()
        };
        for endpoint in endpoints {
            self.send_packet(Packet::connect(endpoint)).await;
        }

        let queued: Vec<Packet> = self.inner.queue.lock().drain(..).collect();
        for packet in queued {
            self.send_packet(packet).await;
        }

        let mut reason: Option<Error> = None;
        let mut done: Option<oneshot::Sender<()>> = None;

        loop {
            let deadline = self.monitor.deadline();

            tokio::select! {
                event = event_rx.recv() => match event {
                    Some(TransportEvent::Data(text)) => {
                        if let Some(fatal) = self.handle_data(&text).await {
                            reason = Some(fatal);
                            break;
                        }
                    }

                    Some(TransportEvent::Disconnect(error)) => {
                        debug!(error = ?error, "Transport disconnected");
                        reason = error.or_else(|| {
                            Some(Error::transport_closed("transport closed"))
                        });
                        break;
                    }

                    Some(TransportEvent::Error(error)) => {
                        warn!(error = %error, "Transport error");
                        self.inner.delegate.on_error(&error);
                    }

                    None => {
                        reason = Some(Error::transport_closed("transport event channel closed"));
                        break;
                    }
                },

                command = command_rx.recv() => match command {
                    Some(Command::Send(packet)) => {
                        self.send_packet(packet).await;
                    }

                    Some(Command::Disconnect { forced, done: done_tx }) => {
                        if !forced {
                            self.send_packet(Packet::disconnect("")).await;
                        }
                        done = done_tx;
                        break;
                    }

                    None => {
                        debug!("All client handles dropped");
                        break;
                    }
                },

                () = sleep_until(deadline.unwrap_or_else(far_future)), if deadline.is_some() => {
                    warn!(timeout_ms = self.monitor.timeout_ms(), "Heartbeat timeout");
                    reason = Some(Error::heartbeat_timeout(self.monitor.timeout_ms()));
                    break;
                }
            }
        }

        self.teardown(reason, done, command_rx).await;
    }

    /// Decodes and routes one inbound packet.
    ///
    /// Returns `Some(error)` for conditions fatal to the connection.
    async fn handle_data(&mut self, text: &str) -> Option<Error> {
        let packet = match self.codec.decode(text) {
            Ok(packet) => packet,
            Err(e) => {
                // Malformed inbound packets are reported, never fatal.
                warn!(error = %e, "Dropping undecodable packet");
                self.inner.delegate.on_error(&e);
                return None;
            }
        };

        trace!(
            packet_type = packet.packet_type.name(),
            endpoint = %packet.endpoint,
            "Packet received"
        );

        match packet.packet_type {
            PacketType::Heartbeat => {
                self.monitor.reset();
                // Liveness is bidirectional: echo one back.
                self.send_packet(Packet::heartbeat()).await;
                None
            }

            PacketType::Connect => {
                let delegate = self.inner.namespaces.lock().mark_connected(&packet.endpoint);
                match delegate {
                    Some(delegate) => delegate.on_connect(&packet.endpoint),
                    None => debug!(endpoint = %packet.endpoint, "Connect echo for unbound endpoint"),
                }
                None
            }

            PacketType::Disconnect => {
                if packet.endpoint.is_empty() {
                    return Some(Error::server_disconnect(""));
                }
                // Namespace-scoped disconnect leaves the socket alive.
                let delegate = self
                    .inner
                    .namespaces
                    .lock()
                    .mark_disconnected(&packet.endpoint);
                if let Some(delegate) = delegate {
                    let error = Error::server_disconnect(&packet.endpoint);
                    delegate.on_disconnect(&packet.endpoint, Some(&error));
                }
                None
            }

            PacketType::Message => {
                self.dispatch(&packet, |delegate, packet| delegate.on_message(packet));
                None
            }

            PacketType::JsonMessage => {
                self.dispatch(&packet, |delegate, packet| delegate.on_json(packet));
                None
            }

            PacketType::Event => {
                self.dispatch(&packet, |delegate, packet| delegate.on_event(packet));
                None
            }

            PacketType::Ack => {
                match packet.ack_payload() {
                    Ok((ack_id, args)) => {
                        let resolved = self.inner.acks.lock().resolve(&ack_id, args);
                        match resolved {
                            // Invoked outside the registry lock.
                            Some((callback, value)) => callback(value),
                            None => debug!(ack_id = %ack_id, "Ack for unknown id dropped"),
                        }
                    }
                    Err(e) => self.inner.delegate.on_error(&e),
                }
                None
            }

            PacketType::Error => {
                let (reason, advice) = match packet.data.split_once('+') {
                    Some((reason, advice)) => (reason.to_string(), Some(advice.to_string())),
                    None => (packet.data.clone(), None),
                };
                self.inner
                    .delegate
                    .on_error(&Error::server_error(reason, advice));
                None
            }

            PacketType::Noop => None,
        }
    }

    /// Dispatches a data packet to the binding matching its endpoint.
    fn dispatch(&self, packet: &Packet, notify: impl Fn(&dyn SocketDelegate, &Packet)) {
        let delegate = self.inner.namespaces.lock().delegate_for(&packet.endpoint);
        match delegate {
            Some(delegate) => notify(&*delegate, packet),
            None => {
                debug!(endpoint = %packet.endpoint, "Dropping packet for unbound endpoint");
            }
        }
    }

    /// Encodes and sends one packet, reporting failures as errors.
    async fn send_packet(&mut self, packet: Packet) {
        let wire = match self.codec.encode(&packet) {
            Ok(wire) => wire,
            Err(e) => {
                self.inner.delegate.on_error(&e);
                return;
            }
        };

        trace!(len = wire.len(), "Sending packet");
        if let Err(e) = self.transport.send(wire).await {
            warn!(error = %e, "Send failed");
            self.inner.delegate.on_error(&e);
            return;
        }

        if matches!(
            packet.packet_type,
            PacketType::Message | PacketType::JsonMessage | PacketType::Event
        ) {
            self.inner.delegate.on_sent(&packet);
        }
    }

    /// Tears the connection down: `Closing` then `Disconnected`.
    async fn teardown(
        mut self,
        reason: Option<Error>,
        done: Option<oneshot::Sender<()>>,
        mut command_rx: mpsc::UnboundedReceiver<Command>,
    ) {
        *self.inner.state.lock() = ConnectionState::Closing;

        self.monitor.disarm();
        self.transport.close().await;
        *self.inner.command_tx.lock() = None;

        // Commands still buffered behind the loop exit fail rather
        // than vanish; extra disconnect requests resolve with ours.
        let mut done_signals: Vec<oneshot::Sender<()>> = done.into_iter().collect();
        command_rx.close();
        while let Ok(command) = command_rx.try_recv() {
            match command {
                Command::Send(packet) => {
                    self.inner.delegate.on_error(&Error::data_not_sent(format!(
                        "{} packet still queued at teardown",
                        packet.packet_type.name()
                    )));
                }
                Command::Disconnect { done: done_tx, .. } => {
                    done_signals.extend(done_tx);
                }
            }
        }

        // Packets still queued fail rather than vanish.
        let stranded: Vec<Packet> = self.inner.queue.lock().drain(..).collect();
        for packet in stranded {
            self.inner.delegate.on_error(&Error::data_not_sent(format!(
                "{} packet still queued at teardown",
                packet.packet_type.name()
            )));
        }

        let dropped = self.inner.acks.lock().drain();
        if dropped > 0 {
            debug!(dropped, "Discarded pending acks");
        }
        self.inner.namespaces.lock().reset_all();
        *self.inner.session.lock() = None;
        *self.inner.state.lock() = ConnectionState::Disconnected;

        for done in done_signals {
            let _ = done.send(());
        }

        info!(reason = ?reason, "Disconnected");
        self.inner.delegate.on_disconnect("", reason.as_ref());
    }
}

/// Placeholder instant for the disabled heartbeat select arm.
fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86_400)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use crate::client::delegate::NoopDelegate;

    // ========================================================================
    // Test Doubles
    // ========================================================================

    /// Transport double recording every sent frame.
    struct MockTransport {
        sent: Arc<Mutex<Vec<String>>>,
        ready: bool,
    }

    impl MockTransport {
        fn new(sent: Arc<Mutex<Vec<String>>>) -> Self {
            Self { sent, ready: true }
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn is_ready(&self) -> bool {
            self.ready
        }

        async fn open(&mut self) -> crate::error::Result<()> {
            self.ready = true;
            Ok(())
        }

        async fn send(&mut self, data: String) -> crate::error::Result<()> {
            if !self.ready {
                return Err(Error::data_not_sent("mock closed"));
            }
            self.sent.lock().push(data);
            Ok(())
        }

        async fn close(&mut self) {
            self.ready = false;
        }
    }

    /// Delegate recording callback invocations as strings.
    #[derive(Default)]
    struct Recorder {
        entries: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn entries(&self) -> Vec<String> {
            self.entries.lock().clone()
        }

        fn record(&self, entry: String) {
            self.entries.lock().push(entry);
        }
    }

    impl SocketDelegate for Recorder {
        fn on_connect(&self, endpoint: &str) {
            self.record(format!("connect:{endpoint}"));
        }

        fn on_disconnect(&self, endpoint: &str, error: Option<&Error>) {
            let tag = error.map_or_else(|| "clean".to_string(), ToString::to_string);
            self.record(format!("disconnect:{endpoint}:{tag}"));
        }

        fn on_message(&self, packet: &Packet) {
            self.record(format!("message:{}", packet.data));
        }

        fn on_json(&self, packet: &Packet) {
            self.record(format!("json:{}", packet.data));
        }

        fn on_event(&self, packet: &Packet) {
            self.record(format!(
                "event:{}",
                packet.name.as_deref().unwrap_or_default()
            ));
        }

        fn on_sent(&self, packet: &Packet) {
            self.record(format!("sent:{}", packet.packet_type.name()));
        }

        fn on_error(&self, error: &Error) {
            self.record(format!("error:{error}"));
        }
    }

    // ========================================================================
    // Harness
    // ========================================================================

    fn test_client(
        namespace: &str,
        heartbeat_secs: Option<u64>,
        delegate: Arc<dyn SocketDelegate>,
    ) -> SocketClient {
        let config = ConnectionConfig::builder()
            .host("localhost")
            .port(3000)
            .namespace(namespace)
            .build()
            .expect("valid config");
        let client = SocketClient::new(config, delegate);

        *client.inner.session.lock() = Some(SessionInfo {
            sid: "test-sid".to_string(),
            heartbeat_timeout: heartbeat_secs.map(Duration::from_secs),
            connection_timeout: Duration::from_secs(60),
            transports: vec!["websocket".to_string()],
        });
        client
    }

    /// Spawns a driver over a mock transport with the client in `Open`.
    fn spawn_driver(
        client: &SocketClient,
    ) -> (
        mpsc::UnboundedSender<Command>,
        mpsc::UnboundedSender<TransportEvent>,
        Arc<Mutex<Vec<String>>>,
        tokio::task::JoinHandle<()>,
    ) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        *client.inner.command_tx.lock() = Some(command_tx.clone());
        *client.inner.state.lock() = ConnectionState::Open;

        let driver = ConnectionDriver::new(
            Arc::clone(&client.inner),
            Box::new(MockTransport::new(Arc::clone(&sent))),
        );
        let handle = tokio::spawn(driver.run(command_rx, event_rx));

        (command_tx, event_tx, sent, handle)
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("condition not reached in time");
    }

    async fn graceful_disconnect(client: &SocketClient, handle: tokio::task::JoinHandle<()>) {
        client.disconnect().await;
        handle.await.expect("driver task");
    }

    // ========================================================================
    // Queue and Ordering
    // ========================================================================

    #[tokio::test]
    async fn test_pre_open_queue_flushed_in_order() {
        let client = test_client("", None, Arc::new(NoopDelegate));
        *client.inner.state.lock() = ConnectionState::Connecting;
        client.send_message("first", None).expect("queued");
        client.send_message("second", None).expect("queued");
        client.send_message("third", None).expect("queued");

        let (_cmd, _evt, sent, handle) = spawn_driver(&client);
        wait_until(|| sent.lock().len() >= 3).await;
        graceful_disconnect(&client, handle).await;

        let sent = sent.lock().clone();
        assert_eq!(&sent[..3], &["3:::first", "3:::second", "3:::third"]);
        assert_eq!(sent.last().map(String::as_str), Some("0::"));
    }

    #[tokio::test]
    async fn test_namespace_connect_sent_on_open() {
        let client = test_client("/chat", None, Arc::new(NoopDelegate));
        let (_cmd, _evt, sent, handle) = spawn_driver(&client);

        wait_until(|| !sent.lock().is_empty()).await;
        assert_eq!(sent.lock()[0], "1::/chat");
        graceful_disconnect(&client, handle).await;
    }

    // ========================================================================
    // Heartbeats
    // ========================================================================

    #[tokio::test]
    async fn test_heartbeat_is_echoed() {
        let client = test_client("", None, Arc::new(NoopDelegate));
        let (_cmd, evt, sent, handle) = spawn_driver(&client);

        evt.send(TransportEvent::Data("2::".to_string())).expect("send");
        wait_until(|| sent.lock().iter().any(|s| s == "2::")).await;
        graceful_disconnect(&client, handle).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_timeout_is_fatal_exactly_once() {
        let recorder = Arc::new(Recorder::default());
        let client = test_client("", Some(20), Arc::clone(&recorder) as Arc<dyn SocketDelegate>);
        let (_cmd, _evt, _sent, handle) = spawn_driver(&client);

        // No heartbeat ever arrives; paused time runs to the deadline.
        handle.await.expect("driver task");

        assert_eq!(client.state(), ConnectionState::Disconnected);
        let disconnects: Vec<String> = recorder
            .entries()
            .into_iter()
            .filter(|e| e.starts_with("disconnect:"))
            .collect();
        assert_eq!(disconnects.len(), 1);
        assert!(disconnects[0].contains("Heartbeat timeout after 20000ms"));
    }

    // ========================================================================
    // Acks
    // ========================================================================

    #[tokio::test]
    async fn test_ack_resolved_exactly_once() {
        let client = test_client("", None, Arc::new(NoopDelegate));
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Value::Null));

        let ack_id = {
            let counter = Arc::clone(&counter);
            let seen = Arc::clone(&seen);
            client.inner.acks.lock().register(Box::new(move |value| {
                counter.fetch_add(1, Ordering::SeqCst);
                *seen.lock() = value;
            }))
        };
        assert_eq!(ack_id, "1");

        let (_cmd, evt, _sent, handle) = spawn_driver(&client);
        evt.send(TransportEvent::Data(r#"6:::1+["woot"]"#.to_string()))
            .expect("send");
        evt.send(TransportEvent::Data(r#"6:::1+["again"]"#.to_string()))
            .expect("send");

        wait_until(|| counter.load(Ordering::SeqCst) >= 1).await;
        graceful_disconnect(&client, handle).await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(*seen.lock(), json!("woot"));
        assert_eq!(client.pending_acks(), 0);
    }

    // ========================================================================
    // Namespace Dispatch
    // ========================================================================

    #[tokio::test]
    async fn test_unbound_endpoint_packet_is_dropped() {
        let recorder = Arc::new(Recorder::default());
        let client = test_client("", None, Arc::clone(&recorder) as Arc<dyn SocketDelegate>);
        let (_cmd, evt, _sent, handle) = spawn_driver(&client);

        evt.send(TransportEvent::Data(
            r#"5::/nowhere:{"name":"x","args":[]}"#.to_string(),
        ))
        .expect("send");
        // A bound packet afterwards proves the first was processed.
        evt.send(TransportEvent::Data("3:::after".to_string()))
            .expect("send");

        wait_until(|| recorder.entries().iter().any(|e| e == "message:after")).await;
        graceful_disconnect(&client, handle).await;

        let entries = recorder.entries();
        assert!(!entries.iter().any(|e| e.starts_with("event:")));
        assert!(!entries.iter().any(|e| e.starts_with("error:")));
    }

    #[tokio::test]
    async fn test_event_dispatched_to_matching_namespace() {
        let root = Arc::new(Recorder::default());
        let chat = Arc::new(Recorder::default());
        let client = test_client("", None, Arc::clone(&root) as Arc<dyn SocketDelegate>);
        client
            .inner
            .namespaces
            .lock()
            .register("/chat", Arc::clone(&chat) as Arc<dyn SocketDelegate>);

        let (_cmd, evt, _sent, handle) = spawn_driver(&client);
        evt.send(TransportEvent::Data(
            r#"5::/chat:{"name":"msg","args":["hi"]}"#.to_string(),
        ))
        .expect("send");

        wait_until(|| chat.entries().iter().any(|e| e == "event:msg")).await;
        graceful_disconnect(&client, handle).await;

        assert!(!root.entries().iter().any(|e| e.starts_with("event:")));
    }

    #[tokio::test]
    async fn test_server_connect_echo_marks_namespace() {
        let chat = Arc::new(Recorder::default());
        let client = test_client("", None, Arc::new(NoopDelegate));
        client
            .inner
            .namespaces
            .lock()
            .register("/chat", Arc::clone(&chat) as Arc<dyn SocketDelegate>);

        let (_cmd, evt, _sent, handle) = spawn_driver(&client);
        evt.send(TransportEvent::Data("1::/chat".to_string()))
            .expect("send");

        wait_until(|| client.is_namespace_connected("/chat")).await;
        graceful_disconnect(&client, handle).await;

        assert!(chat.entries().contains(&"connect:/chat".to_string()));
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    #[tokio::test]
    async fn test_connect_rejected_while_connecting() {
        let client = test_client("", None, Arc::new(NoopDelegate));
        *client.inner.state.lock() = ConnectionState::Connecting;

        let err = client.connect().await.expect_err("must reject");
        assert!(matches!(err, Error::ConnectionInProgress { .. }));
    }

    #[tokio::test]
    async fn test_send_while_disconnected_fails() {
        let client = test_client("", None, Arc::new(NoopDelegate));
        let err = client.send_message("hi", None).expect_err("must fail");
        assert!(matches!(err, Error::DataCouldNotBeSend { .. }));
    }

    #[tokio::test]
    async fn test_failed_send_leaves_no_pending_ack() {
        let client = test_client("", None, Arc::new(NoopDelegate));

        let err = client
            .send_message("hi", Some(Box::new(|_| {})))
            .expect_err("must fail");
        assert!(matches!(err, Error::DataCouldNotBeSend { .. }));
        assert_eq!(client.pending_acks(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_during_connect_aborts_attempt() {
        let client = test_client("", None, Arc::new(NoopDelegate));
        *client.inner.state.lock() = ConnectionState::Connecting;

        client.disconnect().await;
        assert!(client.inner.connect_cancelled.load(Ordering::SeqCst));

        // Already disconnected, nothing to cancel.
        let idle = test_client("", None, Arc::new(NoopDelegate));
        idle.disconnect().await;
        assert!(!idle.inner.connect_cancelled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_server_disconnect_packet_tears_down() {
        let recorder = Arc::new(Recorder::default());
        let client = test_client("", None, Arc::clone(&recorder) as Arc<dyn SocketDelegate>);
        let (_cmd, evt, _sent, handle) = spawn_driver(&client);

        evt.send(TransportEvent::Data("0::".to_string())).expect("send");
        handle.await.expect("driver task");

        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(
            recorder
                .entries()
                .iter()
                .any(|e| e.starts_with("disconnect:") && e.contains("Server disconnected"))
        );
    }

    #[tokio::test]
    async fn test_transport_disconnect_tears_down() {
        let recorder = Arc::new(Recorder::default());
        let client = test_client("", None, Arc::clone(&recorder) as Arc<dyn SocketDelegate>);
        let (_cmd, evt, _sent, handle) = spawn_driver(&client);

        evt.send(TransportEvent::Disconnect(Some(Error::transport_closed(
            "connection reset",
        ))))
        .expect("send");
        handle.await.expect("driver task");

        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_decode_failure_is_reported_not_fatal() {
        let recorder = Arc::new(Recorder::default());
        let client = test_client("", None, Arc::clone(&recorder) as Arc<dyn SocketDelegate>);
        let (_cmd, evt, _sent, handle) = spawn_driver(&client);

        evt.send(TransportEvent::Data("complete garbage".to_string()))
            .expect("send");
        evt.send(TransportEvent::Data("3:::still alive".to_string()))
            .expect("send");

        wait_until(|| recorder.entries().iter().any(|e| e == "message:still alive")).await;
        assert!(
            recorder
                .entries()
                .iter()
                .any(|e| e.starts_with("error:Invalid packet"))
        );
        graceful_disconnect(&client, handle).await;
    }

    #[tokio::test]
    async fn test_forced_disconnect_skips_courtesy_packet() {
        let client = test_client("", None, Arc::new(NoopDelegate));
        let (_cmd, _evt, sent, handle) = spawn_driver(&client);

        client.disconnect_forced();
        handle.await.expect("driver task");

        assert!(!sent.lock().iter().any(|s| s.starts_with("0:")));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_sends_queued_behind_disconnect_are_reported() {
        let recorder = Arc::new(Recorder::default());
        let client = test_client("", None, Arc::clone(&recorder) as Arc<dyn SocketDelegate>);
        let (cmd, _evt, sent, handle) = spawn_driver(&client);

        // The send sits behind the disconnect in the command channel.
        cmd.send(Command::Disconnect {
            forced: true,
            done: None,
        })
        .expect("queue disconnect");
        cmd.send(Command::Send(Packet::message("late")))
            .expect("queue send");
        handle.await.expect("driver task");

        assert!(!sent.lock().iter().any(|s| s.contains("late")));
        assert!(
            recorder
                .entries()
                .iter()
                .any(|e| e.starts_with("error:Data could not be sent"))
        );
    }

    #[tokio::test]
    async fn test_sent_callback_for_messages() {
        let recorder = Arc::new(Recorder::default());
        let client = test_client("", None, Arc::clone(&recorder) as Arc<dyn SocketDelegate>);
        let (_cmd, _evt, _sent, handle) = spawn_driver(&client);

        client.send_message("hi", None).expect("send");
        wait_until(|| recorder.entries().contains(&"sent:message".to_string())).await;
        graceful_disconnect(&client, handle).await;
    }

    #[tokio::test]
    async fn test_state_display() {
        assert_eq!(ConnectionState::Disconnected.to_string(), "disconnected");
        assert_eq!(ConnectionState::Open.to_string(), "open");
        assert_eq!(
            ConnectionState::HandshakeInFlight.to_string(),
            "handshake-in-flight"
        );
    }
}
