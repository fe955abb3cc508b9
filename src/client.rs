//! Async client for a Table Talk game room.
//!
//! [`TableTalkClient`] is a thin handle that communicates with a background
//! transport loop task via an unbounded MPSC channel. Events are emitted on a
//! bounded channel ([`tokio::sync::mpsc::Receiver<TableTalkEvent>`]) returned
//! from [`TableTalkClient::connect`].
//!
//! The transport loop owns the connection lifecycle: it forwards inbound
//! frames to the [`SessionStore`] and the event channel, and after an
//! unexpected close it drives bounded reconnection through the
//! [`Connector`] it was started with.
//!
//! # Example
//!
//! ```rust,ignore
//! let connector = WebSocketConnector::new("ws://localhost:8000");
//! let session = Arc::new(SessionStore::new(Arc::new(MemoryStorage::new())));
//! let player_id = session.init_player();
//!
//! let (client, mut events) =
//!     TableTalkClient::connect(connector, "ABCD", player_id, session, TableTalkConfig::new())
//!         .await?;
//!
//! client.draw_card()?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         TableTalkEvent::CardDrawn { card, .. } => { /* … */ }
//!         TableTalkEvent::ReconnectFailed { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::error::{Result, TableTalkError};
use crate::event::TableTalkEvent;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::session::{Session, SessionStore};
use crate::transport::{Connector, Transport};

/// Default delay between reconnect attempts.
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(2000);

/// Default number of reconnect attempts before giving up.
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`TableTalkClient`] connection.
///
/// All fields have defaults matching the server's expectations; a plain
/// [`TableTalkConfig::new`] is usually enough.
///
/// # Tuning
///
/// ```
/// use table_talk_client::client::TableTalkConfig;
/// use std::time::Duration;
///
/// let config = TableTalkConfig::new()
///     .with_reconnect_delay(Duration::from_millis(500))
///     .with_max_reconnect_attempts(3);
/// ```
#[derive(Debug, Clone)]
pub struct TableTalkConfig {
    /// Fixed delay before each reconnect attempt.
    ///
    /// Defaults to **2000 ms**. The delay is deliberately not exponential;
    /// the retry budget is small and the server tolerates quick re-dials.
    pub reconnect_delay: Duration,
    /// Number of consecutive failed reconnect attempts before the client
    /// gives up and emits [`TableTalkEvent::ReconnectFailed`].
    ///
    /// Defaults to **5**. A successful reconnect resets the counter.
    pub max_reconnect_attempts: u32,
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer cannot keep up with incoming frames, events are
    /// dropped (with a warning logged) to avoid blocking the transport loop.
    /// `Disconnected` and `ReconnectFailed` are always delivered regardless
    /// of capacity.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Timeout for the graceful shutdown.
    ///
    /// When [`TableTalkClient::shutdown`] is called, the background transport
    /// loop is given this much time to close the transport and emit a final
    /// `Disconnected` event. If the timeout expires the task is aborted.
    ///
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
}

impl Default for TableTalkConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl TableTalkConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fixed delay before each reconnect attempt.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the reconnect retry budget.
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set the capacity of the bounded event channel.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the timeout for the graceful shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

// ── Connection status ───────────────────────────────────────────────

/// Lifecycle state of the logical room connection.
///
/// ```text
/// Idle → Connecting → Open ⇄ (Closed → Reconnecting → Open)
///                              Reconnecting → Failed   (terminal)
/// ```
///
/// Explicit [`shutdown`](TableTalkClient::shutdown) moves any state to
/// `Closed` and stops the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// No connection has been attempted yet.
    #[default]
    Idle,
    /// The initial connect is in flight.
    Connecting,
    /// The transport is open and frames flow.
    Open,
    /// The connection dropped or was shut down.
    Closed,
    /// An automatic reconnect attempt is pending or in flight.
    Reconnecting,
    /// Reconnection exhausted its retry budget. Terminal.
    Failed,
}

// ── Shared state ────────────────────────────────────────────────────

/// Internal state shared between the client handle and the transport loop.
struct ClientState {
    connected: AtomicBool,
    status: Mutex<ConnectionStatus>,
    attempt: AtomicU32,
}

impl ClientState {
    fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            status: Mutex::new(ConnectionStatus::Idle),
            attempt: AtomicU32::new(0),
        }
    }

    fn set_status(&self, status: ConnectionStatus) {
        *self
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = status;
    }

    fn status(&self) -> ConnectionStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Client handle ───────────────────────────────────────────────────

/// Async client handle for one logical room connection.
///
/// Created via [`TableTalkClient::connect`], which establishes the initial
/// transport, spawns a background transport loop and returns this handle
/// together with an event receiver.
///
/// All action methods serialize a [`ClientMessage`] and send it to the
/// transport loop over an unbounded channel. They return immediately once the
/// message is queued (no round-trip await).
pub struct TableTalkClient {
    /// Sender half of the command channel to the transport loop.
    cmd_tx: mpsc::UnboundedSender<ClientMessage>,
    /// Shared state updated by the transport loop.
    state: Arc<ClientState>,
    /// Session store the transport loop applies inbound frames to.
    session: Arc<SessionStore>,
    /// Room this client is connected to.
    room_code: String,
    /// Identity the connection was opened with.
    player_id: String,
    /// Handle to the background transport loop task.
    task: Option<tokio::task::JoinHandle<()>>,
    /// Oneshot sender to signal the transport loop to shut down gracefully.
    shutdown_tx: Option<oneshot::Sender<()>>,
    /// Timeout for the graceful shutdown.
    shutdown_timeout: Duration,
}

impl TableTalkClient {
    /// Open a connection to `room_code`'s event channel as `player_id` and
    /// start the background transport loop.
    ///
    /// Resolves once the transport reports open; the server follows up with
    /// a `GameState` snapshot on the event channel. The connector is retained
    /// and re-invoked with the same room code and player id on every
    /// reconnect attempt.
    ///
    /// # Errors
    ///
    /// Returns the connector's transport-level error if the initial
    /// connection cannot be established. No background task is spawned in
    /// that case; retrying is the caller's decision.
    #[must_use = "the event receiver must be used to receive events"]
    pub async fn connect<C: Connector>(
        connector: C,
        room_code: impl Into<String>,
        player_id: impl Into<String>,
        session: Arc<SessionStore>,
        config: TableTalkConfig,
    ) -> Result<(Self, mpsc::Receiver<TableTalkEvent>)> {
        let room_code = room_code.into();
        let player_id = player_id.into();

        let state = Arc::new(ClientState::new());
        state.set_status(ConnectionStatus::Connecting);

        let transport = match connector.connect(&room_code, &player_id).await {
            Ok(transport) => transport,
            Err(e) => {
                state.set_status(ConnectionStatus::Closed);
                return Err(e);
            }
        };

        state.connected.store(true, Ordering::Release);
        state.set_status(ConnectionStatus::Open);

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ClientMessage>();
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<TableTalkEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(transport_loop(
            connector,
            transport,
            room_code.clone(),
            player_id.clone(),
            cmd_rx,
            event_tx,
            Arc::clone(&state),
            Arc::clone(&session),
            shutdown_rx,
            config.clone(),
        ));

        let client = Self {
            cmd_tx,
            state,
            session,
            room_code,
            player_id,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
        };

        Ok((client, event_rx))
    }

    // ── Game actions ────────────────────────────────────────────────

    /// Start the game (host only — the server enforces this).
    ///
    /// # Errors
    ///
    /// Returns [`TableTalkError::NotConnected`] if the transport is not open.
    pub fn start_game(&self) -> Result<()> {
        self.send(ClientMessage::StartGame)
    }

    /// Draw the next card from the deck.
    ///
    /// # Errors
    ///
    /// Returns [`TableTalkError::NotConnected`] if the transport is not open.
    pub fn draw_card(&self) -> Result<()> {
        self.send(ClientMessage::DrawCard)
    }

    /// Discard the current card and draw a replacement.
    ///
    /// # Errors
    ///
    /// Returns [`TableTalkError::NotConnected`] if the transport is not open.
    pub fn switch_card(&self) -> Result<()> {
        self.send(ClientMessage::SwitchCard)
    }

    /// End the game (host only — the server enforces this).
    ///
    /// # Errors
    ///
    /// Returns [`TableTalkError::NotConnected`] if the transport is not open.
    pub fn end_game(&self) -> Result<()> {
        self.send(ClientMessage::EndGame)
    }

    /// Reset the room back to the lobby (host only — the server enforces
    /// this).
    ///
    /// # Errors
    ///
    /// Returns [`TableTalkError::NotConnected`] if the transport is not open.
    pub fn restart_game(&self) -> Result<()> {
        self.send(ClientMessage::RestartGame)
    }

    /// Shut down the client, closing the transport and stopping the
    /// background task.
    ///
    /// This is a deliberate teardown, not a failure path: no reconnection is
    /// attempted, even when called mid-reconnect. After this method returns,
    /// the event receiver yields a final
    /// [`Disconnected`](TableTalkEvent::Disconnected) and then `None`.
    pub async fn shutdown(&mut self) {
        debug!("TableTalkClient: shutdown requested");

        // Signal the transport loop to shut down gracefully.
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        // Await the transport loop with a timeout. If it doesn't exit in
        // time, abort it so the task cannot detach and run indefinitely.
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("transport loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("transport loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("transport loop aborted: {join_err}");
                    }
                }
            }
        }

        self.state.connected.store(false, Ordering::Release);
        self.state.set_status(ConnectionStatus::Closed);
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Returns `true` if the transport is believed to be open.
    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }

    /// Current state of the connection lifecycle.
    pub fn status(&self) -> ConnectionStatus {
        self.state.status()
    }

    /// Number of the reconnect attempt currently pending or in flight.
    /// Zero while the connection is healthy.
    pub fn reconnect_attempt(&self) -> u32 {
        self.state.attempt.load(Ordering::Acquire)
    }

    /// Room code the connection was opened with.
    pub fn room_code(&self) -> &str {
        &self.room_code
    }

    /// Player id the connection was opened with.
    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    /// Snapshot of the session state the transport loop maintains.
    pub fn session(&self) -> Session {
        self.session.snapshot()
    }

    /// The shared session store.
    pub fn session_store(&self) -> &Arc<SessionStore> {
        &self.session
    }

    // ── Internal helpers ────────────────────────────────────────────

    /// Queue a `ClientMessage` to the transport loop.
    fn send(&self, msg: ClientMessage) -> Result<()> {
        if !self.state.connected.load(Ordering::Acquire) {
            return Err(TableTalkError::NotConnected);
        }
        self.cmd_tx
            .send(msg)
            .map_err(|_| TableTalkError::NotConnected)
    }
}

impl std::fmt::Debug for TableTalkClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableTalkClient")
            .field("room_code", &self.room_code)
            .field("player_id", &self.player_id)
            .field("status", &self.status())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for TableTalkClient {
    fn drop(&mut self) {
        // `Drop` is synchronous so we cannot await a graceful shutdown.
        // The only safe action is to abort the spawned task, which causes
        // the transport loop future to be dropped immediately.  The
        // `shutdown_tx` oneshot is intentionally *not* sent here: sending
        // it would trigger a graceful path that calls async `transport.close()`,
        // but there is no executor context to drive it inside `Drop`.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Transport loop ──────────────────────────────────────────────────

/// Why one transport session ended.
enum SessionEnd {
    /// Explicit shutdown was requested.
    Shutdown,
    /// The client handle was dropped (command channel closed).
    ClientDropped,
    /// The transport closed or errored unexpectedly.
    TransportLost(Option<String>),
}

/// Outcome of the bounded reconnection loop.
enum ReconnectOutcome<T> {
    /// A fresh transport was established.
    Restored(T),
    /// The retry budget is exhausted.
    Exhausted,
    /// Shutdown was requested while waiting or dialing.
    ShutdownRequested,
}

/// Background loop that owns the transport for the connection's lifetime.
///
/// Exits when:
/// - Explicit shutdown is requested (or the client handle is dropped)
/// - Reconnection exhausts its retry budget
#[allow(clippy::too_many_arguments)]
async fn transport_loop<C: Connector>(
    connector: C,
    mut transport: C::Transport,
    room_code: String,
    player_id: String,
    mut cmd_rx: mpsc::UnboundedReceiver<ClientMessage>,
    event_tx: mpsc::Sender<TableTalkEvent>,
    state: Arc<ClientState>,
    session: Arc<SessionStore>,
    mut shutdown_rx: oneshot::Receiver<()>,
    config: TableTalkConfig,
) {
    debug!(room = %room_code, player = %player_id, "transport loop started");

    // Emit the synthetic Connected event before entering the select loop.
    emit_event(&event_tx, TableTalkEvent::Connected).await;

    loop {
        let end = drive_transport(
            &mut transport,
            &mut cmd_rx,
            &event_tx,
            &session,
            &mut shutdown_rx,
        )
        .await;

        match end {
            SessionEnd::Shutdown | SessionEnd::ClientDropped => {
                debug!("shutting down transport loop");
                let _ = transport.close().await;
                state.connected.store(false, Ordering::Release);
                state.set_status(ConnectionStatus::Closed);
                deliver_event(
                    &event_tx,
                    TableTalkEvent::Disconnected {
                        reason: Some("client shut down".into()),
                    },
                )
                .await;
                break;
            }
            SessionEnd::TransportLost(reason) => {
                warn!(room = %room_code, reason = ?reason, "connection lost");
                state.connected.store(false, Ordering::Release);
                state.set_status(ConnectionStatus::Closed);
                deliver_event(&event_tx, TableTalkEvent::Disconnected { reason }).await;

                match reconnect(
                    &connector,
                    &room_code,
                    &player_id,
                    &event_tx,
                    &state,
                    &mut shutdown_rx,
                    &config,
                )
                .await
                {
                    ReconnectOutcome::Restored(fresh) => {
                        transport = fresh;
                        state.connected.store(true, Ordering::Release);
                        state.set_status(ConnectionStatus::Open);
                        emit_event(&event_tx, TableTalkEvent::Reconnected).await;
                        // The server re-sends a GameState snapshot on the new
                        // socket, which resynchronizes the session store.
                    }
                    ReconnectOutcome::Exhausted => {
                        state.set_status(ConnectionStatus::Failed);
                        deliver_event(
                            &event_tx,
                            TableTalkEvent::ReconnectFailed {
                                attempts: config.max_reconnect_attempts,
                            },
                        )
                        .await;
                        break;
                    }
                    ReconnectOutcome::ShutdownRequested => {
                        debug!("shutdown requested during reconnection");
                        state.set_status(ConnectionStatus::Closed);
                        break;
                    }
                }
            }
        }
    }

    debug!("transport loop exited");
}

/// Drive one transport session: multiplex outgoing commands, the shutdown
/// signal and inbound frames until the session ends.
async fn drive_transport<T: Transport>(
    transport: &mut T,
    cmd_rx: &mut mpsc::UnboundedReceiver<ClientMessage>,
    event_tx: &mpsc::Sender<TableTalkEvent>,
    session: &SessionStore,
    shutdown_rx: &mut oneshot::Receiver<()>,
) -> SessionEnd {
    loop {
        tokio::select! {
            // Branch 1: outgoing command from the client handle
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(msg) => {
                        debug!("sending client message: {msg:?}");
                        match serde_json::to_string(&msg) {
                            Ok(json) => {
                                if let Err(e) = transport.send(json).await {
                                    error!("transport send error: {e}");
                                    return SessionEnd::TransportLost(
                                        Some(format!("transport send error: {e}")),
                                    );
                                }
                            }
                            Err(e) => {
                                error!("failed to serialize ClientMessage: {e}");
                                // Serialization errors are programming bugs; don't kill the loop.
                            }
                        }
                    }
                    // Command channel closed — client handle dropped.
                    None => return SessionEnd::ClientDropped,
                }
            }

            // Branch 2: shutdown signal
            _ = &mut *shutdown_rx => {
                return SessionEnd::Shutdown;
            }

            // Branch 3: incoming frame from the server
            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => {
                        match serde_json::from_str::<ServerMessage>(&text) {
                            Ok(server_msg) => {
                                // Update the canonical session state, then
                                // forward the typed event to the consumer.
                                session.apply(&server_msg);
                                emit_event(event_tx, TableTalkEvent::from(server_msg)).await;
                            }
                            Err(e) => {
                                // Malformed frames are skipped rather than
                                // tearing down a healthy connection.
                                warn!("failed to deserialize server frame: {e} — raw: {text}");
                            }
                        }
                    }
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        return SessionEnd::TransportLost(
                            Some(format!("transport receive error: {e}")),
                        );
                    }
                    // Transport closed by the server.
                    None => return SessionEnd::TransportLost(None),
                }
            }
        }
    }
}

/// Bounded reconnection: wait, dial, repeat.
///
/// Each attempt waits the fixed delay, then re-invokes the connector with
/// the last known room code and player id. The shutdown signal is selected
/// against both the wait and the dial, so an explicit teardown can never be
/// overtaken by a stale connect resolving afterwards.
async fn reconnect<C: Connector>(
    connector: &C,
    room_code: &str,
    player_id: &str,
    event_tx: &mpsc::Sender<TableTalkEvent>,
    state: &ClientState,
    shutdown_rx: &mut oneshot::Receiver<()>,
    config: &TableTalkConfig,
) -> ReconnectOutcome<C::Transport> {
    for attempt in 1..=config.max_reconnect_attempts {
        state.attempt.store(attempt, Ordering::Release);
        state.set_status(ConnectionStatus::Reconnecting);

        tokio::select! {
            _ = tokio::time::sleep(config.reconnect_delay) => {}
            _ = &mut *shutdown_rx => return ReconnectOutcome::ShutdownRequested,
        }

        debug!(
            attempt,
            max = config.max_reconnect_attempts,
            "attempting reconnect"
        );
        emit_event(event_tx, TableTalkEvent::Reconnecting { attempt }).await;

        tokio::select! {
            result = connector.connect(room_code, player_id) => {
                match result {
                    Ok(transport) => {
                        state.attempt.store(0, Ordering::Release);
                        return ReconnectOutcome::Restored(transport);
                    }
                    Err(e) => {
                        warn!(attempt, "reconnect attempt failed: {e}");
                    }
                }
            }
            _ = &mut *shutdown_rx => return ReconnectOutcome::ShutdownRequested,
        }
    }

    warn!(
        attempts = config.max_reconnect_attempts,
        "reconnection retry budget exhausted"
    );
    ReconnectOutcome::Exhausted
}

/// Emit an event to the event channel. If the channel is full, log a warning
/// and drop the event to avoid blocking the transport loop.
async fn emit_event(event_tx: &mpsc::Sender<TableTalkEvent>, event: TableTalkEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!(
                "event channel full, dropping event: {:?}",
                std::mem::discriminant(&dropped)
            );
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

/// Emit an event that must never be dropped (`Disconnected`,
/// `ReconnectFailed`). Uses `send().await` (blocking) instead of `try_send`.
async fn deliver_event(event_tx: &mpsc::Sender<TableTalkEvent>, event: TableTalkEvent) {
    if event_tx.send(event).await.is_err() {
        debug!("event channel closed, receiver dropped");
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::protocol::GamePhase;
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    // ── Mock transport and connector ────────────────────────────────

    /// A mock transport that records sent messages and replays scripted frames.
    struct MockTransport {
        /// Frames that `recv()` will yield in order. An explicit `None` entry
        /// signals a clean transport close.
        incoming: VecDeque<Option<std::result::Result<String, TableTalkError>>>,
        /// Recorded outgoing messages.
        sent: Arc<StdMutex<Vec<String>>>,
        /// Whether `close()` was called.
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, message: String) -> std::result::Result<(), TableTalkError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, TableTalkError>> {
            if let Some(item) = self.incoming.pop_front() {
                item
            } else {
                // All scripted frames delivered — hang forever so the
                // transport loop stays alive until shutdown.
                std::future::pending().await
            }
        }

        async fn close(&mut self) -> std::result::Result<(), TableTalkError> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    /// A connector that hands out scripted transports, one per connect call.
    struct MockConnector {
        scripts: StdMutex<VecDeque<Vec<Option<std::result::Result<String, TableTalkError>>>>>,
        calls: Arc<StdMutex<Vec<(String, String)>>>,
        sent: Arc<StdMutex<Vec<String>>>,
    }

    impl MockConnector {
        /// Each entry in `scripts` is the incoming script for one successful
        /// connect; once the scripts run out, further connects fail.
        fn new(
            scripts: Vec<Vec<Option<std::result::Result<String, TableTalkError>>>>,
        ) -> (
            Self,
            Arc<StdMutex<Vec<(String, String)>>>,
            Arc<StdMutex<Vec<String>>>,
        ) {
            let calls = Arc::new(StdMutex::new(Vec::new()));
            let sent = Arc::new(StdMutex::new(Vec::new()));
            let connector = Self {
                scripts: StdMutex::new(VecDeque::from(scripts)),
                calls: Arc::clone(&calls),
                sent: Arc::clone(&sent),
            };
            (connector, calls, sent)
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        type Transport = MockTransport;

        async fn connect(
            &self,
            room_code: &str,
            player_id: &str,
        ) -> std::result::Result<MockTransport, TableTalkError> {
            self.calls
                .lock()
                .unwrap()
                .push((room_code.to_string(), player_id.to_string()));
            match self.scripts.lock().unwrap().pop_front() {
                Some(incoming) => Ok(MockTransport {
                    incoming: VecDeque::from(incoming),
                    sent: Arc::clone(&self.sent),
                    closed: Arc::new(AtomicBool::new(false)),
                }),
                None => Err(TableTalkError::TransportReceive("connection refused".into())),
            }
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn game_state_json() -> String {
        r#"{"type":"game_state","status":"waiting","current_card":null,"players":[]}"#.to_string()
    }

    fn new_session() -> Arc<SessionStore> {
        let store = SessionStore::new(Arc::new(MemoryStorage::new()));
        Arc::new(store)
    }

    fn fast_config() -> TableTalkConfig {
        TableTalkConfig::new().with_reconnect_delay(Duration::from_millis(10))
    }

    // ── Config tests ────────────────────────────────────────────────

    #[test]
    fn config_defaults() {
        let config = TableTalkConfig::new();
        assert_eq!(config.reconnect_delay, Duration::from_millis(2000));
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }

    #[test]
    fn config_builder_methods() {
        let config = TableTalkConfig::new()
            .with_reconnect_delay(Duration::from_millis(500))
            .with_max_reconnect_attempts(3)
            .with_event_channel_capacity(512)
            .with_shutdown_timeout(Duration::from_secs(5));
        assert_eq!(config.reconnect_delay, Duration::from_millis(500));
        assert_eq!(config.max_reconnect_attempts, 3);
        assert_eq!(config.event_channel_capacity, 512);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    }

    #[test]
    fn event_channel_capacity_is_clamped_to_one() {
        let config = TableTalkConfig::new().with_event_channel_capacity(0);
        assert_eq!(config.event_channel_capacity, 1);
    }

    // ── Connection tests ────────────────────────────────────────────

    #[tokio::test]
    async fn connect_rejects_on_transport_error() {
        let (connector, calls, _sent) = MockConnector::new(vec![]);
        let result = TableTalkClient::connect(
            connector,
            "ABCD",
            "player_1",
            new_session(),
            TableTalkConfig::new(),
        )
        .await;

        assert!(matches!(result, Err(TableTalkError::TransportReceive(_))));
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn connected_is_first_event() {
        let (connector, _calls, _sent) = MockConnector::new(vec![vec![Some(Ok(game_state_json()))]]);
        let (mut client, mut events) = TableTalkClient::connect(
            connector,
            "ABCD",
            "player_1",
            new_session(),
            TableTalkConfig::new(),
        )
        .await
        .unwrap();

        let first = events.recv().await.unwrap();
        assert!(
            matches!(first, TableTalkEvent::Connected),
            "expected Connected as first event, got {first:?}"
        );
        assert!(client.is_connected());
        assert_eq!(client.status(), ConnectionStatus::Open);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn actions_serialize_onto_the_wire() {
        let (connector, _calls, sent) = MockConnector::new(vec![vec![Some(Ok(game_state_json()))]]);
        let (mut client, mut events) = TableTalkClient::connect(
            connector,
            "ABCD",
            "player_1",
            new_session(),
            TableTalkConfig::new(),
        )
        .await
        .unwrap();

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // GameState

        client.start_game().unwrap();
        client.draw_card().unwrap();
        client.switch_card().unwrap();
        client.end_game().unwrap();
        client.restart_game().unwrap();

        // Give the loop a moment to process.
        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            let parsed: Vec<ClientMessage> = messages
                .iter()
                .map(|m| serde_json::from_str(m).unwrap())
                .collect();
            assert_eq!(
                parsed,
                vec![
                    ClientMessage::StartGame,
                    ClientMessage::DrawCard,
                    ClientMessage::SwitchCard,
                    ClientMessage::EndGame,
                    ClientMessage::RestartGame,
                ]
            );
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn inbound_frames_update_session_store() {
        let snapshot = r#"{"type":"game_state","status":"playing","current_card":null,"players":[{"id":1,"player_id":"player_1","nickname":"Ada","is_host":true,"joined_at":"t"}]}"#;
        let (connector, _calls, _sent) =
            MockConnector::new(vec![vec![Some(Ok(snapshot.to_string()))]]);
        let session = new_session();
        session.init_player();

        let (mut client, mut events) = TableTalkClient::connect(
            connector,
            "ABCD",
            "player_1",
            Arc::clone(&session),
            TableTalkConfig::new(),
        )
        .await
        .unwrap();

        let _ = events.recv().await; // Connected
        let event = events.recv().await.unwrap(); // GameState
        assert!(matches!(event, TableTalkEvent::GameState(_)));

        let snap = client.session();
        assert_eq!(snap.phase, GamePhase::Playing);
        assert_eq!(snap.player_count(), 1);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn malformed_frame_is_skipped() {
        let (connector, _calls, _sent) = MockConnector::new(vec![vec![
            Some(Ok("{not json".to_string())),
            Some(Ok(game_state_json())),
        ]]);
        let (mut client, mut events) = TableTalkClient::connect(
            connector,
            "ABCD",
            "player_1",
            new_session(),
            TableTalkConfig::new(),
        )
        .await
        .unwrap();

        let _ = events.recv().await; // Connected
        // The malformed frame produces no event; the next one does.
        let event = events.recv().await.unwrap();
        assert!(matches!(event, TableTalkEvent::GameState(_)));
        assert!(client.is_connected(), "a bad frame must not kill the link");

        client.shutdown().await;
    }

    #[tokio::test]
    async fn not_connected_error_after_shutdown() {
        let (connector, _calls, _sent) = MockConnector::new(vec![vec![]]);
        let (mut client, mut events) = TableTalkClient::connect(
            connector,
            "ABCD",
            "player_1",
            new_session(),
            TableTalkConfig::new(),
        )
        .await
        .unwrap();

        let _ = events.recv().await; // Connected
        client.shutdown().await;

        let result = client.draw_card();
        assert!(matches!(result, Err(TableTalkError::NotConnected)));
        assert_eq!(client.status(), ConnectionStatus::Closed);
    }

    #[tokio::test]
    async fn shutdown_emits_final_disconnected() {
        let (connector, _calls, _sent) = MockConnector::new(vec![vec![]]);
        let (mut client, mut events) = TableTalkClient::connect(
            connector,
            "ABCD",
            "player_1",
            new_session(),
            TableTalkConfig::new(),
        )
        .await
        .unwrap();

        let _ = events.recv().await; // Connected
        client.shutdown().await;

        let event = events.recv().await.unwrap();
        let TableTalkEvent::Disconnected { reason } = event else {
            panic!("expected Disconnected, got {event:?}");
        };
        assert_eq!(reason.as_deref(), Some("client shut down"));
        assert!(events.recv().await.is_none(), "channel closes after teardown");
    }

    #[tokio::test]
    async fn double_shutdown_does_not_panic() {
        let (connector, _calls, _sent) = MockConnector::new(vec![vec![]]);
        let (mut client, mut events) = TableTalkClient::connect(
            connector,
            "ABCD",
            "player_1",
            new_session(),
            TableTalkConfig::new(),
        )
        .await
        .unwrap();

        let _ = events.recv().await; // Connected
        client.shutdown().await;
        client.shutdown().await; // should not panic
    }

    #[tokio::test]
    async fn drop_without_explicit_shutdown() {
        let (connector, _calls, _sent) = MockConnector::new(vec![vec![]]);
        let (client, mut events) = TableTalkClient::connect(
            connector,
            "ABCD",
            "player_1",
            new_session(),
            TableTalkConfig::new(),
        )
        .await
        .unwrap();

        let _ = events.recv().await; // Connected
        drop(client);

        // The transport loop is aborted; the event channel closes. We just
        // verify we don't hang or panic draining it.
        while let Some(_event) = events.recv().await {}
    }

    // ── Reconnection tests ──────────────────────────────────────────

    #[tokio::test]
    async fn reconnects_after_unexpected_close() {
        // First transport closes immediately; second survives.
        let (connector, calls, _sent) = MockConnector::new(vec![
            vec![Some(Ok(game_state_json())), None],
            vec![Some(Ok(game_state_json()))],
        ]);
        let (mut client, mut events) = TableTalkClient::connect(
            connector,
            "ABCD",
            "player_1",
            new_session(),
            fast_config(),
        )
        .await
        .unwrap();

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // GameState

        let event = events.recv().await.unwrap();
        assert!(matches!(event, TableTalkEvent::Disconnected { reason: None }));

        let event = events.recv().await.unwrap();
        assert!(matches!(event, TableTalkEvent::Reconnecting { attempt: 1 }));

        let event = events.recv().await.unwrap();
        assert!(matches!(event, TableTalkEvent::Reconnected));

        // Fresh snapshot from the new socket.
        let event = events.recv().await.unwrap();
        assert!(matches!(event, TableTalkEvent::GameState(_)));

        assert!(client.is_connected());
        assert_eq!(client.status(), ConnectionStatus::Open);
        assert_eq!(client.reconnect_attempt(), 0, "counter resets on success");

        // Both dials used the same identity.
        {
            let calls = calls.lock().unwrap();
            assert_eq!(calls.len(), 2);
            assert!(calls
                .iter()
                .all(|(room, player)| room == "ABCD" && player == "player_1"));
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn reconnect_failed_after_exhausting_budget() {
        // One good transport that closes immediately, then every reconnect
        // attempt fails.
        let (connector, calls, _sent) = MockConnector::new(vec![vec![None]]);
        let config = fast_config().with_max_reconnect_attempts(5);
        let started = tokio::time::Instant::now();
        let (client, mut events) =
            TableTalkClient::connect(connector, "ABCD", "player_1", new_session(), config)
                .await
                .unwrap();

        let _ = events.recv().await; // Connected
        let event = events.recv().await.unwrap();
        assert!(matches!(event, TableTalkEvent::Disconnected { .. }));

        for expected in 1..=5u32 {
            let event = events.recv().await.unwrap();
            let TableTalkEvent::Reconnecting { attempt } = event else {
                panic!("expected Reconnecting, got {event:?}");
            };
            assert_eq!(attempt, expected);
        }

        let event = events.recv().await.unwrap();
        assert!(matches!(
            event,
            TableTalkEvent::ReconnectFailed { attempts: 5 }
        ));

        // Terminal: the loop exits, the channel closes, no further dials.
        assert!(events.recv().await.is_none());
        assert_eq!(calls.lock().unwrap().len(), 6, "1 initial + 5 retries");
        assert_eq!(client.status(), ConnectionStatus::Failed);
        assert!(!client.is_connected());

        // Each attempt waited the fixed delay first.
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn shutdown_during_reconnect_stops_attempts() {
        let (connector, calls, _sent) = MockConnector::new(vec![vec![None]]);
        let config = TableTalkConfig::new()
            .with_reconnect_delay(Duration::from_secs(30))
            .with_max_reconnect_attempts(5);
        let (mut client, mut events) =
            TableTalkClient::connect(connector, "ABCD", "player_1", new_session(), config)
                .await
                .unwrap();

        let _ = events.recv().await; // Connected
        let event = events.recv().await.unwrap();
        assert!(matches!(event, TableTalkEvent::Disconnected { .. }));

        // The loop is now sleeping out the 30s delay; shut down mid-wait.
        client.shutdown().await;

        assert_eq!(client.status(), ConnectionStatus::Closed);
        assert!(events.recv().await.is_none());
        assert_eq!(calls.lock().unwrap().len(), 1, "no dial after shutdown");
    }

    #[tokio::test]
    async fn send_fails_while_reconnecting() {
        let (connector, _calls, _sent) = MockConnector::new(vec![vec![None]]);
        let config = TableTalkConfig::new()
            .with_reconnect_delay(Duration::from_secs(30))
            .with_max_reconnect_attempts(5);
        let (mut client, mut events) =
            TableTalkClient::connect(connector, "ABCD", "player_1", new_session(), config)
                .await
                .unwrap();

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Disconnected

        assert!(matches!(client.draw_card(), Err(TableTalkError::NotConnected)));
        assert_eq!(client.status(), ConnectionStatus::Reconnecting);
        assert_eq!(client.reconnect_attempt(), 1);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn event_channel_backpressure_does_not_block() {
        // More frames than the channel can hold, then a close so the loop
        // finishes quickly (reconnects also fail fast).
        let mut incoming: Vec<Option<std::result::Result<String, TableTalkError>>> = Vec::new();
        for _ in 0..20 {
            incoming.push(Some(Ok(game_state_json())));
        }
        incoming.push(None);

        let (connector, _calls, _sent) = MockConnector::new(vec![incoming]);
        let config = fast_config()
            .with_event_channel_capacity(1)
            .with_max_reconnect_attempts(1);
        let (client, mut events) =
            TableTalkClient::connect(connector, "ABCD", "player_1", new_session(), config)
                .await
                .unwrap();

        // Let the channel fill and events drop.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut count = 0;
        let mut saw_reconnect_failed = false;
        while let Some(event) = events.recv().await {
            if matches!(event, TableTalkEvent::ReconnectFailed { .. }) {
                saw_reconnect_failed = true;
            }
            count += 1;
        }
        // Backpressure dropped some of the 20 snapshots…
        assert!(count < 23, "expected drops, got all {count}");
        // …but the must-deliver events still arrived.
        assert!(saw_reconnect_failed, "terminal event must never be dropped");
        drop(client);
    }

    #[tokio::test]
    async fn debug_impl_for_client() {
        let (connector, _calls, _sent) = MockConnector::new(vec![vec![]]);
        let (mut client, mut events) = TableTalkClient::connect(
            connector,
            "ABCD",
            "player_1",
            new_session(),
            TableTalkConfig::new(),
        )
        .await
        .unwrap();

        let _ = events.recv().await; // Connected

        let debug_str = format!("{client:?}");
        assert!(debug_str.contains("TableTalkClient"));
        assert!(debug_str.contains("ABCD"));

        client.shutdown().await;
    }
}
