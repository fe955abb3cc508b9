//! # Custom Transport Example
//!
//! Shows how to implement the [`Transport`] and [`Connector`] traits with a
//! simple in-process loopback channel. This is useful for:
//!
//! - **Testing** — exercise your game logic without a real server
//! - **Custom backends** — adapt any I/O layer (TCP, QUIC, WebRTC data channels)
//!
//! ## Running
//!
//! ```sh
//! cargo run --example custom_transport
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use table_talk_client::{
    Connector, MemoryStorage, SessionStore, TableTalkClient, TableTalkConfig, TableTalkError,
    TableTalkEvent, Transport,
};
use tokio::sync::mpsc;
use tokio::sync::Mutex;

// ─────────────────────────────────────────────────────────────────────
// Step 1: Define a channel-based "loopback" transport
// ─────────────────────────────────────────────────────────────────────

/// A loopback transport that shuttles messages through in-process channels.
///
/// This transport consists of two halves:
/// - The **client half** (`LoopbackTransport`) implements [`Transport`] and
///   is handed out by the [`LoopbackConnector`].
/// - The **server half** (`LoopbackServer`) lets you inject frames and read
///   what the client sent — perfect for testing.
pub struct LoopbackTransport {
    /// Messages the client sends go here (server reads from the other end).
    tx: mpsc::UnboundedSender<String>,
    /// Frames the server sends arrive here (client reads them).
    rx: mpsc::UnboundedReceiver<String>,
}

/// The "server side" of the loopback — use this to drive the conversation.
pub struct LoopbackServer {
    /// Read what the client sent.
    pub rx: mpsc::UnboundedReceiver<String>,
    /// Send frames to the client (as if they came from the room).
    pub tx: mpsc::UnboundedSender<String>,
}

/// Create a connected `(transport, server)` pair.
fn loopback_pair() -> (LoopbackTransport, LoopbackServer) {
    // Client → Server channel
    let (client_tx, server_rx) = mpsc::unbounded_channel();
    // Server → Client channel
    let (server_tx, client_rx) = mpsc::unbounded_channel();

    let transport = LoopbackTransport {
        tx: client_tx,
        rx: client_rx,
    };
    let server = LoopbackServer {
        rx: server_rx,
        tx: server_tx,
    };

    (transport, server)
}

// ─────────────────────────────────────────────────────────────────────
// Step 2: Implement the Transport trait
// ─────────────────────────────────────────────────────────────────────

#[async_trait]
impl Transport for LoopbackTransport {
    /// Send a JSON frame to the "server" side of the loopback.
    async fn send(&mut self, message: String) -> Result<(), TableTalkError> {
        self.tx
            .send(message)
            .map_err(|e| TableTalkError::TransportSend(e.to_string()))
    }

    /// Receive the next frame from the "server" side.
    ///
    /// Returns `None` when the server channel is closed — this is how the
    /// client discovers that the connection has ended.
    ///
    /// This method is **cancel-safe** because `mpsc::UnboundedReceiver::recv`
    /// is cancel-safe.
    async fn recv(&mut self) -> Option<Result<String, TableTalkError>> {
        self.rx.recv().await.map(Ok)
    }

    /// Close is a no-op for channels — dropping is sufficient.
    async fn close(&mut self) -> Result<(), TableTalkError> {
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 3: Implement the Connector trait
// ─────────────────────────────────────────────────────────────────────

/// Hands out transports, keeping the server half of each for the demo.
///
/// A real connector would dial the network; this one just mints loopback
/// pairs and parks the server halves where `main` can pick them up. The
/// client calls `connect` again on every reconnect attempt, so the queue can
/// grow past one entry.
pub struct LoopbackConnector {
    servers: Arc<Mutex<Vec<LoopbackServer>>>,
}

impl LoopbackConnector {
    fn new() -> (Self, Arc<Mutex<Vec<LoopbackServer>>>) {
        let servers = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                servers: Arc::clone(&servers),
            },
            servers,
        )
    }
}

#[async_trait]
impl Connector for LoopbackConnector {
    type Transport = LoopbackTransport;

    async fn connect(
        &self,
        room_code: &str,
        player_id: &str,
    ) -> Result<LoopbackTransport, TableTalkError> {
        tracing::info!("Loopback dial for room {room_code} as {player_id}");
        let (transport, server) = loopback_pair();
        self.servers.lock().await.push(server);
        Ok(transport)
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 4: Wire together the client and the fake server
// ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for readable output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (connector, servers) = LoopbackConnector::new();
    let session = Arc::new(SessionStore::new(Arc::new(MemoryStorage::new())));
    let player_id = session.init_player();

    // Connect — the connector mints a loopback pair and the client spawns
    // its transport loop.
    let (mut client, mut event_rx) = TableTalkClient::connect(
        connector,
        "DEMO",
        &player_id,
        Arc::clone(&session),
        TableTalkConfig::new(),
    )
    .await?;

    // ── Fake server: send the initial room snapshot ─────────────────
    let mut server = servers
        .lock()
        .await
        .pop()
        .ok_or("connector produced no server half")?;

    let snapshot = serde_json::json!({
        "type": "game_state",
        "status": "waiting",
        "current_card": null,
        "players": [{
            "id": 1,
            "player_id": player_id,
            "nickname": "Rustacean",
            "is_host": true,
            "joined_at": "2024-01-01T00:00:00"
        }]
    });
    server.tx.send(snapshot.to_string())?;

    // ── Drive one action through the loopback ───────────────────────
    client.start_game()?;
    let Some(sent) = server.rx.recv().await else {
        return Err("server channel closed before the command arrived".into());
    };
    tracing::info!("Server received: {sent}");

    // Answer like the real server would.
    server
        .tx
        .send(r#"{"type":"game_started","status":"playing"}"#.to_string())?;

    // ── Read events from the client ─────────────────────────────────
    let mut events_seen = 0;
    while let Some(event) = event_rx.recv().await {
        match &event {
            TableTalkEvent::Connected => {
                tracing::info!("Event: Connected (synthetic)");
            }
            TableTalkEvent::GameState(_) => {
                let snap = client.session();
                tracing::info!(
                    "Event: GameState — phase={:?}, players={}",
                    snap.phase,
                    snap.player_count()
                );
            }
            TableTalkEvent::GameStarted { status } => {
                tracing::info!("Event: GameStarted — status={status:?}");
            }
            TableTalkEvent::Disconnected { reason } => {
                tracing::info!(
                    "Event: Disconnected — {}",
                    reason.as_deref().unwrap_or("clean")
                );
                break;
            }
            other => {
                tracing::info!("Event: {other:?}");
            }
        }

        events_seen += 1;
        // After Connected, GameState and GameStarted, shut down.
        if events_seen >= 3 {
            break;
        }
    }

    // ── Clean shutdown ──────────────────────────────────────────────
    client.shutdown().await;
    tracing::info!("Done — saw {events_seen} event(s). Custom transport works!");
    Ok(())
}
