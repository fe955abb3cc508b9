#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for Table Talk client integration tests.
//!
//! Provides a scripted [`MockTransport`] plus a [`MockConnector`] that hands
//! out one scripted transport per dial, and helper functions for constructing
//! common server frame JSON strings.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use table_talk_client::protocol::{Card, GamePhase, GameStateUpdate, Player, ServerMessage};
use table_talk_client::{Connector, TableTalkError, Transport};

/// One scripted `recv()` result. An explicit `None` entry means a clean
/// transport close.
pub type ScriptItem = Option<Result<String, TableTalkError>>;

// ── MockTransport ───────────────────────────────────────────────────

/// A scripted mock transport for integration testing.
///
/// Scripted server frames are consumed in order by `recv()`; once they run
/// out, `recv()` hangs so the transport loop stays alive until shutdown.
/// All messages sent by the client are recorded in `sent`.
pub struct MockTransport {
    /// Scripted server frames (consumed in order by `recv`).
    incoming: VecDeque<ScriptItem>,
    /// Recorded outgoing messages from the client.
    pub sent: Arc<StdMutex<Vec<String>>>,
    /// Whether `close()` has been called.
    pub closed: Arc<AtomicBool>,
}

impl MockTransport {
    /// Create a new mock transport with the given scripted incoming frames.
    ///
    /// Returns the transport plus shared handles for inspecting sent messages
    /// and whether close was called.
    pub fn new(incoming: Vec<ScriptItem>) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let transport = Self {
            incoming: VecDeque::from(incoming),
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        };
        (transport, sent, closed)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), TableTalkError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, TableTalkError>> {
        if let Some(item) = self.incoming.pop_front() {
            item
        } else {
            // No more scripted frames — hang forever so the transport loop
            // stays alive until shutdown is called.
            std::future::pending().await
        }
    }

    async fn close(&mut self) -> Result<(), TableTalkError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

// ── MockConnector ───────────────────────────────────────────────────

/// A connector that hands out one scripted [`MockTransport`] per `connect`
/// call and records every dial.
///
/// Once the scripts run out, further connects fail with a transport error,
/// which is how reconnect-failure scenarios are scripted.
pub struct MockConnector {
    scripts: StdMutex<VecDeque<Vec<ScriptItem>>>,
    /// Recorded `(room_code, player_id)` pairs, one per dial.
    pub calls: Arc<StdMutex<Vec<(String, String)>>>,
    /// All messages sent through any transport this connector handed out.
    pub sent: Arc<StdMutex<Vec<String>>>,
}

impl MockConnector {
    /// Create a connector whose n-th successful dial yields a transport
    /// scripted with the n-th entry of `scripts`.
    pub fn new(
        scripts: Vec<Vec<ScriptItem>>,
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
    ) -> Result<MockTransport, TableTalkError> {
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
            None => Err(TableTalkError::TransportReceive(
                "connection refused".into(),
            )),
        }
    }
}

// ── Fixture helpers ─────────────────────────────────────────────────

/// A player record with the given identity. `id` doubles as the row id.
pub fn player(id: i64, player_id: &str, nickname: &str, is_host: bool) -> Player {
    Player {
        id,
        player_id: player_id.into(),
        nickname: nickname.into(),
        is_host,
        joined_at: "2024-01-01T00:00:00".into(),
    }
}

/// A question card with the given id and content.
pub fn card(id: i64, content: &str) -> Card {
    Card {
        id,
        content: content.into(),
        is_system: true,
        created_by: None,
        created_at: "2024-01-01T00:00:00".into(),
    }
}

// ── JSON frame helpers ──────────────────────────────────────────────

/// Returns the JSON string for a `game_state` frame with the given phase and
/// players (no current card).
pub fn game_state_json(status: GamePhase, players: Vec<Player>) -> String {
    serde_json::to_string(&ServerMessage::GameState(GameStateUpdate {
        status: Some(status),
        current_card: Some(None),
        players: Some(players),
    }))
    .expect("game_state serialization")
}

/// Returns the JSON string for a `game_state` frame carrying a current card.
pub fn game_state_with_card_json(
    status: GamePhase,
    card: Card,
    players: Vec<Player>,
) -> String {
    serde_json::to_string(&ServerMessage::GameState(GameStateUpdate {
        status: Some(status),
        current_card: Some(Some(card)),
        players: Some(players),
    }))
    .expect("game_state serialization")
}

/// Returns the JSON string for a `player_joined` frame.
pub fn player_joined_json(player: Player, player_count: usize) -> String {
    serde_json::to_string(&ServerMessage::PlayerJoined {
        player,
        player_count,
    })
    .expect("player_joined serialization")
}

/// Returns the JSON string for a `player_left` frame.
pub fn player_left_json(player_id: &str, player_count: usize) -> String {
    serde_json::to_string(&ServerMessage::PlayerLeft {
        player_id: player_id.into(),
        player_count,
    })
    .expect("player_left serialization")
}

/// Returns the JSON string for a `card_drawn` frame.
pub fn card_drawn_json(card: Card, drawn_by: &str) -> String {
    serde_json::to_string(&ServerMessage::CardDrawn {
        card,
        drawn_by: drawn_by.into(),
    })
    .expect("card_drawn serialization")
}

/// Returns the JSON string for a `game_started` frame.
pub fn game_started_json() -> String {
    serde_json::to_string(&ServerMessage::GameStarted {
        status: GamePhase::Playing,
    })
    .expect("game_started serialization")
}

/// Returns the JSON string for a `game_ended` frame.
pub fn game_ended_json() -> String {
    serde_json::to_string(&ServerMessage::GameEnded {
        status: GamePhase::Ended,
    })
    .expect("game_ended serialization")
}

/// Returns the JSON string for a server `error` frame.
pub fn error_json(message: &str) -> String {
    serde_json::to_string(&ServerMessage::Error {
        message: message.into(),
    })
    .expect("error serialization")
}
