//! Typed events emitted by the client.
//!
//! [`TableTalkEvent`] is the single event stream delivered to the consumer:
//! one variant per inbound [`ServerMessage`] plus synthetic variants produced
//! by the connection manager itself (connect, disconnect, reconnection
//! progress). Because every inbound frame becomes exactly one event on the
//! stream, there is no separate catch-all "message" subscription — matching
//! on the enum covers it.

use crate::protocol::{Card, GamePhase, GameStateUpdate, Player, ServerMessage};

/// Events delivered on the receiver returned by
/// [`TableTalkClient::connect`](crate::client::TableTalkClient::connect).
#[derive(Debug, Clone)]
pub enum TableTalkEvent {
    // ── Synthetic: connection lifecycle ─────────────────────────────
    /// The transport reported open. Always the first event.
    Connected,
    /// The connection dropped. Emitted before reconnection begins, and as
    /// the final event on explicit shutdown. Always delivered, never dropped
    /// under backpressure.
    Disconnected {
        /// Human-readable close reason, when one is known.
        reason: Option<String>,
    },
    /// A reconnect attempt is about to run.
    Reconnecting {
        /// 1-based attempt number since the last successful connection.
        attempt: u32,
    },
    /// Reconnection succeeded; the attempt counter has been reset. The
    /// server follows up with a fresh `GameState` snapshot.
    Reconnected,
    /// Reconnection gave up after exhausting its retry budget. Terminal;
    /// always delivered.
    ReconnectFailed {
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    // ── Inbound server frames ───────────────────────────────────────
    /// Room snapshot (full or partial).
    GameState(GameStateUpdate),
    /// A player's socket came online.
    PlayerConnected {
        player_id: String,
        player_count: usize,
    },
    /// A player's socket dropped.
    PlayerDisconnected { player_id: String },
    /// A player joined the room.
    PlayerJoined { player: Player, player_count: usize },
    /// A player left the room.
    PlayerLeft {
        player_id: String,
        player_count: usize,
    },
    /// The host started the game.
    GameStarted { status: GamePhase },
    /// A card was drawn.
    CardDrawn { card: Card, drawn_by: String },
    /// The current card was switched.
    CardSwitched { card: Card, switched_by: String },
    /// The host ended the game.
    GameEnded { status: GamePhase },
    /// The host restarted the game.
    GameRestarted { status: GamePhase },
    /// The server rejected an action.
    ServerError { message: String },
}

impl From<ServerMessage> for TableTalkEvent {
    fn from(msg: ServerMessage) -> Self {
        match msg {
            ServerMessage::GameState(update) => Self::GameState(update),
            ServerMessage::PlayerConnected {
                player_id,
                player_count,
            } => Self::PlayerConnected {
                player_id,
                player_count,
            },
            ServerMessage::PlayerDisconnected { player_id } => {
                Self::PlayerDisconnected { player_id }
            }
            ServerMessage::PlayerJoined {
                player,
                player_count,
            } => Self::PlayerJoined {
                player,
                player_count,
            },
            ServerMessage::PlayerLeft {
                player_id,
                player_count,
            } => Self::PlayerLeft {
                player_id,
                player_count,
            },
            ServerMessage::GameStarted { status } => Self::GameStarted { status },
            ServerMessage::CardDrawn { card, drawn_by } => Self::CardDrawn { card, drawn_by },
            ServerMessage::CardSwitched { card, switched_by } => Self::CardSwitched {
                card,
                switched_by,
            },
            ServerMessage::GameEnded { status } => Self::GameEnded { status },
            ServerMessage::GameRestarted { status } => Self::GameRestarted { status },
            ServerMessage::Error { message } => Self::ServerError { message },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn server_message_converts_to_event() {
        let msg = ServerMessage::GameStarted {
            status: GamePhase::Playing,
        };
        let event = TableTalkEvent::from(msg);
        assert!(matches!(
            event,
            TableTalkEvent::GameStarted {
                status: GamePhase::Playing
            }
        ));
    }

    #[test]
    fn error_frame_converts_to_server_error() {
        let msg = ServerMessage::Error {
            message: "No cards available".into(),
        };
        let event = TableTalkEvent::from(msg);
        let TableTalkEvent::ServerError { message } = event else {
            panic!("expected ServerError");
        };
        assert_eq!(message, "No cards available");
    }
}
