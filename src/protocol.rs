//! Wire types for the Table Talk room protocol.
//!
//! Every frame is a JSON object with a `type` discriminator and its fields
//! flat beside the tag, exactly as the server emits them:
//!
//! ```json
//! {"type":"card_drawn","card":{"id":7,"content":"...","is_system":true,"created_by":null,"created_at":"..."},"drawn_by":"player_ab12"}
//! ```
//!
//! Timestamps are carried as ISO 8601 strings; the client never interprets
//! them, so they stay `String` here.

use serde::{Deserialize, Deserializer, Serialize};

// ── Enums ───────────────────────────────────────────────────────────

/// Phase of a game room, governing which actions are valid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GamePhase {
    /// Players are gathering in the lobby; the host has not started yet.
    #[default]
    Waiting,
    /// The game is in progress and cards can be drawn.
    Playing,
    /// The host ended the game. A restart returns the room to `Waiting`.
    Ended,
}

// ── Structs ─────────────────────────────────────────────────────────

/// A question card delivered by the server.
///
/// Card content semantics are server-owned; the client treats the content as
/// opaque text to display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Card {
    pub id: i64,
    pub content: String,
    /// `true` for cards from the built-in deck, `false` for room-custom ones.
    pub is_system: bool,
    /// Room code that created the card, for custom cards.
    pub created_by: Option<String>,
    pub created_at: String,
}

/// A player in a room, as reported by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Player {
    pub id: i64,
    /// Client-generated identifier, unique within the room and stable across
    /// reconnects.
    pub player_id: String,
    pub nickname: String,
    pub is_host: bool,
    pub joined_at: String,
}

/// Partial room snapshot carried by a `game_state` frame.
///
/// The server sends a full snapshot on connect, but every field is optional
/// here so the same type can express partial updates. `current_card` uses a
/// double `Option` to tell "field absent — leave unchanged" apart from
/// "field null — clear the card".
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GameStateUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<GamePhase>,
    #[serde(
        default,
        deserialize_with = "some_if_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub current_card: Option<Option<Card>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub players: Option<Vec<Player>>,
}

/// Deserializes any present value (including `null`) as `Some`, so a missing
/// field stays distinguishable from an explicit `null`.
fn some_if_present<'de, D>(deserializer: D) -> Result<Option<Option<Card>>, D::Error>
where
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

// ── Messages ────────────────────────────────────────────────────────

/// Actions sent from client to server over the room socket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start the game (host only).
    StartGame,
    /// Draw the next card from the deck.
    DrawCard,
    /// Discard the current card and draw a replacement.
    SwitchCard,
    /// End the game (host only).
    EndGame,
    /// Reset the room back to the lobby (host only).
    RestartGame,
}

/// Frames sent from server to client over the room socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Room snapshot, sent on connect and after state-changing actions.
    GameState(GameStateUpdate),
    /// A player's socket came online.
    PlayerConnected {
        player_id: String,
        player_count: usize,
    },
    /// A player's socket dropped. The player is still a room member and may
    /// reconnect; membership changes arrive as `player_left`.
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
    /// The current card was switched for a new one.
    CardSwitched { card: Card, switched_by: String },
    /// The host ended the game.
    GameEnded { status: GamePhase },
    /// The host restarted the game; the room is back in the lobby.
    GameRestarted { status: GamePhase },
    /// The server rejected an action.
    Error { message: String },
}

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

    #[test]
    fn client_message_serializes_flat_tag() {
        let json = serde_json::to_string(&ClientMessage::StartGame).unwrap();
        assert_eq!(json, r#"{"type":"start_game"}"#);
        let json = serde_json::to_string(&ClientMessage::DrawCard).unwrap();
        assert_eq!(json, r#"{"type":"draw_card"}"#);
    }

    #[test]
    fn game_state_full_snapshot_deserializes() {
        let raw = r#"{
            "type": "game_state",
            "status": "playing",
            "current_card": {
                "id": 1,
                "content": "What made you smile today?",
                "is_system": true,
                "created_by": null,
                "created_at": "2026-01-01T00:00:00"
            },
            "players": [
                {"id": 1, "player_id": "player_a", "nickname": "Ada", "is_host": true, "joined_at": "2026-01-01T00:00:00"}
            ]
        }"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        let ServerMessage::GameState(update) = msg else {
            panic!("expected game_state, got {msg:?}");
        };
        assert_eq!(update.status, Some(GamePhase::Playing));
        assert_eq!(
            update.current_card.unwrap().unwrap().content,
            "What made you smile today?"
        );
        assert_eq!(update.players.unwrap().len(), 1);
    }

    #[test]
    fn game_state_absent_card_differs_from_null_card() {
        let absent: ServerMessage =
            serde_json::from_str(r#"{"type":"game_state","status":"waiting"}"#).unwrap();
        let ServerMessage::GameState(update) = absent else {
            panic!("expected game_state");
        };
        assert!(update.current_card.is_none(), "absent field must stay None");

        let null: ServerMessage =
            serde_json::from_str(r#"{"type":"game_state","current_card":null}"#).unwrap();
        let ServerMessage::GameState(update) = null else {
            panic!("expected game_state");
        };
        assert_eq!(update.current_card, Some(None), "null must clear the card");
    }

    #[test]
    fn card_drawn_round_trip() {
        let raw = r#"{
            "type": "card_drawn",
            "card": {"id": 3, "content": "q", "is_system": false, "created_by": "ABCD", "created_at": "t"},
            "drawn_by": "player_b"
        }"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        let ServerMessage::CardDrawn { card, drawn_by } = msg else {
            panic!("expected card_drawn");
        };
        assert_eq!(card.id, 3);
        assert_eq!(card.created_by.as_deref(), Some("ABCD"));
        assert_eq!(drawn_by, "player_b");
    }

    #[test]
    fn error_frame_deserializes() {
        let msg: ServerMessage = serde_json::from_str(
            r#"{"type":"error","message":"Only the host can start the game"}"#,
        )
        .unwrap();
        assert!(matches!(msg, ServerMessage::Error { message } if message.contains("host")));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let result = serde_json::from_str::<ServerMessage>(r#"{"type":"mystery"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn game_phase_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&GamePhase::Waiting).unwrap(),
            r#""waiting""#
        );
        assert_eq!(
            serde_json::to_string(&GamePhase::Playing).unwrap(),
            r#""playing""#
        );
        assert_eq!(
            serde_json::to_string(&GamePhase::Ended).unwrap(),
            r#""ended""#
        );
    }
}
