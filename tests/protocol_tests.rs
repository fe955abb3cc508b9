#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Wire-format tests for the Table Talk protocol.
//!
//! The server speaks flat JSON frames tagged with a `type` field. These tests
//! pin the exact tag names and payload shapes the backend produces, so a
//! serde change that silently breaks compatibility fails here first.

mod common;

use serde_json::{json, Value};
use table_talk_client::protocol::{ClientMessage, GamePhase, ServerMessage};

use common::{card, player};

// ── Outbound frames ─────────────────────────────────────────────────

#[test]
fn client_messages_serialize_to_flat_type_tags() {
    let cases = [
        (ClientMessage::StartGame, "start_game"),
        (ClientMessage::DrawCard, "draw_card"),
        (ClientMessage::SwitchCard, "switch_card"),
        (ClientMessage::EndGame, "end_game"),
        (ClientMessage::RestartGame, "restart_game"),
    ];
    for (msg, tag) in cases {
        let value: Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({ "type": tag }), "tag for {msg:?}");
    }
}

// ── Inbound frames ──────────────────────────────────────────────────

#[test]
fn game_state_frame_parses_with_full_payload() {
    let frame = json!({
        "type": "game_state",
        "status": "playing",
        "current_card": {
            "id": 4,
            "content": "What's a skill you wish you had?",
            "is_system": true,
            "created_by": null,
            "created_at": "2024-01-01T00:00:00"
        },
        "players": [
            {"id": 1, "player_id": "player_1", "nickname": "Ada", "is_host": true, "joined_at": "t"}
        ]
    });
    let msg: ServerMessage = serde_json::from_value(frame).unwrap();
    let ServerMessage::GameState(update) = msg else {
        panic!("expected GameState");
    };
    assert_eq!(update.status, Some(GamePhase::Playing));
    let card = update.current_card.unwrap().unwrap();
    assert_eq!(card.id, 4);
    assert_eq!(update.players.unwrap().len(), 1);
}

#[test]
fn game_state_distinguishes_null_card_from_absent_card() {
    // Explicit null clears the card.
    let explicit: ServerMessage =
        serde_json::from_str(r#"{"type":"game_state","current_card":null}"#).unwrap();
    let ServerMessage::GameState(update) = explicit else {
        panic!("expected GameState");
    };
    assert_eq!(update.current_card, Some(None));

    // An absent field leaves the card untouched.
    let absent: ServerMessage = serde_json::from_str(r#"{"type":"game_state"}"#).unwrap();
    let ServerMessage::GameState(update) = absent else {
        panic!("expected GameState");
    };
    assert_eq!(update.current_card, None);
}

#[test]
fn player_lifecycle_frames_parse() {
    let joined: ServerMessage = serde_json::from_value(json!({
        "type": "player_joined",
        "player": {"id": 2, "player_id": "player_2", "nickname": "Grace", "is_host": false, "joined_at": "t"},
        "player_count": 2
    }))
    .unwrap();
    assert!(matches!(
        joined,
        ServerMessage::PlayerJoined { player_count: 2, .. }
    ));

    let left: ServerMessage = serde_json::from_value(json!({
        "type": "player_left",
        "player_id": "player_2",
        "player_count": 1
    }))
    .unwrap();
    assert!(matches!(left, ServerMessage::PlayerLeft { player_count: 1, .. }));

    let connected: ServerMessage = serde_json::from_value(json!({
        "type": "player_connected",
        "player_id": "player_2",
        "player_count": 2
    }))
    .unwrap();
    assert!(matches!(connected, ServerMessage::PlayerConnected { .. }));

    let disconnected: ServerMessage = serde_json::from_value(json!({
        "type": "player_disconnected",
        "player_id": "player_2"
    }))
    .unwrap();
    assert!(matches!(disconnected, ServerMessage::PlayerDisconnected { .. }));
}

#[test]
fn card_frames_parse() {
    let drawn: ServerMessage = serde_json::from_value(json!({
        "type": "card_drawn",
        "card": serde_json::to_value(card(7, "Window or aisle seat?")).unwrap(),
        "drawn_by": "player_1"
    }))
    .unwrap();
    let ServerMessage::CardDrawn { card, drawn_by } = drawn else {
        panic!("expected CardDrawn");
    };
    assert_eq!(card.id, 7);
    assert_eq!(drawn_by, "player_1");

    let switched: ServerMessage = serde_json::from_value(json!({
        "type": "card_switched",
        "card": serde_json::to_value(common::card(8, "Early bird or night owl?")).unwrap(),
        "switched_by": "player_2"
    }))
    .unwrap();
    assert!(matches!(switched, ServerMessage::CardSwitched { .. }));
}

#[test]
fn lifecycle_frames_carry_the_new_phase() {
    let started: ServerMessage =
        serde_json::from_str(r#"{"type":"game_started","status":"playing"}"#).unwrap();
    assert!(matches!(
        started,
        ServerMessage::GameStarted {
            status: GamePhase::Playing
        }
    ));

    let ended: ServerMessage =
        serde_json::from_str(r#"{"type":"game_ended","status":"ended"}"#).unwrap();
    assert!(matches!(
        ended,
        ServerMessage::GameEnded {
            status: GamePhase::Ended
        }
    ));

    let restarted: ServerMessage =
        serde_json::from_str(r#"{"type":"game_restarted","status":"waiting"}"#).unwrap();
    assert!(matches!(
        restarted,
        ServerMessage::GameRestarted {
            status: GamePhase::Waiting
        }
    ));
}

#[test]
fn error_frame_parses() {
    let msg: ServerMessage =
        serde_json::from_str(r#"{"type":"error","message":"Game has not started"}"#).unwrap();
    let ServerMessage::Error { message } = msg else {
        panic!("expected Error");
    };
    assert_eq!(message, "Game has not started");
}

#[test]
fn unknown_type_tag_is_an_error() {
    let result = serde_json::from_str::<ServerMessage>(r#"{"type":"mystery_frame"}"#);
    assert!(result.is_err());
}

#[test]
fn player_fixture_round_trips() {
    let original = player(1, "player_1", "Ada", true);
    let json = serde_json::to_string(&original).unwrap();
    let parsed: table_talk_client::protocol::Player = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, original);
}
