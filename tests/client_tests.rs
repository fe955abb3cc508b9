#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Integration-style client tests for the Table Talk client.
//!
//! Uses the shared `MockConnector` / `MockTransport` from `tests/common` to
//! script server frames and dial outcomes, and verifies event delivery,
//! session state updates and the bounded reconnection behavior end to end.

mod common;

use std::sync::Arc;
use std::time::Duration;

use table_talk_client::protocol::{ClientMessage, GamePhase};
use table_talk_client::{
    ConnectionStatus, KeyValueStorage, MemoryStorage, SessionStore, TableTalkClient,
    TableTalkConfig, TableTalkError, TableTalkEvent,
};

use common::{
    card, card_drawn_json, error_json, game_ended_json, game_started_json, game_state_json,
    game_state_with_card_json, player, player_joined_json, player_left_json, MockConnector,
};

fn new_session() -> Arc<SessionStore> {
    Arc::new(SessionStore::new(Arc::new(MemoryStorage::new())))
}

/// A session whose identity is pinned to `player_id`, so host re-derivation
/// from the wire player list can be asserted.
fn session_for(player_id: &str) -> Arc<SessionStore> {
    let storage = Arc::new(MemoryStorage::new());
    storage.set(table_talk_client::storage::keys::PLAYER_ID, player_id);
    let store = SessionStore::new(storage);
    store.init_player();
    Arc::new(store)
}

fn fast_config() -> TableTalkConfig {
    TableTalkConfig::new().with_reconnect_delay(Duration::from_millis(10))
}

async fn connect(
    connector: MockConnector,
    config: TableTalkConfig,
) -> (
    TableTalkClient,
    tokio::sync::mpsc::Receiver<TableTalkEvent>,
) {
    TableTalkClient::connect(connector, "ABCD", "player_1", new_session(), config)
        .await
        .expect("connect")
}

// ── Event delivery ──────────────────────────────────────────────────

#[tokio::test]
async fn full_game_round_emits_typed_events() {
    let host = player(1, "player_1", "Ada", true);
    let guest = player(2, "player_2", "Grace", false);
    let (connector, _calls, _sent) = MockConnector::new(vec![vec![
        Some(Ok(game_state_json(GamePhase::Waiting, vec![host.clone()]))),
        Some(Ok(player_joined_json(guest.clone(), 2))),
        Some(Ok(game_started_json())),
        Some(Ok(card_drawn_json(card(1, "What was your first job?"), "player_2"))),
        Some(Ok(player_left_json("player_2", 1))),
        Some(Ok(game_ended_json())),
    ]]);

    let (mut client, mut events) = connect(connector, TableTalkConfig::new()).await;

    assert!(matches!(
        events.recv().await.unwrap(),
        TableTalkEvent::Connected
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        TableTalkEvent::GameState(_)
    ));
    let TableTalkEvent::PlayerJoined {
        player,
        player_count,
    } = events.recv().await.unwrap()
    else {
        panic!("expected PlayerJoined");
    };
    assert_eq!(player.player_id, "player_2");
    assert_eq!(player_count, 2);

    assert!(matches!(
        events.recv().await.unwrap(),
        TableTalkEvent::GameStarted {
            status: GamePhase::Playing
        }
    ));

    let TableTalkEvent::CardDrawn { card, drawn_by } = events.recv().await.unwrap() else {
        panic!("expected CardDrawn");
    };
    assert_eq!(card.content, "What was your first job?");
    assert_eq!(drawn_by, "player_2");

    assert!(matches!(
        events.recv().await.unwrap(),
        TableTalkEvent::PlayerLeft { player_count: 1, .. }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        TableTalkEvent::GameEnded {
            status: GamePhase::Ended
        }
    ));

    client.shutdown().await;
}

#[tokio::test]
async fn server_error_frame_becomes_event_without_closing() {
    let (connector, _calls, _sent) = MockConnector::new(vec![vec![
        Some(Ok(error_json("Only the host can start the game"))),
    ]]);
    let (mut client, mut events) = connect(connector, TableTalkConfig::new()).await;

    let _ = events.recv().await; // Connected
    let TableTalkEvent::ServerError { message } = events.recv().await.unwrap() else {
        panic!("expected ServerError");
    };
    assert_eq!(message, "Only the host can start the game");
    assert!(client.is_connected(), "error frames must not close the link");

    client.shutdown().await;
}

// ── Session state ───────────────────────────────────────────────────

#[tokio::test]
async fn session_tracks_frames_across_a_round() {
    let host = player(1, "player_1", "Ada", true);
    let (connector, _calls, _sent) = MockConnector::new(vec![vec![
        Some(Ok(game_state_json(GamePhase::Waiting, vec![host.clone()]))),
        Some(Ok(player_joined_json(player(2, "player_2", "Grace", false), 2))),
        Some(Ok(game_started_json())),
        Some(Ok(card_drawn_json(card(9, "Mountains or beaches?"), "player_1"))),
    ]]);

    let session = session_for("player_1");
    let (mut client, mut events) = TableTalkClient::connect(
        connector,
        "ABCD",
        "player_1",
        Arc::clone(&session),
        TableTalkConfig::new(),
    )
    .await
    .unwrap();

    // Drain through CardDrawn.
    for _ in 0..5 {
        let _ = events.recv().await.unwrap();
    }

    let snap = client.session();
    assert_eq!(snap.phase, GamePhase::Playing);
    assert_eq!(snap.player_count(), 2);
    assert!(snap.is_host, "identity matches the host entry");
    assert_eq!(snap.current_card.as_ref().unwrap().id, 9);

    client.shutdown().await;
}

#[tokio::test]
async fn game_state_snapshot_replaces_stale_state() {
    let players = vec![
        player(1, "player_1", "Ada", false),
        player(2, "player_2", "Grace", true),
    ];
    let (connector, _calls, _sent) = MockConnector::new(vec![vec![Some(Ok(
        game_state_with_card_json(GamePhase::Playing, card(3, "Loud or quiet?"), players),
    ))]]);

    let session = session_for("player_1");
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
    let _ = events.recv().await; // GameState

    let snap = client.session();
    assert_eq!(snap.phase, GamePhase::Playing);
    assert!(!snap.is_host, "host re-derived from the authoritative list");
    assert_eq!(snap.current_card.as_ref().unwrap().content, "Loud or quiet?");

    client.shutdown().await;
}

// ── Outgoing commands ───────────────────────────────────────────────

#[tokio::test]
async fn commands_reach_the_wire_in_order() {
    let (connector, _calls, sent) = MockConnector::new(vec![vec![]]);
    let (mut client, mut events) = connect(connector, TableTalkConfig::new()).await;

    let _ = events.recv().await; // Connected

    client.start_game().unwrap();
    client.draw_card().unwrap();
    client.restart_game().unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;

    let parsed: Vec<ClientMessage> = sent
        .lock()
        .unwrap()
        .iter()
        .map(|m| serde_json::from_str(m).unwrap())
        .collect();
    assert_eq!(
        parsed,
        vec![
            ClientMessage::StartGame,
            ClientMessage::DrawCard,
            ClientMessage::RestartGame,
        ]
    );

    client.shutdown().await;
}

#[tokio::test]
async fn send_after_shutdown_is_not_connected() {
    let (connector, _calls, _sent) = MockConnector::new(vec![vec![]]);
    let (mut client, mut events) = connect(connector, TableTalkConfig::new()).await;

    let _ = events.recv().await; // Connected
    client.shutdown().await;

    assert!(matches!(
        client.start_game(),
        Err(TableTalkError::NotConnected)
    ));
}

// ── Reconnection ────────────────────────────────────────────────────

#[tokio::test]
async fn reconnect_reuses_room_and_player_identity() {
    let (connector, calls, _sent) = MockConnector::new(vec![
        vec![None], // first transport closes right away
        vec![],     // second one survives
    ]);
    let (mut client, mut events) = connect(connector, fast_config()).await;

    let _ = events.recv().await; // Connected
    assert!(matches!(
        events.recv().await.unwrap(),
        TableTalkEvent::Disconnected { reason: None }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        TableTalkEvent::Reconnecting { attempt: 1 }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        TableTalkEvent::Reconnected
    ));

    assert_eq!(client.status(), ConnectionStatus::Open);
    assert_eq!(client.reconnect_attempt(), 0);

    let calls = calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 2);
    assert!(calls
        .iter()
        .all(|(room, pid)| room == "ABCD" && pid == "player_1"));

    client.shutdown().await;
}

#[tokio::test]
async fn attempt_counter_increments_until_budget_exhausted() {
    let (connector, calls, _sent) = MockConnector::new(vec![vec![None]]);
    let config = fast_config().with_max_reconnect_attempts(3);
    let (client, mut events) = connect(connector, config).await;

    let _ = events.recv().await; // Connected
    assert!(matches!(
        events.recv().await.unwrap(),
        TableTalkEvent::Disconnected { .. }
    ));

    for expected in 1..=3u32 {
        let TableTalkEvent::Reconnecting { attempt } = events.recv().await.unwrap() else {
            panic!("expected Reconnecting");
        };
        assert_eq!(attempt, expected);
    }

    assert!(matches!(
        events.recv().await.unwrap(),
        TableTalkEvent::ReconnectFailed { attempts: 3 }
    ));
    assert!(events.recv().await.is_none(), "loop exits after giving up");
    assert_eq!(client.status(), ConnectionStatus::Failed);
    assert_eq!(calls.lock().unwrap().len(), 4, "1 initial + 3 retries");
}

#[tokio::test]
async fn each_attempt_waits_the_configured_delay() {
    let (connector, _calls, _sent) = MockConnector::new(vec![vec![None]]);
    let delay = Duration::from_millis(20);
    let config = TableTalkConfig::new()
        .with_reconnect_delay(delay)
        .with_max_reconnect_attempts(3);

    let started = std::time::Instant::now();
    let (_client, mut events) = connect(connector, config).await;

    while let Some(event) = events.recv().await {
        if matches!(event, TableTalkEvent::ReconnectFailed { .. }) {
            break;
        }
    }
    assert!(
        started.elapsed() >= delay * 3,
        "three attempts wait at least three delays"
    );
}

#[tokio::test]
async fn successful_reconnect_resets_the_retry_budget() {
    // Dies twice; both recoveries succeed on the first attempt even though
    // the budget is 2, proving the counter resets between outages.
    let (connector, calls, _sent) = MockConnector::new(vec![
        vec![None],
        vec![None],
        vec![],
    ]);
    let config = fast_config().with_max_reconnect_attempts(2);
    let (mut client, mut events) = connect(connector, config).await;

    let mut reconnected = 0;
    while reconnected < 2 {
        match events.recv().await.unwrap() {
            TableTalkEvent::Reconnected => reconnected += 1,
            TableTalkEvent::Reconnecting { attempt } => {
                assert_eq!(attempt, 1, "counter restarts after each recovery");
            }
            TableTalkEvent::ReconnectFailed { .. } => panic!("budget should not exhaust"),
            _ => {}
        }
    }

    assert_eq!(client.status(), ConnectionStatus::Open);
    assert_eq!(calls.lock().unwrap().len(), 3);

    client.shutdown().await;
}

#[tokio::test]
async fn shutdown_mid_reconnect_stops_dialing() {
    let (connector, calls, _sent) = MockConnector::new(vec![vec![None]]);
    let config = TableTalkConfig::new()
        .with_reconnect_delay(Duration::from_secs(60))
        .with_max_reconnect_attempts(5);
    let (mut client, mut events) = connect(connector, config).await;

    let _ = events.recv().await; // Connected
    let _ = events.recv().await; // Disconnected
    assert_eq!(client.status(), ConnectionStatus::Reconnecting);

    client.shutdown().await;

    assert_eq!(client.status(), ConnectionStatus::Closed);
    assert!(events.recv().await.is_none());
    assert_eq!(calls.lock().unwrap().len(), 1, "no dials after shutdown");
}

#[tokio::test]
async fn malformed_frames_do_not_trigger_reconnection() {
    let (connector, calls, _sent) = MockConnector::new(vec![vec![
        Some(Ok("{\"type\":\"mystery_frame\"}".to_string())),
        Some(Ok("not json at all".to_string())),
        Some(Ok(game_started_json())),
    ]]);
    let (mut client, mut events) = connect(connector, fast_config()).await;

    let _ = events.recv().await; // Connected
    // Both bad frames are skipped silently; the next good one flows.
    assert!(matches!(
        events.recv().await.unwrap(),
        TableTalkEvent::GameStarted { .. }
    ));
    assert_eq!(calls.lock().unwrap().len(), 1);

    client.shutdown().await;
}

#[tokio::test]
async fn transport_error_is_reported_as_disconnect_reason() {
    let (connector, _calls, _sent) = MockConnector::new(vec![vec![Some(Err(
        TableTalkError::TransportReceive("connection reset".into()),
    ))]]);
    let config = fast_config().with_max_reconnect_attempts(1);
    let (_client, mut events) = connect(connector, config).await;

    let _ = events.recv().await; // Connected
    let TableTalkEvent::Disconnected { reason } = events.recv().await.unwrap() else {
        panic!("expected Disconnected");
    };
    assert!(reason.unwrap().contains("connection reset"));
}
