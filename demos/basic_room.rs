//! # Basic Room Example
//!
//! Demonstrates a complete Table Talk client lifecycle:
//!
//! 1. Restore or generate a player identity
//! 2. Create a room over the REST API (or join one via `TABLE_TALK_ROOM`)
//! 3. Connect to the room's realtime channel via WebSocket
//! 4. React to game events (players joining, cards being drawn)
//! 5. Shut down gracefully on Ctrl+C or disconnect
//!
//! ## Running
//!
//! ```sh
//! # Start a Table Talk server on localhost:8000, then:
//! cargo run --example basic_room --features rest-api
//!
//! # Join an existing room instead of creating one:
//! TABLE_TALK_ROOM=ABCD cargo run --example basic_room --features rest-api
//!
//! # Override the server URL:
//! TABLE_TALK_URL=http://my-server:8000 cargo run --example basic_room --features rest-api
//! ```

use std::sync::Arc;

use table_talk_client::{
    ApiClient, MemoryStorage, SessionStore, TableTalkClient, TableTalkConfig, TableTalkEvent,
    WebSocketConnector,
};

/// Default server URL when `TABLE_TALK_URL` is not set.
const DEFAULT_URL: &str = "http://localhost:8000";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Initialize tracing. Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let base_url = std::env::var("TABLE_TALK_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let ws_url = base_url.replacen("http", "ws", 1);
    tracing::info!("Using server {base_url}");

    // ── Identity ────────────────────────────────────────────────────
    // The session store generates a player id on first use and would reload
    // it from persistent storage in a real app. MemoryStorage keeps it for
    // the lifetime of this process only.
    let session = Arc::new(SessionStore::new(Arc::new(MemoryStorage::new())));
    let player_id = session.init_player();
    session.set_nickname("Rustacean");

    // ── Room setup over REST ────────────────────────────────────────
    let api = ApiClient::new(&base_url);
    let room = match std::env::var("TABLE_TALK_ROOM") {
        Ok(code) => api.join_room(&code, "Rustacean", &player_id).await?,
        Err(_) => api.create_room("Rustacean", &player_id).await?,
    };
    session.set_room(&room.room_code, room.host_id == player_id);
    tracing::info!(
        "In room {} with {} player(s)",
        room.room_code,
        room.players.len()
    );

    // ── Connect ─────────────────────────────────────────────────────
    // Establish the realtime channel. This spawns a background task that
    // drives the transport, keeps the session store in sync and emits
    // events on `event_rx`. Reconnection is automatic.
    let connector = WebSocketConnector::new(&ws_url);
    let (mut client, mut event_rx) = TableTalkClient::connect(
        connector,
        &room.room_code,
        &player_id,
        Arc::clone(&session),
        TableTalkConfig::new(),
    )
    .await?;

    // ── Event loop ──────────────────────────────────────────────────
    // Use `tokio::select!` to listen for both game events and Ctrl+C.
    loop {
        tokio::select! {
            // Branch 1: Incoming event from the room.
            event = event_rx.recv() => {
                let Some(event) = event else {
                    // Channel closed — transport loop exited.
                    tracing::info!("Event channel closed, exiting");
                    break;
                };

                match event {
                    // ── Synthetic lifecycle events ───────────────────
                    TableTalkEvent::Connected => {
                        tracing::info!("Realtime channel open, awaiting game state…");
                    }
                    TableTalkEvent::Disconnected { reason } => {
                        tracing::warn!("Disconnected: {reason:?}");
                    }
                    TableTalkEvent::Reconnecting { attempt } => {
                        tracing::info!("Reconnecting (attempt {attempt})…");
                    }
                    TableTalkEvent::Reconnected => {
                        tracing::info!("Reconnected");
                    }
                    TableTalkEvent::ReconnectFailed { attempts } => {
                        tracing::error!("Gave up after {attempts} reconnect attempts");
                        break;
                    }

                    // ── Room events ──────────────────────────────────
                    TableTalkEvent::GameState(_) => {
                        let snap = client.session();
                        tracing::info!(
                            "Game state: {:?}, {} player(s)",
                            snap.phase,
                            snap.player_count()
                        );
                        // The host kicks the game off as soon as someone
                        // else is in the room.
                        if snap.is_host && snap.player_count() >= 2 && snap.is_waiting() {
                            tracing::info!("Starting the game");
                            client.start_game()?;
                        }
                    }
                    TableTalkEvent::PlayerJoined { player, player_count } => {
                        tracing::info!("{} joined ({player_count} in room)", player.nickname);
                        let snap = client.session();
                        if snap.is_host && snap.is_waiting() {
                            tracing::info!("Starting the game");
                            client.start_game()?;
                        }
                    }
                    TableTalkEvent::PlayerLeft { player_id, player_count } => {
                        tracing::info!("{player_id} left ({player_count} remaining)");
                    }
                    TableTalkEvent::GameStarted { .. } => {
                        tracing::info!("Game on! Drawing the first card");
                        client.draw_card()?;
                    }
                    TableTalkEvent::CardDrawn { card, drawn_by } => {
                        tracing::info!("{drawn_by} drew: {}", card.content);
                    }
                    TableTalkEvent::CardSwitched { card, switched_by } => {
                        tracing::info!("{switched_by} switched to: {}", card.content);
                    }
                    TableTalkEvent::GameEnded { .. } => {
                        tracing::info!("Game over");
                        break;
                    }
                    TableTalkEvent::ServerError { message } => {
                        tracing::warn!("Server rejected an action: {message}");
                    }
                    other => {
                        tracing::debug!("Unhandled event: {other:?}");
                    }
                }
            }

            // Branch 2: Ctrl+C for graceful shutdown.
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, leaving room");
                break;
            }
        }
    }

    // ── Teardown ────────────────────────────────────────────────────
    client.shutdown().await;
    if let Err(e) = api.leave_room(&room.room_code, &player_id).await {
        tracing::warn!("Failed to leave room cleanly: {e}");
    }
    session.reset();
    tracing::info!("Goodbye");
    Ok(())
}
