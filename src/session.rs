//! Client-local session state for a game room.
//!
//! [`Session`] is the canonical copy of what this client believes about the
//! room: who it is, which room it is in, the current phase, the card on the
//! table and the player list. Derived views (`player_count`, `is_playing`,
//! …) are computed on read, so no invalidation step exists — every mutation
//! leaves them consistent by construction.
//!
//! [`SessionStore`] wraps a `Session` behind a mutex for sharing between the
//! transport loop (which mutates it from inbound frames) and the application
//! (which reads snapshots), and persists identity and room association
//! through a [`KeyValueStorage`] collaborator.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;
use uuid::Uuid;

use crate::protocol::{Card, GamePhase, GameStateUpdate, Player, ServerMessage};
use crate::storage::{keys, KeyValueStorage};

// ── Session ─────────────────────────────────────────────────────────

/// Canonical client-local view of a game room.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    /// Stable client-generated identifier for the local player.
    pub player_id: String,
    /// Display name the local player chose.
    pub nickname: String,
    /// Code of the room the player is in; empty when not in a room.
    pub room_code: String,
    /// Whether the local player currently hosts the room.
    pub is_host: bool,
    /// Current phase of the game.
    pub phase: GamePhase,
    /// Card currently on the table, if any.
    pub current_card: Option<Card>,
    /// Players in the room, in server order.
    pub players: Vec<Player>,
}

impl Session {
    /// Create an empty session with the given identity.
    pub fn new(player_id: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            nickname: nickname.into(),
            ..Self::default()
        }
    }

    // ── Mutations ───────────────────────────────────────────────────

    /// Apply the fields present in a room snapshot.
    ///
    /// When the player list is updated, the local host flag is re-derived
    /// from the list entry matching the local player id, so `is_host` always
    /// mirrors the server's view exactly.
    pub fn update_game_state(&mut self, update: &GameStateUpdate) {
        if let Some(status) = update.status {
            self.phase = status;
        }
        if let Some(card) = &update.current_card {
            self.current_card = card.clone();
        }
        if let Some(players) = &update.players {
            self.players = players.clone();
            if let Some(me) = self.players.iter().find(|p| p.player_id == self.player_id) {
                self.is_host = me.is_host;
            }
        }
    }

    /// Insert a player if no entry with the same `player_id` exists.
    pub fn add_player(&mut self, player: Player) {
        if !self.players.iter().any(|p| p.player_id == player.player_id) {
            self.players.push(player);
        }
    }

    /// Remove the player with the given id, if present.
    pub fn remove_player(&mut self, player_id: &str) {
        self.players.retain(|p| p.player_id != player_id);
    }

    /// Overwrite the game phase.
    pub fn set_game_status(&mut self, phase: GamePhase) {
        self.phase = phase;
    }

    /// Overwrite the current card.
    pub fn set_current_card(&mut self, card: Option<Card>) {
        self.current_card = card;
    }

    /// Record the room the player joined and whether they host it.
    pub fn set_room(&mut self, room_code: impl Into<String>, is_host: bool) {
        self.room_code = room_code.into();
        self.is_host = is_host;
    }

    /// Route an inbound server frame to the corresponding mutation.
    pub fn apply(&mut self, msg: &ServerMessage) {
        match msg {
            ServerMessage::GameState(update) => self.update_game_state(update),
            ServerMessage::PlayerJoined { player, .. } => self.add_player(player.clone()),
            ServerMessage::PlayerLeft { player_id, .. } => self.remove_player(player_id),
            ServerMessage::GameStarted { status }
            | ServerMessage::GameEnded { status } => self.set_game_status(*status),
            ServerMessage::GameRestarted { status } => {
                // A restart clears the table along with the phase.
                self.set_game_status(*status);
                self.set_current_card(None);
            }
            ServerMessage::CardDrawn { card, .. } | ServerMessage::CardSwitched { card, .. } => {
                self.set_current_card(Some(card.clone()));
            }
            // Presence changes don't affect room membership, and server
            // errors are the consumer's concern.
            ServerMessage::PlayerConnected { .. }
            | ServerMessage::PlayerDisconnected { .. }
            | ServerMessage::Error { .. } => {}
        }
    }

    /// Restore the waiting/empty defaults for leaving a room.
    ///
    /// Player identity (`player_id`, `nickname`) is preserved.
    pub fn reset(&mut self) {
        self.room_code.clear();
        self.is_host = false;
        self.phase = GamePhase::Waiting;
        self.current_card = None;
        self.players.clear();
    }

    // ── Derived views ───────────────────────────────────────────────

    /// Number of players currently in the room.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// `true` while the game is in progress.
    pub fn is_playing(&self) -> bool {
        self.phase == GamePhase::Playing
    }

    /// `true` while the room is in the lobby.
    pub fn is_waiting(&self) -> bool {
        self.phase == GamePhase::Waiting
    }

    /// `true` once the host has ended the game.
    pub fn is_ended(&self) -> bool {
        self.phase == GamePhase::Ended
    }
}

// ── SessionStore ────────────────────────────────────────────────────

/// Shared, persistence-aware wrapper around [`Session`].
///
/// Created once at app start; the transport loop mutates it via
/// [`apply`](SessionStore::apply) while the application reads
/// [`snapshot`](SessionStore::snapshot)s. Identity and room association are
/// written through to the [`KeyValueStorage`] collaborator so they survive
/// restarts.
pub struct SessionStore {
    inner: Mutex<Session>,
    storage: Arc<dyn KeyValueStorage>,
}

impl SessionStore {
    /// Create a store with an empty session backed by the given storage.
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            inner: Mutex::new(Session::default()),
            storage,
        }
    }

    /// Load the persisted identity, generating and persisting a fresh player
    /// id on first run. Returns the player id.
    pub fn init_player(&self) -> String {
        let player_id = match self.storage.get(keys::PLAYER_ID) {
            Some(id) => id,
            None => {
                let id = format!("player_{}", Uuid::new_v4().simple());
                self.storage.set(keys::PLAYER_ID, &id);
                debug!(player_id = %id, "generated new player identity");
                id
            }
        };
        let nickname = self.storage.get(keys::PLAYER_NICKNAME).unwrap_or_default();

        let mut session = self.lock();
        session.player_id = player_id.clone();
        session.nickname = nickname;
        player_id
    }

    /// Set and persist the player's nickname.
    pub fn set_nickname(&self, nickname: impl Into<String>) {
        let nickname = nickname.into();
        self.storage.set(keys::PLAYER_NICKNAME, &nickname);
        self.lock().nickname = nickname;
    }

    /// Record the joined room (and host flag) and persist the room code.
    pub fn set_room(&self, room_code: impl Into<String>, is_host: bool) {
        let room_code = room_code.into();
        self.storage.set(keys::CURRENT_ROOM, &room_code);
        self.lock().set_room(room_code, is_host);
    }

    /// Apply an inbound server frame to the session.
    pub fn apply(&self, msg: &ServerMessage) {
        self.lock().apply(msg);
    }

    /// Apply the fields present in a room snapshot.
    pub fn update_game_state(&self, update: &GameStateUpdate) {
        self.lock().update_game_state(update);
    }

    /// Insert a player if absent.
    pub fn add_player(&self, player: Player) {
        self.lock().add_player(player);
    }

    /// Remove a player by id.
    pub fn remove_player(&self, player_id: &str) {
        self.lock().remove_player(player_id);
    }

    /// Overwrite the game phase.
    pub fn set_game_status(&self, phase: GamePhase) {
        self.lock().set_game_status(phase);
    }

    /// Overwrite the current card.
    pub fn set_current_card(&self, card: Option<Card>) {
        self.lock().set_current_card(card);
    }

    /// Restore waiting/empty defaults and clear the persisted room
    /// association. Identity keys are left untouched.
    pub fn reset(&self) {
        self.storage.remove(keys::CURRENT_ROOM);
        self.lock().reset();
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// Clone the current session state.
    pub fn snapshot(&self) -> Session {
        self.lock().clone()
    }

    /// Local player id.
    pub fn player_id(&self) -> String {
        self.lock().player_id.clone()
    }

    /// Number of players currently in the room.
    pub fn player_count(&self) -> usize {
        self.lock().player_count()
    }

    /// `true` while the game is in progress.
    pub fn is_playing(&self) -> bool {
        self.lock().is_playing()
    }

    /// `true` while the room is in the lobby.
    pub fn is_waiting(&self) -> bool {
        self.lock().is_waiting()
    }

    /// `true` once the host has ended the game.
    pub fn is_ended(&self) -> bool {
        self.lock().is_ended()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Session> {
        // Session mutations cannot panic, but recover from poison anyway
        // rather than propagating a panic into the transport loop.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("session", &self.snapshot())
            .finish()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn player(player_id: &str, is_host: bool) -> Player {
        Player {
            id: 0,
            player_id: player_id.into(),
            nickname: player_id.to_uppercase(),
            is_host,
            joined_at: "2026-01-01T00:00:00".into(),
        }
    }

    fn card(id: i64) -> Card {
        Card {
            id,
            content: format!("question {id}"),
            is_system: true,
            created_by: None,
            created_at: "2026-01-01T00:00:00".into(),
        }
    }

    // ── Session ─────────────────────────────────────────────────────

    #[test]
    fn add_player_keeps_ids_unique() {
        let mut session = Session::new("me", "Me");
        session.add_player(player("a", false));
        session.add_player(player("b", false));
        session.add_player(player("a", true)); // duplicate id, ignored
        session.add_player(player("c", false));

        assert_eq!(session.player_count(), 3);
        let ids: Vec<&str> = session.players.iter().map(|p| p.player_id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        // The original entry wins over the duplicate.
        assert!(!session.players[0].is_host);
    }

    #[test]
    fn remove_player_filters_by_id() {
        let mut session = Session::new("me", "Me");
        session.add_player(player("a", false));
        session.add_player(player("b", false));

        session.remove_player("a");
        assert_eq!(session.player_count(), 1);
        assert_eq!(session.players[0].player_id, "b");

        // Removing an absent id is a no-op.
        session.remove_player("zzz");
        assert_eq!(session.player_count(), 1);
    }

    #[test]
    fn update_game_state_rederives_host_flag() {
        let mut session = Session::new("me", "Me");
        session.set_room("ABCD", false);

        let update = GameStateUpdate {
            players: Some(vec![player("other", false), player("me", true)]),
            ..Default::default()
        };
        session.update_game_state(&update);
        assert!(session.is_host, "host flag must mirror our list entry");

        let update = GameStateUpdate {
            players: Some(vec![player("other", true), player("me", false)]),
            ..Default::default()
        };
        session.update_game_state(&update);
        assert!(!session.is_host);
    }

    #[test]
    fn update_game_state_applies_only_present_fields() {
        let mut session = Session::new("me", "Me");
        session.set_game_status(GamePhase::Playing);
        session.set_current_card(Some(card(1)));
        session.add_player(player("a", false));

        // Empty update touches nothing.
        session.update_game_state(&GameStateUpdate::default());
        assert!(session.is_playing());
        assert_eq!(session.current_card.as_ref().unwrap().id, 1);
        assert_eq!(session.player_count(), 1);

        // An explicit null clears the card; the rest stays.
        let update = GameStateUpdate {
            current_card: Some(None),
            ..Default::default()
        };
        session.update_game_state(&update);
        assert!(session.current_card.is_none());
        assert!(session.is_playing());
    }

    #[test]
    fn reset_preserves_identity() {
        let mut session = Session::new("me", "Me");
        session.set_room("ABCD", true);
        session.set_game_status(GamePhase::Playing);
        session.set_current_card(Some(card(1)));
        session.add_player(player("me", true));

        session.reset();

        assert_eq!(session.player_id, "me");
        assert_eq!(session.nickname, "Me");
        assert!(session.room_code.is_empty());
        assert!(!session.is_host);
        assert!(session.is_waiting());
        assert!(session.current_card.is_none());
        assert_eq!(session.player_count(), 0);
    }

    #[test]
    fn derived_views_track_phase() {
        let mut session = Session::default();
        assert!(session.is_waiting());
        assert!(!session.is_playing());
        assert!(!session.is_ended());

        session.set_game_status(GamePhase::Playing);
        assert!(session.is_playing());

        session.set_game_status(GamePhase::Ended);
        assert!(session.is_ended());
    }

    #[test]
    fn apply_routes_card_and_phase_frames() {
        let mut session = Session::new("me", "Me");

        session.apply(&ServerMessage::GameStarted {
            status: GamePhase::Playing,
        });
        assert!(session.is_playing());

        session.apply(&ServerMessage::CardDrawn {
            card: card(5),
            drawn_by: "me".into(),
        });
        assert_eq!(session.current_card.as_ref().unwrap().id, 5);

        session.apply(&ServerMessage::CardSwitched {
            card: card(6),
            switched_by: "me".into(),
        });
        assert_eq!(session.current_card.as_ref().unwrap().id, 6);

        session.apply(&ServerMessage::GameRestarted {
            status: GamePhase::Waiting,
        });
        assert!(session.is_waiting());
        assert!(session.current_card.is_none(), "restart clears the table");
    }

    #[test]
    fn apply_routes_membership_frames() {
        let mut session = Session::new("me", "Me");

        session.apply(&ServerMessage::PlayerJoined {
            player: player("a", false),
            player_count: 2,
        });
        assert_eq!(session.player_count(), 1);

        // Presence frames leave membership alone.
        session.apply(&ServerMessage::PlayerDisconnected {
            player_id: "a".into(),
        });
        assert_eq!(session.player_count(), 1);

        session.apply(&ServerMessage::PlayerLeft {
            player_id: "a".into(),
            player_count: 1,
        });
        assert_eq!(session.player_count(), 0);
    }

    // ── SessionStore ────────────────────────────────────────────────

    #[test]
    fn init_player_generates_and_persists_identity() {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage.clone());

        let id = store.init_player();
        assert!(id.starts_with("player_"));
        assert_eq!(storage.get(keys::PLAYER_ID).as_deref(), Some(id.as_str()));

        // A second store over the same storage reuses the identity.
        let store2 = SessionStore::new(storage);
        assert_eq!(store2.init_player(), id);
    }

    #[test]
    fn init_player_loads_stored_nickname() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(keys::PLAYER_NICKNAME, "Ada");

        let store = SessionStore::new(storage);
        store.init_player();
        assert_eq!(store.snapshot().nickname, "Ada");
    }

    #[test]
    fn set_room_and_reset_manage_persisted_room_key() {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage.clone());
        store.init_player();

        store.set_room("ABCD", true);
        assert_eq!(storage.get(keys::CURRENT_ROOM).as_deref(), Some("ABCD"));
        assert!(store.snapshot().is_host);

        store.reset();
        assert!(storage.get(keys::CURRENT_ROOM).is_none());
        // Identity keys survive reset.
        assert!(storage.get(keys::PLAYER_ID).is_some());
        assert!(store.snapshot().is_waiting());
    }

    #[test]
    fn set_nickname_persists() {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage.clone());
        store.init_player();

        store.set_nickname("Grace");
        assert_eq!(storage.get(keys::PLAYER_NICKNAME).as_deref(), Some("Grace"));
        assert_eq!(store.snapshot().nickname, "Grace");
    }
}
