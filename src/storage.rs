//! Persisted key/value storage for client identity.
//!
//! The player id, nickname and current room code survive app restarts. Host
//! applications adapt whatever their platform offers (browser local storage,
//! a config file, an in-memory map for tests) behind [`KeyValueStorage`].

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Storage keys used by the session store.
pub mod keys {
    /// Stable client-generated player identifier.
    pub const PLAYER_ID: &str = "player_id";
    /// Last nickname the player chose.
    pub const PLAYER_NICKNAME: &str = "player_nickname";
    /// Code of the room the player is currently in, if any.
    pub const CURRENT_ROOM: &str = "current_room";
}

/// A string key/value store for small persisted client state.
///
/// Implementations must be cheap to call from the event loop; none of the
/// methods are async.
pub trait KeyValueStorage: Send + Sync {
    /// Read the value stored under `key`, if present.
    fn get(&self, key: &str) -> Option<String>;
    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str);
    /// Remove `key` and its value, if present.
    fn remove(&self, key: &str);
}

/// In-memory [`KeyValueStorage`] backed by a `HashMap`.
///
/// Nothing survives process exit; intended for tests and for platforms
/// without durable storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove_round_trip() {
        let storage = MemoryStorage::new();
        assert!(storage.get(keys::PLAYER_ID).is_none());

        storage.set(keys::PLAYER_ID, "player_abc");
        assert_eq!(storage.get(keys::PLAYER_ID).as_deref(), Some("player_abc"));

        storage.set(keys::PLAYER_ID, "player_def");
        assert_eq!(storage.get(keys::PLAYER_ID).as_deref(), Some("player_def"));

        storage.remove(keys::PLAYER_ID);
        assert!(storage.get(keys::PLAYER_ID).is_none());
    }

    #[test]
    fn remove_missing_key_is_a_no_op() {
        let storage = MemoryStorage::new();
        storage.remove(keys::CURRENT_ROOM);
        assert!(storage.get(keys::CURRENT_ROOM).is_none());
    }
}
