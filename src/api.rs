//! REST client for room and question management.
//!
//! Everything outside the realtime socket goes through this client: creating
//! and joining rooms, checking room existence, and managing the question
//! deck. Requires the `rest-api` feature.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::error::{Result, TableTalkError};
use crate::protocol::{Card, GamePhase, Player};

/// Full room record as returned by the room endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomDetails {
    pub id: i64,
    pub room_code: String,
    pub host_id: String,
    pub status: GamePhase,
    pub current_card: Option<Card>,
    pub players: Vec<Player>,
    pub created_at: String,
}

/// Lightweight room record from the existence check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub room_code: String,
    pub status: GamePhase,
    pub player_count: usize,
}

/// Acknowledgement for leaving a room.
///
/// `room_deleted` is `true` when the departing player was the last one and
/// the server tore the room down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveRoomAck {
    pub message: String,
    #[serde(default)]
    pub room_deleted: bool,
}

/// Acknowledgement for deleting a custom question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionDeleted {
    pub message: String,
}

/// HTTP client for the Table Talk REST API.
///
/// ```rust,ignore
/// let api = ApiClient::new("http://localhost:8000");
/// let room = api.create_room("Ada", &player_id).await?;
/// println!("room code: {}", room.room_code);
/// ```
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for the API at `base_url`, e.g.
    /// `http://localhost:8000`. A trailing slash is trimmed.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    /// Create a client using an existing `reqwest::Client` (to share
    /// connection pools or custom TLS settings).
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    // ── Rooms ───────────────────────────────────────────────────────

    /// Create a new room with `host_id` as host. The server generates the
    /// room code.
    pub async fn create_room(&self, host_nickname: &str, host_id: &str) -> Result<RoomDetails> {
        let url = format!("{}/api/rooms", self.base_url);
        let body = json!({
            "host_nickname": host_nickname,
            "host_id": host_id,
        });
        self.post_json(&url, &body).await
    }

    /// Fetch the full state of a room.
    pub async fn get_room(&self, room_code: &str) -> Result<RoomDetails> {
        let url = format!("{}/api/rooms/{room_code}", self.base_url);
        self.get_json(&url).await
    }

    /// Check whether a room exists without fetching its full state.
    pub async fn room_exists(&self, room_code: &str) -> Result<RoomSummary> {
        let url = format!("{}/api/rooms/{room_code}/exists", self.base_url);
        self.get_json(&url).await
    }

    /// Join a room as `player_id`. Rejoining with a known id is idempotent;
    /// the server returns the room unchanged.
    pub async fn join_room(
        &self,
        room_code: &str,
        nickname: &str,
        player_id: &str,
    ) -> Result<RoomDetails> {
        let url = format!("{}/api/rooms/{room_code}/join", self.base_url);
        let body = json!({
            "nickname": nickname,
            "player_id": player_id,
        });
        self.post_json(&url, &body).await
    }

    /// Leave a room. If the host leaves, the server promotes another player;
    /// if the room empties, it is deleted.
    pub async fn leave_room(&self, room_code: &str, player_id: &str) -> Result<LeaveRoomAck> {
        let url = format!("{}/api/rooms/{room_code}/leave/{player_id}", self.base_url);
        debug!(%url, "DELETE");
        let response = self.http.delete(&url).send().await?;
        Self::decode(response).await
    }

    // ── Questions ───────────────────────────────────────────────────

    /// List the built-in system questions.
    pub async fn system_questions(&self) -> Result<Vec<Card>> {
        let url = format!("{}/api/questions", self.base_url);
        self.get_json(&url).await
    }

    /// List all questions in a room's deck (system + custom).
    pub async fn room_questions(&self, room_code: &str) -> Result<Vec<Card>> {
        let url = format!("{}/api/questions/room/{room_code}", self.base_url);
        self.get_json(&url).await
    }

    /// List only the custom questions added to a room.
    pub async fn custom_questions(&self, room_code: &str) -> Result<Vec<Card>> {
        let url = format!("{}/api/questions/custom/{room_code}", self.base_url);
        self.get_json(&url).await
    }

    /// Add a custom question to a room's deck.
    ///
    /// The server reads the room code from the `created_by` field of the
    /// request body.
    pub async fn add_question(&self, content: &str, room_code: &str) -> Result<Card> {
        let url = format!("{}/api/questions", self.base_url);
        let body = json!({
            "content": content,
            "created_by": room_code,
        });
        self.post_json(&url, &body).await
    }

    /// Delete a custom question from a room's deck. System questions cannot
    /// be deleted; the server rejects the attempt.
    pub async fn delete_question(&self, question_id: i64, room_code: &str) -> Result<QuestionDeleted> {
        let url = format!(
            "{}/api/questions/{question_id}?room_code={room_code}",
            self.base_url
        );
        debug!(%url, "DELETE");
        let response = self.http.delete(&url).send().await?;
        Self::decode(response).await
    }

    // ── Internal helpers ────────────────────────────────────────────

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(%url, "GET");
        let response = self.http.get(url).send().await?;
        Self::decode(response).await
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        debug!(%url, "POST");
        let response = self.http.post(url).json(body).send().await?;
        Self::decode(response).await
    }

    /// Decode a response, mapping non-2xx statuses to [`TableTalkError::Api`]
    /// with the raw body preserved for the caller.
    async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TableTalkError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<T>().await?)
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

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let api = ApiClient::new("http://localhost:8000/");
        assert_eq!(api.base_url, "http://localhost:8000");
    }

    #[test]
    fn room_details_deserializes() {
        let json = r#"{
            "id": 7,
            "room_code": "ABCD",
            "host_id": "player_1",
            "status": "waiting",
            "current_card": null,
            "players": [
                {"id":1,"player_id":"player_1","nickname":"Ada","is_host":true,"joined_at":"t"}
            ],
            "created_at": "2024-01-01T00:00:00"
        }"#;
        let room: RoomDetails = serde_json::from_str(json).unwrap();
        assert_eq!(room.room_code, "ABCD");
        assert_eq!(room.status, GamePhase::Waiting);
        assert!(room.current_card.is_none());
        assert_eq!(room.players.len(), 1);
        assert!(room.players[0].is_host);
    }

    #[test]
    fn leave_ack_defaults_room_deleted_to_false() {
        let ack: LeaveRoomAck = serde_json::from_str(r#"{"message":"left room"}"#).unwrap();
        assert!(!ack.room_deleted);
    }

    #[test]
    fn room_summary_deserializes() {
        let json = r#"{"room_code":"ABCD","status":"playing","player_count":3}"#;
        let summary: RoomSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.status, GamePhase::Playing);
        assert_eq!(summary.player_count, 3);
    }
}
