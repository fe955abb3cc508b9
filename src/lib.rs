//! Async client library for Table Talk, a party game where players draw
//! conversation cards in a shared room.
//!
//! The crate has two halves:
//!
//! - A **realtime client** ([`TableTalkClient`]) that owns one room
//!   connection, keeps a [`SessionStore`] in sync with server frames,
//!   delivers typed [`TableTalkEvent`]s on a bounded channel and
//!   automatically reconnects (bounded retries) after an unexpected close.
//! - A **REST client** ([`ApiClient`], behind the `rest-api` feature) for
//!   room/question management outside the socket: creating and joining
//!   rooms, listing and editing question cards.
//!
//! The realtime half is transport-agnostic: the client talks to anything
//! implementing [`Transport`], and reconnection re-dials through a
//! [`Connector`]. A WebSocket implementation ships behind the
//! `transport-websocket` feature (enabled by default).
//!
//! # Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use table_talk_client::{
//!     MemoryStorage, SessionStore, TableTalkClient, TableTalkConfig, TableTalkEvent,
//!     WebSocketConnector,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Arc::new(SessionStore::new(Arc::new(MemoryStorage::new())));
//!     let player_id = session.init_player();
//!
//!     let connector = WebSocketConnector::new("ws://localhost:8000");
//!     let (client, mut events) = TableTalkClient::connect(
//!         connector,
//!         "ABCD",
//!         player_id,
//!         Arc::clone(&session),
//!         TableTalkConfig::new(),
//!     )
//!     .await?;
//!
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             TableTalkEvent::CardDrawn { card, drawn_by } => {
//!                 println!("{drawn_by} drew: {}", card.content);
//!             }
//!             TableTalkEvent::ReconnectFailed { attempts } => {
//!                 eprintln!("gave up after {attempts} attempts");
//!                 break;
//!             }
//!             _ => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Feature flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `transport-websocket` | yes | [`WebSocketConnector`] / [`WebSocketTransport`] via `tokio-tungstenite` |
//! | `rest-api` | no | [`ApiClient`] via `reqwest` |
//! | `tokio-runtime` | via default | Enables `tokio/rt` for the background task |

#[cfg(feature = "rest-api")]
pub mod api;
pub mod client;
pub mod error;
pub mod event;
pub mod protocol;
pub mod session;
pub mod storage;
pub mod transport;
pub mod transports;

#[cfg(feature = "rest-api")]
pub use api::{ApiClient, LeaveRoomAck, QuestionDeleted, RoomDetails, RoomSummary};
pub use client::{ConnectionStatus, TableTalkClient, TableTalkConfig};
pub use error::{Result, TableTalkError};
pub use event::TableTalkEvent;
pub use protocol::{Card, ClientMessage, GamePhase, GameStateUpdate, Player, ServerMessage};
pub use session::{Session, SessionStore};
pub use storage::{KeyValueStorage, MemoryStorage};
pub use transport::{Connector, Transport};
#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
