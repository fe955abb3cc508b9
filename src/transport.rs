//! Transport abstraction for the Table Talk room protocol.
//!
//! The [`Transport`] trait defines a bidirectional text message channel
//! between the client and the room endpoint. The protocol uses JSON text
//! frames, so every transport implementation must handle message framing
//! internally (WebSocket frames, length-prefixed TCP, and so on).
//!
//! Because the client re-establishes the connection itself during automatic
//! reconnection, connection setup lives in a second trait: a [`Connector`]
//! knows how to open a fresh transport to a given room for a given player
//! and is invoked once for the initial connect and once per reconnect
//! attempt.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use table_talk_client::error::TableTalkError;
//! use table_talk_client::transport::Transport;
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), TableTalkError> {
//!         // Send the JSON text message over your transport
//!         todo!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, TableTalkError>> {
//!         // Receive the next JSON text message
//!         // Return None when the connection is closed cleanly
//!         todo!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), TableTalkError> {
//!         // Gracefully shut down the connection
//!         todo!()
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::TableTalkError;

/// A bidirectional text message transport to a room endpoint.
///
/// Implementors shuttle serialized JSON strings between the client and the
/// server. Each call to [`send`](Transport::send) transmits one complete JSON
/// message. Each call to [`recv`](Transport::recv) returns one complete JSON
/// message.
///
/// # Cancel Safety
///
/// The [`recv`](Transport::recv) method **MUST** be cancel-safe because it is
/// used inside `tokio::select!`. If `recv` is cancelled before completion,
/// calling it again must not lose data. Channel-based implementations (e.g.,
/// wrapping `mpsc::Receiver`) are naturally cancel-safe.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send a JSON text message to the server.
    ///
    /// # Errors
    ///
    /// Returns [`TableTalkError::TransportSend`] if the message could not be
    /// sent (e.g., connection broken, write buffer full).
    async fn send(&mut self, message: String) -> Result<(), TableTalkError>;

    /// Receive the next JSON text message from the server.
    ///
    /// Returns:
    /// - `Some(Ok(text))` — a complete message was received
    /// - `Some(Err(e))` — a transport error occurred
    /// - `None` — the connection was closed cleanly by the server
    ///
    /// # Cancel Safety
    ///
    /// This method **MUST** be cancel-safe (see [trait documentation](Transport)).
    async fn recv(&mut self) -> Option<Result<String, TableTalkError>>;

    /// Close the transport connection gracefully.
    ///
    /// After calling this method, subsequent calls to [`send`](Transport::send)
    /// and [`recv`](Transport::recv) may return errors or `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the graceful shutdown fails. Implementations should
    /// still release resources even if the close handshake fails.
    async fn close(&mut self) -> Result<(), TableTalkError>;
}

/// Opens a fresh [`Transport`] to a room's event channel.
///
/// The client keeps the connector for the lifetime of the connection and
/// re-invokes it with the last known room code and player id on every
/// reconnect attempt. Implementations therefore take `&self` and must be
/// shareable with the background task.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The transport this connector produces.
    type Transport: Transport;

    /// Open a connection to `room_code`'s event channel as `player_id`.
    ///
    /// Resolves once the transport reports open.
    ///
    /// # Errors
    ///
    /// Returns a transport-level error if the connection could not be
    /// established.
    async fn connect(
        &self,
        room_code: &str,
        player_id: &str,
    ) -> Result<Self::Transport, TableTalkError>;
}
