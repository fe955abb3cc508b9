//! Error types for the Table Talk client.

use thiserror::Error;

/// Errors that can occur when using the Table Talk client.
#[derive(Debug, Error)]
pub enum TableTalkError {
    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a protocol message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Attempted an operation that requires an open connection, but the
    /// client is not connected.
    #[error("not connected to room")]
    NotConnected,

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The REST API returned a non-2xx status.
    #[cfg(feature = "rest-api")]
    #[error("API error {status}: {body}")]
    Api {
        /// HTTP status code of the response.
        status: u16,
        /// Raw response body, usually a JSON `detail` message.
        body: String,
    },

    /// An HTTP request to the REST API failed before a response arrived.
    #[cfg(feature = "rest-api")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A specialized [`Result`] type for Table Talk client operations.
pub type Result<T> = std::result::Result<T, TableTalkError>;
