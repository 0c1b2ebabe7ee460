//! Error types for the battle client.
//!
//! Only the transport and intent boundary can fail. The reconciliation core
//! (normalizer, turn resolver, dedup gates, timer, notifier) is total and
//! never produces these.

use thiserror::Error;

/// Errors that can occur when using the battle client.
#[derive(Debug, Error)]
pub enum BattleClientError {
    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a frame.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Attempted an operation that requires an active connection, but the client is not connected.
    #[error("not connected to server")]
    NotConnected,

    /// The intent needs a confirmed player identity.
    #[error("player identity not confirmed")]
    NotAuthenticated,

    /// The server rejected the request in its acknowledgment.
    #[error("rejected by server: {error}")]
    Rejected {
        /// Human-readable reason supplied by the server (or a generic fallback).
        error: String,
    },

    /// A chat line was empty after trimming.
    #[error("chat message is empty")]
    EmptyMessage,

    /// The transport loop exited before the acknowledgment arrived.
    #[error("acknowledgment dropped before resolution")]
    AckDropped,

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for battle client operations.
pub type Result<T> = std::result::Result<T, BattleClientError>;
