//! Transport abstraction for the battle event channel.
//!
//! The [`Transport`] trait is a bidirectional channel of JSON text frames
//! (`{"event", "data"}`) between the client and the battle server. Framing is
//! the transport's business: WebSocket text frames, a socket.io bridge, an
//! in-process channel in tests.
//!
//! Connection setup is not part of this trait. Build a connected transport,
//! then hand it to `BattleClient::start`.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use battle_sync_client::error::BattleClientError;
//! use battle_sync_client::transport::Transport;
//! use tokio::sync::mpsc;
//!
//! struct ChannelTransport {
//!     outgoing: mpsc::Sender<String>,
//!     incoming: mpsc::Receiver<String>,
//! }
//!
//! #[async_trait]
//! impl Transport for ChannelTransport {
//!     async fn send(&mut self, message: String) -> Result<(), BattleClientError> {
//!         self.outgoing
//!             .send(message)
//!             .await
//!             .map_err(|e| BattleClientError::TransportSend(e.to_string()))
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, BattleClientError>> {
//!         self.incoming.recv().await.map(Ok)
//!     }
//!
//!     async fn close(&mut self) -> Result<(), BattleClientError> {
//!         self.incoming.close();
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::BattleClientError;

/// A bidirectional text frame transport.
///
/// Each [`send`](Transport::send) transmits one complete JSON frame and each
/// [`recv`](Transport::recv) yields one.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) runs inside `tokio::select!` and **must** be
/// cancel-safe: a cancelled call must not lose a frame.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns [`BattleClientError::TransportSend`] if the frame could not be
    /// written.
    async fn send(&mut self, message: String) -> Result<(), BattleClientError>;

    /// Receive the next JSON text frame.
    ///
    /// - `Some(Ok(text))`: a frame arrived
    /// - `Some(Err(e))`: the connection failed
    /// - `None`: the server closed the connection cleanly
    async fn recv(&mut self) -> Option<Result<String, BattleClientError>>;

    /// Close the connection. Resources are released even if the close
    /// handshake fails.
    async fn close(&mut self) -> Result<(), BattleClientError>;
}
