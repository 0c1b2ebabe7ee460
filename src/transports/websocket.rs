//! WebSocket transport using `tokio-tungstenite`.
//!
//! [`WebSocketTransport`] carries battle frames as WebSocket text messages.
//! Both `ws://` and `wss://` URLs work; TLS is handled by
//! [`MaybeTlsStream`](tokio_tungstenite::MaybeTlsStream).
//!
//! Some gateways relay JSON inside binary frames. A binary frame that is
//! valid UTF-8 is delivered like a text frame; anything else is skipped.
//!
//! Only available with the `transport-websocket` feature (on by default).
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), battle_sync_client::BattleClientError> {
//! use battle_sync_client::{Transport, WebSocketTransport};
//!
//! let mut transport = WebSocketTransport::connect("ws://localhost:3001/battle").await?;
//! transport
//!     .send(r#"{"event":"join","data":{"battleId":"b1"}}"#.to_string())
//!     .await?;
//!
//! if let Some(Ok(frame)) = transport.recv().await {
//!     println!("received: {frame}");
//! }
//!
//! transport.close().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

use crate::error::BattleClientError;
use crate::transport::Transport;

/// The underlying WebSocket stream, public so callers can build one with
/// custom TLS or headers and pass it to [`WebSocketTransport::from_stream`].
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A [`Transport`] over one WebSocket connection.
///
/// [`recv`](Transport::recv) is cancel-safe: it only awaits the next item of
/// the stream, so dropping it mid-await loses nothing.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Connect to the battle server.
    ///
    /// # Errors
    ///
    /// Returns [`BattleClientError::Io`] if the URL is invalid or the server is
    /// unreachable. An underlying I/O error keeps its
    /// [`ErrorKind`](std::io::ErrorKind); other handshake failures map to
    /// [`ErrorKind::Other`](std::io::ErrorKind::Other).
    pub async fn connect(url: &str) -> Result<Self, BattleClientError> {
        debug!(url = %url, "connecting to battle server");

        let (stream, _response) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            let kind = match &e {
                tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                _ => std::io::ErrorKind::Other,
            };
            BattleClientError::Io(std::io::Error::new(kind, e))
        })?;

        info!(url = %url, "battle server connection established");
        Ok(Self::from_stream(stream))
    }

    /// [`connect`](Self::connect), bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`BattleClientError::Timeout`] if the deadline elapses first.
    pub async fn connect_with_timeout(
        url: &str,
        timeout: Duration,
    ) -> Result<Self, BattleClientError> {
        tokio::time::timeout(timeout, Self::connect(url))
            .await
            .map_err(|_| BattleClientError::Timeout)?
    }

    /// Wrap an already-established stream.
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), BattleClientError> {
        if self.closed {
            return Err(BattleClientError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| BattleClientError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, BattleClientError>> {
        loop {
            let msg = match self.stream.next().await? {
                Ok(msg) => msg,
                Err(e) => return Some(Err(BattleClientError::TransportReceive(e.to_string()))),
            };

            match msg {
                Message::Text(text) => return Some(Ok(text.to_string())),
                Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => warn!(len = bytes.len(), "non-UTF-8 binary frame skipped"),
                },
                Message::Close(frame) => {
                    debug!(?frame, "battle server sent close frame");
                    return None;
                }
                // tungstenite answers pings itself.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) -> Result<(), BattleClientError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| BattleClientError::TransportSend(e.to_string()))
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
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    type ServerStream = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

    /// Accept one connection on a local port and run `handler` on it.
    async fn battle_server<F, Fut>(handler: F) -> String
    where
        F: FnOnce(ServerStream) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });
        format!("ws://{addr}")
    }

    fn frame(event: &str, data: Value) -> Message {
        Message::Text(json!({"event": event, "data": data}).to_string().into())
    }

    #[test]
    fn transport_is_send_and_debug() {
        fn assert_bounds<T: Send + std::fmt::Debug>() {}
        assert_bounds::<WebSocketTransport>();
    }

    #[tokio::test]
    async fn unreachable_server_is_io_error() {
        let err = WebSocketTransport::connect("ws://127.0.0.1:1").await.unwrap_err();
        assert!(matches!(err, BattleClientError::Io(_)));
        let err = WebSocketTransport::connect("battle-server").await.unwrap_err();
        assert!(matches!(err, BattleClientError::Io(_)));
    }

    #[tokio::test]
    async fn connect_timeout_is_reported() {
        let err =
            WebSocketTransport::connect_with_timeout("ws://192.0.2.1:1", Duration::from_millis(50))
                .await
                .unwrap_err();
        assert!(matches!(err, BattleClientError::Timeout));
    }

    #[tokio::test]
    async fn receives_battle_frames_in_order() {
        let url = battle_server(|mut ws| async move {
            ws.send(frame("battle:log", json!({"message": "라운드 1"}))).await.unwrap();
            ws.send(frame("turn:start", json!({"playerId": "p1"}))).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        let first: Value =
            serde_json::from_str(&transport.recv().await.unwrap().unwrap()).unwrap();
        assert_eq!(first["event"], "battle:log");
        let second: Value =
            serde_json::from_str(&transport.recv().await.unwrap().unwrap()).unwrap();
        assert_eq!(second["data"]["playerId"], "p1");
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn utf8_binary_frames_are_delivered_and_garbage_skipped() {
        let url = battle_server(|mut ws| async move {
            ws.send(Message::Binary(vec![0xff, 0xfe].into())).await.unwrap();
            let json = json!({"event": "battleUpdate", "data": {"id": "b1"}}).to_string();
            ws.send(Message::Binary(json.into_bytes().into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        let text = transport.recv().await.unwrap().unwrap();
        assert!(text.contains("battleUpdate"));
    }

    #[tokio::test]
    async fn sent_intents_reach_the_server() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let url = battle_server(|mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                let _ = tx.send(text.to_string());
            }
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport
            .send(json!({"event": "join", "data": {"battleId": "b1"}}).to_string())
            .await
            .unwrap();
        let received: Value = serde_json::from_str(&rx.await.unwrap()).unwrap();
        assert_eq!(received["data"]["battleId"], "b1");
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn closed_transport_rejects_sends_and_closes_twice() {
        let url = battle_server(|mut ws| async move {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();

        let err = transport.send("{}".to_string()).await.unwrap_err();
        assert!(matches!(err, BattleClientError::TransportClosed));
        assert!(!matches!(transport.recv().await, Some(Ok(_))));
    }
}
