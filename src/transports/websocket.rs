//! WebSocket transport backed by `tokio-tungstenite`.
//!
//! Both `ws://` and `wss://` URLs work; TLS is handled by
//! [`MaybeTlsStream`](tokio_tungstenite::MaybeTlsStream). Only available with
//! the `transport-websocket` feature (on by default).
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), truth_or_trick_client::TruthOrTrickError> {
//! use truth_or_trick_client::{ClientConfig, Transport, WebSocketTransport};
//!
//! let config = ClientConfig::from_env();
//! let mut transport = WebSocketTransport::connect_with_config(&config).await?;
//! transport.send(r#"{"type":"StartGame"}"#.to_string()).await?;
//! transport.close().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::client::ClientConfig;
use crate::error::TruthOrTrickError;
use crate::transport::Transport;

/// The underlying stream type, for [`WebSocketTransport::from_stream`].
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A [`Transport`] over a WebSocket connection to the room server.
///
/// Text frames carry protocol messages; control frames are handled here and
/// binary frames are skipped. For custom TLS or proxy setups build the stream
/// yourself and use [`WebSocketTransport::from_stream`].
///
/// [`recv`](Transport::recv) only awaits `StreamExt::next`, which is
/// cancel-safe.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Connect to the room server at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`TruthOrTrickError::Io`] if the URL is invalid or the server is
    /// unreachable. I/O error kinds are preserved; anything else maps to
    /// [`ErrorKind::Other`](std::io::ErrorKind::Other).
    pub async fn connect(url: &str) -> Result<Self, TruthOrTrickError> {
        tracing::debug!(url = %url, "connecting to room server");

        let (stream, _response) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            let kind = match &e {
                tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                _ => std::io::ErrorKind::Other,
            };
            TruthOrTrickError::Io(std::io::Error::new(kind, e))
        })?;

        tracing::info!(url = %url, "room server connection established");

        Ok(Self {
            stream,
            closed: false,
        })
    }

    /// Wrap an already-established WebSocket stream.
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }

    /// Like [`connect`](Self::connect), but gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`TruthOrTrickError::Timeout`] if the deadline elapses, or any
    /// error [`connect`](Self::connect) may return.
    pub async fn connect_with_timeout(
        url: &str,
        timeout: std::time::Duration,
    ) -> Result<Self, TruthOrTrickError> {
        tokio::time::timeout(timeout, Self::connect(url))
            .await
            .map_err(|_| TruthOrTrickError::Timeout)?
    }

    /// Connect to [`ClientConfig::server_url`] within [`ClientConfig::connect_timeout`].
    ///
    /// # Errors
    ///
    /// Same as [`connect_with_timeout`](Self::connect_with_timeout).
    pub async fn connect_with_config(config: &ClientConfig) -> Result<Self, TruthOrTrickError> {
        Self::connect_with_timeout(&config.server_url, config.connect_timeout).await
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), TruthOrTrickError> {
        if self.closed {
            return Err(TruthOrTrickError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| TruthOrTrickError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, TruthOrTrickError>> {
        loop {
            let msg = match self.stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    return Some(Err(TruthOrTrickError::TransportReceive(e.to_string())));
                }
                None => return None,
            };

            match msg {
                Message::Text(text) => return Some(Ok(text.to_string())),
                Message::Close(frame) => {
                    tracing::debug!(?frame, "received WebSocket close frame");
                    return None;
                }
                // tungstenite queues the pong itself.
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Binary(bytes) => {
                    tracing::warn!(len = bytes.len(), "skipping binary frame from room server");
                }
                Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) -> Result<(), TruthOrTrickError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| TruthOrTrickError::TransportSend(e.to_string()))
    }
}

#[cfg(test)]
#[cfg(feature = "transport-websocket")]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::protocol::{ClientMessage, ServerMessage};
    use tokio::net::TcpListener;

    type ServerStream = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

    /// Accept one WebSocket connection on a local port and hand it to `handler`.
    async fn room_server<F, Fut>(handler: F) -> String
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

    #[test]
    fn websocket_transport_is_send_and_debug() {
        fn assert_traits<T: Send + std::fmt::Debug>() {}
        assert_traits::<WebSocketTransport>();
    }

    #[tokio::test]
    async fn connect_rejects_malformed_url() {
        let err = WebSocketTransport::connect("room-server").await.unwrap_err();
        assert!(matches!(err, TruthOrTrickError::Io(_)));
    }

    #[tokio::test]
    async fn connect_with_config_times_out_on_unroutable_address() {
        let config = ClientConfig::new("ws://192.0.2.1:1")
            .with_connect_timeout(std::time::Duration::from_millis(50));
        let err = WebSocketTransport::connect_with_config(&config)
            .await
            .unwrap_err();
        assert!(matches!(err, TruthOrTrickError::Timeout));
    }

    #[tokio::test]
    async fn recv_yields_server_frames_and_skips_binary() {
        let url = room_server(|mut ws| async move {
            ws.send(Message::Binary(vec![1, 2, 3].into())).await.unwrap();
            ws.send(Message::Text(r#"{"type":"PickPrompt"}"#.into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        let text = transport.recv().await.unwrap().unwrap();
        let msg: ServerMessage = serde_json::from_str(&text).unwrap();
        assert!(matches!(msg, ServerMessage::PickPrompt));
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn send_delivers_client_frames() {
        let (seen_tx, seen_rx) = tokio::sync::oneshot::channel::<String>();
        let url = room_server(|mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                let _ = seen_tx.send(text.to_string());
            }
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        let json = serde_json::to_string(&ClientMessage::FinishTurn).unwrap();
        transport.send(json).await.unwrap();

        let seen: ClientMessage = serde_json::from_str(&seen_rx.await.unwrap()).unwrap();
        assert!(matches!(seen, ClientMessage::FinishTurn));
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn close_is_idempotent_and_blocks_further_sends() {
        let url = room_server(|mut ws| async move { while let Some(Ok(_)) = ws.next().await {} }).await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();

        let err = transport.send("{}".to_string()).await.unwrap_err();
        assert!(matches!(err, TruthOrTrickError::TransportClosed));
    }
}
