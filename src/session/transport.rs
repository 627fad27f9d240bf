//! Transport seam between the session driver and the network.
//!
//! The driver only needs three things from a connection: write a text
//! frame, read the next text frame, and close. [`Connector`] produces
//! connections; [`WsConnector`] is the production implementation over
//! `tokio-tungstenite`.

use std::fmt;
use std::future::Future;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::error::SessionError;

/// One established physical connection.
pub trait Transport: Send + 'static {
    /// Writes one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::TransportDropped`] if the write fails; the
    /// connection is unusable afterwards.
    fn send_text(&mut self, text: String) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Waits for the next text frame.
    ///
    /// Returns `None` once the peer has closed the connection and
    /// `Some(Err(_))` on a read failure. Must be cancel-safe: dropping the
    /// future between frames loses nothing.
    fn next_frame(&mut self) -> impl Future<Output = Option<Result<String, SessionError>>> + Send;

    /// Closes the connection. Errors are ignored.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Factory for [`Transport`]s, one per connect attempt.
pub trait Connector: Send + Sync + 'static {
    /// Connection type produced by this connector.
    type Transport: Transport;

    /// Opens a connection to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Connect`] if the connection cannot be
    /// established.
    fn connect(
        &self,
        endpoint: &str,
    ) -> impl Future<Output = Result<Self::Transport, SessionError>> + Send;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket connector backed by `tokio-tungstenite`.
///
/// Supports `ws://` and `wss://` (system TLS through `native-tls`).
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn connect(&self, endpoint: &str) -> Result<WsTransport, SessionError> {
        let (stream, response) = connect_async(endpoint)
            .await
            .map_err(|e| SessionError::Connect(e.to_string()))?;
        tracing::debug!(status = %response.status(), "websocket upgrade complete");
        Ok(WsTransport { stream })
    }
}

/// A live WebSocket connection.
pub struct WsTransport {
    stream: WsStream,
}

impl fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsTransport").finish_non_exhaustive()
    }
}

impl Transport for WsTransport {
    async fn send_text(&mut self, text: String) -> Result<(), SessionError> {
        self.stream
            .send(Message::text(text))
            .await
            .map_err(|e| SessionError::TransportDropped(e.to_string()))
    }

    async fn next_frame(&mut self) -> Option<Result<String, SessionError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => {
                        tracing::warn!(
                            code = "malformed_frame",
                            bytes = bytes.len(),
                            "discarding non-utf8 binary frame"
                        );
                    }
                },
                Ok(Message::Close(frame)) => {
                    if let Some(frame) = frame {
                        tracing::debug!(code = %frame.code, reason = %frame.reason, "peer sent close");
                    }
                    return None;
                }
                // Ping/pong replies are queued by tungstenite itself.
                Ok(_) => {}
                Err(e) => return Some(Err(SessionError::TransportDropped(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!(error = %e, "websocket close failed");
        }
    }
}
