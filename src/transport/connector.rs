//! Transport seam and the tokio-tungstenite implementation.
//!
//! The connection task only needs three things from a socket: send a text
//! frame, receive the next frame, and close. [`Transport`] captures that,
//! and [`Connector`] produces one per connection attempt. The default
//! [`WsConnector`] dials the endpoint with `tokio_tungstenite::connect_async`.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};

// ============================================================================
// Frame
// ============================================================================

/// A frame surfaced by a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A text message.
    Text(String),
    /// The peer closed the connection.
    Close {
        /// Close code, if present.
        code: Option<u16>,
        /// Close reason text.
        reason: String,
    },
}

// ============================================================================
// Traits
// ============================================================================

/// One open, message-oriented connection.
#[async_trait]
pub trait Transport: Send {
    /// Sends a text frame.
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Waits for the next frame.
    ///
    /// Must be cancellation safe: dropping the future loses no frame.
    /// Returns an error when the transport fails or ends without a close
    /// frame.
    async fn recv(&mut self) -> Result<Frame>;

    /// Closes the transport, ignoring failures.
    async fn close(&mut self);
}

/// Opens transports to an endpoint.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Makes one connection attempt.
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>>;
}

// ============================================================================
// WsConnector
// ============================================================================

/// Connector backed by tokio-tungstenite.
///
/// `wss` endpoints need the `native-tls` feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>> {
        let (stream, response) = connect_async(endpoint.as_str())
            .await
            .map_err(|e| Error::connection(format!("{endpoint}: {e}")))?;

        debug!(%endpoint, status = %response.status(), "WebSocket handshake completed");

        Ok(Box::new(WsTransport { stream }))
    }
}

// ============================================================================
// WsTransport
// ============================================================================

/// A tokio-tungstenite client socket.
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Frame> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Frame::Text(text.as_str().to_owned())),

                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Ok(Frame::Text(text)),
                    Err(_) => trace!(len = data.len(), "Ignoring non-UTF-8 binary frame"),
                },

                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (Some(u16::from(f.code)), f.reason.as_str().to_owned()))
                        .unwrap_or_default();
                    return Ok(Frame::Close { code, reason });
                }

                // Ping replies are queued by tungstenite itself
                Some(Ok(_)) => {}

                Some(Err(e)) => return Err(Error::WebSocket(e)),

                None => return Err(Error::ConnectionClosed),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            trace!(error = %e, "Close handshake failed");
        }
    }
}
