//! Socket seam for synthesis sessions.
//!
//! The session state machine only sees [`TransportEvent`]s, so the same logic
//! runs against a real WebSocket ([`WebSocketConnector`]) or a scripted
//! transport in tests.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace, warn};

use super::client::{SynthesisError, SynthesisResult};

/// What the transport observed next.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A text or binary data frame.
    Frame(Bytes),
    /// The connection closed, cleanly or not.
    Closed { code: Option<u16>, reason: String },
    /// The connection failed.
    Error(String),
}

/// An open session connection.
#[async_trait]
pub trait SessionTransport: Send {
    /// Sends one text frame.
    async fn send_text(&mut self, text: String) -> SynthesisResult<()>;

    /// Waits for the next data frame, close or error.
    ///
    /// Control frames (ping/pong) are consumed internally. Once `Closed` or
    /// `Error` has been returned, further calls keep returning `Closed`.
    async fn next_event(&mut self) -> TransportEvent;

    /// Closes the connection. Errors are ignored.
    async fn close(&mut self);
}

/// Opens session connections.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Opens a connection to a fully signed session URL.
    ///
    /// A handshake refused with HTTP 401/403 maps to
    /// [`SynthesisError::ServiceRejected`] with the status as code; any other
    /// failure maps to [`SynthesisError::TransportError`].
    async fn connect(&self, url: &str) -> SynthesisResult<Box<dyn SessionTransport>>;
}

// =============================================================================
// WebSocket Implementation
// =============================================================================

/// Connector backed by tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl SessionConnector for WebSocketConnector {
    async fn connect(&self, url: &str) -> SynthesisResult<Box<dyn SessionTransport>> {
        debug!(
            "Connecting to xfyun TTS: {}",
            url.split('?').next().unwrap_or(url)
        );

        match connect_async(url).await {
            Ok((stream, response)) => {
                debug!("xfyun TTS connected (status: {})", response.status());
                Ok(Box::new(WebSocketTransport::new(stream)))
            }
            Err(tungstenite::Error::Http(response)) => {
                let status = response.status();
                let body = response
                    .body()
                    .as_ref()
                    .map(|b| String::from_utf8_lossy(b).into_owned())
                    .unwrap_or_default();
                warn!("xfyun TTS handshake refused: {status}");

                if matches!(status.as_u16(), 401 | 403) {
                    Err(SynthesisError::ServiceRejected {
                        code: i64::from(status.as_u16()),
                        message: if body.is_empty() {
                            status.to_string()
                        } else {
                            body
                        },
                        sid: None,
                    })
                } else {
                    Err(SynthesisError::TransportError(format!(
                        "Handshake failed with HTTP {status}"
                    )))
                }
            }
            Err(e) => Err(SynthesisError::TransportError(format!(
                "WebSocket connection failed: {e}"
            ))),
        }
    }
}

/// An open tokio-tungstenite connection.
pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    finished: bool,
}

impl WebSocketTransport {
    pub fn new(stream: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Self {
        Self {
            stream,
            finished: false,
        }
    }

    fn finished_event() -> TransportEvent {
        TransportEvent::Closed {
            code: None,
            reason: "connection already closed".to_string(),
        }
    }
}

#[async_trait]
impl SessionTransport for WebSocketTransport {
    async fn send_text(&mut self, text: String) -> SynthesisResult<()> {
        trace!("Sending xfyun frame: {} bytes", text.len());
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| SynthesisError::TransportError(format!("Failed to send frame: {e}")))
    }

    async fn next_event(&mut self) -> TransportEvent {
        if self.finished {
            return Self::finished_event();
        }

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    trace!("Received xfyun text frame: {} bytes", text.len());
                    return TransportEvent::Frame(Bytes::copy_from_slice(text.as_str().as_bytes()));
                }
                Some(Ok(Message::Binary(data))) => {
                    trace!("Received xfyun binary frame: {} bytes", data.len());
                    return TransportEvent::Frame(data);
                }
                Some(Ok(Message::Close(frame))) => {
                    self.finished = true;
                    let (code, reason) = match frame {
                        Some(f) => (Some(u16::from(f.code)), f.reason.as_str().to_string()),
                        None => (None, String::new()),
                    };
                    return TransportEvent::Closed { code, reason };
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    self.finished = true;
                    return TransportEvent::Error(e.to_string());
                }
                None => {
                    self.finished = true;
                    return TransportEvent::Closed {
                        code: None,
                        reason: "stream ended".to_string(),
                    };
                }
            }
        }
    }

    async fn close(&mut self) {
        self.finished = true;
        if let Err(e) = self.stream.close(None).await {
            trace!("Ignoring close error: {e}");
        }
    }
}
