//! xfyun synthesis client and per-call session state machine.
//!
//! Each call to [`XfyunTts::synthesize`] signs a fresh URL, opens its own
//! socket, sends one request frame and drives a [`SynthesisSession`] until it
//! settles. Nothing is shared between calls except the immutable config and
//! the connector.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::CREDENTIAL_ERROR_CODES;
use super::auth::{build_session_url, rfc1123_now};
use super::config::{XfyunCredentials, XfyunTtsConfig};
use super::messages::{ServiceFrame, SynthesisRequestFrame};
use super::transport::{SessionConnector, SessionTransport, TransportEvent, WebSocketConnector};

// =============================================================================
// Errors
// =============================================================================

/// Failure of one synthesis call.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SynthesisError {
    /// The service answered with a non-zero code, or refused the handshake.
    #[error("Service rejected request (code {code}): {message}")]
    ServiceRejected {
        code: i64,
        message: String,
        sid: Option<String>,
    },

    /// Connection refused, reset, TLS or handshake failure.
    #[error("Transport error: {0}")]
    TransportError(String),

    /// An inbound frame was not valid JSON or carried undecodable audio.
    #[error("Protocol parse error: {0}")]
    ProtocolParseError(String),

    /// The session closed before the final chunk arrived.
    #[error("Session closed before the final audio chunk ({chunks_received} chunks received)")]
    IncompleteStream { chunks_received: usize },

    #[error("Synthesis timed out after {0:?}")]
    Timeout(Duration),

    #[error("Synthesis cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl SynthesisError {
    /// Whether the failure means the credentials were refused.
    pub fn is_credentials_invalid(&self) -> bool {
        matches!(self, Self::ServiceRejected { code, .. } if CREDENTIAL_ERROR_CODES.contains(code))
    }

    /// Short machine-readable name, used in logs and HTTP responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ServiceRejected { .. } => "service_rejected",
            Self::TransportError(_) => "transport_error",
            Self::ProtocolParseError(_) => "protocol_parse_error",
            Self::IncompleteStream { .. } => "incomplete_stream",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
            Self::InvalidConfiguration(_) => "invalid_configuration",
        }
    }
}

pub type SynthesisResult<T> = Result<T, SynthesisError>;

// =============================================================================
// Session State Machine
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Streaming,
    Succeeded,
    Failed,
}

impl SessionState {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// State of one synthesis session.
///
/// The outcome is single-assignment: the first event that settles the session
/// returns `Some(outcome)`, every later event returns `None` and changes
/// nothing.
#[derive(Debug)]
pub struct SynthesisSession {
    state: SessionState,
    audio: BytesMut,
    chunks_received: usize,
    sid: Option<String>,
}

impl Default for SynthesisSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SynthesisSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Connecting,
            audio: BytesMut::new(),
            chunks_received: 0,
            sid: None,
        }
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of audio chunks appended so far.
    #[inline]
    pub fn chunks_received(&self) -> usize {
        self.chunks_received
    }

    /// Session ID reported by the service, if any frame carried one.
    pub fn sid(&self) -> Option<&str> {
        self.sid.as_deref()
    }

    /// The socket is open.
    pub fn opened(&mut self) {
        if self.state == SessionState::Connecting {
            self.state = SessionState::Open;
        }
    }

    /// The request frame has been sent.
    pub fn request_sent(&mut self) {
        if self.state == SessionState::Open {
            self.state = SessionState::Streaming;
        }
    }

    /// Applies one inbound frame.
    pub fn on_frame(&mut self, raw: &[u8]) -> Option<SynthesisResult<Bytes>> {
        if self.state.is_terminal() {
            debug!("Ignoring frame after session settled");
            return None;
        }

        let frame = match ServiceFrame::parse(raw) {
            Ok(frame) => frame,
            Err(e) => {
                return self.fail(SynthesisError::ProtocolParseError(format!(
                    "Invalid service frame: {e}"
                )));
            }
        };

        if frame.sid.is_some() {
            self.sid.clone_from(&frame.sid);
        }

        if !frame.is_success() {
            return self.fail(SynthesisError::ServiceRejected {
                code: frame.code,
                message: frame.message.unwrap_or_default(),
                sid: frame.sid,
            });
        }

        let payload = match frame.payload() {
            Ok(payload) => payload,
            Err(e) => {
                return self.fail(SynthesisError::ProtocolParseError(format!(
                    "Invalid audio block: {e}"
                )));
            }
        };

        let chunk = match payload.decode_audio() {
            Ok(chunk) => chunk,
            Err(e) => {
                return self.fail(SynthesisError::ProtocolParseError(format!(
                    "Invalid audio payload: {e}"
                )));
            }
        };

        self.state = SessionState::Streaming;
        if !chunk.is_empty() {
            self.audio.extend_from_slice(&chunk);
            self.chunks_received += 1;
        }

        if payload.is_final() {
            self.state = SessionState::Succeeded;
            return Some(Ok(self.audio.split().freeze()));
        }

        None
    }

    /// The connection closed.
    pub fn on_closed(&mut self, code: Option<u16>, reason: &str) -> Option<SynthesisResult<Bytes>> {
        if self.state.is_terminal() {
            return None;
        }
        debug!(?code, reason, "Session closed before final chunk");
        self.fail(SynthesisError::IncompleteStream {
            chunks_received: self.chunks_received,
        })
    }

    /// The connection failed.
    pub fn on_transport_error(&mut self, cause: impl Into<String>) -> Option<SynthesisResult<Bytes>> {
        self.fail(SynthesisError::TransportError(cause.into()))
    }

    /// Settles the session with `error` unless it is already settled.
    pub fn fail(&mut self, error: SynthesisError) -> Option<SynthesisResult<Bytes>> {
        if self.state.is_terminal() {
            return None;
        }
        self.state = SessionState::Failed;
        self.audio.clear();
        Some(Err(error))
    }
}

// =============================================================================
// Client
// =============================================================================

enum Step {
    Event(TransportEvent),
    Cancelled,
    Expired,
}

/// Streaming synthesis client.
///
/// Cheap to clone; holds only the validated configuration and the connector.
#[derive(Clone)]
pub struct XfyunTts {
    config: XfyunTtsConfig,
    endpoint: Url,
    connector: Arc<dyn SessionConnector>,
}

impl fmt::Debug for XfyunTts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XfyunTts")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl XfyunTts {
    /// Creates a client that connects over WebSocket.
    pub fn new(config: XfyunTtsConfig) -> SynthesisResult<Self> {
        Self::with_connector(config, Arc::new(WebSocketConnector))
    }

    /// Creates a client with a custom connector.
    pub fn with_connector(
        config: XfyunTtsConfig,
        connector: Arc<dyn SessionConnector>,
    ) -> SynthesisResult<Self> {
        config
            .validate()
            .map_err(SynthesisError::InvalidConfiguration)?;
        let endpoint = config
            .endpoint_url()
            .map_err(SynthesisError::InvalidConfiguration)?;
        Ok(Self {
            config,
            endpoint,
            connector,
        })
    }

    /// Same connector, different business parameters.
    pub fn with_config(&self, config: XfyunTtsConfig) -> SynthesisResult<Self> {
        Self::with_connector(config, self.connector.clone())
    }

    pub fn config(&self) -> &XfyunTtsConfig {
        &self.config
    }

    /// Synthesizes `text` and returns the complete audio buffer.
    ///
    /// Single attempt; no internal timeout.
    pub async fn synthesize(
        &self,
        text: &str,
        credentials: &XfyunCredentials,
    ) -> SynthesisResult<Bytes> {
        self.run(text, credentials, &CancellationToken::new(), None)
            .await
    }

    /// Like [`synthesize`](Self::synthesize), but force-closes the session and
    /// returns [`SynthesisError::Cancelled`] once `cancel` fires.
    pub async fn synthesize_until_cancelled(
        &self,
        text: &str,
        credentials: &XfyunCredentials,
        cancel: CancellationToken,
    ) -> SynthesisResult<Bytes> {
        self.run(text, credentials, &cancel, None).await
    }

    /// Like [`synthesize`](Self::synthesize), but force-closes the session and
    /// returns [`SynthesisError::Timeout`] after `limit`.
    pub async fn synthesize_with_timeout(
        &self,
        text: &str,
        credentials: &XfyunCredentials,
        limit: Duration,
    ) -> SynthesisResult<Bytes> {
        self.run(text, credentials, &CancellationToken::new(), Some(limit))
            .await
    }

    async fn run(
        &self,
        text: &str,
        credentials: &XfyunCredentials,
        cancel: &CancellationToken,
        limit: Option<Duration>,
    ) -> SynthesisResult<Bytes> {
        let expiry = async move {
            match limit {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expiry);

        let (url, _) = build_session_url(&self.endpoint, &rfc1123_now(), credentials)?;
        let request = SynthesisRequestFrame::new(text, &self.config, credentials)
            .to_json()
            .map_err(|e| SynthesisError::ProtocolParseError(format!("Failed to encode request: {e}")))?;

        let mut session = SynthesisSession::new();
        debug!(chars = text.chars().count(), voice = %self.config.voice, "Starting xfyun synthesis");

        let mut transport = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SynthesisError::Cancelled),
            _ = &mut expiry => return Err(Self::timeout_error(limit)),
            connected = self.connector.connect(&url) => match connected {
                Ok(transport) => transport,
                Err(e) => {
                    warn!(kind = e.kind(), "xfyun session failed to open: {e}");
                    return Err(e);
                }
            },
        };
        session.opened();

        let outcome = self
            .drive(&mut session, transport.as_mut(), request, cancel, expiry, limit)
            .await;
        transport.close().await;

        match &outcome {
            Ok(audio) => info!(
                bytes = audio.len(),
                chunks = session.chunks_received(),
                sid = session.sid().unwrap_or("-"),
                "xfyun synthesis complete"
            ),
            Err(e) => warn!(
                kind = e.kind(),
                sid = session.sid().unwrap_or("-"),
                "xfyun synthesis failed: {e}"
            ),
        }
        outcome
    }

    async fn drive(
        &self,
        session: &mut SynthesisSession,
        transport: &mut dyn SessionTransport,
        request: String,
        cancel: &CancellationToken,
        mut expiry: std::pin::Pin<&mut impl std::future::Future<Output = ()>>,
        limit: Option<Duration>,
    ) -> SynthesisResult<Bytes> {
        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SynthesisError::Cancelled),
            _ = &mut expiry => Err(Self::timeout_error(limit)),
            sent = transport.send_text(request) => sent,
        };
        if let Err(e) = sent {
            return session.fail(e.clone()).unwrap_or(Err(e));
        }
        session.request_sent();

        loop {
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => Step::Cancelled,
                _ = &mut expiry => Step::Expired,
                event = transport.next_event() => Step::Event(event),
            };

            let settled = match step {
                Step::Cancelled => session.fail(SynthesisError::Cancelled),
                Step::Expired => session.fail(Self::timeout_error(limit)),
                Step::Event(TransportEvent::Frame(raw)) => session.on_frame(&raw),
                Step::Event(TransportEvent::Closed { code, reason }) => {
                    session.on_closed(code, &reason)
                }
                Step::Event(TransportEvent::Error(cause)) => session.on_transport_error(cause),
            };

            if let Some(outcome) = settled {
                return outcome;
            }
        }
    }

    fn timeout_error(limit: Option<Duration>) -> SynthesisError {
        SynthesisError::Timeout(limit.unwrap_or_default())
    }
}
