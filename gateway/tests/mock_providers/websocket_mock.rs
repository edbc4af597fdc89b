//! WebSocket mock of the xfyun streaming TTS service
//!
//! Verifies the signed handshake exactly as the real service does (refusing
//! bad signatures with HTTP 401), then answers the single request frame
//! according to a [`MockBehavior`].

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

use transit_voice_gateway::core::tts::xfyun::{XfyunCredentials, auth::sign_request};

/// How the mock answers a request frame
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Echo the request text back as audio, `chunk_size` bytes per frame
    Echo { chunk_size: usize },
    /// Send these chunks; only the last carries status 2
    Chunks(Vec<Vec<u8>>),
    /// Answer with a business error code
    Reject { code: i64, message: String },
    /// Send `chunks` intermediate frames, then close without a final frame
    CloseEarly { chunks: usize },
    /// Send a frame that is not JSON
    Garbage,
    /// Accept the request and never answer
    Stall,
}

/// Mock server state shared with the test
pub struct XfyunMockState {
    pub credentials: XfyunCredentials,
    pub behavior: MockBehavior,
    pub connection_count: AtomicU64,
    pub rejected_handshakes: AtomicU64,
    pub requests: Mutex<Vec<Value>>,
}

impl XfyunMockState {
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

/// A running mock server
pub struct XfyunMockServer {
    pub addr: SocketAddr,
    pub state: Arc<XfyunMockState>,
    handle: JoinHandle<()>,
}

impl XfyunMockServer {
    /// Starts a mock on an ephemeral port that accepts `credentials`.
    pub async fn start(credentials: XfyunCredentials, behavior: MockBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let state = Arc::new(XfyunMockState {
            credentials,
            behavior,
            connection_count: AtomicU64::new(0),
            rejected_handshakes: AtomicU64::new(0),
            requests: Mutex::new(Vec::new()),
        });

        let accept_state = state.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let state = accept_state.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, state).await {
                        eprintln!("xfyun mock connection error: {e}");
                    }
                });
            }
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// Endpoint URL to configure the client with
    pub fn endpoint(&self) -> String {
        format!("ws://{}/v2/tts", self.addr)
    }
}

impl Drop for XfyunMockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn query_param(query: &str, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// Checks the signed query string; `Err` carries the refusal reason.
fn verify_handshake(request: &Request, credentials: &XfyunCredentials) -> Result<(), String> {
    let query = request.uri().query().ok_or("missing query string")?;
    let authorization = query_param(query, "authorization").ok_or("missing authorization")?;
    let date = query_param(query, "date").ok_or("missing date")?;
    let host = query_param(query, "host").ok_or("missing host")?;

    let expected =
        sign_request(&host, request.uri().path(), &date, credentials).map_err(|e| e.to_string())?;
    if expected.authorization != authorization {
        return Err("HMAC signature does not match".to_string());
    }
    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<XfyunMockState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let handshake_state = state.clone();
    let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        match verify_handshake(request, &handshake_state.credentials) {
            Ok(()) => Ok(response),
            Err(reason) => {
                handshake_state
                    .rejected_handshakes
                    .fetch_add(1, Ordering::Relaxed);
                Err(http::Response::builder()
                    .status(http::StatusCode::UNAUTHORIZED)
                    .body(Some(json!({ "message": reason }).to_string()))
                    .unwrap())
            }
        }
    };

    let ws_stream = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        // Refused handshakes end here
        Err(_) => return Ok(()),
    };
    let (mut write, mut read) = ws_stream.split();
    let conn_id = state.connection_count.fetch_add(1, Ordering::Relaxed) + 1;
    let sid = format!("tts-mock-{conn_id}");

    let request: Value = loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => break serde_json::from_str(text.as_str())?,
            Some(Ok(Message::Close(_))) | None => return Ok(()),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    };
    state.requests.lock().unwrap().push(request.clone());

    let frame = |audio: &[u8], status: u8| {
        Message::Text(
            json!({
                "code": 0,
                "message": "success",
                "sid": sid,
                "data": { "audio": BASE64.encode(audio), "status": status, "ced": "0" }
            })
            .to_string()
            .into(),
        )
    };

    match &state.behavior {
        MockBehavior::Echo { chunk_size } => {
            let text = BASE64.decode(request["data"]["text"].as_str().unwrap_or_default())?;
            let chunks: Vec<&[u8]> = text.chunks((*chunk_size).max(1)).collect();
            for (i, chunk) in chunks.iter().enumerate() {
                let status = if i + 1 == chunks.len() { 2 } else if i == 0 { 0 } else { 1 };
                write.send(frame(chunk, status)).await?;
            }
        }
        MockBehavior::Chunks(chunks) => {
            for (i, chunk) in chunks.iter().enumerate() {
                let status = if i + 1 == chunks.len() { 2 } else { 1 };
                write.send(frame(chunk, status)).await?;
            }
        }
        MockBehavior::Reject { code, message } => {
            let error = json!({ "code": code, "message": message, "sid": sid });
            write.send(Message::Text(error.to_string().into())).await?;
        }
        MockBehavior::CloseEarly { chunks } => {
            for _ in 0..*chunks {
                write.send(frame(&[0xFF, 0xF3], 1)).await?;
            }
            write.send(Message::Close(None)).await?;
            return Ok(());
        }
        MockBehavior::Garbage => {
            write.send(Message::Text("<html>bad gateway</html>".into())).await?;
        }
        MockBehavior::Stall => {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
    }

    // Drain until the client closes
    while let Some(Ok(msg)) = read.next().await {
        if msg.is_close() {
            break;
        }
    }
    Ok(())
}
