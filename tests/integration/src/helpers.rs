//! Mock servers for integration tests
//!
//! [`MockApi`] is an axum app standing in for the REST API, with routes that
//! rate limit, fail, and succeed in scripted ways. [`MockGateway`] accepts
//! real WebSocket connections, answers Identify with READY and Resume with
//! RESUMED, and reports every client frame back to the test.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use crate::fixtures::{
    dispatch, gateway_bot, heartbeat_ack, hello, message_create, ready, OP_HEARTBEAT,
    OP_IDENTIFY, OP_RESUME,
};

/// Upper bound for anything a test waits on
pub const WAIT: Duration = Duration::from_secs(10);

/// Await a future, failing the test if it takes longer than [`WAIT`]
pub async fn within<F: std::future::Future>(future: F) -> F::Output {
    tokio::time::timeout(WAIT, future)
        .await
        .unwrap_or_else(|_| panic!("timed out after {WAIT:?}"))
}

// ============================================================================
// REST
// ============================================================================

/// What the mock API has seen
#[derive(Debug, Default)]
pub struct ApiRecord {
    pub paths: Mutex<Vec<String>>,
    pub authorization: Mutex<Option<String>>,
    pub audit_reason: Mutex<Option<String>>,
    pub user_agent: Mutex<Option<String>>,
}

impl ApiRecord {
    pub fn hits(&self, path: &str) -> usize {
        self.paths.lock().iter().filter(|p| *p == path).count()
    }
}

struct ApiState {
    gateway_url: String,
    shards: u32,
    max_concurrency: u32,
    record: Arc<ApiRecord>,
    message_attempts: AtomicU32,
    profile_attempts: AtomicU32,
}

impl ApiState {
    fn observe(&self, uri: &Uri, headers: &HeaderMap) {
        self.record.paths.lock().push(uri.path().to_string());
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        *self.record.authorization.lock() = header("authorization");
        *self.record.user_agent.lock() = header("user-agent");
        if let Some(reason) = header("x-audit-log-reason") {
            *self.record.audit_reason.lock() = Some(reason);
        }
    }
}

/// In-process REST API
pub struct MockApi {
    pub addr: SocketAddr,
    pub record: Arc<ApiRecord>,
    _handle: JoinHandle<()>,
}

impl MockApi {
    /// Start the API; `/gateway/bot` points clients at `gateway_url`
    pub async fn start(gateway_url: &str, shards: u32, max_concurrency: u32) -> Result<Self> {
        let record = Arc::new(ApiRecord::default());
        let state = Arc::new(ApiState {
            gateway_url: gateway_url.to_string(),
            shards,
            max_concurrency,
            record: Arc::clone(&record),
            message_attempts: AtomicU32::new(0),
            profile_attempts: AtomicU32::new(0),
        });

        let app = Router::new()
            .route("/gateway", get(get_gateway))
            .route("/gateway/bot", get(get_gateway_bot))
            .route("/channels/:channel_id/messages", post(create_message))
            .route("/guilds/:guild_id", get(get_guild))
            .route("/users/@me", get(get_current_user))
            .with_state(state);

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            record,
            _handle: handle,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

async fn get_gateway(
    State(state): State<Arc<ApiState>>,
    uri: Uri,
    headers: HeaderMap,
) -> Json<Value> {
    state.observe(&uri, &headers);
    Json(json!({"url": state.gateway_url}))
}

async fn get_gateway_bot(
    State(state): State<Arc<ApiState>>,
    uri: Uri,
    headers: HeaderMap,
) -> Json<Value> {
    state.observe(&uri, &headers);
    Json(gateway_bot(
        &state.gateway_url,
        state.shards,
        state.max_concurrency,
    ))
}

/// Rate limited on the first attempt, then succeeds
async fn create_message(
    State(state): State<Arc<ApiState>>,
    Path(channel_id): Path<String>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.observe(&uri, &headers);

    if state.message_attempts.fetch_add(1, Ordering::SeqCst) == 0 {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [
                ("x-ratelimit-limit", "5"),
                ("x-ratelimit-remaining", "0"),
                ("x-ratelimit-reset-after", "0.2"),
                ("x-ratelimit-bucket", "message-bucket"),
                ("x-ratelimit-scope", "user"),
            ],
            Json(json!({
                "message": "You are being rate limited.",
                "retry_after": 0.2,
                "global": false
            })),
        )
            .into_response();
    }

    (
        StatusCode::OK,
        [
            ("x-ratelimit-limit", "5"),
            ("x-ratelimit-remaining", "4"),
            ("x-ratelimit-reset-after", "1.0"),
            ("x-ratelimit-bucket", "message-bucket"),
        ],
        Json(json!({
            "id": "1000",
            "channel_id": channel_id,
            "content": body["content"]
        })),
    )
        .into_response()
}

async fn get_guild(
    State(state): State<Arc<ApiState>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    state.observe(&uri, &headers);
    (
        StatusCode::NOT_FOUND,
        Json(json!({"code": 10004, "message": "Unknown Guild"})),
    )
        .into_response()
}

/// Fails with 500 on the first attempt
async fn get_current_user(
    State(state): State<Arc<ApiState>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    state.observe(&uri, &headers);

    if state.profile_attempts.fetch_add(1, Ordering::SeqCst) == 0 {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    Json(json!({"id": "1", "username": "bot"})).into_response()
}

// ============================================================================
// Gateway
// ============================================================================

/// Scripted gateway behavior
#[derive(Debug, Clone)]
pub struct GatewayBehavior {
    pub heartbeat_interval: u64,
    /// Close the first connection with this code right after READY
    pub close_first_connection_with: Option<u16>,
}

impl Default for GatewayBehavior {
    fn default() -> Self {
        Self {
            heartbeat_interval: 45_000,
            close_first_connection_with: None,
        }
    }
}

/// Something a client did on one connection
#[derive(Debug, Clone)]
pub enum GatewayFrame {
    Received { connection: usize, payload: Value },
    Closed { connection: usize, code: Option<u16> },
}

struct GatewayShared {
    url: String,
    behavior: GatewayBehavior,
    frames: mpsc::UnboundedSender<GatewayFrame>,
}

/// In-process gateway server
pub struct MockGateway {
    pub url: String,
    frames: mpsc::UnboundedReceiver<GatewayFrame>,
    _handle: JoinHandle<()>,
}

impl MockGateway {
    pub async fn start(behavior: GatewayBehavior) -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let url = format!("ws://{}/gateway", listener.local_addr()?);
        let (frames_tx, frames) = mpsc::unbounded_channel();

        let shared = Arc::new(GatewayShared {
            url: url.clone(),
            behavior,
            frames: frames_tx,
        });

        let handle = tokio::spawn(async move {
            let connections = AtomicUsize::new(0);
            while let Ok((stream, _)) = listener.accept().await {
                let connection = connections.fetch_add(1, Ordering::SeqCst);
                let shared = Arc::clone(&shared);
                tokio::spawn(async move {
                    if let Err(e) = serve_connection(stream, connection, shared).await {
                        eprintln!("mock gateway connection {connection} failed: {e:#}");
                    }
                });
            }
        });

        Ok(Self {
            url,
            frames,
            _handle: handle,
        })
    }

    /// Next frame from any connection
    pub async fn next_frame(&mut self) -> GatewayFrame {
        within(self.frames.recv())
            .await
            .unwrap_or_else(|| panic!("mock gateway stopped"))
    }

    /// Skip frames until a payload with the given opcode arrives
    pub async fn expect_op(&mut self, op: u64) -> (usize, Value) {
        loop {
            if let GatewayFrame::Received {
                connection,
                payload,
            } = self.next_frame().await
            {
                if payload["op"].as_u64() == Some(op) {
                    return (connection, payload);
                }
            }
        }
    }

    /// Skip frames until a connection is closed by the client
    pub async fn expect_close(&mut self) -> (usize, Option<u16>) {
        loop {
            if let GatewayFrame::Closed { connection, code } = self.next_frame().await {
                return (connection, code);
            }
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    connection: usize,
    shared: Arc<GatewayShared>,
) -> Result<()> {
    let ws = tokio_tungstenite::accept_async(stream)
        .await
        .context("websocket handshake")?;
    let (mut write, mut read) = ws.split();

    write
        .send(Message::Text(
            hello(shared.behavior.heartbeat_interval).to_string(),
        ))
        .await?;

    while let Some(message) = read.next().await {
        let text = match message? {
            Message::Text(text) => text,
            Message::Close(frame) => {
                let code = frame.map(|f| u16::from(f.code));
                let _ = shared.frames.send(GatewayFrame::Closed { connection, code });
                return Ok(());
            }
            _ => continue,
        };

        let payload: Value = serde_json::from_str(&text)?;
        let _ = shared.frames.send(GatewayFrame::Received {
            connection,
            payload: payload.clone(),
        });

        let mut replies = Vec::new();
        let mut close_with = None;
        match payload["op"].as_u64() {
            Some(OP_IDENTIFY) => {
                let shard = payload["d"]["shard"].clone();
                let shard_id = shard[0].as_u64().unwrap_or(0);
                replies.push(ready(1, &format!("session-{shard_id}"), shard, &shared.url));
                replies.push(message_create(
                    2,
                    "42",
                    &format!("hello from shard {shard_id}"),
                ));
                if connection == 0 {
                    close_with = shared.behavior.close_first_connection_with;
                }
            }
            Some(OP_RESUME) => {
                let seq = payload["d"]["seq"].as_u64().unwrap_or(0);
                replies.push(dispatch("RESUMED", seq + 1, json!({})));
            }
            Some(OP_HEARTBEAT) => replies.push(heartbeat_ack()),
            _ => {}
        }

        for reply in replies {
            write.send(Message::Text(reply.to_string())).await?;
        }

        if let Some(code) = close_with {
            write
                .send(Message::Close(Some(CloseFrame {
                    code: CloseCode::from(code),
                    reason: "".into(),
                })))
                .await?;
        }
    }

    let _ = shared.frames.send(GatewayFrame::Closed {
        connection,
        code: None,
    });
    Ok(())
}
