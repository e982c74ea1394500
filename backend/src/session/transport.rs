//! Per-session transport handle.
//!
//! Adapts individual HTTP request/response cycles to the long-lived protocol
//! session they belong to: JSON-RPC over POST, a server-push SSE stream over
//! GET, and termination over DELETE.

use super::SessionId;
use crate::mcp::{McpServer, Peer};
use axum::{
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::future::{join_all, BoxFuture};
use parking_lot::Mutex;
use serde_json::Value;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tether_types::jsonrpc::error_codes;
use tether_types::mcp::Implementation;
use tether_types::{
    negotiate_protocol_version, InitializeParams, JsonRpcMessage, JsonRpcPayload, JsonRpcRequest,
    JsonRpcResponse, LogLevel, PROTOCOL_VERSION_HEADER, SESSION_ID_HEADER,
    SUPPORTED_PROTOCOL_VERSIONS,
};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

/// Buffered server-push messages per session before slow streams lag.
const EVENT_BUFFER: usize = 100;

/// Interval between SSE keep-alive comments.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Callback fired once when a handle closes.
pub type CloseCallback = Box<dyn FnOnce(SessionId) -> BoxFuture<'static, ()> + Send>;

/// Messages pushed to a session's open streams.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    /// A serialized JSON-RPC message.
    JsonRpc(String),
}

/// Errors raised while a handle processes a request.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Not Acceptable: {0}")]
    NotAcceptable(&'static str),

    #[error("Bad Request: Unsupported protocol version ({0})")]
    UnsupportedProtocolVersion(String),

    #[error("Invalid Request: Server already initialized")]
    AlreadyInitialized,

    #[error("Bad Request: Server not initialized")]
    NotInitialized,

    #[error("Invalid Request: {0}")]
    InvalidRequest(String),

    #[error("Session not found")]
    Closed,
}

impl TransportError {
    fn status(&self) -> StatusCode {
        match self {
            TransportError::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            TransportError::Closed => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn code(&self) -> i32 {
        match self {
            TransportError::AlreadyInitialized | TransportError::InvalidRequest(_) => {
                error_codes::INVALID_REQUEST
            }
            TransportError::Closed => error_codes::SESSION_NOT_FOUND,
            _ => error_codes::SERVER_ERROR,
        }
    }
}

impl IntoResponse for TransportError {
    fn into_response(self) -> Response {
        let body = match &self {
            TransportError::UnsupportedProtocolVersion(_) => JsonRpcResponse::error(
                None,
                self.code(),
                format!(
                    "{} (supported versions: {})",
                    self,
                    SUPPORTED_PROTOCOL_VERSIONS.join(", ")
                ),
            ),
            _ => JsonRpcResponse::error(None, self.code(), self.to_string()),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Responses produced by one POST.
#[derive(Debug)]
pub struct PostOutcome {
    pub session_id: SessionId,
    pub responses: Vec<JsonRpcResponse>,
    pub batch: bool,
}

impl PostOutcome {
    /// Whether any response in the outcome is a JSON-RPC error.
    pub fn has_error(&self) -> bool {
        self.responses.iter().any(JsonRpcResponse::is_error)
    }
}

impl IntoResponse for PostOutcome {
    fn into_response(self) -> Response {
        let mut responses = self.responses;
        let mut resp = if responses.is_empty() {
            StatusCode::ACCEPTED.into_response()
        } else if self.batch {
            (StatusCode::OK, Json(responses)).into_response()
        } else {
            (StatusCode::OK, Json(responses.remove(0))).into_response()
        };
        insert_session_header(&mut resp, &self.session_id);
        resp
    }
}

#[derive(Debug, Default)]
struct ProtocolState {
    initialized: bool,
    protocol_version: Option<String>,
    client_info: Option<Implementation>,
    log_level: LogLevel,
}

/// Transport bound to one session and its protocol server.
pub struct TransportHandle {
    session_id: SessionId,
    server: Arc<McpServer>,
    protocol: Mutex<ProtocolState>,
    closed: AtomicBool,
    /// Taken on close so every open stream ends.
    events: Mutex<Option<broadcast::Sender<SessionEvent>>>,
    subscribers: Arc<AtomicUsize>,
    on_close: Mutex<Option<CloseCallback>>,
}

impl TransportHandle {
    /// Create a handle for a new session, bound to the given server.
    pub fn new(session_id: SessionId, server: Arc<McpServer>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            session_id,
            server,
            protocol: Mutex::new(ProtocolState::default()),
            closed: AtomicBool::new(false),
            events: Mutex::new(Some(event_tx)),
            subscribers: Arc::new(AtomicUsize::new(0)),
            on_close: Mutex::new(None),
        }
    }

    /// Register the callback fired when this handle closes.
    pub fn set_on_close<F>(&self, callback: F)
    where
        F: FnOnce(SessionId) -> BoxFuture<'static, ()> + Send + 'static,
    {
        *self.on_close.lock() = Some(Box::new(callback));
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn is_initialized(&self) -> bool {
        self.protocol.lock().initialized
    }

    /// Protocol version negotiated during the handshake.
    pub fn protocol_version(&self) -> Option<String> {
        self.protocol.lock().protocol_version.clone()
    }

    /// Client name and version sent during the handshake.
    pub fn client_info(&self) -> Option<Implementation> {
        self.protocol.lock().client_info.clone()
    }

    /// Number of currently open push streams.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::SeqCst)
    }

    /// Process a POSTed JSON-RPC message or batch.
    pub async fn handle_post(
        &self,
        headers: &HeaderMap,
        payload: JsonRpcPayload,
    ) -> Result<PostOutcome, TransportError> {
        self.ensure_open()?;
        if !accepts(headers, "application/json") {
            return Err(TransportError::NotAcceptable(
                "Client must accept application/json",
            ));
        }

        let batch = payload.is_batch();
        let messages = payload.into_messages();
        if messages.is_empty() {
            return Err(TransportError::InvalidRequest("Empty batch".to_string()));
        }

        let init_params = messages
            .iter()
            .filter_map(JsonRpcMessage::as_request)
            .find(|req| req.is_initialize())
            .and_then(|req| req.params.clone());

        match init_params {
            Some(params) => {
                if messages.len() > 1 {
                    return Err(TransportError::InvalidRequest(
                        "Only one initialization request is allowed".to_string(),
                    ));
                }
                self.begin_initialize(params)?;
            }
            None => {
                if !self.is_initialized() {
                    return Err(TransportError::NotInitialized);
                }
                self.validate_protocol_version(headers)?;
            }
        }

        let responses = join_all(messages.into_iter().map(|m| self.dispatch(m)))
            .await
            .into_iter()
            .flatten()
            .collect();

        Ok(PostOutcome {
            session_id: self.session_id.clone(),
            responses,
            batch,
        })
    }

    /// Open a server-push SSE stream for this session.
    ///
    /// The stream lives until the client disconnects or the handle closes.
    pub fn open_stream(&self, headers: &HeaderMap) -> Result<Response, TransportError> {
        self.ensure_open()?;
        if !accepts(headers, "text/event-stream") {
            return Err(TransportError::NotAcceptable(
                "Client must accept text/event-stream",
            ));
        }
        self.validate_protocol_version(headers)?;

        let rx = self
            .events
            .lock()
            .as_ref()
            .map(|tx| tx.subscribe())
            .ok_or(TransportError::Closed)?;

        let guard = SubscriberGuard::new(self.session_id.clone(), self.subscribers.clone());
        info!("MCP: SSE stream opened for session {}", self.session_id);

        let stream = BroadcastStream::new(rx).filter_map(move |result| {
            let _held = &guard;
            match result {
                Ok(SessionEvent::JsonRpc(json)) => {
                    Some(Ok::<_, Infallible>(Event::default().event("message").data(json)))
                }
                Err(e) => {
                    warn!("MCP: stream lagging, skipping events: {}", e);
                    None
                }
            }
        });

        let mut resp = Sse::new(stream)
            .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
            .into_response();
        insert_session_header(&mut resp, &self.session_id);
        Ok(resp)
    }

    /// Terminate the session on client request.
    pub async fn terminate(&self, headers: &HeaderMap) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.validate_protocol_version(headers)?;
        self.close().await;
        Ok(())
    }

    /// Close the handle: end all streams and fire the close callback.
    ///
    /// Returns `false` if the handle was already closed.
    pub async fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.events.lock().take();
        let callback = self.on_close.lock().take();
        info!("MCP: Transport closed for session {}", self.session_id);
        if let Some(callback) = callback {
            callback(self.session_id.clone()).await;
        }
        true
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.is_closed() {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }

    fn begin_initialize(&self, params: Value) -> Result<(), TransportError> {
        let params: InitializeParams = serde_json::from_value(params)
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        let mut protocol = self.protocol.lock();
        if protocol.initialized {
            warn!(
                "MCP: Rejecting repeated initialize on session {}",
                self.session_id
            );
            return Err(TransportError::AlreadyInitialized);
        }
        protocol.initialized = true;
        protocol.protocol_version =
            Some(negotiate_protocol_version(&params.protocol_version).to_string());
        debug!(
            "MCP: Session {} initialized by {} {}",
            self.session_id, params.client_info.name, params.client_info.version
        );
        protocol.client_info = Some(params.client_info);
        Ok(())
    }

    fn validate_protocol_version(&self, headers: &HeaderMap) -> Result<(), TransportError> {
        let Some(value) = headers.get(PROTOCOL_VERSION_HEADER) else {
            return Ok(());
        };
        let version = value.to_str().unwrap_or_default();
        if SUPPORTED_PROTOCOL_VERSIONS.contains(&version) {
            Ok(())
        } else {
            Err(TransportError::UnsupportedProtocolVersion(version.to_string()))
        }
    }

    async fn dispatch(&self, message: JsonRpcMessage) -> Option<JsonRpcResponse> {
        match message {
            JsonRpcMessage::Request(request) => self.server.handle_request(self, request).await,
            JsonRpcMessage::Response(response) => {
                debug!(
                    "MCP: Ignoring client response {:?} on session {}",
                    response.id, self.session_id
                );
                None
            }
        }
    }
}

impl Peer for TransportHandle {
    fn session_id(&self) -> &str {
        self.session_id.as_str()
    }

    fn notify(&self, notification: JsonRpcRequest) -> usize {
        let json = match serde_json::to_string(&notification) {
            Ok(json) => json,
            Err(e) => {
                warn!("MCP: Failed to serialize notification: {}", e);
                return 0;
            }
        };
        self.events
            .lock()
            .as_ref()
            .and_then(|tx| tx.send(SessionEvent::JsonRpc(json)).ok())
            .unwrap_or(0)
    }

    fn log_level(&self) -> LogLevel {
        self.protocol.lock().log_level
    }

    fn set_log_level(&self, level: LogLevel) {
        self.protocol.lock().log_level = level;
    }
}

/// Tracks one open stream; released when the stream is dropped.
struct SubscriberGuard {
    session_id: SessionId,
    count: Arc<AtomicUsize>,
}

impl SubscriberGuard {
    fn new(session_id: SessionId, count: Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self { session_id, count }
    }
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
        debug!("MCP: SSE stream closed for session {}", self.session_id);
    }
}

fn insert_session_header(resp: &mut Response, session_id: &SessionId) {
    if let Ok(hv) = HeaderValue::from_str(session_id.as_str()) {
        resp.headers_mut()
            .insert(HeaderName::from_static(SESSION_ID_HEADER), hv);
    }
}

/// Whether the Accept header admits `mime`. A missing header accepts anything.
fn accepts(headers: &HeaderMap, mime: &str) -> bool {
    let Some(accept) = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()) else {
        return true;
    };
    let wildcard = mime
        .split_once('/')
        .map(|(kind, _)| format!("{kind}/*"))
        .unwrap_or_default();
    accept
        .split(',')
        .filter_map(|range| range.split(';').next())
        .map(str::trim)
        .any(|range| range == mime || range == "*/*" || range == wildcard)
}
