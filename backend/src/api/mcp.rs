//! MCP Streamable HTTP endpoint handlers.
//!
//! Resolves each request to a session transport, or creates one for a
//! handshake, and forwards the request to it.
//!
//! ## Endpoints
//!
//! - `POST /mcp` - Send JSON-RPC requests (creates a session on `initialize`)
//! - `GET /mcp` - Open SSE stream for server-initiated messages
//! - `DELETE /mcp` - Terminate a session

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tether_types::jsonrpc::error_codes;
use tether_types::{JsonRpcPayload, JsonRpcResponse, SESSION_ID_HEADER};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::session::{SessionId, TransportError, TransportHandle};
use crate::state::AppState;

/// Failures to resolve a request to a session.
///
/// These never create a session and never reach a transport.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// POST without a usable session and without a handshake.
    #[error("Bad Request: No valid session ID provided")]
    NoValidSession,

    /// GET or DELETE without a usable session.
    #[error("Invalid or missing session ID")]
    InvalidOrMissingSession,

    /// POST body for a resolved session is not JSON-RPC.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl IntoResponse for RoutingError {
    fn into_response(self) -> Response {
        match self {
            RoutingError::NoValidSession => (
                StatusCode::BAD_REQUEST,
                Json(JsonRpcResponse::error(
                    None,
                    error_codes::SERVER_ERROR,
                    self.to_string(),
                )),
            )
                .into_response(),
            RoutingError::InvalidOrMissingSession => {
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
            RoutingError::Parse(_) => (
                StatusCode::BAD_REQUEST,
                Json(JsonRpcResponse::error(
                    None,
                    error_codes::PARSE_ERROR,
                    self.to_string(),
                )),
            )
                .into_response(),
        }
    }
}

/// Extract session ID from headers.
fn get_session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Look up the transport for the request's session header.
async fn resolve_session(state: &AppState, headers: &HeaderMap) -> Option<Arc<TransportHandle>> {
    let session_id = get_session_id(headers)?;
    let handle = state.sessions().get(&session_id).await;
    if handle.is_none() {
        debug!("MCP: Unknown or expired session {}", session_id);
    }
    handle
}

/// POST /mcp - Handle JSON-RPC requests.
///
/// A request with a known `mcp-session-id` goes to that session. A request
/// without the header is accepted only if it is an `initialize` handshake,
/// which creates a new session whose id is returned in the response header.
/// Anything else gets the routing error, whatever the body holds.
pub async fn mcp_post(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let session_id = get_session_id(&headers);
    debug!("MCP POST: session={:?}", session_id);

    if session_id.is_some() {
        let Some(handle) = resolve_session(&state, &headers).await else {
            return RoutingError::NoValidSession.into_response();
        };
        let payload: JsonRpcPayload = match serde_json::from_slice(&body) {
            Ok(payload) => payload,
            Err(e) => return RoutingError::Parse(e.to_string()).into_response(),
        };
        return match handle.handle_post(&headers, payload).await {
            Ok(outcome) => outcome.into_response(),
            // Closed between lookup and dispatch; same answer as an unknown id
            Err(TransportError::Closed) => RoutingError::NoValidSession.into_response(),
            Err(e) => e.into_response(),
        };
    }

    match serde_json::from_slice::<JsonRpcPayload>(&body) {
        Ok(payload) if payload.contains_initialize() => {
            initialize_session(&state, &headers, payload).await
        }
        _ => {
            warn!("MCP: POST without session rejected");
            RoutingError::NoValidSession.into_response()
        }
    }
}

/// Create a session for a handshake and forward the handshake to it.
///
/// The handle is stored before the handshake runs and removed again if the
/// handshake fails, so no unreachable handle outlives the request.
async fn initialize_session(
    state: &AppState,
    headers: &HeaderMap,
    payload: JsonRpcPayload,
) -> Response {
    let session_id = SessionId::generate();
    let handle = Arc::new(TransportHandle::new(session_id.clone(), state.server()));

    let sessions = Arc::downgrade(&state.sessions());
    handle.set_on_close(move |id| {
        Box::pin(async move {
            if let Some(sessions) = sessions.upgrade() {
                sessions.remove(id.as_str()).await;
            }
        })
    });

    state.sessions().put(session_id.clone(), handle.clone()).await;

    match handle.handle_post(headers, payload).await {
        Ok(outcome) if !outcome.has_error() => {
            info!("MCP: New session initialized: {}", session_id);
            outcome.into_response()
        }
        Ok(outcome) => {
            warn!("MCP: Handshake for session {} failed", session_id);
            handle.close().await;
            let mut resp = outcome.into_response();
            resp.headers_mut().remove(SESSION_ID_HEADER);
            resp
        }
        Err(e) => {
            warn!("MCP: Handshake for session {} rejected: {}", session_id, e);
            handle.close().await;
            e.into_response()
        }
    }
}

/// GET /mcp - Open SSE stream for server-initiated messages.
pub async fn mcp_get(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(handle) = resolve_session(&state, &headers).await else {
        return RoutingError::InvalidOrMissingSession.into_response();
    };

    match handle.open_stream(&headers) {
        Ok(resp) => resp,
        Err(TransportError::Closed) => RoutingError::InvalidOrMissingSession.into_response(),
        Err(e) => e.into_response(),
    }
}

/// DELETE /mcp - Terminate a session.
pub async fn mcp_delete(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(handle) = resolve_session(&state, &headers).await else {
        return RoutingError::InvalidOrMissingSession.into_response();
    };

    match handle.terminate(&headers).await {
        Ok(()) => {
            info!("MCP: Session terminated: {}", handle.session_id());
            StatusCode::OK.into_response()
        }
        Err(TransportError::Closed) => RoutingError::InvalidOrMissingSession.into_response(),
        Err(e) => e.into_response(),
    }
}
