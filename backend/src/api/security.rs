//! DNS rebinding protection.
//!
//! Validates the `Host` and `Origin` headers of MCP requests against the
//! configured allow-lists before any session lookup happens.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tether_types::jsonrpc::error_codes;
use tether_types::JsonRpcResponse;
use tracing::warn;

use crate::config::SecurityConfig;
use crate::state::AppState;

/// Reject requests whose Host or Origin is not allow-listed.
pub async fn validate_request_headers(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let security = state.security();
    if !security.dns_rebinding_protection {
        return next.run(request).await;
    }

    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.to_string()));

    match host {
        Some(host) if host_allowed(security, &host) => {}
        Some(host) => {
            warn!("MCP: Rejecting request for host {}", host);
            return forbidden(format!("Invalid Host header: {}", host));
        }
        None => {
            warn!("MCP: Rejecting request without Host header");
            return forbidden("Invalid Host header: missing".to_string());
        }
    }

    if let Some(origin) = request.headers().get(header::ORIGIN) {
        let origin = origin.to_str().unwrap_or_default();
        if !origin_allowed(security, origin) {
            warn!("MCP: Rejecting request from origin {}", origin);
            return forbidden(format!("Invalid Origin header: {}", origin));
        }
    }

    next.run(request).await
}

fn forbidden(message: String) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(JsonRpcResponse::error(
            None,
            error_codes::SERVER_ERROR,
            message,
        )),
    )
        .into_response()
}

/// Whether `host` (as sent, possibly with a port) is allow-listed.
///
/// An allow-list entry with a port must match exactly; one without a port
/// matches the host on any port. An empty list allows every host.
fn host_allowed(security: &SecurityConfig, host: &str) -> bool {
    if security.allowed_hosts.is_empty() {
        return true;
    }
    let bare = strip_port(host);
    security
        .allowed_hosts
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(host) || allowed.eq_ignore_ascii_case(bare))
}

fn origin_allowed(security: &SecurityConfig, origin: &str) -> bool {
    security.allowed_origins.is_empty() || security.allowed_origins.iter().any(|o| o == origin)
}

/// Strip a trailing `:port`, keeping bracketed IPv6 literals intact.
fn strip_port(host: &str) -> &str {
    if let Some(end) = host.find(']') {
        return &host[..=end];
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}
