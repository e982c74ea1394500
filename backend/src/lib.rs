//! Tether backend library.
//!
//! This module exposes the application builder for use in tests.

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::{middleware, routing::get, Router};
use tether_types::{PROTOCOL_VERSION_HEADER, SESSION_ID_HEADER};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod mcp;
pub mod session;
pub mod state;

use state::AppState;

/// Create the Axum application router.
///
/// This function is used both by the main server binary and by integration tests.
pub async fn create_app() -> Router {
    create_app_with_state(AppState::default()).await
}

/// Create the Axum application router with a given state.
pub async fn create_app_with_state(state: AppState) -> Router {
    create_app_with_config(state, Vec::new()).await
}

/// Create the Axum application router with a given state and CORS origins.
///
/// If `cors_allowed_origins` is empty, any origin is allowed.
/// Otherwise, only the specified origins are allowed.
pub async fn create_app_with_config(state: AppState, cors_allowed_origins: Vec<String>) -> Router {
    if !state.security().dns_rebinding_protection {
        tracing::warn!("DNS rebinding protection disabled - any Host is accepted!");
    }

    // MCP Streamable HTTP endpoint; host/origin checks run before session lookup
    let mcp_router = Router::new()
        .route(
            "/mcp",
            get(api::mcp::mcp_get)
                .post(api::mcp::mcp_post)
                .delete(api::mcp::mcp_delete),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api::security::validate_request_headers,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(mcp_router)
        .layer(TraceLayer::new_for_http())
        .layer({
            let cors = CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::ACCEPT,
                    HeaderName::from_static(SESSION_ID_HEADER),
                    HeaderName::from_static(PROTOCOL_VERSION_HEADER),
                ])
                .expose_headers([HeaderName::from_static(SESSION_ID_HEADER)]);

            // If no origins specified, allow any origin
            // Otherwise, restrict to the specified origins
            if cors_allowed_origins.is_empty() {
                cors.allow_origin(Any)
            } else {
                let origins: Vec<HeaderValue> = cors_allowed_origins
                    .iter()
                    .filter_map(|o| o.parse::<HeaderValue>().ok())
                    .collect();
                cors.allow_origin(origins)
            }
        })
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "OK"
}
