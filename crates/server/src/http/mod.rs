//! HTTP façade: router construction and the per-request trust and auth
//! guard.
//!
//! Every operation hangs off the request path plus query parameters, so
//! the router is two routes wired to method-specific handlers. The guard
//! runs before them: it resolves the effective client IP (honoring
//! forwarded headers only from trusted proxies), enforces the CIDR
//! allow-list, and applies server-wide basic auth.

pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthGate;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::files::PathResolver;
use crate::share::ShareLinkStore;
use crate::sync::SyncHub;
use crate::trust::TrustResolver;

/// Shared per-process state handed to every handler.
pub struct AppState {
    pub config: ServerConfig,
    pub resolver: PathResolver,
    pub trust: TrustResolver,
    pub auth: Option<AuthGate>,
    pub shares: ShareLinkStore,
    pub hub: SyncHub,
}

pub type SharedState = Arc<AppState>;

/// Effective client address, stored in request extensions by the guard.
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub std::net::IpAddr);

/// Build the service router with the guard and tracing layers applied.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route(
            "/",
            get(handlers::handle_get)
                .post(handlers::handle_post)
                .put(handlers::handle_put)
                .delete(handlers::handle_delete),
        )
        .route(
            "/*path",
            get(handlers::handle_get)
                .post(handlers::handle_post)
                .put(handlers::handle_put)
                .delete(handlers::handle_delete),
        )
        .layer(middleware::from_fn_with_state(state.clone(), guard))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Trust and auth guard.
///
/// Share-token GETs skip basic auth: the token itself is the capability.
/// Every other request must pass the allow-list and, when configured, the
/// server-wide credential.
async fn guard(
    State(state): State<SharedState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    mut request: Request,
    next: Next,
) -> Response {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok());
    let client_ip = state.trust.resolve_client_ip(peer.ip(), forwarded);

    if !state.trust.is_allowed(client_ip) {
        tracing::warn!(%client_ip, peer = %peer.ip(), "request outside allow-list");
        return ServerError::Forbidden("address not allowed".to_string()).into_response();
    }

    let token_get = request.method() == axum::http::Method::GET
        && handlers::query_has_token(request.uri().query());
    if !token_get {
        if let Some(gate) = &state.auth {
            let authorized = request
                .headers()
                .get(axum::http::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(|v| gate.verify_header(v))
                .unwrap_or(false);
            if !authorized {
                tracing::debug!(%client_ip, "rejecting unauthenticated request");
                return ServerError::Unauthorized.into_response();
            }
        }
    }

    request.extensions_mut().insert(ClientIp(client_ip));
    next.run(request).await
}
