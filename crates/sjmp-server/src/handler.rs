//! HTTP request handling.
//!
//! Every path is served by one handler: authorization first, then the method
//! check, then the capped body read. The dispatcher runs on the blocking pool
//! because host getters and actions are synchronous.

use crate::auth::{challenge, is_authorized, Authorizer};
use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use bytes::Bytes;
use sjmp_core::{handle_body, protocol, ProtocolConfig, Registry, Reply, SjmpError};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

/// State shared by all requests.
pub struct AppState {
    pub registry: Arc<Registry>,
    pub authorizer: Option<Arc<dyn Authorizer>>,
}

/// Build the router serving SJMP on every path.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(handle_request)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Main SJMP handler.
pub async fn handle_request(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if let Some(authorizer) = &state.authorizer {
        if !is_authorized(authorizer.as_ref(), request.headers()) {
            debug!("[{}] Auth failed, returning Unauthorized", peer);
            let realm = challenge(&state.registry.info().name);
            return (StatusCode::UNAUTHORIZED, [(header::WWW_AUTHENTICATE, realm)]).into_response();
        }
    }

    if request.method() != Method::POST {
        let error = SjmpError::MethodNotAllowed(request.method().to_string());
        warn!("[{}] {}", peer, error);
        let response = protocol::Response::error(None, "Wrong request method");
        return text_response(StatusCode::FORBIDDEN, response.to_text().into());
    }

    let body = match axum::body::to_bytes(request.into_body(), ProtocolConfig::MAX_REQUEST_LENGTH)
        .await
    {
        Ok(body) => body,
        Err(e) => {
            debug!("[{}] Failed to read body: {}", peer, e);
            let reply = Reply::Failed {
                request_id: None,
                error: SjmpError::PayloadTooLarge {
                    limit: ProtocolConfig::MAX_REQUEST_LENGTH,
                },
            };
            return finish(&peer, reply);
        }
    };

    let registry = state.registry.clone();
    let reply = match tokio::task::spawn_blocking(move || handle_body(&registry, &body)).await {
        Ok(reply) => reply,
        Err(e) => Reply::Failed {
            request_id: None,
            error: SjmpError::Internal {
                message: format!("request handler failed: {}", e),
            },
        },
    };
    finish(&peer, reply)
}

fn finish(peer: &str, reply: Reply) -> Response {
    match reply.error() {
        None => debug!("[{}] Request ok", peer),
        Some(e) if e.is_usage() => warn!("[{}][error] {}", peer, e),
        Some(e) => error!("[{}][error] {}", peer, e),
    }
    text_response(StatusCode::OK, reply.into_text())
}

fn text_response(status: StatusCode, text: Arc<str>) -> Response {
    let mut response = Response::new(Body::from(Bytes::copy_from_slice(text.as_bytes())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(ProtocolConfig::CONTENT_TYPE),
    );
    response
}
