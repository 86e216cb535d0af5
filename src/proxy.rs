// Copyright 2026 The Assist Gateway Authors
// SPDX-License-Identifier: Apache-2.0

// Gateway routes.
//
// Responsibilities:
// - SSE relay: forward a user message to the regional backend and pipe the
//   event stream back to the caller unmodified
// - Buffered reverse proxy for document uploads and all other chat routes
// - Region resolution from the request header via the injected RegionSource
// - Session cookie stripping on every forwarded request
// - Heartbeat endpoint

use axum::body::{to_bytes, Body};
use axum::extract::{Path, State};
use axum::http::header::{
    CACHE_CONTROL, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, HOST,
    TRANSFER_ENCODING,
};
use axum::http::{HeaderMap, HeaderValue, Method, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::Router;
use bytes::Bytes;
use futures_util::TryStreamExt;
use std::io::Read;
use std::sync::Arc;

use crate::region::{resolve, BackendTarget, RegionSource, USER_REGION_HEADER};
use crate::upstream::{HttpBody, HttpError, HttpRequest, HttpSender};

/// Fixed body returned to the caller for any SSE relay failure. The caller
/// cannot act on the distinction; detail goes to the log instead.
pub const SSE_ERROR_BODY: &str = r#"{"error": "Error proxying SSE."}"#;

/// Request body cap for document uploads.
pub const UPLOAD_BODY_LIMIT_BYTES: usize = 120 * 1024 * 1024;

/// Request body cap for every other forwarded route.
pub const PROXY_BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

/// Path prefix the gateway is mounted under; stripped before forwarding.
const MOUNT_PREFIX: &str = "/new_chat";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while forwarding a request to the backend.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("no backend configured for request region")]
    UnresolvedRegion,

    #[error("upstream rejected the stream: status {0}")]
    UpstreamReject(StatusCode),

    #[error("upstream response is not an event stream: content-type {0:?}")]
    NotEventStream(String),

    #[error("upstream response has no body")]
    NullBody,

    #[error(transparent)]
    Upstream(#[from] HttpError),
}

/// Response mapping for the buffered routes. The SSE route maps every
/// failure to its fixed 500 body instead, in `user_message`.
impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match &self {
            RelayError::UnresolvedRegion => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::Upstream(HttpError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        };
        (status, self.to_string()).into_response()
    }
}

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// Shared state injected into axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub http: Arc<dyn HttpSender>,
    pub regions: Arc<dyn RegionSource>,
}

// ---------------------------------------------------------------------------
// Header handling
// ---------------------------------------------------------------------------

/// Headers forwarded to the backend: everything the caller sent except the
/// session cookie (never forwarded), the inbound host, and the content
/// length the transport recomputes.
fn proxy_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = headers.clone();
    forwarded.remove(COOKIE);
    forwarded.remove(HOST);
    forwarded.remove(CONTENT_LENGTH);
    forwarded
}

/// Headers returned from a buffered forward: upstream headers minus the
/// framing ones axum recomputes, plus a no-store cache policy since every
/// response is per-user.
fn passthrough_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = upstream.clone();
    headers.remove(TRANSFER_ENCODING);
    headers.remove(CONTENT_LENGTH);
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("private, no-store"));
    headers
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn resolve_target(state: &AppState, headers: &HeaderMap) -> Result<BackendTarget, RelayError> {
    let region = header_str(headers, USER_REGION_HEADER);
    resolve(state.regions.as_ref(), region).ok_or(RelayError::UnresolvedRegion)
}

/// Body text for error logging; gzip-encoded bodies are inflated first.
fn body_text(headers: &HeaderMap, body: &Bytes) -> String {
    let gzipped = header_str(headers, CONTENT_ENCODING.as_str())
        .map(|v| v.contains("gzip"))
        .unwrap_or(false);
    if gzipped {
        let mut text = String::new();
        let mut decoder = flate2::read::GzDecoder::new(body.as_ref());
        if decoder.read_to_string(&mut text).is_ok() {
            return text;
        }
    }
    String::from_utf8_lossy(body).into_owned()
}

// ---------------------------------------------------------------------------
// SSE relay
// ---------------------------------------------------------------------------

/// POST /new_chat/chat/{chat_id}/user-message
///
/// Forwards the message to the regional backend and pipes the event stream
/// back byte for byte. Any failure before or during setup collapses to a
/// fixed 500 JSON body; once streaming has begun, a pipe error simply ends
/// the client response.
pub async fn user_message(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    request: Request<Body>,
) -> Response {
    let headers = request.headers().clone();
    let body = match to_bytes(request.into_body(), PROXY_BODY_LIMIT_BYTES).await {
        Ok(b) => b,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                format!("failed to read request body: {e}"),
            )
                .into_response()
        }
    };

    match relay_stream(&state, &chat_id, &headers, body).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(chat_id = %chat_id, error = %e, "SSE relay failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
                SSE_ERROR_BODY,
            )
                .into_response()
        }
    }
}

async fn relay_stream(
    state: &AppState,
    chat_id: &str,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, RelayError> {
    let target = resolve_target(state, headers)?;
    let url = format!(
        "{}{}/chat/{}/user-message",
        target.origin, target.path_prefix, chat_id
    );
    tracing::info!(chat_id = %chat_id, url = %url, "relaying user message stream");

    let upstream = state
        .http
        .send(HttpRequest {
            method: Method::POST,
            url,
            headers: proxy_headers(headers),
            body,
            // No client-side timeout: the stream stays open as long as the
            // backend keeps it open.
            timeout_ms: None,
            stream: true,
        })
        .await?;

    if !upstream.status.is_success() {
        return Err(RelayError::UpstreamReject(upstream.status));
    }
    let content_type = header_str(&upstream.headers, CONTENT_TYPE.as_str())
        .unwrap_or("")
        .to_string();
    if !content_type.starts_with("text/event-stream") {
        return Err(RelayError::NotEventStream(content_type));
    }
    let upstream_body = upstream.body.ok_or(RelayError::NullBody)?;

    let body = match upstream_body {
        HttpBody::Stream(stream) => Body::from_stream(stream),
        HttpBody::Full(bytes) => Body::from(bytes),
    };

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    Ok((upstream.status, headers, body).into_response())
}

// ---------------------------------------------------------------------------
// Buffered forwarding
// ---------------------------------------------------------------------------

/// ANY /new_chat/documents/upload
///
/// Uploads are forwarded with the original content type so multipart
/// boundaries survive, under a larger body cap than the other routes.
pub async fn upload_document(
    State(state): State<AppState>,
    request: Request<Body>,
) -> Response {
    forward_request(state, request, UPLOAD_BODY_LIMIT_BYTES).await
}

/// Fallback: every other path is forwarded buffered to the regional
/// backend, with the gateway mount prefix stripped.
pub async fn forward_any(State(state): State<AppState>, request: Request<Body>) -> Response {
    forward_request(state, request, PROXY_BODY_LIMIT_BYTES).await
}

async fn forward_request(state: AppState, request: Request<Body>, limit: usize) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = request.headers().clone();

    let body = match to_bytes(request.into_body(), limit).await {
        Ok(b) => b,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                format!("failed to read request body: {e}"),
            )
                .into_response()
        }
    };

    match forward_buffered(&state, method, &uri, &headers, body).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(path = %uri.path(), error = %e, "buffered forward failed");
            e.into_response()
        }
    }
}

/// Backend path for a forwarded request: the inbound path with the mount
/// prefix stripped, query preserved.
fn backend_path(uri: &Uri) -> String {
    let path = uri.path();
    let stripped = path.strip_prefix(MOUNT_PREFIX).unwrap_or(path);
    let stripped = if stripped.is_empty() { "/" } else { stripped };
    match uri.query() {
        Some(query) => format!("{stripped}?{query}"),
        None => stripped.to_string(),
    }
}

async fn forward_buffered(
    state: &AppState,
    method: Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, RelayError> {
    let target = resolve_target(state, headers)?;
    let url = format!("{}{}{}", target.origin, target.path_prefix, backend_path(uri));
    tracing::info!(method = %method, url = %url, "forwarding request");

    let upstream = state
        .http
        .send(HttpRequest {
            method,
            url,
            headers: proxy_headers(headers),
            body,
            timeout_ms: None,
            stream: false,
        })
        .await?;

    let bytes = match upstream.body {
        Some(HttpBody::Full(bytes)) => bytes,
        Some(HttpBody::Stream(stream)) => {
            let chunks: Vec<Bytes> = stream.try_collect().await?;
            Bytes::from(chunks.concat())
        }
        None => Bytes::new(),
    };

    if upstream.status.is_client_error() || upstream.status.is_server_error() {
        tracing::warn!(
            status = %upstream.status,
            body = %body_text(&upstream.headers, &bytes),
            "backend returned an error response"
        );
    }

    Ok((
        upstream.status,
        passthrough_headers(&upstream.headers),
        Body::from(bytes),
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Router construction
// ---------------------------------------------------------------------------

/// Heartbeat endpoint: GET /heartbeat -> 200 OK
pub async fn heartbeat() -> StatusCode {
    StatusCode::OK
}

/// Build the axum router with the relay routes and the heartbeat endpoint.
///
/// Transport and region source are injected — no side effects, no
/// hard-coded clients.
pub fn build_router(http: Arc<dyn HttpSender>, regions: Arc<dyn RegionSource>) -> Router {
    let state = AppState { http, regions };

    Router::new()
        .route("/heartbeat", get(heartbeat))
        .route("/new_chat/chat/:chat_id/user-message", post(user_message))
        .route("/new_chat/documents/upload", any(upload_document))
        .fallback(forward_any)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
