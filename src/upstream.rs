// Copyright 2026 The Assist Gateway Authors
// SPDX-License-Identifier: Apache-2.0

// Outbound HTTP transport.
//
// Route handlers forward requests through the injected `HttpSender` trait
// and never touch a concrete HTTP client. `ReqwestHttpSender` is the
// production implementation; tests inject mocks.

use async_trait::async_trait;
use axum::http::{HeaderMap, Method, StatusCode};
use bytes::Bytes;
use futures_util::stream::Stream;
use futures_util::TryStreamExt;
use std::pin::Pin;

// ---------------------------------------------------------------------------
// Transport types
// ---------------------------------------------------------------------------

/// A request to forward to the regional backend.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// `None` applies no client-side timeout. The SSE relay passes `None`:
    /// a hung upstream stalls the pipe until the client disconnects.
    pub timeout_ms: Option<u64>,
    /// Whether the response body should be exposed as a byte stream
    /// (SSE relay) or collected in full (buffered proxy).
    pub stream: bool,
}

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, HttpError>> + Send>>;

pub enum HttpBody {
    Full(Bytes),
    Stream(ByteStream),
}

pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// `None` models an upstream reply that carries no body at all. The
    /// production sender always yields `Some`; test doubles use `None` to
    /// exercise the relay's empty-body failure path.
    pub body: Option<HttpBody>,
}

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("upstream request failed: {0}")]
    Transport(String),

    #[error("upstream request timed out: {0}")]
    Timeout(String),
}

// ---------------------------------------------------------------------------
// Trait: HttpSender (dependency injection point)
// ---------------------------------------------------------------------------

/// Sends HTTP requests to the regional backend.
#[async_trait]
pub trait HttpSender: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

// ---------------------------------------------------------------------------
// Reqwest implementation
// ---------------------------------------------------------------------------

pub struct ReqwestHttpSender {
    client: reqwest::Client,
}

impl ReqwestHttpSender {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestHttpSender {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl HttpSender for ReqwestHttpSender {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut req = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers)
            .body(request.body);

        if let Some(timeout_ms) = request.timeout_ms {
            req = req.timeout(std::time::Duration::from_millis(timeout_ms));
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::Timeout(e.to_string())
            } else {
                HttpError::Transport(e.to_string())
            }
        })?;

        let status = resp.status();
        let headers = resp.headers().clone();

        if request.stream {
            let stream = resp
                .bytes_stream()
                .map_err(|e| HttpError::Transport(e.to_string()));
            Ok(HttpResponse {
                status,
                headers,
                body: Some(HttpBody::Stream(Box::pin(stream))),
            })
        } else {
            let body = resp
                .bytes()
                .await
                .map_err(|e| HttpError::Transport(e.to_string()))?;
            Ok(HttpResponse {
                status,
                headers,
                body: Some(HttpBody::Full(body)),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
