// Copyright 2026 The Assist Gateway Authors
// SPDX-License-Identifier: Apache-2.0

// Chat API client.
//
// Consumer-side counterpart of the gateway: sends user messages, decodes
// the streamed reply frames, and wraps the non-streaming chat calls
// (AI message creation, feedback, support cases, document upload). All
// calls take an explicit `Session` for identity and routing headers.

use chrono::Utc;
use reqwest::multipart;
use reqwest::StatusCode;
use serde::Serialize;
use uuid::Uuid;

use crate::decode::{DecodeError, FrameDecoder};
use crate::message::{
    ChatMessage, FeedbackPayload, FileUploadResponse, Sender, SupportRequest, SupportResponse,
    TextMessage, WithChat,
};
use crate::session::{Session, SessionError};

const FEEDBACK_PATH: &str = "/new_chat/feedback";
const SUPPORT_PATH: &str = "/new_chat/support_case";
const SALESFORCE_PRODUCTS_PATH: &str = "/new_chat/salesforce_products";
const UPLOAD_PATH: &str = "/new_chat/documents/upload";

fn user_message_path(chat_id: &str) -> String {
    format!("/new_chat/chat/{chat_id}/user-message")
}

fn ai_message_path(chat_id: &str) -> String {
    format!("/new_chat/chat/{chat_id}/ai-message")
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("stream decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("backend rejected the call with status {status}: {detail}")]
    Rejected { status: StatusCode, detail: String },
}

impl ClientError {
    fn rejected(status: StatusCode) -> Self {
        ClientError::Rejected {
            status,
            detail: "no detail".to_string(),
        }
    }
}

/// One entry of the prior conversation, sent along with a new message so
/// the backend has context.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: Option<String>,
}

/// A new user message plus the context the backend needs to answer it.
#[derive(Debug, Clone)]
pub struct DirectMessageRequest {
    pub message: String,
    pub chat_history: Vec<HistoryEntry>,
    pub allowed_skills: Vec<String>,
}

fn direct_message_payload(chat_id: &str, request: &DirectMessageRequest) -> serde_json::Value {
    serde_json::json!({
        "chat_id": chat_id,
        "chat_history": request.chat_history,
        "allowed_skills": request.allowed_skills,
        "permit_prepared_flow_responses": true,
        "user_message": { "message": request.message },
    })
}

fn salesforce_products_payload(product_list: &[String]) -> serde_json::Value {
    serde_json::json!({ "products": product_list })
}

/// A freshly constructed AI text message, ready to persist.
fn new_ai_text_message(message: &str, user_query_id: Option<&str>) -> TextMessage {
    TextMessage {
        id: user_query_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        sent_time: Utc::now().to_rfc2822(),
        sender: Sender::Ai,
        message: message.to_string(),
        user_query_id: user_query_id.map(str::to_string),
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
}

impl ChatClient {
    /// `base_url` is the gateway origin, no trailing slash.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn with_http(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a user message and stream the reply.
    ///
    /// `set_streaming(true)` fires once the backend has accepted the call;
    /// each decoded frame is delivered through `on_message` tagged with the
    /// chat id; `set_streaming(false)` fires at a clean end-of-stream.
    /// Frames that parse as JSON but not as a known message schema are
    /// logged and skipped. Reader failures return an error, with the
    /// streaming flag left for the caller to reset.
    pub async fn direct_message<F, G>(
        &self,
        session: &Session,
        chat_id: &str,
        request: DirectMessageRequest,
        mut on_message: F,
        mut set_streaming: G,
    ) -> Result<(), ClientError>
    where
        F: FnMut(WithChat<ChatMessage>),
        G: FnMut(bool),
    {
        let response = self
            .http
            .post(self.url(&user_message_path(chat_id)))
            .headers(session.request_headers()?)
            .json(&direct_message_payload(chat_id, &request))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::rejected(response.status()));
        }

        set_streaming(true);
        let stream = Box::pin(response.bytes_stream());
        FrameDecoder::new()
            .run(stream, |value| {
                match serde_json::from_value::<ChatMessage>(value) {
                    Ok(message) => on_message(WithChat {
                        chat_id: chat_id.to_string(),
                        inner: message,
                    }),
                    Err(e) => {
                        tracing::warn!(chat_id = %chat_id, error = %e, "skipping frame with unknown schema")
                    }
                }
            })
            .await?;
        set_streaming(false);
        Ok(())
    }

    /// Persist an AI-authored text message, returning the stored message.
    pub async fn create_ai_message(
        &self,
        session: &Session,
        chat_id: &str,
        message: &str,
        user_query_id: Option<&str>,
    ) -> Result<ChatMessage, ClientError> {
        let body = ChatMessage::Text(new_ai_text_message(message, user_query_id));
        let response = self
            .http
            .post(self.url(&ai_message_path(chat_id)))
            .headers(session.request_headers()?)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::rejected(response.status()));
        }
        Ok(response.json().await?)
    }

    pub async fn submit_feedback(
        &self,
        session: &Session,
        payload: &FeedbackPayload,
    ) -> Result<(), ClientError> {
        let response = self
            .http
            .post(self.url(FEEDBACK_PATH))
            .headers(session.request_headers()?)
            .json(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::rejected(response.status()));
        }
        Ok(())
    }

    /// Raise a support case. A rejection surfaces the backend's `detail`
    /// field when the error body carries one.
    pub async fn support(
        &self,
        session: &Session,
        request: &SupportRequest,
    ) -> Result<SupportResponse, ClientError> {
        let response = self
            .http
            .post(self.url(SUPPORT_PATH))
            .headers(session.request_headers()?)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
                .unwrap_or_else(|| "failed to create support request".to_string());
            return Err(ClientError::Rejected { status, detail });
        }
        Ok(response.json().await?)
    }

    /// Look up the Salesforce product records for the session's product
    /// list, as shown on the support-ticket surface.
    pub async fn salesforce_products(
        &self,
        session: &Session,
        product_list: &[String],
    ) -> Result<serde_json::Value, ClientError> {
        let response = self
            .http
            .post(self.url(SALESFORCE_PRODUCTS_PATH))
            .headers(session.request_headers()?)
            .json(&salesforce_products_payload(product_list))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::rejected(response.status()));
        }
        Ok(response.json().await?)
    }

    /// Upload one document as a multipart form.
    pub async fn upload_document(
        &self,
        session: &Session,
        filename: &str,
        data: Vec<u8>,
    ) -> Result<FileUploadResponse, ClientError> {
        let part = multipart::Part::bytes(data).file_name(filename.to_string());
        let form = multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(self.url(UPLOAD_PATH))
            .headers(session.multipart_headers()?)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::rejected(response.status()));
        }
        Ok(response.json().await?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_message_payload_shape() {
        let request = DirectMessageRequest {
            message: "summarize this".to_string(),
            chat_history: vec![HistoryEntry {
                role: "user".to_string(),
                content: Some("earlier question".to_string()),
            }],
            allowed_skills: vec!["summarize".to_string()],
        };
        let payload = direct_message_payload("chat-1", &request);

        assert_eq!(payload["chat_id"], "chat-1");
        assert_eq!(payload["user_message"]["message"], "summarize this");
        assert_eq!(payload["chat_history"][0]["role"], "user");
        assert_eq!(payload["allowed_skills"][0], "summarize");
        assert_eq!(payload["permit_prepared_flow_responses"], true);
    }

    #[test]
    fn new_ai_message_defaults_to_fresh_uuid() {
        let msg = new_ai_text_message("hello", None);
        assert!(Uuid::parse_str(&msg.id).is_ok());
        assert_eq!(msg.sender, Sender::Ai);
        assert_eq!(msg.user_query_id, None);
        assert!(chrono::DateTime::parse_from_rfc2822(&msg.sent_time).is_ok());
    }

    #[test]
    fn new_ai_message_reuses_query_id() {
        let msg = new_ai_text_message("hello", Some("q-42"));
        assert_eq!(msg.id, "q-42");
        assert_eq!(msg.user_query_id.as_deref(), Some("q-42"));
    }

    #[test]
    fn ai_message_serializes_with_text_discriminator() {
        let body = ChatMessage::Text(new_ai_text_message("hi", Some("q-1")));
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["message_type"], "text");
        assert_eq!(value["sender"], "ai");
        assert_eq!(value["message"], "hi");
    }

    #[test]
    fn salesforce_products_payload_wraps_the_list() {
        let payload =
            salesforce_products_payload(&["Workpapers".to_string(), "DataFlow".to_string()]);
        assert_eq!(payload["products"][0], "Workpapers");
        assert_eq!(payload["products"][1], "DataFlow");
    }

    #[test]
    fn endpoint_paths_are_mounted_under_gateway_prefix() {
        assert_eq!(
            user_message_path("chat-9"),
            "/new_chat/chat/chat-9/user-message"
        );
        assert_eq!(ai_message_path("chat-9"), "/new_chat/chat/chat-9/ai-message");
        assert_eq!(UPLOAD_PATH, "/new_chat/documents/upload");
    }
}
