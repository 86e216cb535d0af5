// Wire message model.
//
// These are the canonical types decoded from backend event-stream frames
// and sent on chat API calls. The `message_type` discriminator selects the
// variant; a frame with an unknown discriminator fails to decode and is
// handled (logged and skipped) at the call site rather than panicking.

use serde::{Deserialize, Serialize};

/// Which side of the conversation produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Ai,
    User,
}

/// A single chat message, discriminated by `message_type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "snake_case")]
pub enum ChatMessage {
    /// A complete display message.
    Text(TextMessage),
    /// A streamed continuation of the text message with the same `id`;
    /// consumers append `message` to that message's body.
    Fragment(FragmentMessage),
    /// Echo of the user's query as recorded by the backend.
    Request(RequestMessage),
    /// A structured flow invocation; the payload shape varies per flow and
    /// is kept opaque here.
    Flow(FlowMessage),
    /// Files attached to the conversation.
    Files(FilesMessage),
    /// Backend bookkeeping messages that must never be rendered.
    Hidden(HiddenMessage),
}

impl ChatMessage {
    pub fn id(&self) -> &str {
        match self {
            ChatMessage::Text(m) => &m.id,
            ChatMessage::Fragment(m) => &m.id,
            ChatMessage::Request(m) => &m.id,
            ChatMessage::Flow(m) => &m.id,
            ChatMessage::Files(m) => &m.id,
            ChatMessage::Hidden(m) => &m.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMessage {
    pub id: String,
    /// RFC 2822 timestamp, matching what the backend emits.
    pub sent_time: String,
    pub sender: Sender,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_query_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentMessage {
    /// Id of the text message this fragment extends.
    pub id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMessage {
    pub id: String,
    pub sent_time: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_query_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowMessage {
    pub id: String,
    pub sent_time: String,
    pub request: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilesMessage {
    pub id: String,
    #[serde(default)]
    pub files: Vec<FileHandle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileHandle {
    pub id: String,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HiddenMessage {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A decoded message together with the chat it belongs to.
///
/// Frames on the wire do not carry the chat id; the caller that opened the
/// stream attaches it before dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithChat<T> {
    pub chat_id: String,
    #[serde(flatten)]
    pub inner: T,
}

// ---------------------------------------------------------------------------
// Structured side-channel payloads
// ---------------------------------------------------------------------------

/// Thumbs-up/down feedback on an AI reply, sent as explicit fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackPayload {
    pub feedback_symbol: String,
    pub chat_id: Option<String>,
    pub user_query: Option<String>,
    pub ai_message: Option<String>,
    pub tenant_id: String,
    pub comments: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_query_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_resp_id: Option<String>,
}

/// A support case raised from the chat surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportRequest {
    pub firm_id: Option<String>,
    pub product: Option<String>,
    pub case_subject: Option<String>,
    pub case_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportResponse {
    #[serde(rename = "salesforce_ticket_code")]
    pub ticket_code: String,
    #[serde(rename = "salesforce_ticket_id")]
    pub ticket_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileUploadResponse {
    pub document_id: String,
    pub filename: String,
    pub status: UploadStatus,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Success,
    Failure,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ---------------------------------------------------------------
    // 1. Tagged decoding selects the right variant
    // ---------------------------------------------------------------

    #[test]
    fn text_frame_decodes_to_text_variant() {
        let frame = json!({
            "message_type": "text",
            "id": "m-1",
            "sent_time": "Wed, 01 May 2024 12:30:45 +0000",
            "sender": "ai",
            "message": "Hello",
        });
        let msg: ChatMessage = serde_json::from_value(frame).unwrap();
        match msg {
            ChatMessage::Text(t) => {
                assert_eq!(t.sender, Sender::Ai);
                assert_eq!(t.message, "Hello");
                assert_eq!(t.user_query_id, None);
            }
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn fragment_frame_decodes_to_fragment_variant() {
        let frame = json!({"message_type": "fragment", "id": "m-1", "message": "lo"});
        let msg: ChatMessage = serde_json::from_value(frame).unwrap();
        assert_eq!(
            msg,
            ChatMessage::Fragment(FragmentMessage {
                id: "m-1".to_string(),
                message: "lo".to_string(),
            })
        );
    }

    #[test]
    fn hidden_frame_decodes_without_body() {
        let frame = json!({"message_type": "hidden", "id": "m-9"});
        let msg: ChatMessage = serde_json::from_value(frame).unwrap();
        assert_eq!(msg.id(), "m-9");
    }

    // ---------------------------------------------------------------
    // 2. Unknown discriminators are rejected, not silently mapped
    // ---------------------------------------------------------------

    #[test]
    fn unknown_message_type_fails_to_decode() {
        let frame = json!({"message_type": "telemetry", "id": "m-1"});
        assert!(serde_json::from_value::<ChatMessage>(frame).is_err());
    }

    #[test]
    fn missing_message_type_fails_to_decode() {
        let frame = json!({"id": "m-1", "message": "no tag"});
        assert!(serde_json::from_value::<ChatMessage>(frame).is_err());
    }

    // ---------------------------------------------------------------
    // 3. WithChat flattens the inner message
    // ---------------------------------------------------------------

    #[test]
    fn with_chat_flattens_message_fields() {
        let tagged = WithChat {
            chat_id: "chat-123".to_string(),
            inner: ChatMessage::Fragment(FragmentMessage {
                id: "m-1".to_string(),
                message: "hi".to_string(),
            }),
        };
        let value = serde_json::to_value(&tagged).unwrap();
        assert_eq!(value["chat_id"], "chat-123");
        assert_eq!(value["message_type"], "fragment");
        assert_eq!(value["message"], "hi");
    }

    // ---------------------------------------------------------------
    // 4. Support response keeps the wire field names
    // ---------------------------------------------------------------

    #[test]
    fn support_response_uses_wire_names() {
        let resp: SupportResponse = serde_json::from_value(json!({
            "salesforce_ticket_code": "00123",
            "salesforce_ticket_id": "500Ab",
        }))
        .unwrap();
        assert_eq!(resp.ticket_code, "00123");
        assert_eq!(resp.ticket_id, "500Ab");
    }
}
