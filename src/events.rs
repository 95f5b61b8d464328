//! Control-channel wire messages.
//!
//! One JSON object per data-channel frame, tagged by `type`. Only a fixed
//! subset is produced or consumed by this crate; inbound types outside the
//! subset deserialize to [`ServerEvent::Unknown`] and are dropped silently.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Client Events ───────────────────────────────────────────────────────

/// Events sent from the client over the control channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Update session configuration (voice, tool manifest, tool-choice policy).
    #[serde(rename = "session.update")]
    SessionUpdate {
        /// Session configuration payload.
        session: Value,
    },

    /// Add a conversation item: a user text message or a tool result.
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate {
        /// The conversation item.
        item: Value,
    },

    /// Ask the remote endpoint to produce the next turn.
    #[serde(rename = "response.create")]
    ResponseCreate {
        /// Optional response configuration.
        #[serde(skip_serializing_if = "Option::is_none")]
        config: Option<Value>,
    },
}

/// A conversation item for text messages or tool responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationItem {
    /// Unique ID for this item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Item type: "message" or "function_call_output".
    #[serde(rename = "type")]
    pub item_type: String,
    /// Role: "user", "assistant", or "system".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Content parts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ContentPart>>,
    /// For tool responses: the call ID being responded to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    /// For tool responses: the serialized output value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// A content part within a conversation item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPart {
    /// Content type: "input_text", "text", "audio".
    #[serde(rename = "type")]
    pub content_type: String,
    /// Text content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Transcript of audio content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

impl ConversationItem {
    /// Create a user text message item.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            id: None,
            item_type: "message".to_string(),
            role: Some("user".to_string()),
            content: Some(vec![ContentPart {
                content_type: "input_text".to_string(),
                text: Some(text.into()),
                transcript: None,
            }]),
            call_id: None,
            output: None,
        }
    }

    /// Create a tool response item carrying the serialized result.
    pub fn tool_response(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            id: None,
            item_type: "function_call_output".to_string(),
            role: None,
            content: None,
            call_id: Some(call_id.into()),
            output: Some(output.into()),
        }
    }
}

// ── Server Events ───────────────────────────────────────────────────────

/// Events received from the remote endpoint over the control channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// A turn completed. Carries the final response payload, which may hold
    /// a transcript fragment and at most one function-call descriptor.
    #[serde(rename = "response.done")]
    ResponseDone {
        /// Unique event ID.
        #[serde(skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        /// Final response details.
        response: Value,
    },

    /// Unknown event type (forward compatibility).
    #[serde(other)]
    Unknown,
}

/// Extract the transcript fragment from a `response.done` payload, if present.
///
/// Looks at `response.output[0].content[0].transcript`. Absent fields are
/// tolerated and yield `None`.
pub fn response_transcript(response: &Value) -> Option<&str> {
    response.get("output")?.get(0)?.get("content")?.get(0)?.get("transcript")?.as_str()
}

/// Extract the function-call descriptor from a `response.done` payload.
///
/// Only the first output item is inspected; it must have type
/// `"function_call"` and carry a call identifier.
pub fn response_tool_call(response: &Value) -> Option<ToolCall> {
    let output = response.get("output")?.get(0)?;
    if output.get("type")?.as_str()? != "function_call" {
        return None;
    }
    let call_id = output.get("call_id")?.as_str()?;
    let name = output.get("name")?.as_str()?;
    let arguments = output.get("arguments").and_then(Value::as_str).unwrap_or("{}");
    Some(ToolCall {
        call_id: call_id.to_string(),
        name: name.to_string(),
        arguments: arguments.to_string(),
    })
}

/// A tool/function call requested by the remote endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (echoed back in the response).
    pub call_id: String,
    /// Tool/function name.
    pub name: String,
    /// Serialized JSON arguments, tool-specific.
    pub arguments: String,
}
