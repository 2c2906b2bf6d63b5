//! Event types produced while an agent run is streaming

use crate::core::ConversationItem;
use futures::stream::BoxStream;
use serde::Deserialize;
use serde_json::Value;

use super::LlmError;

/// One event from the Responses API stream, as sent by the server
///
/// Only the fields the chat surface reads are typed; everything else in the
/// payload is ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawResponseEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    /// Text or code fragment for `*.delta` events
    #[serde(default)]
    pub delta: Option<String>,
    /// Base64 image for `response.image_generation_call.partial_image`
    #[serde(default)]
    pub partial_image_b64: Option<String>,
    /// Output item for `response.output_item.added` / `.done`
    #[serde(default)]
    pub item: Option<Value>,
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub output_index: Option<u32>,
    /// Full response object for `response.created` / `.completed` / `.failed`
    #[serde(default)]
    pub response: Option<Value>,
    /// Error message for top-level `error` events
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl RawResponseEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            delta: None,
            partial_image_b64: None,
            item: None,
            item_id: None,
            output_index: None,
            response: None,
            message: None,
            code: None,
        }
    }

    pub fn with_delta(mut self, delta: impl Into<String>) -> Self {
        self.delta = Some(delta.into());
        self
    }

    pub fn with_partial_image(mut self, b64: impl Into<String>) -> Self {
        self.partial_image_b64 = Some(b64.into());
        self
    }

    /// Human-readable failure carried by `error` or `response.failed`
    pub fn failure_message(&self) -> Option<String> {
        match self.event_type.as_str() {
            "error" => Some(
                self.message
                    .clone()
                    .or_else(|| self.code.clone())
                    .unwrap_or_else(|| "unknown stream error".to_string()),
            ),
            "response.failed" => Some(
                self.response
                    .as_ref()
                    .and_then(|r| r.pointer("/error/message"))
                    .and_then(Value::as_str)
                    .unwrap_or("response failed")
                    .to_string(),
            ),
            _ => None,
        }
    }
}

/// Events yielded by an agent run
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// The run started with this agent
    AgentUpdated { name: String },
    /// A raw event from the model stream
    RawResponse(RawResponseEvent),
    /// An output item finished and will be stored with the turn
    ItemCompleted(ConversationItem),
}

/// Live event sequence for one turn
pub type RunStream = BoxStream<'static, Result<RunEvent, LlmError>>;

/// Reference to a file stored with the hosted API
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub bytes: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_text_delta() {
        let event: RawResponseEvent = serde_json::from_value(json!({
            "type": "response.output_text.delta",
            "item_id": "msg_1",
            "output_index": 0,
            "content_index": 0,
            "delta": "Hel",
            "sequence_number": 4
        }))
        .unwrap();
        assert_eq!(event.event_type, "response.output_text.delta");
        assert_eq!(event.delta.as_deref(), Some("Hel"));
        assert_eq!(event.item_id.as_deref(), Some("msg_1"));
    }

    #[test]
    fn test_parse_partial_image() {
        let event: RawResponseEvent = serde_json::from_value(json!({
            "type": "response.image_generation_call.partial_image",
            "partial_image_b64": "AAAA",
            "partial_image_index": 0
        }))
        .unwrap();
        assert_eq!(event.partial_image_b64.as_deref(), Some("AAAA"));
    }

    #[test]
    fn test_parse_output_item_done() {
        let event: RawResponseEvent = serde_json::from_value(json!({
            "type": "response.output_item.done",
            "output_index": 1,
            "item": {"type": "web_search_call", "id": "ws_1", "status": "completed"}
        }))
        .unwrap();
        assert_eq!(event.item.unwrap()["type"], "web_search_call");
    }

    #[test]
    fn test_failure_messages() {
        let event: RawResponseEvent = serde_json::from_value(json!({
            "type": "error",
            "code": "server_error",
            "message": "boom"
        }))
        .unwrap();
        assert_eq!(event.failure_message().as_deref(), Some("boom"));

        let event: RawResponseEvent = serde_json::from_value(json!({
            "type": "response.failed",
            "response": {"status": "failed", "error": {"code": "x", "message": "tool crashed"}}
        }))
        .unwrap();
        assert_eq!(event.failure_message().as_deref(), Some("tool crashed"));

        assert_eq!(RawResponseEvent::new("response.completed").failure_message(), None);
    }
}
