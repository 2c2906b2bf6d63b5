//! Conversation items as persisted in the session store
//!
//! Items keep the exact JSON shape produced by the agent runtime so they can be
//! replayed back to it as input. Accessors expose the handful of fields the
//! renderer and uploader care about.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Role string that marks an item as written by the user
pub const USER_ROLE: &str = "user";

/// One persisted unit of chat or tool history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationItem(Value);

impl ConversationItem {
    /// Wrap a runtime-produced item without interpreting it
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    /// A plain-text user message
    pub fn user_text(text: &str) -> Self {
        Self(json!({
            "role": USER_ROLE,
            "content": text,
        }))
    }

    /// A user message carrying a single inline image
    pub fn user_image(image_url: &str) -> Self {
        Self(json!({
            "role": USER_ROLE,
            "content": [
                {
                    "type": "input_image",
                    "detail": "auto",
                    "image_url": image_url,
                }
            ],
        }))
    }

    pub fn role(&self) -> Option<&str> {
        self.str_field("role")
    }

    /// Raw `type` field (`message`, `web_search_call`, ...)
    pub fn item_type(&self) -> Option<&str> {
        self.str_field("type")
    }

    pub fn kind(&self) -> Option<ItemKind> {
        self.item_type().map(ItemKind::from_type)
    }

    pub fn is_user(&self) -> bool {
        self.role() == Some(USER_ROLE)
    }

    /// Message content, either a plain string or a list of typed parts
    pub fn content(&self) -> Option<Content<'_>> {
        match self.0.get("content")? {
            Value::String(text) => Some(Content::Text(text.as_str())),
            Value::Array(parts) => Some(Content::Parts(parts.as_slice())),
            _ => None,
        }
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for ConversationItem {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Borrowed view of a message's `content`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Content<'a> {
    Text(&'a str),
    Parts(&'a [Value]),
}

impl<'a> Content<'a> {
    /// `text` of the first part, or the whole string for plain content
    pub fn first_text(&self) -> Option<&'a str> {
        match *self {
            Content::Text(text) => Some(text),
            Content::Parts(parts) => parts.first()?.get("text")?.as_str(),
        }
    }

    /// Every `image_url` carried by the parts, in order
    pub fn image_urls(&self) -> Vec<&'a str> {
        match *self {
            Content::Text(_) => Vec::new(),
            Content::Parts(parts) => parts
                .iter()
                .filter_map(|part| part.get("image_url"))
                .filter_map(image_url_of)
                .collect(),
        }
    }
}

// `image_url` is a bare string on input items but `{ "url": ... }` in some
// older payloads.
fn image_url_of(value: &Value) -> Option<&str> {
    match value {
        Value::String(url) => Some(url.as_str()),
        Value::Object(map) => map.get("url").and_then(Value::as_str),
        _ => None,
    }
}

/// The item types the renderer knows how to show
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
    Message,
    WebSearchCall,
    FileSearchCall,
    ImageGenerationCall,
    CodeInterpreterCall,
    McpListTools,
    McpCall,
    Other(String),
}

impl ItemKind {
    pub fn from_type(item_type: &str) -> Self {
        match item_type {
            "message" => ItemKind::Message,
            "web_search_call" => ItemKind::WebSearchCall,
            "file_search_call" => ItemKind::FileSearchCall,
            "image_generation_call" => ItemKind::ImageGenerationCall,
            "code_interpreter_call" => ItemKind::CodeInterpreterCall,
            "mcp_list_tools" => ItemKind::McpListTools,
            "mcp_call" => ItemKind::McpCall,
            other => ItemKind::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_text_shape() {
        let item = ConversationItem::user_text("hi");
        assert_eq!(item.role(), Some("user"));
        assert_eq!(item.item_type(), None);
        assert_eq!(item.content(), Some(Content::Text("hi")));
        assert!(item.is_user());
    }

    #[test]
    fn test_user_image_shape() {
        let item = ConversationItem::user_image("data:image/png;base64,AAAA");
        let content = item.content().unwrap();
        assert_eq!(content.image_urls(), vec!["data:image/png;base64,AAAA"]);
        assert_eq!(
            item.as_value()["content"][0]["type"],
            Value::String("input_image".into())
        );
        assert_eq!(item.as_value()["content"][0]["detail"], "auto");
    }

    #[test]
    fn test_first_text_of_assistant_message() {
        let item = ConversationItem::from_value(json!({
            "role": "assistant",
            "type": "message",
            "content": [{"type": "output_text", "text": "hello"}, {"type": "output_text", "text": "ignored"}]
        }));
        assert_eq!(item.content().unwrap().first_text(), Some("hello"));
        assert_eq!(item.kind(), Some(ItemKind::Message));
    }

    #[test]
    fn test_image_url_object_form() {
        let item = ConversationItem::from_value(json!({
            "role": "user",
            "content": [{"type": "input_image", "image_url": {"url": "https://x/y.png"}}]
        }));
        assert_eq!(item.content().unwrap().image_urls(), vec!["https://x/y.png"]);
    }

    #[test]
    fn test_unknown_kind_is_preserved() {
        assert_eq!(
            ItemKind::from_type("reasoning"),
            ItemKind::Other("reasoning".to_string())
        );
    }

    #[test]
    fn test_serde_is_transparent() {
        let raw = json!({"type": "mcp_call", "server_label": "Context7", "extra": [1, 2]});
        let item: ConversationItem = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&item).unwrap(), raw);
    }
}
