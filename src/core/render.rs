//! Replays stored conversation items into display directives

use super::items::{Content, ConversationItem, ItemKind};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Container role used for tool-call lines
pub const AI_ROLE: &str = "ai";

/// Image to show, either a URL the browser can load or decoded bytes
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    Url(String),
    Bytes(Vec<u8>),
}

impl ImageSource {
    /// Decode a base64 image payload
    pub fn from_base64(encoded: &str) -> Result<Self, base64::DecodeError> {
        STANDARD.decode(encoded.trim()).map(ImageSource::Bytes)
    }

    /// Value suitable for an `<img src>`
    pub fn to_src(&self) -> String {
        match self {
            ImageSource::Url(url) => url.clone(),
            ImageSource::Bytes(bytes) => {
                format!("data:{};base64,{}", sniff_mime(bytes), STANDARD.encode(bytes))
            }
        }
    }
}

impl Serialize for ImageSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_src())
    }
}

fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        "image/png"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        // Generated images are requested as jpeg
        "image/jpeg"
    }
}

/// Body of a single display block
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DisplayBody {
    Text(String),
    Image(ImageSource),
    Code(String),
}

/// One block inside a chat-message container
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayDirective {
    pub role: String,
    pub body: DisplayBody,
}

impl DisplayDirective {
    fn new(role: &str, body: DisplayBody) -> Self {
        Self {
            role: role.to_string(),
            body,
        }
    }
}

/// Escape `$` so the page's markdown layer does not treat amounts as math
pub fn escape_dollars(text: &str) -> String {
    text.replace('$', "\\$")
}

/// Render stored items, in order, into display directives
///
/// Items that carry neither `role` nor `type`, or that lack the fields their
/// branch needs, are skipped with a log line rather than failing the render.
pub fn render_history(items: &[ConversationItem]) -> Vec<DisplayDirective> {
    let mut directives = Vec::new();

    for (index, item) in items.iter().enumerate() {
        if item.role().is_none() && item.item_type().is_none() {
            tracing::warn!(index, "Skipping history item without role or type");
            continue;
        }

        if let Some(role) = item.role() {
            render_message(index, role, item, &mut directives);
        }

        if let Some(kind) = item.kind() {
            render_call(index, kind, item, &mut directives);
        }
    }

    directives
}

fn render_message(
    index: usize,
    role: &str,
    item: &ConversationItem,
    out: &mut Vec<DisplayDirective>,
) {
    if item.is_user() {
        match item.content() {
            Some(Content::Text(text)) => {
                out.push(DisplayDirective::new(role, DisplayBody::Text(text.to_string())));
            }
            Some(parts) => {
                for url in parts.image_urls() {
                    out.push(DisplayDirective::new(
                        role,
                        DisplayBody::Image(ImageSource::Url(url.to_string())),
                    ));
                }
            }
            None => tracing::warn!(index, "User item has no content"),
        }
        return;
    }

    if item.kind() != Some(ItemKind::Message) {
        return;
    }

    match item.content().and_then(|content| content.first_text()) {
        Some(text) => out.push(DisplayDirective::new(
            role,
            DisplayBody::Text(escape_dollars(text)),
        )),
        None => tracing::warn!(index, role, "Message item has no text content"),
    }
}

fn render_call(
    index: usize,
    kind: ItemKind,
    item: &ConversationItem,
    out: &mut Vec<DisplayDirective>,
) {
    let body = match kind {
        ItemKind::WebSearchCall => DisplayBody::Text("🔍 Searched the web...".to_string()),
        ItemKind::FileSearchCall => DisplayBody::Text("🗂️ Searched files...".to_string()),
        ItemKind::ImageGenerationCall => {
            let Some(result) = item.str_field("result") else {
                tracing::warn!(index, "Image generation item has no result");
                return;
            };
            match ImageSource::from_base64(result) {
                Ok(image) => DisplayBody::Image(image),
                Err(e) => {
                    tracing::warn!(index, "Image generation result is not valid base64: {}", e);
                    return;
                }
            }
        }
        ItemKind::CodeInterpreterCall => match item.str_field("code") {
            Some(code) => DisplayBody::Code(code.to_string()),
            None => {
                tracing::warn!(index, "Code interpreter item has no code");
                return;
            }
        },
        ItemKind::McpListTools => match item.str_field("server_label") {
            Some(server) => DisplayBody::Text(format!("Listed {}'s tools", server)),
            None => {
                tracing::warn!(index, "MCP list-tools item has no server_label");
                return;
            }
        },
        ItemKind::McpCall => {
            let (Some(server), Some(name)) =
                (item.str_field("server_label"), item.str_field("name"))
            else {
                tracing::warn!(index, "MCP call item is missing server_label or name");
                return;
            };
            DisplayBody::Text(format!(
                "Called {}'s {} with args {}",
                server,
                name,
                arguments_text(item.field("arguments"))
            ))
        }
        ItemKind::Message => return,
        ItemKind::Other(other) => {
            tracing::debug!(index, item_type = %other, "No display for item type");
            return;
        }
    };

    out.push(DisplayDirective::new(AI_ROLE, body));
}

// Arguments arrive as a JSON-encoded string, but tolerate structured values.
fn arguments_text(arguments: Option<&Value>) -> String {
    match arguments {
        Some(Value::String(raw)) => raw.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(value: Value) -> ConversationItem {
        ConversationItem::from_value(value)
    }

    fn assistant(text: &str) -> ConversationItem {
        item(json!({
            "role": "assistant",
            "type": "message",
            "content": [{"type": "output_text", "text": text}]
        }))
    }

    #[test]
    fn test_user_then_assistant_renders_two_directives_in_order() {
        let items = vec![ConversationItem::user_text("hi"), assistant("hello")];
        let directives = render_history(&items);

        assert_eq!(
            directives,
            vec![
                DisplayDirective::new("user", DisplayBody::Text("hi".to_string())),
                DisplayDirective::new("assistant", DisplayBody::Text("hello".to_string())),
            ]
        );
    }

    #[test]
    fn test_user_image_parts_render_one_image_each() {
        let items = vec![item(json!({
            "role": "user",
            "content": [
                {"type": "input_image", "detail": "auto", "image_url": "data:image/png;base64,AAAA"},
                {"type": "input_text", "text": "skipped"}
            ]
        }))];

        let directives = render_history(&items);
        assert_eq!(directives.len(), 1);
        assert_eq!(
            directives[0].body,
            DisplayBody::Image(ImageSource::Url("data:image/png;base64,AAAA".to_string()))
        );
    }

    #[test]
    fn test_role_match_is_case_sensitive() {
        // Not "user", and not a message, so nothing is drawn for the content
        let items = vec![item(json!({
            "role": "User",
            "content": [{"type": "input_image", "image_url": "https://x/a.png"}]
        }))];
        assert!(render_history(&items).is_empty());
    }

    #[test]
    fn test_assistant_dollars_are_escaped() {
        let directives = render_history(&[assistant("costs $5 or $6")]);
        assert_eq!(
            directives[0].body,
            DisplayBody::Text("costs \\$5 or \\$6".to_string())
        );
    }

    #[test]
    fn test_user_dollars_are_left_alone() {
        let directives = render_history(&[ConversationItem::user_text("$5")]);
        assert_eq!(directives[0].body, DisplayBody::Text("$5".to_string()));
    }

    #[test]
    fn test_tool_call_lines() {
        let items = vec![
            item(json!({"type": "web_search_call", "id": "ws_1", "status": "completed"})),
            item(json!({"type": "file_search_call", "id": "fs_1"})),
            item(json!({"type": "code_interpreter_call", "code": "print(1)"})),
            item(json!({"type": "mcp_list_tools", "server_label": "Context7", "tools": []})),
            item(json!({
                "type": "mcp_call",
                "server_label": "Context7",
                "name": "resolve-library-id",
                "arguments": "{\"libraryName\":\"tokio\"}"
            })),
        ];

        let bodies: Vec<DisplayBody> = render_history(&items)
            .into_iter()
            .map(|d| {
                assert_eq!(d.role, AI_ROLE);
                d.body
            })
            .collect();

        assert_eq!(
            bodies,
            vec![
                DisplayBody::Text("🔍 Searched the web...".to_string()),
                DisplayBody::Text("🗂️ Searched files...".to_string()),
                DisplayBody::Code("print(1)".to_string()),
                DisplayBody::Text("Listed Context7's tools".to_string()),
                DisplayBody::Text(
                    "Called Context7's resolve-library-id with args {\"libraryName\":\"tokio\"}"
                        .to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_image_generation_result_is_decoded() {
        let png = b"\x89PNG\r\n\x1a\nrest".to_vec();
        let items = vec![item(json!({
            "type": "image_generation_call",
            "result": STANDARD.encode(&png)
        }))];

        let directives = render_history(&items);
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].body, DisplayBody::Image(ImageSource::Bytes(png)));
        let DisplayBody::Image(image) = &directives[0].body else {
            unreachable!()
        };
        assert!(image.to_src().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_malformed_items_are_skipped() {
        let items = vec![
            item(json!({"id": "orphan"})),
            item(json!({"type": "image_generation_call", "result": "!!not base64!!"})),
            item(json!({"type": "code_interpreter_call"})),
            item(json!({"role": "assistant", "type": "message", "content": []})),
            item(json!({"type": "reasoning", "summary": []})),
            ConversationItem::user_text("still here"),
        ];

        let directives = render_history(&items);
        assert_eq!(
            directives,
            vec![DisplayDirective::new(
                "user",
                DisplayBody::Text("still here".to_string())
            )]
        );
    }

    #[test]
    fn test_render_is_idempotent() {
        let items = vec![
            ConversationItem::user_text("a"),
            assistant("b"),
            item(json!({"type": "web_search_call"})),
        ];
        assert_eq!(render_history(&items), render_history(&items));
    }

    #[test]
    fn test_directive_serialization() {
        let directive = DisplayDirective::new("ai", DisplayBody::Code("x = 1".to_string()));
        let json = serde_json::to_value(&directive).unwrap();
        assert_eq!(
            json,
            json!({"role": "ai", "body": {"kind": "code", "value": "x = 1"}})
        );
    }
}
