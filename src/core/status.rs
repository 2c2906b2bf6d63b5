//! Stream event classification
//!
//! Maps the upstream event type strings onto a closed set of kinds, and the
//! kinds that carry tool progress onto the status line shown above a reply.

use serde::Serialize;

/// Whether the status spinner is still running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusPhase {
    Running,
    Complete,
}

/// Label and phase for the status container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusUpdate {
    pub label: String,
    pub phase: StatusPhase,
}

impl StatusUpdate {
    pub fn running(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            phase: StatusPhase::Running,
        }
    }

    pub fn complete(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            phase: StatusPhase::Complete,
        }
    }
}

/// Stream event kinds the chat surface reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    WebSearchCompleted,
    WebSearchInProgress,
    WebSearchSearching,
    FileSearchCompleted,
    FileSearchInProgress,
    FileSearchSearching,
    ImageGenerating,
    ImageInProgress,
    ImagePartial,
    CodeDelta,
    CodeDone,
    CodeCompleted,
    CodeInProgress,
    CodeInterpreting,
    McpCallCompleted,
    McpCallFailed,
    McpListToolsCompleted,
    McpListToolsFailed,
    McpListToolsInProgress,
    OutputTextDelta,
    ResponseCompleted,
    Unknown,
}

impl EventKind {
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            "response.web_search_call.completed" => EventKind::WebSearchCompleted,
            "response.web_search_call.in_progress" => EventKind::WebSearchInProgress,
            "response.web_search_call.searching" => EventKind::WebSearchSearching,
            "response.file_search_call.completed" => EventKind::FileSearchCompleted,
            "response.file_search_call.in_progress" => EventKind::FileSearchInProgress,
            "response.file_search_call.searching" => EventKind::FileSearchSearching,
            "response.image_generation_call.generating" => EventKind::ImageGenerating,
            "response.image_generation_call.in_progress" => EventKind::ImageInProgress,
            "response.image_generation_call.partial_image" => EventKind::ImagePartial,
            "response.code_interpreter_call_code.delta" => EventKind::CodeDelta,
            "response.code_interpreter_call_code.done" => EventKind::CodeDone,
            "response.code_interpreter_call.completed" => EventKind::CodeCompleted,
            "response.code_interpreter_call.in_progress" => EventKind::CodeInProgress,
            "response.code_interpreter_call.interpreting" => EventKind::CodeInterpreting,
            "response.mcp_call.completed" => EventKind::McpCallCompleted,
            "response.mcp_call.failed" => EventKind::McpCallFailed,
            "response.mcp_list_tools.completed" => EventKind::McpListToolsCompleted,
            "response.mcp_list_tools.failed" => EventKind::McpListToolsFailed,
            "response.mcp_list_tools.in_progress" => EventKind::McpListToolsInProgress,
            "response.output_text.delta" => EventKind::OutputTextDelta,
            // Only the misspelled key clears the status; the real
            // `response.completed` leaves the last tool label in place
            "resposnse.completed" => EventKind::ResponseCompleted,
            _ => EventKind::Unknown,
        }
    }

    /// Status line for this kind, if it drives one
    pub fn status(self) -> Option<StatusUpdate> {
        let update = match self {
            EventKind::WebSearchCompleted => StatusUpdate::complete("✅ Web serach completed."),
            EventKind::WebSearchInProgress => StatusUpdate::running("🔍 Starting web search..."),
            EventKind::WebSearchSearching => StatusUpdate::running("🔍 Web search in progrress..."),
            EventKind::FileSearchCompleted => StatusUpdate::complete("✅ File search completed."),
            EventKind::FileSearchInProgress => StatusUpdate::running("🗂️ Starting file search..."),
            EventKind::FileSearchSearching => {
                StatusUpdate::running("🗂️ File search in progress...")
            }
            EventKind::ImageGenerating | EventKind::ImageInProgress => {
                StatusUpdate::running("🎨 Drawing image...")
            }
            EventKind::CodeDone | EventKind::CodeCompleted => StatusUpdate::complete("🤖 Ran code."),
            EventKind::CodeInProgress | EventKind::CodeInterpreting => {
                StatusUpdate::running("🤖 Running code...")
            }
            EventKind::McpCallCompleted => StatusUpdate::complete("⚒️ Called MCP tool"),
            EventKind::McpCallFailed => StatusUpdate::complete("⚒️ Error calling MCP tool"),
            EventKind::McpListToolsCompleted => StatusUpdate::complete("⚒️ Listed MCP tools"),
            EventKind::McpListToolsFailed => StatusUpdate::complete("⚒️ Error listing MCP tools"),
            EventKind::McpListToolsInProgress => StatusUpdate::running("⚒️ Listing MCP tools..."),
            EventKind::ResponseCompleted => StatusUpdate::complete(" "),
            EventKind::ImagePartial
            | EventKind::CodeDelta
            | EventKind::OutputTextDelta
            | EventKind::Unknown => return None,
        };
        Some(update)
    }
}

/// Status update for a raw event type; `None` leaves the status unchanged
pub fn classify(event_type: &str) -> Option<StatusUpdate> {
    EventKind::from_type(event_type).status()
}
