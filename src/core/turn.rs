//! Streaming consumer for one chat turn
//!
//! Raw events are folded into a [`TurnState`] in arrival order and every
//! visible change is pushed to the browser as a [`RenderCommand`].

use super::items::{ConversationItem, ItemKind};
use super::render::{escape_dollars, ImageSource};
use super::status::{EventKind, StatusPhase, StatusUpdate};
use crate::llm::{Agent, AgentRuntime, LlmError, RawResponseEvent, RunEvent};
use crate::storage::SessionStore;
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Incremental display update sent to the browser
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderCommand {
    /// Reset the status, text, code and image surfaces
    ClearSurfaces,
    UserMessage {
        text: String,
    },
    UserImage {
        src: String,
    },
    UploadStatus {
        file: String,
        label: String,
        phase: StatusPhase,
    },
    Status {
        label: String,
        phase: StatusPhase,
    },
    /// Full assistant text so far, already `$`-escaped
    Text {
        text: String,
    },
    /// Full interpreter code so far
    Code {
        code: String,
    },
    /// Latest image, partial or final; replaces any previous one
    Image {
        src: ImageSource,
    },
    Done,
    Error {
        message: String,
    },
}

impl RenderCommand {
    pub fn status(update: StatusUpdate) -> Self {
        RenderCommand::Status {
            label: update.label,
            phase: update.phase,
        }
    }

    pub fn error(message: impl ToString) -> Self {
        RenderCommand::Error {
            message: message.to_string(),
        }
    }
}

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    /// The receiving side went away before the stream finished
    Cancelled,
}

/// Accumulated text and code for the reply being streamed
#[derive(Debug, Default, Clone)]
pub struct TurnState {
    text: String,
    code: String,
}

impl TurnState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Fold one raw event into the state, returning what changed on screen
    pub fn apply(&mut self, event: &RawResponseEvent) -> Vec<RenderCommand> {
        let kind = EventKind::from_type(&event.event_type);
        let mut commands = Vec::new();

        if let Some(update) = kind.status() {
            commands.push(RenderCommand::status(update));
        }

        match kind {
            EventKind::OutputTextDelta => {
                if let Some(delta) = &event.delta {
                    self.text.push_str(delta);
                    commands.push(RenderCommand::Text {
                        text: escape_dollars(&self.text),
                    });
                }
            }
            EventKind::CodeDelta => {
                if let Some(delta) = &event.delta {
                    self.code.push_str(delta);
                    commands.push(RenderCommand::Code {
                        code: self.code.clone(),
                    });
                }
            }
            EventKind::ImagePartial => match event.partial_image_b64.as_deref() {
                Some(b64) => match ImageSource::from_base64(b64) {
                    Ok(src) => commands.push(RenderCommand::Image { src }),
                    Err(e) => tracing::warn!("Skipping undecodable partial image: {}", e),
                },
                None => tracing::debug!("Partial image event without payload"),
            },
            EventKind::Unknown => {
                tracing::trace!(event_type = %event.event_type, "Ignoring stream event");
            }
            _ => {}
        }

        commands
    }

    /// Commands for an output item the runtime reports as finished
    ///
    /// A completed image generation call carries the full-quality image,
    /// which replaces the last partial preview.
    pub fn complete_item(&self, item: &ConversationItem) -> Vec<RenderCommand> {
        if item.kind() != Some(ItemKind::ImageGenerationCall) {
            return Vec::new();
        }
        let Some(result) = item.str_field("result") else {
            tracing::debug!("Image generation item completed without a result");
            return Vec::new();
        };
        match ImageSource::from_base64(result) {
            Ok(src) => vec![RenderCommand::Image { src }],
            Err(e) => {
                tracing::warn!("Skipping undecodable generated image: {}", e);
                Vec::new()
            }
        }
    }
}

/// Stream one agent turn into `tx`
///
/// Emits `Done` when the stream finishes, or `Error` (and returns the error)
/// when the runtime fails. If `tx` is closed the upstream stream is dropped
/// and the turn reports `Cancelled`.
pub async fn run_turn(
    runtime: &dyn AgentRuntime,
    agent: &Agent,
    session: Arc<dyn SessionStore>,
    message: &str,
    tx: &UnboundedSender<RenderCommand>,
) -> Result<TurnOutcome, LlmError> {
    let mut stream = match runtime.run_streamed(agent, message, session).await {
        Ok(stream) => stream,
        Err(e) => {
            if e.is_client_error() {
                tracing::warn!("Agent request rejected, check OPENAI_API_KEY and model: {}", e);
            } else {
                tracing::error!("Failed to start agent turn: {}", e);
            }
            let _ = tx.send(RenderCommand::error(&e));
            return Err(e);
        }
    };

    let mut state = TurnState::new();
    while let Some(event) = stream.next().await {
        if tx.is_closed() {
            tracing::info!("Render channel closed, abandoning turn");
            return Ok(TurnOutcome::Cancelled);
        }

        let commands = match event {
            Ok(RunEvent::RawResponse(raw)) => state.apply(&raw),
            Ok(RunEvent::AgentUpdated { name }) => {
                tracing::debug!(agent = %name, "Agent started");
                continue;
            }
            Ok(RunEvent::ItemCompleted(item)) => {
                tracing::debug!(item_type = ?item.item_type(), "Output item completed");
                state.complete_item(&item)
            }
            Err(e) => {
                tracing::error!("Agent turn failed: {}", e);
                let _ = tx.send(RenderCommand::error(&e));
                return Err(e);
            }
        };

        for command in commands {
            if tx.send(command).is_err() {
                tracing::info!("Render channel closed, abandoning turn");
                return Ok(TurnOutcome::Cancelled);
            }
        }
    }

    if tx.send(RenderCommand::Done).is_err() {
        return Ok(TurnOutcome::Cancelled);
    }
    Ok(TurnOutcome::Completed)
}
