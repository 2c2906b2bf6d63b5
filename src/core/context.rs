//! Shared state for the chat surface
//!
//! One `ChatContext` is built at startup and handed to every request. It
//! owns the collaborators a turn needs and serialises turns on the session.

use super::items::ConversationItem;
use super::render::{render_history, DisplayDirective};
use super::turn::{run_turn, RenderCommand, TurnOutcome};
use super::upload::{Attachment, FileStorage, UploadCoordinator, UploadError, UploadOutcome};
use crate::config::Config;
use crate::llm::{Agent, AgentRuntime, LlmError, OpenAiClient, Runner};
use crate::storage::{SessionStore, StorageError};
use anyhow::Context as _;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Agent(#[from] LlmError),
}

/// One submission from the chat input
#[derive(Debug, Clone, Default)]
pub struct Prompt {
    pub text: String,
    pub attachments: Vec<Attachment>,
}

impl Prompt {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

pub struct ChatContext {
    agent: Agent,
    session: Arc<dyn SessionStore>,
    runtime: Arc<dyn AgentRuntime>,
    uploads: UploadCoordinator,
    turn_lock: Mutex<()>,
}

impl ChatContext {
    pub fn new(
        agent: Agent,
        session: Arc<dyn SessionStore>,
        runtime: Arc<dyn AgentRuntime>,
        files: Arc<dyn FileStorage>,
        vector_store_id: Option<String>,
    ) -> Self {
        let uploads = UploadCoordinator::new(files, Arc::clone(&session), vector_store_id);
        Self {
            agent,
            session,
            runtime,
            uploads,
            turn_lock: Mutex::new(()),
        }
    }

    /// Wire the OpenAI-backed runtime and file storage from config
    pub fn from_config(config: &Config, session: Arc<dyn SessionStore>) -> anyhow::Result<Self> {
        let api_key = config
            .openai
            .api_key
            .clone()
            .context("OPENAI_API_KEY is not set (export it or add it to .env)")?;

        let client = OpenAiClient::new(api_key)
            .with_base_url(config.openai.base_url.as_str())
            .with_stream_timeout(Duration::from_secs(config.openai.stream_timeout_secs));

        let agent = Agent::from_config(config);
        tracing::info!(
            agent = %agent.name,
            model = %agent.model,
            tools = agent.tools.len(),
            "Agent configured"
        );

        Ok(Self::new(
            agent,
            session,
            Arc::new(Runner::new(client.clone())),
            Arc::new(client),
            config.openai.vector_store_id.clone(),
        ))
    }

    /// Raw stored items
    pub async fn items(&self) -> Result<Vec<ConversationItem>, StorageError> {
        self.session.get_items().await
    }

    /// Stored items rendered for display
    pub async fn history(&self) -> Result<Vec<DisplayDirective>, StorageError> {
        let items = self.session.get_items().await?;
        Ok(render_history(&items))
    }

    /// Clear the conversation; waits for any running turn to finish
    pub async fn reset(&self) -> Result<(), StorageError> {
        let _guard = self.turn_lock.lock().await;
        self.session.clear_session().await
    }

    /// Handle one submission, streaming display updates into `tx`
    ///
    /// Attachments are processed first, in order. The agent only runs when
    /// the prompt carries text.
    pub async fn submit(
        &self,
        prompt: Prompt,
        tx: UnboundedSender<RenderCommand>,
    ) -> Result<TurnOutcome, ChatError> {
        let _guard = self.turn_lock.lock().await;

        if tx.send(RenderCommand::ClearSurfaces).is_err() {
            return Ok(TurnOutcome::Cancelled);
        }

        let mut report = |attachment: &Attachment, status: super::status::StatusUpdate| {
            let _ = tx.send(RenderCommand::UploadStatus {
                file: attachment.name.clone(),
                label: status.label,
                phase: status.phase,
            });
        };
        let outcomes = match self.uploads.handle_all(&prompt.attachments, &mut report).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                tracing::error!("Upload failed: {}", e);
                let _ = tx.send(RenderCommand::error(&e));
                return Err(e.into());
            }
        };

        for outcome in outcomes {
            if let UploadOutcome::Inlined { data_uri } = outcome {
                let _ = tx.send(RenderCommand::UserImage { src: data_uri });
            }
        }

        let text = prompt.text.trim();
        if text.is_empty() {
            let _ = tx.send(RenderCommand::Done);
            return Ok(TurnOutcome::Completed);
        }

        if tx
            .send(RenderCommand::UserMessage {
                text: text.to_string(),
            })
            .is_err()
        {
            return Ok(TurnOutcome::Cancelled);
        }

        let outcome = run_turn(
            self.runtime.as_ref(),
            &self.agent,
            Arc::clone(&self.session),
            text,
            &tx,
        )
        .await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::turn::tests::{raw, ScriptedRuntime};
    use crate::core::upload::tests::RecordingFiles;
    use crate::llm::RawResponseEvent;
    use crate::storage::SqliteSession;
    use tokio::sync::mpsc;

    fn context(runtime: ScriptedRuntime, files: Arc<RecordingFiles>) -> ChatContext {
        ChatContext::new(
            Agent::new("ChatGPT Clone", "gpt-4.1"),
            Arc::new(SqliteSession::in_memory("chat-history").unwrap()),
            Arc::new(runtime),
            files,
            Some("vs_1".to_string()),
        )
    }

    async fn collect(
        ctx: &ChatContext,
        prompt: Prompt,
    ) -> (Result<TurnOutcome, ChatError>, Vec<RenderCommand>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = ctx.submit(prompt, tx).await;
        let mut commands = Vec::new();
        while let Some(c) = rx.recv().await {
            commands.push(c);
        }
        (result, commands)
    }

    #[tokio::test]
    async fn test_submit_text_runs_turn_and_records_history() {
        let runtime = ScriptedRuntime::new(vec![
            raw(RawResponseEvent::new("response.output_text.delta").with_delta("Hello")),
            raw(RawResponseEvent::new("response.completed")),
        ]);
        let ctx = context(runtime, Arc::new(RecordingFiles::default()));

        let (result, commands) = collect(&ctx, Prompt::text("hi there")).await;

        assert_eq!(result.unwrap(), TurnOutcome::Completed);
        assert_eq!(commands.first(), Some(&RenderCommand::ClearSurfaces));
        assert_eq!(
            commands[1],
            RenderCommand::UserMessage {
                text: "hi there".into()
            }
        );
        assert!(commands.contains(&RenderCommand::Text {
            text: "Hello".into()
        }));
        assert_eq!(commands.last(), Some(&RenderCommand::Done));

        let history = ctx.history().await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_uploads_happen_before_the_turn() {
        let files = Arc::new(RecordingFiles::default());
        let runtime = ScriptedRuntime::new(vec![raw(RawResponseEvent::new("response.completed"))]);
        let ctx = context(runtime, files.clone());

        let prompt = Prompt::text("what's in these?")
            .with_attachment(Attachment::new("notes.txt", "text/plain", b"abc".to_vec()))
            .with_attachment(Attachment::new("cat.png", "image/png", vec![1, 2, 3]));

        let (result, commands) = collect(&ctx, prompt).await;
        assert!(result.is_ok());

        let user_image = commands
            .iter()
            .position(|c| matches!(c, RenderCommand::UserImage { .. }))
            .unwrap();
        let user_message = commands
            .iter()
            .position(|c| matches!(c, RenderCommand::UserMessage { .. }))
            .unwrap();
        assert!(user_image < user_message);

        let upload_labels: Vec<_> = commands
            .iter()
            .filter_map(|c| match c {
                RenderCommand::UploadStatus { file, label, .. } => {
                    Some(format!("{}: {}", file, label))
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            upload_labels,
            vec![
                "notes.txt: ⏳ Uploading file...",
                "notes.txt: ⏳ Attaching file...",
                "notes.txt: ✅ File uploaded",
                "cat.png: ⏳ Uploading image...",
                "cat.png: ✅ Image uploaded",
            ]
        );
        assert_eq!(files.calls().len(), 2);

        // Inline image, then the committed user message
        assert_eq!(ctx.items().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_attachment_only_prompt_skips_the_agent() {
        let runtime = ScriptedRuntime::new(Vec::new());
        let ctx = context(runtime, Arc::new(RecordingFiles::default()));

        let prompt = Prompt::default()
            .with_attachment(Attachment::new("cat.png", "image/png", vec![9]));
        let (result, commands) = collect(&ctx, prompt).await;

        assert_eq!(result.unwrap(), TurnOutcome::Completed);
        assert_eq!(commands.last(), Some(&RenderCommand::Done));
        assert!(!commands
            .iter()
            .any(|c| matches!(c, RenderCommand::UserMessage { .. })));
    }

    #[tokio::test]
    async fn test_upload_failure_stops_before_the_turn() {
        let files = Arc::new(RecordingFiles {
            fail_attach: true,
            ..Default::default()
        });
        let runtime = ScriptedRuntime::new(Vec::new());
        let ctx = context(runtime, files);

        let prompt = Prompt::text("summarise")
            .with_attachment(Attachment::new("notes.txt", "text/plain", b"x".to_vec()));
        let (result, commands) = collect(&ctx, prompt).await;

        assert!(matches!(result, Err(ChatError::Upload(UploadError::Attach { .. }))));
        assert!(matches!(commands.last(), Some(RenderCommand::Error { .. })));
        assert!(ctx.items().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reset_clears_history() {
        let runtime = ScriptedRuntime::new(vec![raw(RawResponseEvent::new("response.completed"))]);
        let ctx = context(runtime, Arc::new(RecordingFiles::default()));

        let _ = collect(&ctx, Prompt::text("remember me")).await;
        assert_eq!(ctx.items().await.unwrap().len(), 1);

        ctx.reset().await.unwrap();
        assert!(ctx.items().await.unwrap().is_empty());
        assert!(ctx.history().await.unwrap().is_empty());
    }
}
