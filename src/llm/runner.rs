//! Runs one agent turn against the hosted Responses API
//!
//! The runner owns the session bookkeeping: history goes in as input, and
//! once the response completes the user's message plus every finished
//! output item are appended to the session in a single write. A turn that
//! fails or is abandoned part-way leaves the session untouched.

use super::openai::{OpenAiClient, ResponsesRequest};
use super::{Agent, LlmError, RunEvent, RunStream};
use crate::core::ConversationItem;
use crate::storage::SessionStore;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;

/// Something that can run the agent and stream its events
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    async fn run_streamed(
        &self,
        agent: &Agent,
        input: &str,
        session: Arc<dyn SessionStore>,
    ) -> Result<RunStream, LlmError>;
}

/// `AgentRuntime` backed by the OpenAI Responses API
#[derive(Debug, Clone)]
pub struct Runner {
    client: OpenAiClient,
}

impl Runner {
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentRuntime for Runner {
    async fn run_streamed(
        &self,
        agent: &Agent,
        input: &str,
        session: Arc<dyn SessionStore>,
    ) -> Result<RunStream, LlmError> {
        let history = session
            .get_items()
            .await
            .map_err(|e| {
                LlmError::Other(anyhow::Error::new(e).context("loading session history"))
            })?;
        let user_item = ConversationItem::user_text(input);

        let mut input_items: Vec<_> = history
            .into_iter()
            .map(ConversationItem::into_value)
            .collect();
        input_items.push(user_item.as_value().clone());

        let request = ResponsesRequest {
            model: agent.model.clone(),
            instructions: agent.instructions.clone(),
            input: input_items,
            tools: agent.tools.clone(),
            stream: true,
        };

        tracing::info!(
            agent = %agent.name,
            session_id = session.session_id(),
            history_items = request.input.len() - 1,
            "Starting agent turn"
        );

        let mut events = self.client.stream_response(&request).await?;
        let agent_name = agent.name.clone();

        let stream = async_stream::try_stream! {
            yield RunEvent::AgentUpdated { name: agent_name };

            let mut completed = Vec::new();
            let mut finished = false;

            while let Some(event) = events.next().await {
                let event = event?;

                if let Some(message) = event.failure_message() {
                    tracing::error!(
                        event_type = %event.event_type,
                        "Agent turn failed: {}",
                        message
                    );
                    Err::<(), _>(LlmError::ServiceError(message))?;
                }

                let done_item = (event.event_type == "response.output_item.done")
                    .then(|| event.item.clone())
                    .flatten();
                if event.event_type == "response.completed" {
                    finished = true;
                }

                yield RunEvent::RawResponse(event);

                if let Some(value) = done_item {
                    let item = ConversationItem::from_value(value);
                    completed.push(item.clone());
                    yield RunEvent::ItemCompleted(item);
                }
            }

            if !finished {
                Err::<(), _>(LlmError::Network(
                    "stream closed before response.completed".to_string(),
                ))?;
            }

            let mut to_store = Vec::with_capacity(completed.len() + 1);
            to_store.push(user_item);
            to_store.extend(completed);
            let stored = to_store.len();

            session
                .add_items(to_store)
                .await
                .map_err(|e| LlmError::Other(anyhow::Error::new(e).context("saving turn")))?;
            tracing::info!(stored, "Agent turn committed to session");
        };

        Ok(stream.boxed())
    }
}
