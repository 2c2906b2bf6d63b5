//! Hosted agent runtime: agent definition, API client and turn runner

mod agent;
mod error;
pub mod openai;
mod runner;
pub mod streaming;
mod types;

pub use agent::{Agent, ContainerConfig, HostedTool, DEFAULT_AGENT_NAME, DEFAULT_INSTRUCTIONS};
pub use error::LlmError;
pub use openai::OpenAiClient;
pub use runner::{AgentRuntime, Runner};
pub use types::{RawResponseEvent, RunEvent, RunStream, UploadedFile};
