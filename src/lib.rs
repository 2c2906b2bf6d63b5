//! chatdeck: browser chat front-end for a hosted LLM agent
//!
//! This library provides:
//! - Classification of streamed agent events into tool status lines
//! - Replay of stored conversation items into display blocks
//! - A streaming consumer that turns live events into render commands
//! - Upload handling for documents (vector store) and images (inline)
//! - SQLite-backed conversation history
//! - An agent runtime over the OpenAI Responses API with hosted tools
//! - An HTTP server serving the chat page and its SSE API

pub mod config;
pub mod core;
pub mod llm;
pub mod storage;
pub mod transport;

pub use config::Config;
pub use crate::core::ChatContext;
