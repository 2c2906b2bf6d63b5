//! Local persistence for conversation history

mod session;

pub use session::{SessionStore, SqliteSession};

use crate::config::SessionConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Stored item is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to prepare database location: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database lock poisoned")]
    Poisoned,

    #[error("Database task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Open the configured session database
pub fn open_session(config: &SessionConfig) -> Result<SqliteSession, StorageError> {
    SqliteSession::open(&config.conversation_id, &config.db_path)
}
