//! Conversation history in SQLite
//!
//! Items are stored as JSON text, one row per item, ordered by an
//! autoincrement id so insertion order is display order.

use super::StorageError;
use crate::core::ConversationItem;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Ordered, append-only item persistence for one conversation
#[async_trait]
pub trait SessionStore: Send + Sync {
    fn session_id(&self) -> &str;

    /// All items, oldest first
    async fn get_items(&self) -> Result<Vec<ConversationItem>, StorageError>;

    /// Append items atomically, preserving their order
    async fn add_items(&self, items: Vec<ConversationItem>) -> Result<(), StorageError>;

    /// Remove and return the newest item
    async fn pop_item(&self) -> Result<Option<ConversationItem>, StorageError>;

    /// Drop every item of this conversation
    async fn clear_session(&self) -> Result<(), StorageError>;
}

/// SQLite-backed session store
pub struct SqliteSession {
    session_id: String,
    db_path: Option<PathBuf>,
    db: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSession")
            .field("session_id", &self.session_id)
            .field("db_path", &self.db_path)
            .finish()
    }
}

impl SqliteSession {
    /// Open (or create) the database file and its tables
    pub fn open(
        session_id: impl Into<String>,
        db_path: impl AsRef<Path>,
    ) -> Result<Self, StorageError> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&db_path)?;
        Self::from_connection(session_id.into(), Some(db_path), conn)
    }

    /// Throwaway store, used by tests and `--ephemeral` runs
    pub fn in_memory(session_id: impl Into<String>) -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(session_id.into(), None, conn)
    }

    fn from_connection(
        session_id: String,
        db_path: Option<PathBuf>,
        conn: Connection,
    ) -> Result<Self, StorageError> {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS agent_sessions (
                session_id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS agent_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                message_data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY(session_id) REFERENCES agent_sessions(session_id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_agent_messages_session
                ON agent_messages(session_id, id);",
        )?;

        tracing::debug!(session_id = %session_id, db_path = ?db_path, "Opened session store");

        Ok(Self {
            session_id,
            db_path,
            db: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Run a closure against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &str) -> Result<T, StorageError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let session_id = self.session_id.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = db.lock().map_err(|_| StorageError::Poisoned)?;
            f(&mut conn, &session_id)
        })
        .await?
    }
}

#[async_trait]
impl SessionStore for SqliteSession {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn get_items(&self) -> Result<Vec<ConversationItem>, StorageError> {
        self.with_conn(|conn, session_id| {
            let mut stmt = conn.prepare(
                "SELECT id, message_data FROM agent_messages
                 WHERE session_id = ?1
                 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![session_id], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?;

            let mut items = Vec::new();
            for row in rows {
                let (id, data) = row?;
                match serde_json::from_str(&data) {
                    Ok(value) => items.push(ConversationItem::from_value(value)),
                    Err(e) => tracing::warn!(id, "Skipping unreadable stored item: {}", e),
                }
            }
            Ok(items)
        })
        .await
    }

    async fn add_items(&self, items: Vec<ConversationItem>) -> Result<(), StorageError> {
        if items.is_empty() {
            return Ok(());
        }
        let payloads = items
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;

        self.with_conn(move |conn, session_id| {
            let now = Utc::now().to_rfc3339();
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR IGNORE INTO agent_sessions (session_id, created_at, updated_at)
                 VALUES (?1, ?2, ?2)",
                params![session_id, now],
            )?;
            {
                let mut insert = tx.prepare(
                    "INSERT INTO agent_messages (session_id, message_data, created_at)
                     VALUES (?1, ?2, ?3)",
                )?;
                for payload in &payloads {
                    insert.execute(params![session_id, payload, now])?;
                }
            }
            tx.execute(
                "UPDATE agent_sessions SET updated_at = ?2 WHERE session_id = ?1",
                params![session_id, now],
            )?;
            tx.commit()?;

            tracing::debug!(session_id, count = payloads.len(), "Stored conversation items");
            Ok(())
        })
        .await
    }

    async fn pop_item(&self) -> Result<Option<ConversationItem>, StorageError> {
        self.with_conn(|conn, session_id| {
            let tx = conn.transaction()?;
            let last: Option<(i64, String)> = tx
                .query_row(
                    "SELECT id, message_data FROM agent_messages
                     WHERE session_id = ?1
                     ORDER BY id DESC LIMIT 1",
                    params![session_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((id, data)) = last else {
                return Ok(None);
            };
            // An unreadable row stays in place
            let item = ConversationItem::from_value(serde_json::from_str(&data)?);
            tx.execute("DELETE FROM agent_messages WHERE id = ?1", params![id])?;
            tx.commit()?;

            Ok(Some(item))
        })
        .await
    }

    async fn clear_session(&self) -> Result<(), StorageError> {
        self.with_conn(|conn, session_id| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM agent_messages WHERE session_id = ?1",
                params![session_id],
            )?;
            tx.execute(
                "DELETE FROM agent_sessions WHERE session_id = ?1",
                params![session_id],
            )?;
            tx.commit()?;
            tracing::info!(session_id, "Cleared session");
            Ok(())
        })
        .await
    }
}
