//! Local durable store
//!
//! The whole conversation log lives under a single key as one JSON array.
//! Every append rewrites that value inside a transaction, so a reader sees
//! either the old log or the new one.

mod schema;

pub use schema::CONVERSATION_KEY;
use schema::SCHEMA;

use crate::llm::Message;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Stored value under {key} is corrupt: {source}")]
    Corrupt {
        key: String,
        source: serde_json::Error,
    },
    #[error("Failed to encode messages: {0}")]
    Encode(serde_json::Error),
    #[error("Database lock poisoned")]
    Poisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    fn run_migrations(&self) -> DbResult<()> {
        self.conn()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Load the conversation log, empty if nothing was ever written
    pub fn load_messages(&self) -> DbResult<Vec<Message>> {
        let conn = self.conn()?;
        read_log(&conn)
    }

    /// Append `batch` to the stored log.
    ///
    /// Returns the new log length.
    pub fn append_messages(&self, batch: &[Message]) -> DbResult<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut log = read_log(&tx)?;
        log.extend_from_slice(batch);
        let encoded = serde_json::to_string(&log).map_err(DbError::Encode)?;

        tx.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![CONVERSATION_KEY, encoded, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;

        Ok(log.len())
    }
}

fn read_log(conn: &Connection) -> DbResult<Vec<Message>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM kv WHERE key = ?1",
            params![CONVERSATION_KEY],
            |row| row.get(0),
        )
        .optional()?;

    match value {
        Some(json) => serde_json::from_str(&json).map_err(|source| DbError::Corrupt {
            key: CONVERSATION_KEY.to_string(),
            source,
        }),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolCall;

    #[test]
    fn test_empty_database_loads_empty_log() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.load_messages().unwrap().is_empty());
    }

    #[test]
    fn test_append_preserves_order() {
        let db = Database::open_in_memory().unwrap();
        let call = ToolCall::new("c1", "web_search", r#"{"query":"x"}"#);

        db.append_messages(&[Message::user("hi")]).unwrap();
        let len = db
            .append_messages(&[
                Message::assistant_with_tool_calls("", vec![call.clone()]),
                Message::tool_result(&call, "nothing"),
                Message::assistant("done"),
            ])
            .unwrap();
        assert_eq!(len, 4);

        let log = db.load_messages().unwrap();
        assert_eq!(log[0], Message::user("hi"));
        assert_eq!(log[1].requested_tool_calls(), &[call.clone()]);
        assert_eq!(log[2].tool_call_ref.as_deref(), Some("c1"));
        assert_eq!(log[3], Message::assistant("done"));
    }

    #[test]
    fn test_log_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("converse.db");

        {
            let db = Database::open(&path).unwrap();
            db.append_messages(&[Message::user("remember me")]).unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.load_messages().unwrap(), vec![Message::user("remember me")]);
    }

    #[test]
    fn test_corrupt_value_is_an_error() {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .unwrap()
            .execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, 'not json', '')",
                params![CONVERSATION_KEY],
            )
            .unwrap();

        assert!(matches!(db.load_messages(), Err(DbError::Corrupt { .. })));
        // A failed read must not clobber the stored value
        assert!(db.append_messages(&[Message::user("x")]).is_err());
    }
}
