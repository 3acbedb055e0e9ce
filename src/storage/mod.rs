//! # Event Storage
//!
//! SQLite persistence for matches, raw transcriptions and the events parsed
//! out of them.
//!
//! ## Layout:
//! - **schema**: table creation (idempotent, run on every open)
//! - **models**: row types returned to handlers
//! - **matches_repo**: create/list matches
//! - **events_repo**: save a transcription with its events, query by match, delete
//!
//! ## Thread Safety:
//! A single `rusqlite::Connection` sits behind a `Mutex`. Handlers reach it
//! through `web::block` so the blocking SQLite calls never run on the async
//! workers.

pub mod events_repo;
pub mod matches_repo;
pub mod models;
pub mod schema;

pub use models::{ParsedEvent, RawEvent};

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Failures reported by the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to prepare database location: {0}")]
    Io(#[from] std::io::Error),

    #[error("database connection lock was poisoned")]
    LockPoisoned,

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{0}")]
    InvalidInput(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Owns the SQLite connection and exposes the repository operations.
pub struct EventStore {
    conn: Mutex<Connection>,
    location: Option<PathBuf>,
}

impl EventStore {
    /// Open (or create) the database file at `path` and ensure the schema.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// A private in-memory database, used by tests.
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, location: Option<PathBuf>) -> StorageResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::create_tables(&conn)?;

        match &location {
            Some(path) => tracing::info!("Event database ready at {:?}", path),
            None => tracing::debug!("In-memory event database ready"),
        }

        Ok(Self {
            conn: Mutex::new(conn),
            location,
        })
    }

    /// Run `f` with exclusive access to the connection.
    pub fn with_connection<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut Connection) -> StorageResult<T>,
    {
        let mut conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
        f(&mut conn)
    }

    /// Cheap liveness probe for the health endpoint.
    pub fn ping(&self) -> StorageResult<()> {
        self.with_connection(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
    }

    /// Database file path, `None` for in-memory stores.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }
}
