// Matches repository
// Creates and lists the matches that commentary is recorded against

use chrono::Utc;
use rusqlite::{params, Connection};

use super::models::Match;
use super::{EventStore, StorageError, StorageResult};

impl EventStore {
    /// Create a match against `opponent`, dated now
    pub fn create_match(&self, opponent: &str) -> StorageResult<Match> {
        self.with_connection(|conn| create_match_impl(conn, opponent))
    }

    /// All matches, newest first
    pub fn list_matches(&self) -> StorageResult<Vec<Match>> {
        self.with_connection(|conn| list_matches_impl(conn))
    }
}

fn create_match_impl(conn: &Connection, opponent: &str) -> StorageResult<Match> {
    let opponent = opponent.trim();
    if opponent.is_empty() {
        return Err(StorageError::InvalidInput("opponent must not be empty".to_string()));
    }

    let date = Utc::now();
    conn.execute(
        "INSERT INTO matches (opponent, date) VALUES (?1, ?2)",
        params![opponent, date],
    )?;

    Ok(Match {
        id: conn.last_insert_rowid(),
        opponent: opponent.to_string(),
        date,
    })
}

fn list_matches_impl(conn: &Connection) -> StorageResult<Vec<Match>> {
    let mut stmt = conn.prepare(
        "SELECT id, opponent, date FROM matches ORDER BY date DESC, id DESC",
    )?;

    let matches = stmt
        .query_map([], |row| {
            Ok(Match {
                id: row.get(0)?,
                opponent: row.get(1)?,
                date: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(matches)
}
