// Table definitions for the event database.
// Every statement is IF NOT EXISTS so opening an existing file is a no-op.

use rusqlite::Connection;

pub fn create_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS matches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            opponent TEXT NOT NULL,
            date TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS raw_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            match_id INTEGER NOT NULL,
            transcription TEXT NOT NULL,
            timestamp TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_raw_events_match
            ON raw_events(match_id, timestamp);

        CREATE TABLE IF NOT EXISTS parsed_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            raw_event_id INTEGER NOT NULL REFERENCES raw_events(id),
            match_id INTEGER NOT NULL,
            event_type TEXT NOT NULL,
            player TEXT,
            confidence REAL NOT NULL,
            raw_text TEXT NOT NULL,
            timestamp TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_parsed_events_match
            ON parsed_events(match_id, timestamp);

        CREATE INDEX IF NOT EXISTS idx_parsed_events_raw
            ON parsed_events(raw_event_id);
        "#,
    )
}
