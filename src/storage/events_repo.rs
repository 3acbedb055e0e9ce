// Events repository
// Stores raw transcriptions together with the events parsed from them

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{DeletedRawEvent, ParsedEvent, RawEvent, SavedTranscription};
use super::{EventStore, StorageError, StorageResult};
use crate::extractor::EventCandidate;

impl EventStore {
    /// Store a transcription and its parsed events atomically.
    ///
    /// Either the raw event and every parsed event are written, or nothing is.
    pub fn save_transcription(
        &self,
        match_id: i64,
        transcription: &str,
        events: &[EventCandidate],
    ) -> StorageResult<SavedTranscription> {
        self.with_connection(|conn| save_transcription_impl(conn, match_id, transcription, events))
    }

    /// Raw transcriptions for a match, oldest first
    pub fn raw_events_for_match(&self, match_id: i64) -> StorageResult<Vec<RawEvent>> {
        self.with_connection(|conn| raw_events_for_match_impl(conn, match_id))
    }

    /// Parsed events for a match, oldest first
    pub fn parsed_events_for_match(&self, match_id: i64) -> StorageResult<Vec<ParsedEvent>> {
        self.with_connection(|conn| parsed_events_for_match_impl(conn, match_id))
    }

    /// Delete a raw event and every event parsed from it
    pub fn delete_raw_event(&self, event_id: i64) -> StorageResult<DeletedRawEvent> {
        self.with_connection(|conn| delete_raw_event_impl(conn, event_id))
    }
}

fn save_transcription_impl(
    conn: &mut Connection,
    match_id: i64,
    transcription: &str,
    events: &[EventCandidate],
) -> StorageResult<SavedTranscription> {
    let tx = conn.transaction()?;
    let now = Utc::now();

    tx.execute(
        "INSERT INTO raw_events (match_id, transcription, timestamp) VALUES (?1, ?2, ?3)",
        params![match_id, transcription, now],
    )?;
    let raw_event_id = tx.last_insert_rowid();

    let mut parsed_event_ids = Vec::with_capacity(events.len());
    {
        let mut stmt = tx.prepare(
            r#"
            INSERT INTO parsed_events (
                raw_event_id, match_id, event_type, player, confidence, raw_text, timestamp
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )?;

        for event in events {
            stmt.execute(params![
                raw_event_id,
                match_id,
                event.kind.as_str(),
                event.player,
                event.confidence,
                event.raw_text,
                now,
            ])?;
            parsed_event_ids.push(tx.last_insert_rowid());
        }
    }

    tx.commit()?;

    Ok(SavedTranscription {
        raw_event_id,
        parsed_event_ids,
    })
}

fn raw_events_for_match_impl(conn: &Connection, match_id: i64) -> StorageResult<Vec<RawEvent>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, match_id, transcription, timestamp
        FROM raw_events
        WHERE match_id = ?1
        ORDER BY timestamp ASC, id ASC
        "#,
    )?;

    let events = stmt
        .query_map(params![match_id], |row| {
            Ok(RawEvent {
                id: row.get(0)?,
                match_id: row.get(1)?,
                transcription: row.get(2)?,
                timestamp: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

fn parsed_events_for_match_impl(conn: &Connection, match_id: i64) -> StorageResult<Vec<ParsedEvent>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, raw_event_id, match_id, event_type, player, confidence, raw_text, timestamp
        FROM parsed_events
        WHERE match_id = ?1
        ORDER BY timestamp ASC, id ASC
        "#,
    )?;

    let events = stmt
        .query_map(params![match_id], |row| {
            Ok(ParsedEvent {
                id: row.get(0)?,
                raw_event_id: row.get(1)?,
                match_id: row.get(2)?,
                event_type: row.get(3)?,
                player: row.get(4)?,
                confidence: row.get(5)?,
                raw_text: row.get(6)?,
                timestamp: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

fn delete_raw_event_impl(conn: &mut Connection, event_id: i64) -> StorageResult<DeletedRawEvent> {
    let tx = conn.transaction()?;

    let exists = tx
        .query_row(
            "SELECT id FROM raw_events WHERE id = ?1",
            params![event_id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;

    if exists.is_none() {
        return Err(StorageError::NotFound {
            entity: "raw event",
            id: event_id,
        });
    }

    let parsed_events_deleted = tx.execute(
        "DELETE FROM parsed_events WHERE raw_event_id = ?1",
        params![event_id],
    )?;
    tx.execute("DELETE FROM raw_events WHERE id = ?1", params![event_id])?;
    tx.commit()?;

    Ok(DeletedRawEvent {
        event_id,
        parsed_events_deleted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{EventExtractor, Vocabulary};

    fn parse(text: &str) -> Vec<EventCandidate> {
        EventExtractor::new(Vocabulary::default()).unwrap().parse(text)
    }

    #[test]
    fn test_save_and_query_transcription() {
        let store = EventStore::open_in_memory().unwrap();
        let text = "Goal Winston, Save Tommy, nice weather";
        let events = parse(text);

        let saved = store.save_transcription(4, text, &events).unwrap();
        assert_eq!(saved.parsed_event_ids.len(), 3);

        let raw = store.raw_events_for_match(4).unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].id, saved.raw_event_id);
        assert_eq!(raw[0].transcription, text);

        let parsed = store.parsed_events_for_match(4).unwrap();
        let ids: Vec<i64> = parsed.iter().map(|e| e.id).collect();
        assert_eq!(ids, saved.parsed_event_ids);
        assert_eq!(parsed[0].event_type, "goal");
        assert_eq!(parsed[0].player.as_deref(), Some("Winston"));
        assert_eq!(parsed[0].confidence, 0.9);
        assert_eq!(parsed[1].event_type, "save");
        assert_eq!(parsed[2].event_type, "unknown");
        assert_eq!(parsed[2].player, None);
        assert_eq!(parsed[2].confidence, 0.0);
        assert!(parsed.iter().all(|e| e.raw_event_id == saved.raw_event_id));

        assert!(store.raw_events_for_match(5).unwrap().is_empty());
        assert!(store.parsed_events_for_match(5).unwrap().is_empty());
    }

    #[test]
    fn test_save_transcription_without_events() {
        let store = EventStore::open_in_memory().unwrap();
        let saved = store.save_transcription(1, "", &[]).unwrap();
        assert!(saved.parsed_event_ids.is_empty());
        assert_eq!(store.raw_events_for_match(1).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_removes_all_parsed_events() {
        let store = EventStore::open_in_memory().unwrap();
        let first = store
            .save_transcription(1, "Goal Winston, Shot Kip", &parse("Goal Winston, Shot Kip"))
            .unwrap();
        let second = store
            .save_transcription(1, "Pass Logan", &parse("Pass Logan"))
            .unwrap();

        let deleted = store.delete_raw_event(first.raw_event_id).unwrap();
        assert_eq!(deleted.event_id, first.raw_event_id);
        assert_eq!(deleted.parsed_events_deleted, 2);

        let raw = store.raw_events_for_match(1).unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].id, second.raw_event_id);

        let parsed = store.parsed_events_for_match(1).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].event_type, "pass");
    }

    #[test]
    fn test_delete_unknown_raw_event() {
        let store = EventStore::open_in_memory().unwrap();
        assert!(matches!(
            store.delete_raw_event(99),
            Err(StorageError::NotFound { id: 99, .. })
        ));
    }
}
