// Row types for the event database
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A match that commentary can be recorded against
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    pub id: i64,
    pub opponent: String,
    pub date: DateTime<Utc>,
}

/// One transcription exactly as the speech model produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawEvent {
    pub id: i64,
    pub match_id: i64,
    pub transcription: String,
    pub timestamp: DateTime<Utc>,
}

/// One event extracted from a raw transcription
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedEvent {
    pub id: i64,
    pub raw_event_id: i64,
    pub match_id: i64,
    pub event_type: String,
    pub player: Option<String>,
    pub confidence: f64,
    pub raw_text: String,
    pub timestamp: DateTime<Utc>,
}

/// Identifiers assigned when a transcription and its events are stored
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedTranscription {
    pub raw_event_id: i64,
    pub parsed_event_ids: Vec<i64>,
}

/// Outcome of deleting a raw event together with its parsed events
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeletedRawEvent {
    pub event_id: i64,
    pub parsed_events_deleted: usize,
}
