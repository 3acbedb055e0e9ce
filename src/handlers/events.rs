use super::ensure_positive_id;
use crate::error::AppResult;
use crate::storage::{ParsedEvent, RawEvent};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Serialize)]
struct RawEventView {
    id: i64,
    transcription: String,
    timestamp: DateTime<Utc>,
}

impl From<RawEvent> for RawEventView {
    fn from(event: RawEvent) -> Self {
        Self {
            id: event.id,
            transcription: event.transcription,
            timestamp: event.timestamp,
        }
    }
}

#[derive(Debug, Serialize)]
struct ParsedEventView {
    id: i64,
    raw_event_id: i64,
    event_type: String,
    player: Option<String>,
    confidence: f64,
    raw_text: String,
    timestamp: DateTime<Utc>,
}

impl From<ParsedEvent> for ParsedEventView {
    fn from(event: ParsedEvent) -> Self {
        Self {
            id: event.id,
            raw_event_id: event.raw_event_id,
            event_type: event.event_type,
            player: event.player,
            confidence: event.confidence,
            raw_text: event.raw_text,
            timestamp: event.timestamp,
        }
    }
}

/// `GET /events/raw/{match_id}`: transcriptions for a match, oldest first.
pub async fn get_raw_events(state: web::Data<AppState>, path: web::Path<i64>) -> AppResult<HttpResponse> {
    let match_id = ensure_positive_id("match_id", path.into_inner())?;

    let store = state.store.clone();
    let events = web::block(move || store.raw_events_for_match(match_id)).await??;
    let events: Vec<RawEventView> = events.into_iter().map(Into::into).collect();

    Ok(HttpResponse::Ok().json(json!({
        "match_id": match_id,
        "event_count": events.len(),
        "events": events
    })))
}

/// `GET /events/parsed/{match_id}`: extracted events for a match, oldest first.
///
/// `player` is `null` for events without an attributed player.
pub async fn get_parsed_events(state: web::Data<AppState>, path: web::Path<i64>) -> AppResult<HttpResponse> {
    let match_id = ensure_positive_id("match_id", path.into_inner())?;

    let store = state.store.clone();
    let events = web::block(move || store.parsed_events_for_match(match_id)).await??;
    let events: Vec<ParsedEventView> = events.into_iter().map(Into::into).collect();

    Ok(HttpResponse::Ok().json(json!({
        "match_id": match_id,
        "event_count": events.len(),
        "events": events
    })))
}

/// `DELETE /events/raw/{event_id}`: removes the transcription and every event parsed from it.
pub async fn delete_raw_event(state: web::Data<AppState>, path: web::Path<i64>) -> AppResult<HttpResponse> {
    let event_id = ensure_positive_id("event_id", path.into_inner())?;

    let store = state.store.clone();
    let deleted = web::block(move || store.delete_raw_event(event_id)).await??;
    tracing::info!(
        raw_event_id = deleted.event_id,
        event_count = deleted.parsed_events_deleted,
        "Deleted raw event"
    );

    Ok(HttpResponse::Ok().json(json!({
        "deleted": true,
        "event_id": deleted.event_id,
        "parsed_events_deleted": deleted.parsed_events_deleted
    })))
}
