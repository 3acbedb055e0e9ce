//! # HTTP Handlers
//!
//! Route table for the public API. Commentary endpoints sit at the root
//! (`/transcribe`, `/events/...`, `/matches`); operational endpoints live
//! under `/api/v1`.

pub mod config;
pub mod events;
pub mod matches;
pub mod models;
pub mod transcribe;

use crate::error::{AppError, AppResult};
use crate::health;
use actix_web::{web, HttpResponse};
use serde_json::json;

/// Register every route on an `App` (or a test service).
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(root))
        .route("/transcribe", web::post().to(transcribe::transcribe_upload))
        .route("/events/text", web::post().to(transcribe::submit_text))
        .route("/parse", web::post().to(transcribe::parse_text))
        .service(
            web::resource("/events/raw/{id}")
                .route(web::get().to(events::get_raw_events))
                .route(web::delete().to(events::delete_raw_event)),
        )
        .route("/events/parsed/{match_id}", web::get().to(events::get_parsed_events))
        .route("/matches/create", web::post().to(matches::create_match))
        .route("/matches", web::get().to(matches::list_matches))
        .route("/health", web::get().to(health::health_check))
        .service(
            web::scope("/api/v1")
                .route("/health", web::get().to(health::health_check))
                .route("/metrics", web::get().to(health::detailed_metrics))
                .route("/config", web::get().to(config::get_config))
                .route("/models/whisper", web::get().to(models::whisper_status)),
        );
}

pub async fn root() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "message": "Football Voice Tracker API",
        "status": "running"
    }))
}

/// Database ids start at 1; zero and negatives can never address a row.
pub(crate) fn ensure_positive_id(name: &str, id: i64) -> AppResult<i64> {
    if id > 0 {
        Ok(id)
    } else {
        Err(AppError::InvalidInput(format!("{} must be a positive integer, got {}", name, id)))
    }
}
