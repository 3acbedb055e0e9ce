use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

/// `GET /api/v1/config`: effective configuration plus the active event vocabulary.
pub async fn get_config(state: web::Data<AppState>) -> HttpResponse {
    let vocabulary = state.extractor.vocabulary();
    let actions: Vec<_> = state
        .extractor
        .keyword_summary()
        .into_iter()
        .map(|(kind, keywords)| json!({ "kind": kind, "keywords": keywords }))
        .collect();

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": state.config.as_ref(),
        "vocabulary": {
            "actions": actions,
            "players": vocabulary.players,
            "max_player_distance": vocabulary.max_player_distance
        }
    }))
}
