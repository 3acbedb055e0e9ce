use crate::error::AppResult;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct CreateMatchQuery {
    #[serde(default = "default_opponent")]
    pub opponent: String,
}

fn default_opponent() -> String {
    "Unknown Team".to_string()
}

/// `POST /matches/create?opponent=...`
pub async fn create_match(
    state: web::Data<AppState>,
    query: web::Query<CreateMatchQuery>,
) -> AppResult<HttpResponse> {
    let opponent = query.into_inner().opponent;

    let store = state.store.clone();
    let created = web::block(move || store.create_match(&opponent)).await??;
    tracing::info!(match_id = created.id, "Created match against {}", created.opponent);

    Ok(HttpResponse::Ok().json(json!({
        "match_id": created.id,
        "opponent": created.opponent,
        "created": true
    })))
}

/// `GET /matches`, newest first.
pub async fn list_matches(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let store = state.store.clone();
    let matches = web::block(move || store.list_matches()).await??;

    Ok(HttpResponse::Ok().json(json!({ "matches": matches })))
}
