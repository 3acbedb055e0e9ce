//! # Speech Model Status
//!
//! Read-only view of the Whisper model: which one is configured, whether it
//! has finished loading, and how it has performed so far. The model is
//! chosen in configuration and loaded at startup, so there is no runtime
//! load/unload endpoint.

use crate::state::AppState;
use crate::transcription::ModelSize;
use actix_web::{web, HttpResponse};
use serde_json::json;

const MODEL_SIZES: [ModelSize; 5] = [
    ModelSize::Tiny,
    ModelSize::Base,
    ModelSize::Small,
    ModelSize::Medium,
    ModelSize::Large,
];

/// `GET /api/v1/models/whisper`
pub async fn whisper_status(state: web::Data<AppState>) -> HttpResponse {
    let status = state.transcriber.status();

    let available: Vec<_> = MODEL_SIZES
        .iter()
        .map(|size| {
            json!({
                "size": size,
                "repository": size.repo_name(),
                "size_mb": size.size_mb(),
                "active": size.to_string() == status.model
            })
        })
        .collect();

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "status": if status.loaded { "loaded" } else { "loading" },
        "current": status,
        "available_models": available
    }))
}

#[cfg(test)]
mod tests {
    use crate::handlers::configure_routes;
    use crate::state::test_support::state_with_transcript;
    use actix_web::{test, web, App};
    use serde_json::Value;

    #[actix_web::test]
    async fn test_whisper_status() {
        let state = web::Data::new(state_with_transcript(Some("goal")));
        let app = test::init_service(App::new().app_data(state).configure(configure_routes)).await;

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/v1/models/whisper").to_request(),
        )
        .await;

        assert_eq!(body["status"], "loaded");
        assert_eq!(body["current"]["model"], "fake");
        assert_eq!(body["available_models"].as_array().unwrap().len(), 5);
        assert_eq!(body["available_models"][0]["size"], "tiny");
        assert_eq!(body["available_models"][0]["active"], false);
    }
}
