use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;
use std::process;

/// Liveness plus a summary of every collaborator.
///
/// Always answers 200; `status` is `degraded` while the speech model is
/// still loading or when the database does not respond, so load balancers
/// can keep routing text-only traffic.
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let config = &state.config;
    let transcriber = state.transcriber.status();

    let store = state.store.clone();
    let database_ok = match web::block(move || store.ping()).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!("Database health check failed: {}", e);
            false
        }
        Err(e) => {
            tracing::warn!("Database health check could not run: {}", e);
            false
        }
    };

    let status = if database_ok && transcriber.loaded {
        "healthy"
    } else {
        "degraded"
    };

    HttpResponse::Ok().json(json!({
        "status": status,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.get_uptime_seconds(),
        "service": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "metrics": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": metrics.error_rate(),
            "active_transcriptions": metrics.active_transcriptions,
            "events_extracted": metrics.events_extracted
        },
        "memory": get_memory_info(),
        "models": {
            "whisper": {
                "model": transcriber.model,
                "status": if transcriber.loaded { "loaded" } else { "not_loaded" },
                "available": transcriber.loaded,
                "device": transcriber.device
            }
        },
        "database": {
            "path": state.store.location().map(|p| p.display().to_string()),
            "available": database_ok
        }
    }))
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let uptime_seconds = state.get_uptime_seconds();
    let transcriber = state.transcriber.status();

    let mut endpoint_stats: Vec<_> = metrics
        .endpoint_metrics
        .iter()
        .map(|(endpoint, metric)| {
            json!({
                "endpoint": endpoint,
                "request_count": metric.request_count,
                "error_count": metric.error_count,
                "error_rate": metric.error_rate(),
                "average_duration_ms": metric.average_duration_ms(),
                "total_duration_ms": metric.total_duration_ms
            })
        })
        .collect();
    endpoint_stats.sort_by(|a, b| a["endpoint"].as_str().cmp(&b["endpoint"].as_str()));

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "overall": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": metrics.error_rate(),
            "active_transcriptions": metrics.active_transcriptions,
            "events_extracted": metrics.events_extracted,
            "requests_per_second": if uptime_seconds > 0 {
                metrics.request_count as f64 / uptime_seconds as f64
            } else {
                0.0
            }
        },
        "endpoints": endpoint_stats,
        "transcription": transcriber,
        "memory": get_memory_info()
    }))
}

fn get_memory_info() -> serde_json::Value {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string(format!("/proc/{}/status", process::id())) {
            let read_kb = |key: &str| {
                status
                    .lines()
                    .find(|line| line.starts_with(key))
                    .and_then(|line| line.split_whitespace().nth(1))
                    .and_then(|kb| kb.parse::<u64>().ok())
                    .map_or(0, |kb| kb * 1024)
            };

            return json!({
                "resident_memory_bytes": read_kb("VmRSS:"),
                "virtual_memory_bytes": read_kb("VmSize:"),
                "available": true
            });
        }
    }

    json!({
        "resident_memory_bytes": 0,
        "virtual_memory_bytes": 0,
        "available": false,
        "note": format!("Memory info not available for pid {} on this platform", process::id())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::state_with_transcript;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn test_health_reports_collaborators() {
        let state = web::Data::new(state_with_transcript(Some("goal Winston")));
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .route("/health", web::get().to(health_check)),
        )
        .await;

        let body: serde_json::Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request()).await;

        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"]["name"], "football-voice-tracker");
        assert_eq!(body["models"]["whisper"]["status"], "loaded");
        assert_eq!(body["database"]["available"], true);
        assert!(body["database"]["path"].is_null());
    }

    #[actix_web::test]
    async fn test_health_is_degraded_without_model() {
        let state = web::Data::new(state_with_transcript(None));
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .route("/health", web::get().to(health_check))
                .route("/metrics", web::get().to(detailed_metrics)),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert!(resp.status().is_success());
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "degraded");

        state.record_endpoint_request("GET /health", 4, false);
        let metrics: serde_json::Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
        assert_eq!(metrics["endpoints"][0]["endpoint"], "GET /health");
        assert_eq!(metrics["transcription"]["model"], "fake");
    }
}
