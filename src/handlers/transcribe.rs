//! # Commentary Intake Handlers
//!
//! The pipeline every piece of commentary goes through:
//!
//! 1. **Receive**: stream the multipart `file` field into a temp file
//!    (`/transcribe` only)
//! 2. **Decode**: any supported audio format to 16kHz mono samples on the blocking pool
//! 3. **Transcribe**: hand the samples to the speech model
//! 4. **Extract**: split the text into phrases and classify each one
//! 5. **Persist**: raw transcription plus parsed events in one transaction
//!
//! `/events/text` enters at step 4 with text the client already has, and
//! `/parse` runs step 4 alone without touching the database.

use super::ensure_positive_id;
use crate::audio::{decode_audio_file, TempUpload};
use crate::config::UploadsConfig;
use crate::error::{AppError, AppResult};
use crate::extractor::EventCandidate;
use crate::state::AppState;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Matches are addressed by `?match_id=`; commentary without one goes to match 1.
const DEFAULT_MATCH_ID: i64 = 1;

#[derive(Debug, Deserialize)]
pub struct MatchQuery {
    pub match_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TextSubmission {
    pub text: String,
    pub match_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ParseRequest {
    pub text: String,
}

/// Body returned after commentary has been transcribed and stored.
#[derive(Debug, Serialize)]
pub struct RecordedCommentary {
    pub transcription: String,
    pub parsed_events: Vec<EventCandidate>,
    pub saved: bool,
    pub raw_event_id: i64,
    pub parsed_event_ids: Vec<i64>,
    pub match_id: i64,
}

/// `POST /transcribe?match_id=N` with a multipart `file` field holding an
/// audio clip (WAV, FLAC, MP3, M4A or Ogg Vorbis).
pub async fn transcribe_upload(
    state: web::Data<AppState>,
    query: web::Query<MatchQuery>,
    mut payload: Multipart,
) -> AppResult<HttpResponse> {
    let match_id = ensure_positive_id("match_id", query.match_id.unwrap_or(DEFAULT_MATCH_ID))?;
    let _active = state.begin_transcription();
    let start_time = Instant::now();

    let mut upload = receive_audio(&state.config.uploads, &mut payload).await?;
    let path = upload.finish().await?.to_path_buf();
    tracing::debug!(match_id, bytes = upload.len(), "Received audio upload");

    let samples = web::block(move || decode_audio_file(&path)).await??;
    let transcript = state.transcriber.transcribe(samples).await?;
    drop(upload);

    tracing::info!(
        match_id,
        audio_seconds = transcript.audio_duration,
        duration_ms = transcript.processing_time_ms,
        "Transcribed commentary: {:?}",
        transcript.text
    );

    let recorded = record_commentary(&state, match_id, transcript.text).await?;
    tracing::debug!(
        match_id,
        duration_ms = start_time.elapsed().as_millis() as u64,
        "Upload pipeline finished"
    );
    Ok(HttpResponse::Ok().json(recorded))
}

/// `POST /events/text` with `{"text": "...", "match_id": N}`.
///
/// Same result as `/transcribe`, for commentary that is already text.
pub async fn submit_text(
    state: web::Data<AppState>,
    body: web::Json<TextSubmission>,
) -> AppResult<HttpResponse> {
    let TextSubmission { text, match_id } = body.into_inner();
    let match_id = ensure_positive_id("match_id", match_id.unwrap_or(DEFAULT_MATCH_ID))?;

    if text.trim().is_empty() {
        return Err(AppError::InvalidInput("Commentary text must not be empty".to_string()));
    }

    let recorded = record_commentary(&state, match_id, text).await?;
    Ok(HttpResponse::Ok().json(recorded))
}

/// `POST /parse` with `{"text": "..."}`: extraction only, nothing is stored.
pub async fn parse_text(state: web::Data<AppState>, body: web::Json<ParseRequest>) -> HttpResponse {
    let parsed_events = state.extractor.parse(&body.text);
    state.record_extracted_events(parsed_events.len());

    HttpResponse::Ok().json(serde_json::json!({
        "event_count": parsed_events.len(),
        "parsed_events": parsed_events
    }))
}

/// Stream the `file` field into a temp file. Other fields are skipped.
async fn receive_audio(uploads: &UploadsConfig, payload: &mut Multipart) -> AppResult<TempUpload> {
    while let Some(mut field) = payload.try_next().await? {
        let disposition = field.content_disposition();
        if disposition.and_then(|cd| cd.get_name()) != Some("file") {
            continue;
        }
        let filename = disposition.and_then(|cd| cd.get_filename()).map(str::to_string);

        let mut upload =
            TempUpload::create(&uploads.temp_dir, filename.as_deref(), uploads.max_upload_bytes).await?;
        while let Some(chunk) = field.try_next().await? {
            upload.write_chunk(&chunk).await?;
        }
        return Ok(upload);
    }

    Err(AppError::InvalidInput("No audio file in upload (expected a 'file' field)".to_string()))
}

/// Extract events from `transcription` and store both atomically.
async fn record_commentary(
    state: &AppState,
    match_id: i64,
    transcription: String,
) -> AppResult<RecordedCommentary> {
    let parsed_events = state.extractor.parse(&transcription);
    state.record_extracted_events(parsed_events.len());

    let store = Arc::clone(&state.store);
    let text = transcription.clone();
    let events = parsed_events.clone();
    let saved = web::block(move || store.save_transcription(match_id, &text, &events)).await??;

    let unrecognized = parsed_events.iter().filter(|e| e.kind.is_unknown()).count();
    tracing::info!(
        match_id,
        raw_event_id = saved.raw_event_id,
        event_count = saved.parsed_event_ids.len(),
        unrecognized,
        "Recorded commentary"
    );

    Ok(RecordedCommentary {
        transcription,
        parsed_events,
        saved: true,
        raw_event_id: saved.raw_event_id,
        parsed_event_ids: saved.parsed_event_ids,
        match_id,
    })
}

#[cfg(test)]
mod tests {
    use crate::handlers::configure_routes;
    use crate::state::test_support::state_with_transcript;
    use actix_web::http::{header, StatusCode};
    use actix_web::{test, web, App};
    use serde_json::{json, Value};
    use std::io::Cursor;

    const BOUNDARY: &str = "----commentary-boundary";

    fn wav_bytes(seconds: usize) -> Vec<u8> {
        let samples: Vec<i16> = (0..16_000 * seconds).map(|i| ((i % 64) as i16 - 32) * 256).collect();
        let mut cursor = Cursor::new(Vec::new());
        wav::write(
            wav::Header::new(wav::WAV_FORMAT_PCM, 1, 16_000, 16),
            &wav::BitDepth::Sixteen(samples),
            &mut cursor,
        )
        .unwrap();
        cursor.into_inner()
    }

    fn multipart_body(field: &str, filename: &str, content: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                field, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: audio/wav\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload_request(uri: &str, body: Vec<u8>) -> test::TestRequest {
        test::TestRequest::post()
            .uri(uri)
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(body)
    }

    #[actix_web::test]
    async fn test_upload_is_transcribed_parsed_and_stored() {
        let state = web::Data::new(state_with_transcript(Some("Goal Winston, Save Tommy, Shot Kip")));
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure_routes)).await;

        let req = upload_request("/transcribe?match_id=4", multipart_body("file", "clip.wav", &wav_bytes(1)));
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["transcription"], "Goal Winston, Save Tommy, Shot Kip");
        assert_eq!(body["saved"], true);
        assert_eq!(body["match_id"], 4);
        assert_eq!(body["parsed_events"].as_array().unwrap().len(), 3);
        assert_eq!(body["parsed_events"][1]["type"], "save");
        assert_eq!(body["parsed_events"][1]["player"], "Tommy");
        assert_eq!(body["parsed_event_ids"].as_array().unwrap().len(), 3);

        let stored = state.store.parsed_events_for_match(4).unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[2].event_type, "shot");
        assert_eq!(state.get_metrics_snapshot().active_transcriptions, 0);
    }

    #[actix_web::test]
    async fn test_upload_defaults_to_match_one() {
        let state = web::Data::new(state_with_transcript(Some("The weather was nice today")));
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure_routes)).await;

        let req = upload_request("/transcribe", multipart_body("file", "clip.wav", &wav_bytes(1)));
        let body: Value = test::call_and_read_body_json(&app, req.to_request()).await;
        assert_eq!(body["match_id"], 1);
        assert_eq!(body["parsed_events"][0]["type"], "unknown");
        assert_eq!(body["parsed_events"][0]["confidence"], 0.0);
        assert_eq!(state.store.raw_events_for_match(1).unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn test_upload_without_file_field_is_rejected() {
        let state = web::Data::new(state_with_transcript(Some("goal")));
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure_routes)).await;

        let req = upload_request("/transcribe", multipart_body("audio", "clip.wav", &wav_bytes(1)));
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["type"], "invalid_input");
        assert!(state.store.raw_events_for_match(1).unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_undecodable_upload_is_rejected() {
        let state = web::Data::new(state_with_transcript(Some("goal")));
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure_routes)).await;

        let req = upload_request("/transcribe", multipart_body("file", "clip.wav", b"not audio at all"));
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_upload_without_model_is_unavailable() {
        let state = web::Data::new(state_with_transcript(None));
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure_routes)).await;

        let req = upload_request("/transcribe", multipart_body("file", "clip.wav", &wav_bytes(1)));
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["type"], "transcription_unavailable");
        assert!(state.store.raw_events_for_match(1).unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_upload_rejects_non_positive_match() {
        let state = web::Data::new(state_with_transcript(Some("goal")));
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure_routes)).await;

        let req = upload_request("/transcribe?match_id=0", multipart_body("file", "clip.wav", &wav_bytes(1)));
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_text_submission_is_stored() {
        let state = web::Data::new(state_with_transcript(None));
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure_routes)).await;

        let req = test::TestRequest::post()
            .uri("/events/text")
            .set_json(json!({"text": "Alex scored. Pass from Logan to Tom!", "match_id": 2}));
        let body: Value = test::call_and_read_body_json(&app, req.to_request()).await;

        assert_eq!(body["saved"], true);
        assert_eq!(body["match_id"], 2);
        assert_eq!(body["parsed_events"][0]["type"], "goal");
        assert_eq!(body["parsed_events"][0]["player"], "Alex");
        assert_eq!(body["parsed_events"][1]["type"], "pass");
        assert_eq!(body["parsed_events"][1]["player"], "Logan");

        let raw = state.store.raw_events_for_match(2).unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].id, body["raw_event_id"].as_i64().unwrap());
    }

    #[actix_web::test]
    async fn test_blank_text_submission_is_rejected() {
        let state = web::Data::new(state_with_transcript(None));
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure_routes)).await;

        let req = test::TestRequest::post().uri("/events/text").set_json(json!({"text": "   "}));
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_parse_does_not_persist() {
        let state = web::Data::new(state_with_transcript(None));
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure_routes)).await;

        let req = test::TestRequest::post()
            .uri("/parse")
            .set_json(json!({"text": "Goal Winston"}));
        let body: Value = test::call_and_read_body_json(&app, req.to_request()).await;

        assert_eq!(body["event_count"], 1);
        assert_eq!(
            body["parsed_events"][0],
            json!({"type": "goal", "player": "Winston", "raw_text": "Goal Winston", "confidence": 0.9})
        );
        assert!(state.store.raw_events_for_match(1).unwrap().is_empty());
        assert_eq!(state.get_metrics_snapshot().events_extracted, 1);
    }

    #[actix_web::test]
    async fn test_parse_of_empty_text_yields_no_events() {
        let state = web::Data::new(state_with_transcript(None));
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure_routes)).await;

        let req = test::TestRequest::post().uri("/parse").set_json(json!({"text": ""}));
        let body: Value = test::call_and_read_body_json(&app, req.to_request()).await;
        assert_eq!(body["event_count"], 0);
        assert_eq!(body["parsed_events"], json!([]));
    }
}
