//! # Football Voice Tracker - Main Application Entry Point
//!
//! HTTP service that turns spoken match commentary into structured events.
//! A coach records a short clip ("Goal Winston, save Tommy"), the service
//! transcribes it with Whisper, extracts `{type, player}` events from the
//! text and stores both per match in SQLite.
//!
//! ## Key Rust Concepts Used:
//! - **async/await**: actix-web serves requests on an async runtime
//! - **Arc & trait objects**: shared state, with the speech model behind a trait
//! - **Result<T, E>**: startup fails loudly with context instead of panicking
//!
//! ## Application Architecture:
//! - **config**: Application configuration (TOML file + environment variables)
//! - **extractor**: Commentary text to events (pure, no I/O)
//! - **transcription**: Whisper speech-to-text via Candle-rs
//! - **audio**: Upload temp files, audio decoding and resampling
//! - **storage**: SQLite persistence for matches, transcriptions and events
//! - **state**: Shared application state and metrics
//! - **handlers / health / middleware**: the HTTP surface
//! - **error**: Error taxonomy and HTTP error responses

mod audio;
mod config;
mod device;
mod error;
mod extractor;
mod handlers;
mod health;
mod middleware;
mod state;
mod storage;
mod transcription;

use crate::config::AppConfig;
use actix_cors::Cors;
use actix_web::{middleware::NormalizePath, web, App, HttpServer};
use anyhow::{Context, Result};
use extractor::EventExtractor;
use state::AppState;
use std::sync::Arc;
use storage::EventStore;
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transcription::TranscriptionEngine;

/// The main application entry point.
///
/// ## What this function does:
/// 1. **Loads configuration** from files and environment variables
/// 2. **Sets up logging** for debugging and monitoring
/// 3. **Builds the collaborators**: extractor, database, transcription engine
/// 4. **Starts loading the speech model** in the background
/// 5. **Configures the HTTP server** with middleware and routes
/// 6. **Handles graceful shutdown** on Ctrl+C / SIGTERM
///
/// The server accepts requests while the model is still downloading; text
/// endpoints work immediately and `/transcribe` answers 503 until it is ready.
#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!("Starting football-voice-tracker v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);

    let vocabulary = config.load_vocabulary().context("Failed to load event vocabulary")?;
    info!(
        "Event vocabulary: {} actions, {} players",
        vocabulary.actions.len(),
        vocabulary.players.len()
    );
    let extractor = EventExtractor::new(vocabulary).context("Failed to build event extractor")?;

    let store = EventStore::open(&config.database.path)
        .with_context(|| format!("Failed to open database at {:?}", config.database.path))?;

    let device = device::device_from_config(&config.models.device);
    let engine = Arc::new(TranscriptionEngine::new(config.transcription_config()?, device));
    if config.models.load_on_startup {
        spawn_model_load(Arc::clone(&engine));
    } else {
        warn!("Speech model loading disabled; /transcribe will answer 503");
    }

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let app_state = web::Data::new(AppState::new(config, extractor, store, engine));

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        // The last `wrap` sees a request first: CORS, then the request span,
        // then path normalisation, so metrics record the matched route.
        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::MetricsMiddleware)
            .wrap(NormalizePath::trim())
            .wrap(TracingLogger::default())
            .wrap(cors)
            .configure(handlers::configure_routes)
    })
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {}", bind_addr))?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task error: {}", e),
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize the tracing (logging) system for the application.
///
/// ## Environment Variables:
/// - `RUST_LOG`: Controls what gets logged (e.g., "debug", "football_voice_tracker=trace")
/// - If not set, defaults to "football_voice_tracker=debug,actix_web=info"
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "football_voice_tracker=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Download and load the Whisper model without blocking startup.
fn spawn_model_load(engine: Arc<TranscriptionEngine>) {
    tokio::spawn(async move {
        if let Err(e) = engine.load_model().await {
            error!("Failed to load speech model: {:#}", e);
        }
    });
}

/// Resolve on Ctrl+C or (on Unix) SIGTERM.
///
/// If a handler cannot be installed we log it and wait on the other one,
/// rather than shutting down immediately.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
