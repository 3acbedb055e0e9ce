//! # Application State Management
//!
//! This module holds everything the HTTP handlers share: configuration, the
//! event extractor, the SQLite store, the speech transcriber and request
//! metrics.
//!
//! ## Key Rust Concepts:
//!
//! ### Arc (Atomically Reference Counted)
//! - Every actix worker gets a clone of `AppState`; cloning only bumps the
//!   reference counts, the extractor/store/model are never copied
//!
//! ### Arc<dyn Trait>
//! - `transcriber` is a trait object, so the real Whisper engine and the
//!   fakes used in tests plug into the same handlers
//!
//! ### RwLock for metrics
//! - Metrics are the only state mutated on every request. Configuration,
//!   the extractor and the store are either immutable or synchronise
//!   internally, so they need no outer lock
//!
//! Poisoned locks are recovered with `PoisonError::into_inner`: a panic in
//! one request must not take the metrics down for every later request.

use crate::config::AppConfig;
use crate::extractor::EventExtractor;
use crate::storage::EventStore;
use crate::transcription::Transcriber;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

/// The application state shared across all HTTP request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Loaded once at startup; read-only afterwards
    pub config: Arc<AppConfig>,

    /// Stateless and reentrant, shared without locking
    pub extractor: Arc<EventExtractor>,

    /// Owns the SQLite connection (serialised by an internal mutex)
    pub store: Arc<EventStore>,

    pub transcriber: Arc<dyn Transcriber>,

    /// Updated by the metrics middleware on every request
    pub metrics: Arc<RwLock<AppMetrics>>,

    pub start_time: Instant,
}

/// Counters collected across all HTTP requests.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    pub request_count: u64,
    pub error_count: u64,

    /// Uploads currently being decoded or transcribed
    pub active_transcriptions: u32,

    /// Phrases turned into events since startup (persisted or not)
    pub events_extracted: u64,

    /// Key: method plus route pattern (e.g. "GET /events/raw/{match_id}")
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Per-endpoint request statistics.
///
/// ## Derived values:
/// - **Average response time**: total_duration_ms / request_count
/// - **Error rate**: error_count / request_count
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        extractor: EventExtractor,
        store: EventStore,
        transcriber: Arc<dyn Transcriber>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            extractor: Arc::new(extractor),
            store: Arc::new(store),
            transcriber,
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    pub fn increment_request_count(&self) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        metrics.request_count += 1;
    }

    /// Record one finished request for `endpoint`.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);

        if is_error {
            metrics.error_count += 1;
        }

        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();
        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;
        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    pub fn record_extracted_events(&self, count: usize) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        metrics.events_extracted += count as u64;
    }

    /// Mark an upload as in flight until the returned guard is dropped.
    pub fn begin_transcription(&self) -> ActiveTranscription {
        {
            let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
            metrics.active_transcriptions += 1;
        }
        ActiveTranscription {
            metrics: Arc::clone(&self.metrics),
        }
    }

    /// Copy of the current metrics, so the lock is not held while serialising.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Decrements `active_transcriptions` on drop, whichever way the request ends.
pub struct ActiveTranscription {
    metrics: Arc<RwLock<AppMetrics>>,
}

impl Drop for ActiveTranscription {
    fn drop(&mut self) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        metrics.active_transcriptions = metrics.active_transcriptions.saturating_sub(1);
    }
}

impl AppMetrics {
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Fraction of failed requests (0.0 to 1.0).
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
