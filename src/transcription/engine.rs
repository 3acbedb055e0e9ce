//! # Transcription Engine
//!
//! Owns the loaded Whisper model and turns decoded clips into text for the
//! request handlers.
//!
//! ## Key Responsibilities:
//! - **Model lifecycle**: load once (usually in the background at startup)
//! - **Clip validation**: reject empty, too short or too long audio before inference
//! - **Blocking inference**: run the model on tokio's blocking pool so the
//!   actix workers keep serving other requests
//! - **Performance monitoring**: count requests, failures and processing time

use super::{Transcriber, TranscriberStatus, Transcript, TranscriptionError};
use crate::audio::TARGET_SAMPLE_RATE;
use crate::device;
use crate::transcription::model::{ModelSize, WhisperModel};
use async_trait::async_trait;
use candle_core::Device;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

/// Settings for the speech model and the clips it accepts.
#[derive(Debug, Clone)]
pub struct TranscriptionConfig {
    pub model_size: ModelSize,

    /// Language hint (ISO 639-1 code like "en"); `None` lets Whisper detect it
    pub language: Option<String>,

    /// Clips shorter than this are rejected (seconds)
    pub min_audio_seconds: f64,

    /// Clips longer than this are rejected (seconds)
    pub max_audio_seconds: f64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            model_size: ModelSize::Tiny,
            language: Some("en".to_string()),
            min_audio_seconds: 0.3,
            max_audio_seconds: 120.0,
        }
    }
}

#[derive(Debug, Default)]
struct EngineMetrics {
    total_requests: u64,
    failed_requests: u64,
    total_audio_seconds: f64,
    total_processing_time_ms: u64,
}

/// Whisper-backed [`Transcriber`].
///
/// ## Thread Safety:
/// Decoding needs `&mut WhisperModel` (the attention caches are updated in
/// place), so the model sits behind a `Mutex` and requests take turns.
/// The `loaded` flag lets status checks answer without waiting on that lock.
pub struct TranscriptionEngine {
    model: Arc<Mutex<Option<WhisperModel>>>,
    loaded: AtomicBool,
    config: TranscriptionConfig,
    device: Device,
    metrics: RwLock<EngineMetrics>,
}

impl TranscriptionEngine {
    pub fn new(config: TranscriptionConfig, device: Device) -> Self {
        Self {
            model: Arc::new(Mutex::new(None)),
            loaded: AtomicBool::new(false),
            config,
            device,
            metrics: RwLock::new(EngineMetrics::default()),
        }
    }

    /// Download and load the configured model.
    ///
    /// Until this finishes, transcription requests fail with
    /// [`TranscriptionError::ModelNotLoaded`].
    pub async fn load_model(&self) -> anyhow::Result<()> {
        let start_time = Instant::now();
        let model = WhisperModel::load(self.config.model_size, self.device.clone()).await?;

        *self.model.lock().unwrap_or_else(PoisonError::into_inner) = Some(model);
        self.loaded.store(true, Ordering::Release);

        tracing::info!(
            "Transcription engine ready with {} model ({:.2}s)",
            self.config.model_size,
            start_time.elapsed().as_secs_f64()
        );
        Ok(())
    }

    pub fn is_model_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Check clip length against the configured bounds. Returns the duration.
    fn validate_clip(&self, samples: &[f32]) -> Result<f64, TranscriptionError> {
        if samples.is_empty() {
            return Err(TranscriptionError::InvalidAudio("audio clip contains no samples".to_string()));
        }

        let duration = samples.len() as f64 / f64::from(TARGET_SAMPLE_RATE);
        if duration < self.config.min_audio_seconds {
            return Err(TranscriptionError::InvalidAudio(format!(
                "audio clip is {:.2}s, minimum is {:.2}s",
                duration, self.config.min_audio_seconds
            )));
        }
        if duration > self.config.max_audio_seconds {
            return Err(TranscriptionError::InvalidAudio(format!(
                "audio clip is {:.1}s, maximum is {:.1}s",
                duration, self.config.max_audio_seconds
            )));
        }
        Ok(duration)
    }

    fn record(&self, audio_seconds: f64, elapsed_ms: u64, success: bool) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        metrics.total_requests += 1;
        if success {
            metrics.total_audio_seconds += audio_seconds;
            metrics.total_processing_time_ms += elapsed_ms;
        } else {
            metrics.failed_requests += 1;
        }
    }

    async fn run_inference(&self, samples: Vec<f32>) -> Result<String, TranscriptionError> {
        if !self.is_model_loaded() {
            return Err(TranscriptionError::ModelNotLoaded);
        }

        let model = Arc::clone(&self.model);
        let language = self.config.language.clone();

        tokio::task::spawn_blocking(move || {
            let mut guard = model.lock().unwrap_or_else(PoisonError::into_inner);
            let whisper = guard.as_mut().ok_or(TranscriptionError::ModelNotLoaded)?;
            whisper
                .transcribe(&samples, language.as_deref())
                .map_err(|e| TranscriptionError::Inference(e.to_string()))
        })
        .await
        .map_err(|e| TranscriptionError::Inference(format!("inference task failed: {}", e)))?
    }
}

#[async_trait]
impl Transcriber for TranscriptionEngine {
    async fn transcribe(&self, samples: Vec<f32>) -> Result<Transcript, TranscriptionError> {
        let audio_duration = match self.validate_clip(&samples) {
            Ok(duration) => duration,
            Err(e) => {
                self.record(0.0, 0, false);
                return Err(e);
            }
        };

        let start_time = Instant::now();
        let result = self.run_inference(samples).await;
        let elapsed_ms = start_time.elapsed().as_millis() as u64;
        self.record(audio_duration, elapsed_ms, result.is_ok());

        let text = result?;
        tracing::debug!(
            "Transcribed {:.2}s of audio in {}ms: {:?}",
            audio_duration,
            elapsed_ms,
            text
        );

        Ok(Transcript {
            text,
            audio_duration,
            processing_time_ms: elapsed_ms,
            model_name: self.config.model_size.to_string(),
        })
    }

    fn status(&self) -> TranscriberStatus {
        let metrics = self.metrics.read().unwrap_or_else(PoisonError::into_inner);
        let successful = metrics.total_requests - metrics.failed_requests;
        let average_processing_time_ms = if successful > 0 {
            metrics.total_processing_time_ms / successful
        } else {
            0
        };

        TranscriberStatus {
            model: self.config.model_size.to_string(),
            loaded: self.is_model_loaded(),
            device: device::describe(&self.device).to_string(),
            total_requests: metrics.total_requests,
            failed_requests: metrics.failed_requests,
            total_audio_seconds: metrics.total_audio_seconds,
            average_processing_time_ms,
        }
    }
}
