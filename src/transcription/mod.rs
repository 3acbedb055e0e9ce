//! # Transcription Module
//!
//! Speech-to-text for uploaded commentary clips, using Whisper models via the
//! Candle-rs framework.
//!
//! ## Key Components:
//! - **Transcriber trait**: the seam the request layer talks to; tests plug in fakes
//! - **Transcription Engine**: owns the loaded model, validates clips, tracks totals
//! - **Whisper Model**: hub download, log-mel features, greedy decoding
//! - **Mel filters**: Slaney-style filter bank for the log-mel spectrogram
//!
//! ## Whisper Model Sizes:
//! - **tiny**: ~39MB, fastest but least accurate (default)
//! - **base**: ~74MB
//! - **small**: ~244MB
//! - **medium**: ~769MB
//! - **large**: ~1550MB, best accuracy but slowest

pub mod engine;
pub mod mel;
pub mod model;

pub use engine::{TranscriptionConfig, TranscriptionEngine};
pub use model::ModelSize;

use async_trait::async_trait;
use serde::Serialize;

/// Text produced from one clip, with some bookkeeping for responses and logs.
#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    pub text: String,
    /// Duration of audio processed (seconds)
    pub audio_duration: f64,
    /// Time taken for transcription (milliseconds)
    pub processing_time_ms: u64,
    pub model_name: String,
}

/// Snapshot of a transcriber for health and model endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriberStatus {
    pub model: String,
    pub loaded: bool,
    pub device: String,
    pub total_requests: u64,
    pub failed_requests: u64,
    pub total_audio_seconds: f64,
    pub average_processing_time_ms: u64,
}

/// Why a clip could not be transcribed.
#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("no speech model is loaded")]
    ModelNotLoaded,

    #[error("{0}")]
    InvalidAudio(String),

    #[error("speech model failed: {0}")]
    Inference(String),
}

/// Anything that can turn 16kHz mono samples into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe one clip of 16kHz mono `f32` samples.
    async fn transcribe(&self, samples: Vec<f32>) -> Result<Transcript, TranscriptionError>;

    /// Current model and usage counters.
    fn status(&self) -> TranscriberStatus;
}
