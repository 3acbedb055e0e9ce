//! # Audio Intake
//!
//! Everything between an uploaded file and the float samples the speech
//! model consumes.
//!
//! ## Key Components:
//! - **upload**: `TempUpload`, the temp-file lifecycle for multipart uploads
//! - **decode**: container probing and decoding, downmix to mono and resampling to 16kHz
//!
//! ## Output Format:
//! - **Sample Rate**: 16kHz (16,000 Hz)
//! - **Channels**: Mono
//! - **Samples**: `f32` in the range [-1.0, 1.0]

pub mod decode;
pub mod upload;

pub use decode::{decode_audio_file, TARGET_SAMPLE_RATE};
pub use upload::TempUpload;

/// Problems with an uploaded audio clip.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("failed to access upload: {0}")]
    Io(#[from] std::io::Error),

    #[error("upload is not a readable audio file: {0}")]
    InvalidFormat(String),

    #[error("unsupported audio: {0}")]
    Unsupported(String),

    #[error("failed to resample audio: {0}")]
    Resample(String),

    #[error("audio clip contains no samples")]
    Empty,

    #[error("upload exceeds the {limit} byte limit")]
    TooLarge { limit: usize },
}
