//! # Whisper Model
//!
//! Loads a Whisper checkpoint with Candle-rs and turns 16kHz samples into text.
//!
//! ## Loading Process:
//! 1. Download `config.json`, `tokenizer.json` and `model.safetensors` from the
//!    HuggingFace hub (cached locally after the first run)
//! 2. Build the mel filter bank for the checkpoint's `num_mel_bins`
//! 3. Memory-map the weights onto the selected device
//! 4. Resolve the special tokens (SOT, language, task, EOT) from the tokenizer
//!
//! ## Decoding:
//! Audio is converted to a log-mel spectrogram and fed to the encoder in
//! 30 second windows. Each window is decoded greedily until end-of-text,
//! a repetition loop, or the token budget.

use crate::transcription::mel;
use anyhow::{anyhow, Context, Result};
use candle_core::{Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::whisper::{self as m, audio, Config};
use hf_hub::api::tokio::ApiBuilder;
use std::path::PathBuf;
use tokenizers::Tokenizer;

/// Available Whisper model sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl ModelSize {
    /// HuggingFace repository holding the checkpoint.
    pub fn repo_name(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "openai/whisper-tiny",
            ModelSize::Base => "openai/whisper-base",
            ModelSize::Small => "openai/whisper-small",
            ModelSize::Medium => "openai/whisper-medium",
            ModelSize::Large => "openai/whisper-large-v2",
        }
    }

    /// Approximate download size in MB.
    pub fn size_mb(&self) -> u32 {
        match self {
            ModelSize::Tiny => 39,
            ModelSize::Base => 74,
            ModelSize::Small => 244,
            ModelSize::Medium => 769,
            ModelSize::Large => 1550,
        }
    }
}

impl std::str::FromStr for ModelSize {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "tiny" => Ok(ModelSize::Tiny),
            "base" => Ok(ModelSize::Base),
            "small" => Ok(ModelSize::Small),
            "medium" => Ok(ModelSize::Medium),
            "large" => Ok(ModelSize::Large),
            _ => Err(anyhow!("Unknown model size: {}", s)),
        }
    }
}

impl std::fmt::Display for ModelSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Base => "base",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
            ModelSize::Large => "large",
        };
        write!(f, "{}", name)
    }
}

/// Token ids the decoder loop needs, looked up in the checkpoint's tokenizer.
#[derive(Debug, Clone, Copy)]
struct SpecialTokens {
    sot: u32,
    transcribe: u32,
    no_timestamps: u32,
    eot: u32,
}

impl SpecialTokens {
    fn resolve(tokenizer: &Tokenizer) -> Result<Self> {
        Ok(Self {
            sot: token_id(tokenizer, m::SOT_TOKEN)?,
            transcribe: token_id(tokenizer, m::TRANSCRIBE_TOKEN)?,
            no_timestamps: token_id(tokenizer, m::NO_TIMESTAMPS_TOKEN)?,
            eot: token_id(tokenizer, m::EOT_TOKEN)?,
        })
    }
}

fn token_id(tokenizer: &Tokenizer, token: &str) -> Result<u32> {
    tokenizer
        .token_to_id(token)
        .ok_or_else(|| anyhow!("Tokenizer has no id for {}", token))
}

/// A loaded Whisper model ready for transcription.
///
/// Decoding mutates the model's attention caches, so callers need exclusive
/// access (`&mut self`) while transcribing.
pub struct WhisperModel {
    model: m::model::Whisper,
    config: Config,
    device: Device,
    tokenizer: Tokenizer,
    tokens: SpecialTokens,
    mel_filters: Vec<f32>,
}

impl WhisperModel {
    /// Download (or reuse the cached copy of) a checkpoint and load it.
    pub async fn load(size: ModelSize, device: Device) -> Result<Self> {
        tracing::info!("Loading Whisper {} model from {}", size, size.repo_name());
        let start_time = std::time::Instant::now();

        let mut builder = ApiBuilder::new().with_progress(false);
        if let Ok(token) = std::env::var("HF_TOKEN") {
            builder = builder.with_token(Some(token));
        }
        if let Ok(cache_dir) = std::env::var("HF_HUB_CACHE") {
            builder = builder.with_cache_dir(PathBuf::from(cache_dir));
        } else if let Ok(hf_home) = std::env::var("HF_HOME") {
            builder = builder.with_cache_dir(PathBuf::from(hf_home).join("hub"));
        }
        let api = builder.build().context("Failed to create HuggingFace API client")?;
        let repo = api.model(size.repo_name().to_string());

        let config_path = repo
            .get("config.json")
            .await
            .with_context(|| format!("Failed to download config.json from {}", size.repo_name()))?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .await
            .with_context(|| format!("Failed to download tokenizer.json from {}", size.repo_name()))?;
        let weights_path = repo
            .get("model.safetensors")
            .await
            .with_context(|| format!("Failed to download model.safetensors from {}", size.repo_name()))?;

        let config: Config = serde_json::from_reader(std::fs::File::open(config_path)?)?;
        let tokenizer =
            Tokenizer::from_file(tokenizer_path).map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;
        let tokens = SpecialTokens::resolve(&tokenizer)?;
        let mel_filters = mel::mel_filter_bank(config.num_mel_bins, m::N_FFT, m::SAMPLE_RATE);

        // SAFETY: the weights file is not modified while it is mapped.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], m::DTYPE, &device)? };
        let model = m::model::Whisper::load(&vb, config.clone())?;

        tracing::info!(
            "Whisper {} model loaded in {:.2}s",
            size,
            start_time.elapsed().as_secs_f64()
        );

        Ok(Self {
            model,
            config,
            device,
            tokenizer,
            tokens,
            mel_filters,
        })
    }

    /// Transcribe 16kHz mono samples.
    ///
    /// `language` is an ISO 639-1 hint ("en"); unknown codes are ignored and
    /// the model auto-detects.
    pub fn transcribe(&mut self, samples: &[f32], language: Option<&str>) -> Result<String> {
        if samples.is_empty() {
            return Err(anyhow!("Audio data is empty"));
        }

        let mel = audio::pcm_to_mel(&self.config, samples, &self.mel_filters);
        let n_mels = self.config.num_mel_bins;
        let mel_len = mel.len();
        let mel = Tensor::from_vec(mel, (1, n_mels, mel_len / n_mels), &self.device)?;

        let prompt = self.prompt_tokens(language);
        let (_, _, content_frames) = mel.dims3()?;
        let speech_frames = usize::min(content_frames, samples.len() / m::HOP_LENGTH + 1);

        let mut pieces = Vec::new();
        let mut seek = 0;
        while seek < speech_frames {
            let window = usize::min(content_frames - seek, m::N_FRAMES);
            let segment = mel.narrow(2, seek, window)?;
            let text = self.decode_segment(&segment, &prompt)?;
            if !text.is_empty() {
                pieces.push(text);
            }
            seek += window;
        }

        Ok(pieces.join(" "))
    }

    fn prompt_tokens(&self, language: Option<&str>) -> Vec<u32> {
        let mut prompt = vec![self.tokens.sot];
        if let Some(lang) = language {
            match self.tokenizer.token_to_id(&format!("<|{}|>", lang.to_lowercase())) {
                Some(id) => prompt.push(id),
                None => tracing::warn!("No language token for '{}', letting the model detect it", lang),
            }
        }
        prompt.push(self.tokens.transcribe);
        prompt.push(self.tokens.no_timestamps);
        prompt
    }

    /// Greedy decode of one mel window.
    fn decode_segment(&mut self, mel: &Tensor, prompt: &[u32]) -> Result<String> {
        let audio_features = self.model.encoder.forward(mel, true)?;

        let max_tokens = self.config.max_target_positions / 2;
        let mut tokens = prompt.to_vec();
        let mut output = Vec::new();

        for step in 0..max_tokens {
            let tokens_t = Tensor::new(tokens.as_slice(), &self.device)?.unsqueeze(0)?;
            let ys = self.model.decoder.forward(&tokens_t, &audio_features, step == 0)?;

            let seq_len = tokens.len();
            let logits = self.model.decoder.final_linear(&ys.i(..1)?)?.i(0)?.i(seq_len - 1)?;
            let next_token = logits.argmax(0)?.to_scalar::<u32>()?;

            if next_token == self.tokens.eot || tokens.len() >= self.config.max_target_positions {
                break;
            }
            if is_repetitive(&output, next_token) {
                tracing::debug!("Stopping decode on repetition after {} tokens", output.len());
                break;
            }

            tokens.push(next_token);
            output.push(next_token);
        }

        let text = self
            .tokenizer
            .decode(&output, true)
            .map_err(|e| anyhow!("Tokenizer decode error: {}", e))?;
        Ok(text.trim().to_string())
    }
}

/// True when `next` would extend a run of identical tokens or repeat the
/// previous three-token pattern.
fn is_repetitive(tokens: &[u32], next: u32) -> bool {
    let n = tokens.len();
    if n >= 3 && tokens[n - 3..].iter().all(|&t| t == next) {
        return true;
    }
    if n >= 5 {
        let candidate = [tokens[n - 2], tokens[n - 1], next];
        if tokens[n - 5..n - 2] == candidate {
            return true;
        }
    }
    false
}
