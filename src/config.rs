//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Key Rust Concepts Used:
//! - **Serde**: Converts between these structs and TOML/JSON/environment values
//! - **#[serde(default)]**: Missing keys in a section fall back to the `Default` impl
//! - **Result<T, E>**: Loading and validation report failures instead of panicking
//!
//! ## Configuration Priority (highest to lowest):
//! 1. `HOST` / `PORT` (deployment platforms set these)
//! 2. Environment variables (`APP_SERVER__PORT`, `APP_MODELS__WHISPER_MODEL`, ...)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impls)

use crate::device::DevicePreference;
use crate::extractor::{Vocabulary, VocabularyError};
use crate::transcription::{ModelSize, TranscriptionConfig};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main application configuration that contains all settings.
///
/// ## Why separate config structs:
/// Each section maps to one part of the service (HTTP server, speech model,
/// SQLite file, upload handling, event vocabulary), so a `config.toml` reads
/// the same way the code is organised.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub models: ModelsConfig,
    pub database: DatabaseConfig,
    pub uploads: UploadsConfig,
    pub extractor: ExtractorConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (production)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Speech model settings.
///
/// ## Model size trade-offs:
/// - Smaller models: Faster processing, less memory, lower accuracy
/// - Larger models: Slower processing, more memory, higher accuracy
///
/// Short commentary clips transcribe well enough with `tiny`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// "tiny", "base", "small", "medium" or "large"
    pub whisper_model: String,
    /// ISO 639-1 language hint; an empty string lets Whisper detect the language
    pub language: String,
    /// "auto", "cpu", "cuda" or "metal"
    pub device: String,
    /// Start downloading/loading the model in the background at startup
    pub load_on_startup: bool,
    pub min_audio_seconds: f64,
    pub max_audio_seconds: f64,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            whisper_model: "tiny".to_string(),
            language: "en".to_string(),
            device: "auto".to_string(),
            load_on_startup: true,
            min_audio_seconds: 0.3,
            max_audio_seconds: 120.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file; created (with its parent directory) on first start
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("football.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadsConfig {
    /// Where uploaded clips are staged while they are decoded
    pub temp_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            temp_dir: env::temp_dir().join("football-voice-tracker"),
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Optional TOML file replacing the built-in actions and player roster
    pub vocabulary_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    /// 4. Handle special cases for HOST and PORT environment variables
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=3000`: Override server port
    /// - `APP_MODELS__WHISPER_MODEL=base`: Override whisper model
    /// - `APP_DATABASE__PATH=/data/football.db`: Move the database
    ///
    /// The double underscore separates nested keys, so field names that
    /// contain a single underscore (`whisper_model`) survive intact.
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// Catching these at startup gives a clear message instead of a
    /// confusing failure on the first request.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow!("Server port cannot be 0"));
        }

        if self.database.path.as_os_str().is_empty() {
            return Err(anyhow!("Database path cannot be empty"));
        }

        if self.uploads.max_upload_bytes == 0 {
            return Err(anyhow!("Upload size limit must be greater than 0"));
        }

        if self.models.min_audio_seconds < 0.0 || self.models.min_audio_seconds >= self.models.max_audio_seconds {
            return Err(anyhow!(
                "Audio bounds are invalid: min {}s must be >= 0 and below max {}s",
                self.models.min_audio_seconds,
                self.models.max_audio_seconds
            ));
        }

        self.models.whisper_model.parse::<ModelSize>()?;
        self.models
            .device
            .parse::<DevicePreference>()
            .map_err(|e| anyhow!(e))?;

        Ok(())
    }

    /// Settings for the transcription engine, derived from `[models]`.
    pub fn transcription_config(&self) -> Result<TranscriptionConfig> {
        let language = self.models.language.trim();
        Ok(TranscriptionConfig {
            model_size: self.models.whisper_model.parse()?,
            language: (!language.is_empty()).then(|| language.to_string()),
            min_audio_seconds: self.models.min_audio_seconds,
            max_audio_seconds: self.models.max_audio_seconds,
        })
    }

    /// The vocabulary file if one is configured, the built-in one otherwise.
    pub fn load_vocabulary(&self) -> Result<Vocabulary, VocabularyError> {
        match &self.extractor.vocabulary_path {
            Some(path) => {
                tracing::info!("Loading event vocabulary from {:?}", path);
                Vocabulary::load(path)
            }
            None => Ok(Vocabulary::default()),
        }
    }
}
