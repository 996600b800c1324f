use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::session::{SessionConfig, SessionMode};

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub openai: OpenAiConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    /// Where finished recordings are archived; unset disables archiving
    pub recordings_path: Option<String>,
    /// Capture rate; capture is always mono
    pub sample_rate: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub mode: SessionMode,
    pub max_record_secs: u64,
    pub stream_frame_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            mode: SessionMode::VoiceRoundTrip,
            max_record_secs: 10,
            stream_frame_ms: 100,
        }
    }
}

/// OpenAI endpoints, models and request policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub transcription_url: String,
    pub chat_url: String,
    pub speech_url: String,
    pub realtime_url: String,
    pub transcription_model: String,
    pub chat_model: String,
    pub speech_model: String,
    pub realtime_model: String,
    pub voice: String,
    /// ISO-639-1 hint for transcription
    pub language: Option<String>,
    pub system_prompt: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: "OPENAI_API_KEY".to_string(),
            transcription_url: "https://api.openai.com/v1/audio/transcriptions".to_string(),
            chat_url: "https://api.openai.com/v1/chat/completions".to_string(),
            speech_url: "https://api.openai.com/v1/audio/speech".to_string(),
            realtime_url: "wss://api.openai.com/v1/realtime".to_string(),
            transcription_model: "whisper-1".to_string(),
            chat_model: "gpt-4o".to_string(),
            speech_model: "gpt-4o-mini-tts".to_string(),
            realtime_model: "gpt-4o-realtime-preview".to_string(),
            voice: "alloy".to_string(),
            language: None,
            system_prompt: None,
            request_timeout_secs: Some(60),
        }
    }
}

impl OpenAiConfig {
    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .with_context(|| format!("Environment variable {} is not set", self.api_key_env))
    }
}

impl Config {
    /// Load a config file, overridden by `VOICELINK__SECTION__KEY` variables
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("VOICELINK").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Session settings for a controller built from this config
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            mode: self.session.mode,
            sample_rate: self.audio.sample_rate,
            max_record_duration: Duration::from_secs(self.session.max_record_secs),
            stream_frame_interval: Duration::from_millis(self.session.stream_frame_ms),
            realtime_url: self.openai.realtime_url.clone(),
            realtime_model: self.openai.realtime_model.clone(),
            archive_dir: self.audio.recordings_path.as_ref().map(PathBuf::from),
            ..SessionConfig::default()
        }
    }
}
