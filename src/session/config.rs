use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::state::SessionMode;
use crate::error::{AudioError, Result};

/// Sample rates the capture path accepts
pub const SUPPORTED_SAMPLE_RATES: [u32; 2] = [44100, 48000];

/// Configuration for an audio session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier
    pub session_id: String,

    /// What stop_recording does with the captured clip
    pub mode: SessionMode,

    /// Capture sample rate (44100 or 48000)
    pub sample_rate: u32,

    /// Capture buffer length while streaming
    pub max_record_duration: Duration,

    /// How often captured audio is flushed to the stream
    pub stream_frame_interval: Duration,

    /// Realtime endpoint and model announced in the handshake
    pub realtime_url: String,
    pub realtime_model: String,

    /// Extra headers for opening the stream (e.g. authorization)
    pub realtime_headers: Vec<(String, String)>,

    /// Directory finished recordings are saved to, if any
    pub archive_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
            mode: SessionMode::default(),
            sample_rate: 44100,
            max_record_duration: Duration::from_secs(10),
            stream_frame_interval: Duration::from_millis(100),
            realtime_url: "wss://api.openai.com/v1/realtime".to_string(),
            realtime_model: "gpt-4o-realtime-preview".to_string(),
            realtime_headers: Vec::new(),
            archive_dir: None,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(AudioError::InvalidArgument(format!(
                "capture sample rate must be 44100 or 48000, got {}",
                self.sample_rate
            )));
        }
        if self.stream_frame_interval.is_zero() {
            return Err(AudioError::InvalidArgument(
                "stream frame interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = SessionConfig::default();
        assert!(config.session_id.starts_with("session-"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_unsupported_rate() {
        let config = SessionConfig {
            sample_rate: 16000,
            ..SessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(AudioError::InvalidArgument(_))));
    }
}
