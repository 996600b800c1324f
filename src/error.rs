//! Error types for the audio codec and session controller.

use thiserror::Error;

use crate::session::SessionState;

/// Result alias used across the codec, ports and session controller
pub type Result<T> = std::result::Result<T, AudioError>;

/// Audio codec, capture and session errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Bad codec input (zero sample rate, zero channels, ragged samples)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Missing or mismatched RIFF/WAVE/fmt/data tags, or a short header
    #[error("Malformed WAV container: {0}")]
    MalformedContainer(String),

    /// Anything other than 16-bit integer PCM
    #[error("Unsupported WAV format: {0}")]
    UnsupportedFormat(String),

    /// Data chunk shorter than declared, or not a whole number of frames
    #[error("Truncated WAV data: {0}")]
    TruncatedData(String),

    /// The capture device reported nothing recorded
    #[error("Nothing was captured")]
    EmptyCapture,

    /// Another session already holds the capture device
    #[error("Capture device is already in use")]
    DeviceBusy,

    /// Network or vendor service failure
    #[error("Transport error{}: {message}", status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// A single received streaming frame could not be decoded
    #[error("Bad stream frame: {0}")]
    DecodeFrame(String),

    /// Operation not permitted from the current state
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        state: SessionState,
        operation: &'static str,
    },

    /// An in-flight operation was cancelled by closing the session
    #[error("Session was closed")]
    SessionClosed,
}

impl AudioError {
    pub fn transport(message: impl Into<String>) -> Self {
        AudioError::Transport {
            status: None,
            message: message.into(),
        }
    }

    pub fn transport_status(status: u16, message: impl Into<String>) -> Self {
        AudioError::Transport {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, AudioError::Transport { .. })
    }

    /// Check if the session can keep going after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            AudioError::DecodeFrame(_)
            | AudioError::EmptyCapture
            | AudioError::DeviceBusy
            | AudioError::Transport { .. } => true,
            AudioError::InvalidArgument(_)
            | AudioError::MalformedContainer(_)
            | AudioError::UnsupportedFormat(_)
            | AudioError::TruncatedData(_)
            | AudioError::InvalidState { .. }
            | AudioError::SessionClosed => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_message_includes_status() {
        let err = AudioError::transport_status(503, "service unavailable");
        assert_eq!(
            err.to_string(),
            "Transport error (status 503): service unavailable"
        );

        let err = AudioError::transport("connection refused");
        assert_eq!(err.to_string(), "Transport error: connection refused");
        assert!(err.is_transport());
    }

    #[test]
    fn invalid_state_names_operation() {
        let err = AudioError::InvalidState {
            state: SessionState::Closed,
            operation: "start recording",
        };
        assert_eq!(err.to_string(), "Cannot start recording while session is closed");
        assert!(!err.is_recoverable());
    }
}
