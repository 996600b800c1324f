pub mod audio;
pub mod config;
pub mod error;
pub mod services;
pub mod session;
pub mod transport;

pub use audio::{
    AudioFile, CaptureConfig, CaptureDevice, CaptureHandle, DeviceLease, PcmBuffer, PlaybackSink,
    SharedCaptureDevice, WavBytes,
};
pub use config::{Config, OpenAiConfig};
pub use error::{AudioError, Result};
pub use services::{ChatMessage, OpenAiServices, SpeechServices};
pub use session::{
    AudioSession, SessionConfig, SessionEvent, SessionMode, SessionOutcome, SessionPorts,
    SessionState, SessionStats, VoiceReply,
};
pub use transport::{
    RequestTransport, StreamFrame, StreamHandle, StreamTransport, TransportRequest,
};
