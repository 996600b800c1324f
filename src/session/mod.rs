//! Audio session management
//!
//! This module provides the `AudioSession` controller that manages:
//! - Microphone capture through an exclusively held device
//! - Record-then-play, record-then-transcribe and full voice round-trips
//! - Persistent duplex streaming of audio and text frames
//! - Session state, statistics and events

mod config;
mod controller;
mod state;
mod stats;
mod stream;
mod text;

pub use config::{SessionConfig, SUPPORTED_SAMPLE_RATES};
pub use controller::{AudioSession, SessionOutcome, SessionPorts, VoiceReply};
pub use state::{SessionMode, SessionState, Transition};
pub use stats::{SessionEvent, SessionStats, EVENT_QUEUE_CAPACITY};
pub use text::TextAccumulator;
