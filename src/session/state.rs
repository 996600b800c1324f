use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Recording,
    Transcribing,
    AwaitingReply,
    Streaming,
    /// Terminal
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Idle => "idle",
            SessionState::Recording => "recording",
            SessionState::Transcribing => "transcribing",
            SessionState::AwaitingReply => "awaiting reply",
            SessionState::Streaming => "streaming",
            SessionState::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// What happens after a recording stops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Record, then play the clip back
    CaptureOnly,
    /// Record, then transcribe
    Transcription,
    /// Record, transcribe, chat, synthesize and play the spoken reply
    #[default]
    VoiceRoundTrip,
}

/// Events that drive the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    StartRecording,
    StopRecording,
    TranscriptionResult,
    ReplyReceived,
    OpenStream,
    Close,
    TransportFailure,
}

impl SessionState {
    /// Next state for `transition`, or `None` if it is not allowed here
    pub fn next(self, transition: Transition, mode: SessionMode) -> Option<SessionState> {
        use SessionState::*;
        use Transition::*;

        match (self, transition) {
            (Closed, _) => None,
            (_, Close) => Some(Closed),
            (_, TransportFailure) => Some(Idle),

            (Idle, StartRecording) => Some(Recording),
            (Recording, StartRecording) => Some(Recording),

            (Recording, StopRecording) => match mode {
                SessionMode::CaptureOnly => Some(Idle),
                SessionMode::Transcription | SessionMode::VoiceRoundTrip => Some(Transcribing),
            },

            (Transcribing, TranscriptionResult) => match mode {
                SessionMode::VoiceRoundTrip => Some(AwaitingReply),
                SessionMode::Transcription | SessionMode::CaptureOnly => Some(Idle),
            },
            (AwaitingReply, ReplyReceived) => Some(Idle),

            (Idle, OpenStream) => Some(Streaming),

            _ => None,
        }
    }
}
