use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::{AudioError, Result};

/// One unit of data on a duplex stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// A piece of text; `done` marks the end of one logical reply
    Text { text: String, done: bool },
    /// A complete WAV-encoded audio clip
    Audio(Vec<u8>),
}

impl StreamFrame {
    pub fn text(text: impl Into<String>) -> Self {
        StreamFrame::Text {
            text: text.into(),
            done: false,
        }
    }

    pub fn final_text(text: impl Into<String>) -> Self {
        StreamFrame::Text {
            text: text.into(),
            done: true,
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, StreamFrame::Audio(_))
    }
}

/// Opaque handle for an open stream, issued by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle(pub u64);

/// Persistent duplex transport port
///
/// `send` and `receive` may be used concurrently from different tasks on
/// the same handle.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    async fn open(&self, url: &str, headers: &[(String, String)]) -> Result<StreamHandle>;

    async fn send(&self, handle: StreamHandle, frame: StreamFrame) -> Result<()>;

    /// Frames in arrival order
    ///
    /// Ends when the stream is closed; yields an error on abnormal
    /// termination. A fresh sequence needs a fresh `open`.
    fn receive(&self, handle: StreamHandle) -> BoxStream<'static, Result<StreamFrame>>;

    async fn close(&self, handle: StreamHandle) -> Result<()>;
}

/// First frame sent on a new stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStartMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub model: String,
    pub audio_format: AudioFormatDescriptor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFormatDescriptor {
    pub encoding: String,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Build the handshake text frame declaring model and audio format
pub fn handshake_frame(model: &str, sample_rate: u32, channels: u16) -> Result<StreamFrame> {
    let message = SessionStartMessage {
        kind: "session.start".to_string(),
        model: model.to_string(),
        audio_format: AudioFormatDescriptor {
            encoding: "pcm16-wav".to_string(),
            sample_rate,
            channels,
        },
    };

    let json = serde_json::to_string(&message)
        .map_err(|e| AudioError::transport(format!("failed to encode handshake: {e}")))?;

    Ok(StreamFrame::final_text(json))
}
