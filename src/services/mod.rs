//! Vendor speech and chat services
//!
//! The session controller only sees [`SpeechServices`]; how requests are
//! built and responses parsed is the adapter's business.

pub mod messages;
pub mod openai;

use async_trait::async_trait;

use crate::audio::WavBytes;
use crate::error::Result;

pub use messages::ChatMessage;
pub use openai::OpenAiServices;

/// Speech-to-text, chat completion and text-to-speech
#[async_trait]
pub trait SpeechServices: Send + Sync {
    /// Transcribe a WAV clip to text
    async fn transcribe(&self, audio: &WavBytes) -> Result<String>;

    /// Produce a chat reply to the given user text
    async fn chat_reply(&self, text: &str) -> Result<String>;

    /// Synthesize speech for the text, returning encoded audio bytes
    async fn synthesize_speech(&self, text: &str) -> Result<Vec<u8>>;
}
