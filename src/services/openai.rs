use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::messages::{
    ChatMessage, ChatRequest, ChatResponse, SpeechRequest, TranscriptionResponse,
};
use super::SpeechServices;
use crate::audio::WavBytes;
use crate::config::OpenAiConfig;
use crate::error::{AudioError, Result};
use crate::transport::{RequestTransport, TransportRequest};

/// OpenAI transcription, chat and speech endpoints over a request transport
///
/// Keeps the chat history so consecutive voice turns form one conversation.
pub struct OpenAiServices {
    transport: Arc<dyn RequestTransport>,
    config: OpenAiConfig,
    api_key: String,
    history: Mutex<Vec<ChatMessage>>,
    tokens_used: AtomicU64,
}

impl OpenAiServices {
    pub fn new(transport: Arc<dyn RequestTransport>, config: OpenAiConfig, api_key: String) -> Self {
        Self {
            transport,
            config,
            api_key,
            history: Mutex::new(Vec::new()),
            tokens_used: AtomicU64::new(0),
        }
    }

    /// Conversation so far (user and assistant turns, no system prompt)
    pub async fn history(&self) -> Vec<ChatMessage> {
        self.history.lock().await.clone()
    }

    pub async fn clear_history(&self) {
        self.history.lock().await.clear();
    }

    /// Total tokens reported by chat completions
    pub fn tokens_used(&self) -> u64 {
        self.tokens_used.load(Ordering::Relaxed)
    }

    fn request(&self, url: &str) -> TransportRequest {
        TransportRequest::post(url)
            .bearer(&self.api_key)
            .timeout(self.config.request_timeout_secs.map(Duration::from_secs))
    }

    fn transcription_body(&self, audio: &WavBytes, boundary: &str) -> Vec<u8> {
        let mut body = Vec::with_capacity(audio.len() + 512);

        let mut field = |name: &str, value: &str| {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        };
        field("model", &self.config.transcription_model);
        if let Some(language) = &self.config.language {
            field("language", language);
        }

        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"audio.wav\"\r\nContent-Type: audio/wav\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(audio.as_bytes());
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        body
    }
}

fn parse_json<T: DeserializeOwned>(bytes: &[u8], what: &str) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| AudioError::transport(format!("invalid {what} response: {e}")))
}

fn to_json<T: serde::Serialize>(value: &T, what: &str) -> Result<Vec<u8>> {
    serde_json::to_vec(value)
        .map_err(|e| AudioError::transport(format!("failed to encode {what} request: {e}")))
}

#[async_trait]
impl SpeechServices for OpenAiServices {
    async fn transcribe(&self, audio: &WavBytes) -> Result<String> {
        let boundary = format!("voicelink-{}", uuid::Uuid::new_v4().simple());
        let request = self
            .request(&self.config.transcription_url)
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(self.transcription_body(audio, &boundary));

        debug!("Sending {} bytes of audio for transcription", audio.len());
        let response = self.transport.send(request).await?;
        let transcription: TranscriptionResponse = parse_json(&response, "transcription")?;

        info!("Transcription received ({} chars)", transcription.text.len());
        Ok(transcription.text)
    }

    async fn chat_reply(&self, text: &str) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(prompt) = &self.config.system_prompt {
            messages.push(ChatMessage::system(prompt.clone()));
        }
        messages.extend(self.history.lock().await.iter().cloned());
        messages.push(ChatMessage::user(text));

        let body = to_json(
            &ChatRequest {
                model: &self.config.chat_model,
                messages: &messages,
            },
            "chat",
        )?;
        let request = self
            .request(&self.config.chat_url)
            .header("Content-Type", "application/json")
            .body(body);

        let response = self.transport.send(request).await?;
        let completion: ChatResponse = parse_json(&response, "chat completion")?;

        if let Some(usage) = &completion.usage {
            self.tokens_used.fetch_add(usage.total_tokens, Ordering::Relaxed);
        }

        let reply = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AudioError::transport("chat completion returned no choices"))?;

        {
            let mut history = self.history.lock().await;
            history.push(ChatMessage::user(text));
            history.push(ChatMessage::assistant(reply.clone()));
        }

        info!(
            "Chat reply received ({} chars, {} tokens used so far)",
            reply.len(),
            self.tokens_used()
        );
        Ok(reply)
    }

    async fn synthesize_speech(&self, text: &str) -> Result<Vec<u8>> {
        let body = to_json(
            &SpeechRequest {
                model: &self.config.speech_model,
                input: text,
                voice: &self.config.voice,
                response_format: "wav",
            },
            "speech",
        )?;
        let request = self
            .request(&self.config.speech_url)
            .header("Content-Type", "application/json")
            .body(body);

        let audio = self.transport.send(request).await?;
        info!("Synthesized speech received ({} bytes)", audio.len());
        Ok(audio)
    }
}
