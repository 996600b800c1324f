// In-memory fakes for every port the session controller drives.
#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use voicelink::audio::{self, CaptureConfig, CaptureDevice, CaptureHandle, PlaybackSink};
use voicelink::{
    AudioError, PcmBuffer, Result, SessionConfig, SessionPorts, SharedCaptureDevice,
    SpeechServices, StreamFrame, StreamHandle, StreamTransport, WavBytes,
};

/// Microphone whose write cursor is set by the test
#[derive(Default)]
pub struct FakeMicrophone {
    pub position: AtomicUsize,
    pub begins: AtomicUsize,
    pub ends: AtomicUsize,
    pub allocated_frames: AtomicUsize,
    pub looping: AtomicBool,
    next_handle: AtomicU64,
}

impl FakeMicrophone {
    pub fn set_position(&self, frames: usize) {
        self.position.store(frames, Ordering::SeqCst);
    }

    pub fn begins(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    pub fn ends(&self) -> usize {
        self.ends.load(Ordering::SeqCst)
    }

    pub fn is_looping(&self) -> bool {
        self.looping.load(Ordering::SeqCst)
    }
}

impl CaptureDevice for FakeMicrophone {
    fn begin(&self, config: &CaptureConfig) -> Result<CaptureHandle> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        self.allocated_frames
            .store(config.capacity_frames(), Ordering::SeqCst);
        self.looping.store(config.looping, Ordering::SeqCst);
        Ok(CaptureHandle(self.next_handle.fetch_add(1, Ordering::SeqCst)))
    }

    fn position(&self, _handle: CaptureHandle) -> usize {
        self.position.load(Ordering::SeqCst)
    }

    /// Returns the whole allocated buffer if asked, like a real ring buffer
    fn read(&self, _handle: CaptureHandle, frames: Range<usize>) -> Vec<f32> {
        let allocated = self.allocated_frames.load(Ordering::SeqCst);
        let end = frames.end.max(allocated);
        (frames.start..end).map(|i| ((i % 100) as f32) / 200.0).collect()
    }

    fn end(&self, _handle: CaptureHandle) {
        self.ends.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "fake-microphone"
    }
}

#[derive(Default)]
pub struct RecordingPlayback {
    pub clips: Mutex<Vec<PcmBuffer>>,
}

impl RecordingPlayback {
    pub fn count(&self) -> usize {
        self.clips.lock().unwrap().len()
    }
}

impl PlaybackSink for RecordingPlayback {
    fn play(&self, clip: PcmBuffer) {
        self.clips.lock().unwrap().push(clip);
    }
}

/// Speech services answering from canned results, logging call order
pub struct ScriptedServices {
    pub transcript: Result<String>,
    pub reply: Result<String>,
    pub speech: Result<Vec<u8>>,
    pub calls: Mutex<Vec<&'static str>>,
    pub transcribed_audio: Mutex<Vec<WavBytes>>,
    /// Delay before answering chat requests
    pub chat_delay: Duration,
}

impl Default for ScriptedServices {
    fn default() -> Self {
        let speech = audio::encode_samples(24000, 1, &[0.5; 2400])
            .map(|wav| wav.into_vec());
        Self {
            transcript: Ok("hola".to_string()),
            reply: Ok("hola, ¿en qué te ayudo?".to_string()),
            speech,
            calls: Mutex::new(Vec::new()),
            transcribed_audio: Mutex::new(Vec::new()),
            chat_delay: Duration::ZERO,
        }
    }
}

impl ScriptedServices {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechServices for ScriptedServices {
    async fn transcribe(&self, audio: &WavBytes) -> Result<String> {
        self.calls.lock().unwrap().push("transcribe");
        self.transcribed_audio.lock().unwrap().push(audio.clone());
        self.transcript.clone()
    }

    async fn chat_reply(&self, _text: &str) -> Result<String> {
        self.calls.lock().unwrap().push("chat");
        if !self.chat_delay.is_zero() {
            tokio::time::sleep(self.chat_delay).await;
        }
        self.reply.clone()
    }

    async fn synthesize_speech(&self, _text: &str) -> Result<Vec<u8>> {
        self.calls.lock().unwrap().push("synthesize");
        self.speech.clone()
    }
}

/// Stream transport backed by channels the test controls
pub struct ChannelTransport {
    pub sent: Mutex<Vec<StreamFrame>>,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub fail_open: bool,
    inbound: Mutex<Option<mpsc::UnboundedReceiver<Result<StreamFrame>>>>,
}

impl ChannelTransport {
    /// Transport plus the sender feeding its receive side
    pub fn new() -> (Self, mpsc::UnboundedSender<Result<StreamFrame>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self {
            sent: Mutex::new(Vec::new()),
            opened: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
            fail_open: false,
            inbound: Mutex::new(Some(rx)),
        };
        (transport, tx)
    }

    pub fn refusing() -> Self {
        let (mut transport, _tx) = Self::new();
        transport.fail_open = true;
        transport
    }

    pub fn sent(&self) -> Vec<StreamFrame> {
        self.sent.lock().unwrap().clone()
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamTransport for ChannelTransport {
    async fn open(&self, _url: &str, _headers: &[(String, String)]) -> Result<StreamHandle> {
        if self.fail_open {
            return Err(AudioError::transport("connection refused"));
        }
        let id = self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(StreamHandle(id as u64))
    }

    async fn send(&self, _handle: StreamHandle, frame: StreamFrame) -> Result<()> {
        self.sent.lock().unwrap().push(frame);
        Ok(())
    }

    fn receive(&self, _handle: StreamHandle) -> BoxStream<'static, Result<StreamFrame>> {
        match self.inbound.lock().unwrap().take() {
            Some(rx) => stream::unfold(rx, |mut rx| async move {
                let frame = rx.recv().await?;
                Some((frame, rx))
            })
            .boxed(),
            None => stream::pending().boxed(),
        }
    }

    async fn close(&self, _handle: StreamHandle) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A session wired to fakes, keeping handles to inspect them
pub struct Harness {
    pub microphone: Arc<FakeMicrophone>,
    pub device: SharedCaptureDevice,
    pub playback: Arc<RecordingPlayback>,
    pub services: Arc<ScriptedServices>,
    pub transport: Arc<ChannelTransport>,
}

impl Harness {
    pub fn new(services: ScriptedServices, transport: ChannelTransport) -> Self {
        let microphone = Arc::new(FakeMicrophone::default());
        Self {
            device: SharedCaptureDevice::new(microphone.clone()),
            microphone,
            playback: Arc::new(RecordingPlayback::default()),
            services: Arc::new(services),
            transport: Arc::new(transport),
        }
    }

    pub fn ports(&self) -> SessionPorts {
        SessionPorts {
            capture: self.device.clone(),
            playback: self.playback.clone(),
            services: self.services.clone(),
            stream: self.transport.clone(),
        }
    }
}

pub fn session_config(mode: voicelink::SessionMode) -> SessionConfig {
    SessionConfig {
        mode,
        sample_rate: 44100,
        stream_frame_interval: Duration::from_millis(10),
        ..SessionConfig::default()
    }
}

/// Poll until `condition` holds, failing the test after two seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 2s"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
