use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use super::state::{SessionMode, SessionState, Transition};
use super::stats::{SessionCounters, SessionEvent, SessionStats, EVENT_QUEUE_CAPACITY};
use super::stream::{guarded, Inbound, Outbound, OUTBOUND_QUEUE_CAPACITY};
use crate::audio::{
    wav, AudioFile, CaptureConfig, DeviceLease, PcmBuffer, PlaybackSink, SharedCaptureDevice,
};
use crate::error::{AudioError, Result};
use crate::services::SpeechServices;
use crate::transport::{handshake_frame, StreamFrame, StreamHandle, StreamTransport};

/// Channel count for everything the controller captures
const CAPTURE_CHANNELS: u16 = 1;

/// External collaborators a session drives
#[derive(Clone)]
pub struct SessionPorts {
    pub capture: SharedCaptureDevice,
    pub playback: Arc<dyn PlaybackSink>,
    pub services: Arc<dyn SpeechServices>,
    pub stream: Arc<dyn StreamTransport>,
}

/// Result of `stop_recording`
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// Nothing was recording; state unchanged
    Unchanged(SessionState),
    /// Capture-only mode: the clip, already handed to playback
    Captured(PcmBuffer),
    /// Transcription mode
    Transcribed(String),
    /// Voice round-trip mode
    Replied(VoiceReply),
}

/// Everything produced by one voice round-trip
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceReply {
    pub transcript: String,
    pub reply: String,
    /// Synthesized speech, already handed to playback
    pub audio: PcmBuffer,
}

struct Inner {
    state: SessionState,
    /// Held while recording
    lease: Option<DeviceLease>,
    /// Present while streaming
    stream: Option<ActiveStream>,
}

struct ActiveStream {
    handle: StreamHandle,
    outbound: mpsc::Sender<StreamFrame>,
    supervisor: JoinHandle<()>,
}

/// Audio session controller
///
/// Owns the state machine and is its only mutator. Drives capture, the WAV
/// codec, the speech services and the stream transport for one session.
/// Not reentrant: wait for one state-changing call before making the next.
/// `close` is the exception and may be called at any time.
pub struct AudioSession {
    config: SessionConfig,
    ports: SessionPorts,
    inner: Arc<Mutex<Inner>>,
    /// Cancelled by `close`; parent of every stream's token
    closing: CancellationToken,
    counters: Arc<SessionCounters>,
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<SessionEvent>>>,
    started_at: chrono::DateTime<Utc>,
}

impl AudioSession {
    pub fn new(config: SessionConfig, ports: SessionPorts) -> Result<Self> {
        config.validate()?;
        info!(
            "Creating audio session: {} ({:?}, {}Hz, device {})",
            config.session_id,
            config.mode,
            config.sample_rate,
            ports.capture.name()
        );

        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);

        Ok(Self {
            config,
            ports,
            inner: Arc::new(Mutex::new(Inner {
                state: SessionState::Idle,
                lease: None,
                stream: None,
            })),
            closing: CancellationToken::new(),
            counters: Arc::new(SessionCounters::default()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            started_at: Utc::now(),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    /// Take the event receiver; `None` after the first call
    ///
    /// Holds up to [`EVENT_QUEUE_CAPACITY`] events; later ones are dropped
    /// until the receiver catches up.
    pub async fn take_events(&self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.events_rx.lock().await.take()
    }

    /// Begin capturing from the microphone
    ///
    /// Starting while already recording is a no-op.
    pub async fn start_recording(&self, duration_hint: Duration) -> Result<SessionState> {
        let mut inner = self.inner.lock().await;

        match inner.state {
            SessionState::Recording => {
                debug!("Recording already started");
                return Ok(SessionState::Recording);
            }
            SessionState::Idle => {}
            state => {
                return Err(AudioError::InvalidState {
                    state,
                    operation: "start recording",
                })
            }
        }

        let mut lease = self.ports.capture.acquire()?;
        lease.begin(&CaptureConfig {
            sample_rate: self.config.sample_rate,
            channels: CAPTURE_CHANNELS,
            max_duration: duration_hint,
            looping: false,
        })?;

        inner.lease = Some(lease);
        inner.state = self.advance(inner.state, Transition::StartRecording, "start recording")?;

        info!(
            "Recording started: {} ({}Hz, up to {:.1}s)",
            self.config.session_id,
            self.config.sample_rate,
            duration_hint.as_secs_f64()
        );
        Ok(inner.state)
    }

    /// Stop capturing and run whatever the session mode does with the clip
    ///
    /// A no-op while idle. Any failure returns the session to idle.
    pub async fn stop_recording(&self) -> Result<SessionOutcome> {
        let clip = {
            let mut inner = self.inner.lock().await;

            match inner.state {
                SessionState::Idle => {
                    debug!("Recording not active");
                    return Ok(SessionOutcome::Unchanged(SessionState::Idle));
                }
                SessionState::Recording => {}
                state => {
                    return Err(AudioError::InvalidState {
                        state,
                        operation: "stop recording",
                    })
                }
            }

            let captured = match inner.lease.take() {
                Some(lease) => read_capture(lease, self.config.sample_rate),
                None => Err(AudioError::EmptyCapture),
            };
            let clip = match captured {
                Ok(clip) => clip,
                Err(e) => {
                    warn!("Recording stopped with no usable audio: {}", e);
                    inner.state = SessionState::Idle;
                    return Err(e);
                }
            };

            inner.state = self.advance(inner.state, Transition::StopRecording, "stop recording")?;
            clip
        };

        SessionCounters::bump(&self.counters.recordings);
        info!(
            "Recording stopped: {:.2}s ({} samples)",
            clip.duration_seconds(),
            clip.samples().len()
        );
        self.archive(&clip).await;

        match self.config.mode {
            SessionMode::CaptureOnly => {
                self.ports.playback.play(clip.clone());
                Ok(SessionOutcome::Captured(clip))
            }
            SessionMode::Transcription => {
                let result = self.transcribe(&clip).await;
                self.settle(&result, Transition::TranscriptionResult).await;
                result.map(SessionOutcome::Transcribed)
            }
            SessionMode::VoiceRoundTrip => {
                let result = self.round_trip(clip).await;
                self.settle(&result, Transition::ReplyReceived).await;
                result.map(SessionOutcome::Replied)
            }
        }
    }

    /// Open the duplex stream and start both streaming activities
    pub async fn open_stream(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let next = self.advance(inner.state, Transition::OpenStream, "open stream")?;

        let mut lease = self.ports.capture.acquire()?;
        let transport = Arc::clone(&self.ports.stream);

        info!("Opening stream to {}", self.config.realtime_url);
        let handle = self
            .cancellable(transport.open(&self.config.realtime_url, &self.config.realtime_headers))
            .await?;

        let handshake = handshake_frame(
            &self.config.realtime_model,
            self.config.sample_rate,
            CAPTURE_CHANNELS,
        );
        // The stream captures into a ring buffer the outbound task drains
        let capture = CaptureConfig {
            sample_rate: self.config.sample_rate,
            channels: CAPTURE_CHANNELS,
            max_duration: self.config.max_record_duration,
            looping: true,
        };
        let opened = match handshake {
            Ok(frame) => self.cancellable(transport.send(handle, frame)).await,
            Err(e) => Err(e),
        }
        .and_then(|()| lease.begin(&capture));

        if let Err(e) = opened {
            error!("Failed to start stream: {}", e);
            if let Err(close_err) = transport.close(handle).await {
                warn!("Failed to close stream after setup error: {}", close_err);
            }
            return Err(e);
        }
        SessionCounters::bump(&self.counters.frames_sent);

        let token = self.closing.child_token();
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);

        let outbound = Outbound {
            transport: Arc::clone(&transport),
            handle,
            lease,
            sample_rate: capture.sample_rate,
            channels: capture.channels,
            capacity: capture.capacity_frames(),
            frame_interval: self.config.stream_frame_interval,
            queue: outbound_rx,
            counters: Arc::clone(&self.counters),
        };
        let inbound = Inbound {
            transport: Arc::clone(&transport),
            handle,
            playback: Arc::clone(&self.ports.playback),
            events: self.events_tx.clone(),
            counters: Arc::clone(&self.counters),
        };

        let outbound_task = tokio::spawn(guarded(outbound.run(token.clone()), token.clone()));
        let inbound_task = tokio::spawn(guarded(inbound.run(token.clone()), token.clone()));

        let supervisor = tokio::spawn(supervise_stream(
            Arc::clone(&self.inner),
            self.closing.clone(),
            transport,
            handle,
            self.config.mode,
            [outbound_task, inbound_task],
            self.events_tx.clone(),
        ));

        inner.stream = Some(ActiveStream {
            handle,
            outbound: outbound_tx,
            supervisor,
        });
        inner.state = next;

        info!("Stream open: {}", self.config.session_id);
        Ok(())
    }

    /// Queue a text message on the open stream
    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        let outbound = {
            let inner = self.inner.lock().await;
            match (&inner.state, &inner.stream) {
                (SessionState::Streaming, Some(stream)) => stream.outbound.clone(),
                (state, _) => {
                    return Err(AudioError::InvalidState {
                        state: *state,
                        operation: "send text",
                    })
                }
            }
        };

        outbound
            .send(StreamFrame::final_text(text))
            .await
            .map_err(|_| AudioError::transport("stream is shutting down"))
    }

    /// Cancel everything in flight, release the device and the stream
    ///
    /// Safe from any state and idempotent. Always ends in `Closed`; an
    /// error from closing the transport is still returned.
    pub async fn close(&self) -> Result<()> {
        self.closing.cancel();

        let (lease, stream) = {
            let mut inner = self.inner.lock().await;
            if inner.state == SessionState::Closed {
                return Ok(());
            }
            info!(
                "Closing session {} (was {})",
                self.config.session_id, inner.state
            );
            inner.state = self.advance(inner.state, Transition::Close, "close")?;
            (inner.lease.take(), inner.stream.take())
        };

        drop(lease);

        if let Some(stream) = stream {
            drop(stream.outbound);
            if let Err(e) = stream.supervisor.await {
                error!("Stream supervisor panicked: {}", e);
            }
            self.ports.stream.close(stream.handle).await.map_err(|e| {
                error!("Failed to close stream: {}", e);
                e
            })?;
        }

        info!("Session closed: {}", self.config.session_id);
        Ok(())
    }

    /// Snapshot of the session's counters and state
    pub async fn stats(&self) -> SessionStats {
        let state = self.state().await;
        let duration = Utc::now().signed_duration_since(self.started_at);
        let c = &self.counters;

        SessionStats {
            session_id: self.config.session_id.clone(),
            state,
            mode: self.config.mode,
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            recordings: SessionCounters::read(&c.recordings),
            frames_sent: SessionCounters::read(&c.frames_sent),
            frames_received: SessionCounters::read(&c.frames_received),
            frames_rejected: SessionCounters::read(&c.frames_rejected),
            text_replies: SessionCounters::read(&c.text_replies),
        }
    }

    async fn transcribe(&self, clip: &PcmBuffer) -> Result<String> {
        let audio = wav::encode(clip)?;
        info!("Transcribing {} bytes of audio", audio.len());
        self.cancellable(self.ports.services.transcribe(&audio)).await
    }

    /// transcribe -> chat -> synthesize -> play, strictly in order
    async fn round_trip(&self, clip: PcmBuffer) -> Result<VoiceReply> {
        let transcript = self.transcribe(&clip).await?;
        info!("Transcript: {}", transcript);

        {
            let mut inner = self.inner.lock().await;
            if inner.state == SessionState::Closed {
                return Err(AudioError::SessionClosed);
            }
            inner.state =
                self.advance(inner.state, Transition::TranscriptionResult, "await reply")?;
        }

        let reply = self
            .cancellable(self.ports.services.chat_reply(&transcript))
            .await?;
        info!("Reply: {}", reply);

        let speech = self
            .cancellable(self.ports.services.synthesize_speech(&reply))
            .await?;
        let audio = wav::decode(&speech)?;

        info!("Playing spoken reply ({:.2}s)", audio.duration_seconds());
        self.ports.playback.play(audio.clone());

        Ok(VoiceReply {
            transcript,
            reply,
            audio,
        })
    }

    /// Move to the state that follows a finished (or failed) network step
    async fn settle<T>(&self, result: &Result<T>, on_success: Transition) {
        let transition = match result {
            Ok(_) => on_success,
            Err(e) => {
                error!("Session step failed: {}", e);
                Transition::TransportFailure
            }
        };

        let mut inner = self.inner.lock().await;
        if let Some(next) = inner.state.next(transition, self.config.mode) {
            inner.state = next;
        } else if inner.state != SessionState::Closed {
            inner.state = SessionState::Idle;
        }
    }

    fn advance(
        &self,
        state: SessionState,
        transition: Transition,
        operation: &'static str,
    ) -> Result<SessionState> {
        if state == SessionState::Closed {
            return Err(AudioError::InvalidState { state, operation });
        }
        state
            .next(transition, self.config.mode)
            .ok_or(AudioError::InvalidState { state, operation })
    }

    /// Await a network call unless the session closes first
    async fn cancellable<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            _ = self.closing.cancelled() => Err(AudioError::SessionClosed),
            result = call => result,
        }
    }

    /// Save the clip on the blocking pool; failures are logged, never returned
    async fn archive(&self, clip: &PcmBuffer) {
        let Some(dir) = &self.config.archive_dir else {
            return;
        };
        let path = dir.join(format!(
            "recording-{}.wav",
            Utc::now().format("%Y%m%d_%H%M%S%.3f")
        ));

        let clip = clip.clone();
        let target = path.clone();
        match tokio::task::spawn_blocking(move || AudioFile::save(&target, &clip)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to archive recording to {}: {:#}", path.display(), e),
            Err(e) => error!("Archive task for {} failed: {}", path.display(), e),
        }
    }
}

impl Drop for AudioSession {
    fn drop(&mut self) {
        self.closing.cancel();
    }
}

/// Read exactly what the device wrote, then end the capture run
fn read_capture(mut lease: DeviceLease, sample_rate: u32) -> Result<PcmBuffer> {
    let position = lease.position();
    let mut samples = if position > 0 {
        lease.read(0..position)
    } else {
        Vec::new()
    };
    lease.end();
    drop(lease);

    if position == 0 {
        return Err(AudioError::EmptyCapture);
    }

    samples.truncate(position * CAPTURE_CHANNELS as usize);
    PcmBuffer::new(sample_rate, CAPTURE_CHANNELS, samples)
}

/// Wait for both stream activities; on an unrequested exit, tear down
async fn supervise_stream(
    inner: Arc<Mutex<Inner>>,
    closing: CancellationToken,
    transport: Arc<dyn StreamTransport>,
    handle: StreamHandle,
    mode: SessionMode,
    tasks: [JoinHandle<Result<()>>; 2],
    events: mpsc::Sender<SessionEvent>,
) {
    let mut failure = None;
    for task in tasks {
        let error = match task.await {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => e,
            Err(e) => AudioError::transport(format!("stream task panicked: {e}")),
        };
        failure.get_or_insert(error);
    }

    if closing.is_cancelled() {
        return;
    }

    {
        let mut inner = inner.lock().await;
        if closing.is_cancelled() {
            return;
        }
        inner.stream = None;
        if let Some(next) = inner.state.next(Transition::TransportFailure, mode) {
            inner.state = next;
        }
    }

    let error = failure.unwrap_or_else(|| AudioError::transport("stream ended"));
    error!("Stream failed: {}", error);

    if let Err(e) = transport.close(handle).await {
        warn!("Failed to close failed stream: {}", e);
    }
    SessionEvent::StreamFailed(error).emit(&events);
}
