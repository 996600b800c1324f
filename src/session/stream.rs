//! The two activities behind a streaming session
//!
//! Outbound drains the capture device and the outbound queue into the
//! transport. Inbound pulls frames off the transport, plays audio and
//! flushes completed text replies onto the event queue. Neither touches
//! the other's state; a failure in either cancels both.

use futures::StreamExt;
use std::future::Future;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::stats::{SessionCounters, SessionEvent};
use super::text::TextAccumulator;
use crate::audio::{wav, DeviceLease, PlaybackSink};
use crate::error::{AudioError, Result};
use crate::transport::{StreamFrame, StreamHandle, StreamTransport};

/// Queue depth for frames waiting to go out
pub(crate) const OUTBOUND_QUEUE_CAPACITY: usize = 64;

pub(crate) struct Outbound {
    pub transport: Arc<dyn StreamTransport>,
    pub handle: StreamHandle,
    pub lease: DeviceLease,
    pub sample_rate: u32,
    pub channels: u16,
    /// Ring buffer size in frames; the write position wraps past it
    pub capacity: usize,
    pub frame_interval: Duration,
    pub queue: mpsc::Receiver<StreamFrame>,
    pub counters: Arc<SessionCounters>,
}

pub(crate) struct Inbound {
    pub transport: Arc<dyn StreamTransport>,
    pub handle: StreamHandle,
    pub playback: Arc<dyn PlaybackSink>,
    pub events: mpsc::Sender<SessionEvent>,
    pub counters: Arc<SessionCounters>,
}

/// Run an activity; on failure, cancel its sibling
pub(crate) async fn guarded(
    activity: impl Future<Output = Result<()>>,
    cancel: CancellationToken,
) -> Result<()> {
    let result = activity.await;
    if result.is_err() {
        cancel.cancel();
    }
    result
}

impl Outbound {
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        info!("Outbound stream task started");

        let mut ticker = tokio::time::interval(self.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cursor = 0usize;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let position = self.lease.position();
                    if position == cursor {
                        continue;
                    }
                    let samples = self.drain(cursor, position);
                    cursor = position;
                    if samples.is_empty() {
                        continue;
                    }
                    let clip = wav::encode_samples(self.sample_rate, self.channels, &samples)?;
                    self.send(StreamFrame::Audio(clip.into_vec()), &cancel).await?;
                }
                Some(frame) = self.queue.recv() => {
                    self.send(frame, &cancel).await?;
                }
            }
        }

        // `self.lease` drops here, ending capture and freeing the device
        info!("Outbound stream task stopped");
        Ok(())
    }

    /// Samples written since `cursor`, following the write position across a wrap
    fn drain(&self, cursor: usize, position: usize) -> Vec<f32> {
        if position > cursor {
            return self.read(cursor..position);
        }

        debug!("Capture buffer wrapped ({} -> {})", cursor, position);
        let mut samples = self.read(cursor..self.capacity.max(cursor));
        samples.extend(self.read(0..position));
        samples
    }

    fn read(&self, frames: Range<usize>) -> Vec<f32> {
        if frames.is_empty() {
            return Vec::new();
        }
        let len = frames.len() * self.channels as usize;
        let mut samples = self.lease.read(frames);
        samples.truncate(len);
        samples
    }

    /// Send one frame; a send cut short by cancellation is dropped
    async fn send(&self, frame: StreamFrame, cancel: &CancellationToken) -> Result<()> {
        let is_audio = frame.is_audio();
        tokio::select! {
            _ = cancel.cancelled() => Ok(()),
            result = self.transport.send(self.handle, frame) => {
                result?;
                SessionCounters::bump(&self.counters.frames_sent);
                debug!("Sent {} frame", if is_audio { "audio" } else { "text" });
                Ok(())
            }
        }
    }
}

impl Inbound {
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        info!("Inbound stream task started");

        let mut frames = self.transport.receive(self.handle);
        let mut text = TextAccumulator::default();

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => break,
                next = frames.next() => next,
            };

            let frame = match next {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => return Err(e),
                None => return Err(AudioError::transport("stream closed by remote")),
            };
            SessionCounters::bump(&self.counters.frames_received);

            match frame {
                StreamFrame::Text { text: fragment, done } => {
                    if let Some(reply) = text.push(&fragment, done) {
                        SessionCounters::bump(&self.counters.text_replies);
                        debug!("Text reply complete ({} chars)", reply.len());
                        SessionEvent::TextReply(reply).emit(&self.events);
                    }
                }
                StreamFrame::Audio(bytes) => match wav::decode(&bytes) {
                    Ok(clip) => {
                        debug!("Playing received clip ({:.2}s)", clip.duration_seconds());
                        self.playback.play(clip);
                    }
                    Err(e) => {
                        warn!("Skipping undecodable audio frame: {}", e);
                        SessionCounters::bump(&self.counters.frames_rejected);
                        SessionEvent::FrameRejected(AudioError::DecodeFrame(e.to_string()))
                            .emit(&self.events);
                    }
                },
            }
        }

        if !text.pending().is_empty() {
            debug!("Discarding {} chars of unfinished text", text.pending().len());
            text.discard();
        }

        info!("Inbound stream task stopped");
        Ok(())
    }
}
