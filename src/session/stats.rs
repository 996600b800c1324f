use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

use super::state::{SessionMode, SessionState};
use crate::error::AudioError;

/// Statistics about an audio session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub session_id: String,

    /// State at the time of the snapshot
    pub state: SessionState,

    pub mode: SessionMode,

    /// When the session was created
    pub started_at: DateTime<Utc>,

    /// Session age in seconds
    pub duration_secs: f64,

    /// Completed recordings
    pub recordings: usize,

    /// Frames pushed to the stream transport (handshake included)
    pub frames_sent: usize,

    /// Frames pulled from the stream transport
    pub frames_received: usize,

    /// Received audio frames that failed to decode
    pub frames_rejected: usize,

    /// Completed streamed text replies
    pub text_replies: usize,
}

/// Counters shared with the streaming tasks
#[derive(Debug, Default)]
pub(crate) struct SessionCounters {
    pub recordings: AtomicUsize,
    pub frames_sent: AtomicUsize,
    pub frames_received: AtomicUsize,
    pub frames_rejected: AtomicUsize,
    pub text_replies: AtomicUsize,
}

impl SessionCounters {
    pub fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn read(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::Relaxed)
    }
}

/// Events held for the caller before new ones are dropped
pub const EVENT_QUEUE_CAPACITY: usize = 256;

/// Notifications from a running session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A streamed text reply completed
    TextReply(String),
    /// A received frame was skipped; the stream keeps running
    FrameRejected(AudioError),
    /// The stream died; the session is back to idle
    StreamFailed(AudioError),
}

impl SessionEvent {
    /// Queue the event without waiting; dropped if the caller is not keeping up
    pub(crate) fn emit(self, events: &mpsc::Sender<SessionEvent>) {
        match events.try_send(self) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(event)) => {
                warn!("Event queue full, dropping {:?}", event);
            }
        }
    }
}
