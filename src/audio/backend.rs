use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::pcm::PcmBuffer;
use crate::error::{AudioError, Result};

/// Configuration for a capture run
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Capture sample rate in Hz (44100 or 48000)
    pub sample_rate: u32,
    /// Channel count (the controller always records mono)
    pub channels: u16,
    /// How much audio the device should allocate room for
    pub max_duration: Duration,
    /// Keep writing from frame 0 once the buffer is full
    pub looping: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 1,
            max_duration: Duration::from_secs(10),
            looping: false,
        }
    }
}

impl CaptureConfig {
    /// Buffer size in sample frames
    pub fn capacity_frames(&self) -> usize {
        (self.max_duration.as_secs_f64() * self.sample_rate as f64) as usize
    }
}

/// Opaque handle for one capture run, issued by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CaptureHandle(pub u64);

/// Microphone capture port
///
/// Implementations wrap the platform input device. All calls return
/// immediately; the device fills its buffer in the background.
pub trait CaptureDevice: Send + Sync {
    /// Start filling a buffer
    fn begin(&self, config: &CaptureConfig) -> Result<CaptureHandle>;

    /// Current write position, in sample frames
    ///
    /// A looping run wraps back to 0 after `capacity_frames`; otherwise the
    /// position stops there.
    fn position(&self, handle: CaptureHandle) -> usize;

    /// Interleaved samples starting at `frames.start`
    ///
    /// May return fewer samples than requested if the range runs past the
    /// allocated buffer, or more if the device hands back its whole buffer;
    /// callers trim to the range.
    fn read(&self, handle: CaptureHandle, frames: Range<usize>) -> Vec<f32>;

    /// Stop capturing and release the device buffer
    fn end(&self, handle: CaptureHandle);

    /// Device name for logging
    fn name(&self) -> &str;
}

/// Playback port
///
/// Fire-and-forget: a new clip replaces whatever is currently playing.
pub trait PlaybackSink: Send + Sync {
    fn play(&self, clip: PcmBuffer);
}

/// The process-wide capture device, shared between sessions
///
/// Only one session may hold the device at a time; holding is expressed
/// as a [`DeviceLease`] that releases the device when dropped.
#[derive(Clone)]
pub struct SharedCaptureDevice {
    device: Arc<dyn CaptureDevice>,
    held: Arc<AtomicBool>,
}

impl SharedCaptureDevice {
    pub fn new(device: Arc<dyn CaptureDevice>) -> Self {
        Self {
            device,
            held: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Claim exclusive use of the device
    pub fn acquire(&self) -> Result<DeviceLease> {
        if self
            .held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(AudioError::DeviceBusy);
        }

        debug!("Capture device acquired: {}", self.device.name());

        Ok(DeviceLease {
            device: Arc::clone(&self.device),
            held: Arc::clone(&self.held),
            active: None,
        })
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    pub fn name(&self) -> &str {
        self.device.name()
    }
}

/// Exclusive claim on the capture device
///
/// Ends any capture run still active and frees the device on drop.
pub struct DeviceLease {
    device: Arc<dyn CaptureDevice>,
    held: Arc<AtomicBool>,
    active: Option<CaptureHandle>,
}

impl DeviceLease {
    /// Start capturing; a run already in progress is ended first
    pub fn begin(&mut self, config: &CaptureConfig) -> Result<CaptureHandle> {
        if let Some(handle) = self.active.take() {
            self.device.end(handle);
        }
        let handle = self.device.begin(config)?;
        self.active = Some(handle);
        Ok(handle)
    }

    pub fn position(&self) -> usize {
        self.active
            .map(|handle| self.device.position(handle))
            .unwrap_or(0)
    }

    pub fn read(&self, frames: Range<usize>) -> Vec<f32> {
        match self.active {
            Some(handle) => self.device.read(handle, frames),
            None => Vec::new(),
        }
    }

    /// Stop the active capture run, if any
    pub fn end(&mut self) {
        if let Some(handle) = self.active.take() {
            self.device.end(handle);
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.active.is_some()
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        self.end();
        self.held.store(false, Ordering::Release);
        debug!("Capture device released: {}", self.device.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingDevice {
        begins: Mutex<u32>,
        ends: Mutex<u32>,
    }

    impl CaptureDevice for CountingDevice {
        fn begin(&self, _config: &CaptureConfig) -> Result<CaptureHandle> {
            let mut begins = self.begins.lock().unwrap();
            *begins += 1;
            Ok(CaptureHandle(*begins as u64))
        }

        fn position(&self, _handle: CaptureHandle) -> usize {
            0
        }

        fn read(&self, _handle: CaptureHandle, _frames: Range<usize>) -> Vec<f32> {
            Vec::new()
        }

        fn end(&self, _handle: CaptureHandle) {
            *self.ends.lock().unwrap() += 1;
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    #[test]
    fn test_second_acquire_is_busy() {
        let shared = SharedCaptureDevice::new(Arc::new(CountingDevice::default()));

        let lease = shared.acquire().unwrap();
        assert!(shared.is_held());
        assert!(matches!(shared.acquire(), Err(AudioError::DeviceBusy)));

        drop(lease);
        assert!(!shared.is_held());
        assert!(shared.acquire().is_ok());
    }

    #[test]
    fn test_drop_ends_active_capture() {
        let device = Arc::new(CountingDevice::default());
        let shared = SharedCaptureDevice::new(device.clone());

        let mut lease = shared.acquire().unwrap();
        lease.begin(&CaptureConfig::default()).unwrap();
        assert!(lease.is_capturing());
        drop(lease);

        assert_eq!(*device.begins.lock().unwrap(), 1);
        assert_eq!(*device.ends.lock().unwrap(), 1);
    }

    #[test]
    fn test_capture_config_default() {
        let config = CaptureConfig::default();
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.channels, 1);
        assert_eq!(config.max_duration, Duration::from_secs(10));
        assert!(!config.looping);
        assert_eq!(config.capacity_frames(), 441000);
    }
}
