use crate::error::{AudioError, Result};

/// Interleaved float PCM audio (samples nominally in [-1.0, 1.0])
///
/// Immutable once constructed. Produced by capture or decoding, handed by
/// value to the codec or the playback sink.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    sample_rate: u32,
    channels: u16,
    samples: Vec<f32>,
}

impl PcmBuffer {
    /// Create a buffer, validating rate, channel count and interleaving
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<f32>) -> Result<Self> {
        validate_layout(sample_rate, channels, samples.len())?;
        Ok(Self {
            sample_rate,
            channels,
            samples,
        })
    }

    /// Mono buffer of `frames` zero samples
    pub fn silence(sample_rate: u32, frames: usize) -> Result<Self> {
        Self::new(sample_rate, 1, vec![0.0; frames])
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Number of sample frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()))
    }
}

/// Shared validation for buffers and raw encoder input
pub(crate) fn validate_layout(sample_rate: u32, channels: u16, sample_count: usize) -> Result<()> {
    if sample_rate == 0 {
        return Err(AudioError::InvalidArgument(
            "sample rate must be greater than zero".to_string(),
        ));
    }
    if channels == 0 || channels > 2 {
        return Err(AudioError::InvalidArgument(format!(
            "channel count must be 1 or 2, got {channels}"
        )));
    }
    if sample_count % channels as usize != 0 {
        return Err(AudioError::InvalidArgument(format!(
            "{sample_count} samples is not a multiple of {channels} channels"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_ragged_stereo() {
        let err = PcmBuffer::new(44100, 2, vec![0.1, 0.2, 0.3]).unwrap_err();
        assert!(matches!(err, AudioError::InvalidArgument(_)));
    }

    #[test]
    fn test_rejects_zero_rate_and_channels() {
        assert!(matches!(
            PcmBuffer::new(0, 1, vec![]),
            Err(AudioError::InvalidArgument(_))
        ));
        assert!(matches!(
            PcmBuffer::new(48000, 0, vec![]),
            Err(AudioError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_frames_and_duration() {
        let buffer = PcmBuffer::new(48000, 2, vec![0.0; 96000]).unwrap();
        assert_eq!(buffer.frames(), 48000);
        assert!((buffer.duration_seconds() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_peak() {
        let buffer = PcmBuffer::new(16000, 1, vec![0.25, -0.75, 0.5]).unwrap();
        assert_eq!(buffer.peak(), 0.75);
    }
}
