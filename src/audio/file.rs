use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::fs;
use std::path::Path;
use tracing::info;

use super::pcm::PcmBuffer;
use super::wav;

/// A 16-bit PCM WAV file loaded from disk
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub buffer: PcmBuffer,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
            anyhow::bail!(
                "Expected 16-bit PCM, got {:?} {} bits",
                spec.sample_format,
                spec.bits_per_sample
            );
        }

        let samples: Vec<f32> = reader
            .into_samples::<i16>()
            .map(|s| s.map(|sample| sample as f32 / 32768.0))
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let buffer = PcmBuffer::new(spec.sample_rate, spec.channels, samples)
            .context("Invalid audio layout")?;
        let duration_seconds = buffer.duration_seconds();

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            buffer.samples().len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            buffer,
        })
    }

    /// Write a buffer to disk as 16-bit PCM, creating the parent directory
    pub fn save(path: impl AsRef<Path>, buffer: &PcmBuffer) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let spec = WavSpec {
            channels: buffer.channels(),
            sample_rate: buffer.sample_rate(),
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };

        let mut writer = WavWriter::create(path, spec)
            .with_context(|| format!("Failed to create WAV file: {}", path.display()))?;

        for &sample in buffer.samples() {
            writer
                .write_sample(wav::quantize(sample))
                .context("Failed to write sample to WAV")?;
        }

        writer.finalize().context("Failed to finalize WAV file")?;

        info!(
            "Saved {:.1}s of audio to {}",
            buffer.duration_seconds(),
            path.display()
        );

        Ok(())
    }
}
