// Integration tests for WAV persistence
//
// These tests verify recordings survive a save/open cycle on disk.

use anyhow::Result;
use std::path::PathBuf;
use tempfile::TempDir;
use voicelink::{AudioFile, PcmBuffer};

#[test]
fn test_audio_file_save_and_open() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("nested").join("grabacion.wav");

    let buffer = PcmBuffer::new(44100, 1, vec![0.0, 0.25, -0.25, 0.5])?;
    AudioFile::save(&path, &buffer)?;

    let audio = AudioFile::open(&path)?;
    assert!(audio.path.contains("grabacion.wav"));
    assert_eq!(audio.buffer.sample_rate(), 44100);
    assert_eq!(audio.buffer.channels(), 1);
    assert_eq!(audio.buffer.samples().len(), 4);
    for (a, b) in buffer.samples().iter().zip(audio.buffer.samples()) {
        assert!((a - b).abs() < 0.001);
    }

    Ok(())
}

#[test]
fn test_saved_file_matches_codec_quantization() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("clip.wav");

    let buffer = PcmBuffer::new(48000, 2, vec![0.5, -0.5, 1.0, -1.0])?;
    AudioFile::save(&path, &buffer)?;

    let from_disk = AudioFile::open(&path)?.buffer;
    let from_codec = voicelink::audio::encode(&buffer)?.decode()?;
    assert_eq!(from_disk, from_codec);

    Ok(())
}

#[test]
fn test_saved_file_quantizes_like_codec_at_extremes() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("extremes.wav");

    let buffer = PcmBuffer::new(44100, 1, vec![f32::NAN, 2.0, -2.0, 0.5])?;
    AudioFile::save(&path, &buffer)?;

    let mut reader = hound::WavReader::open(&path)?;
    let samples: Vec<i16> = reader.samples::<i16>().collect::<Result<_, _>>()?;
    assert_eq!(samples, vec![0, 32767, -32767, 16384]);

    Ok(())
}

#[test]
fn test_audio_file_duration() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("two-seconds.wav");

    AudioFile::save(&path, &PcmBuffer::silence(16000, 32000)?)?;
    let audio = AudioFile::open(&path)?;

    assert!((audio.duration_seconds - 2.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_audio_file_nonexistent() {
    let path = PathBuf::from("/nonexistent/path/to/audio.wav");
    let result = AudioFile::open(&path);

    assert!(result.is_err(), "Opening nonexistent file should fail");
}
