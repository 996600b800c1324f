//! Canonical 44-byte-header WAV codec for 16-bit PCM
//!
//! Layout (all fields little-endian):
//!
//! | Offset | Size | Field          |
//! |--------|------|----------------|
//! | 0      | 4    | "RIFF"         |
//! | 4      | 4    | 36 + data size |
//! | 8      | 4    | "WAVE"         |
//! | 12     | 4    | "fmt "         |
//! | 16     | 4    | 16             |
//! | 20     | 2    | 1 (PCM)        |
//! | 22     | 2    | channels       |
//! | 24     | 4    | sample rate    |
//! | 28     | 4    | byte rate      |
//! | 32     | 2    | block align    |
//! | 34     | 2    | 16             |
//! | 36     | 4    | "data"         |
//! | 40     | 4    | data size      |
//! | 44     | ...  | samples        |
//!
//! Vendor transcription endpoints validate this header strictly, so the
//! encoder output is byte-exact and never carries extra chunks.

use super::pcm::{validate_layout, PcmBuffer};
use crate::error::{AudioError, Result};

pub const HEADER_LEN: usize = 44;

const PCM_FORMAT: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;
const BYTES_PER_SAMPLE: usize = 2;
const FMT_CHUNK_LEN: u32 = 16;

/// Encoded WAV container bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavBytes(Vec<u8>);

impl WavBytes {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn decode(&self) -> Result<PcmBuffer> {
        decode(&self.0)
    }
}

impl AsRef<[u8]> for WavBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<WavBytes> for Vec<u8> {
    fn from(bytes: WavBytes) -> Self {
        bytes.0
    }
}

/// Encode a buffer as 16-bit PCM WAV
pub fn encode(buffer: &PcmBuffer) -> Result<WavBytes> {
    encode_samples(buffer.sample_rate(), buffer.channels(), buffer.samples())
}

/// Encode raw interleaved samples as 16-bit PCM WAV
pub fn encode_samples(sample_rate: u32, channels: u16, samples: &[f32]) -> Result<WavBytes> {
    validate_layout(sample_rate, channels, samples.len())?;

    let data_len = samples.len() * BYTES_PER_SAMPLE;
    let data_len_u32 = u32::try_from(data_len).map_err(|_| {
        AudioError::InvalidArgument(format!("{data_len} bytes of audio exceeds the WAV size limit"))
    })?;
    if data_len_u32 > u32::MAX - 36 {
        return Err(AudioError::InvalidArgument(format!(
            "{data_len} bytes of audio exceeds the WAV size limit"
        )));
    }

    let block_align = channels * BYTES_PER_SAMPLE as u16;
    let byte_rate = sample_rate
        .checked_mul(block_align as u32)
        .ok_or_else(|| AudioError::InvalidArgument(format!("sample rate {sample_rate} is too large")))?;

    let mut out = Vec::with_capacity(HEADER_LEN + data_len);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len_u32).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
    out.extend_from_slice(&PCM_FORMAT.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len_u32.to_le_bytes());

    for &sample in samples {
        out.extend_from_slice(&quantize(sample).to_le_bytes());
    }

    Ok(WavBytes(out))
}

/// Decode a canonical 16-bit PCM WAV container
pub fn decode(bytes: &[u8]) -> Result<PcmBuffer> {
    if bytes.len() < HEADER_LEN {
        return Err(AudioError::MalformedContainer(format!(
            "{} bytes is shorter than the {HEADER_LEN}-byte header",
            bytes.len()
        )));
    }

    expect_tag(bytes, 0, b"RIFF")?;
    expect_tag(bytes, 8, b"WAVE")?;
    expect_tag(bytes, 12, b"fmt ")?;
    expect_tag(bytes, 36, b"data")?;

    let format = read_u16(bytes, 20);
    if format != PCM_FORMAT {
        return Err(AudioError::UnsupportedFormat(format!(
            "format code {format}, only PCM (1) is supported"
        )));
    }
    let bits = read_u16(bytes, 34);
    if bits != BITS_PER_SAMPLE {
        return Err(AudioError::UnsupportedFormat(format!(
            "{bits} bits per sample, only 16 is supported"
        )));
    }
    let channels = read_u16(bytes, 22);
    if channels == 0 || channels > 2 {
        return Err(AudioError::UnsupportedFormat(format!(
            "{channels} channels, only mono and stereo are supported"
        )));
    }
    let sample_rate = read_u32(bytes, 24);
    if sample_rate == 0 {
        return Err(AudioError::MalformedContainer(
            "sample rate is zero".to_string(),
        ));
    }

    let data_len = read_u32(bytes, 40) as usize;
    let available = bytes.len() - HEADER_LEN;
    if available % BYTES_PER_SAMPLE != 0 {
        return Err(AudioError::TruncatedData(format!(
            "{available} bytes after the header is not a whole number of 16-bit words"
        )));
    }
    if available < data_len {
        return Err(AudioError::TruncatedData(format!(
            "header declares {data_len} data bytes, only {available} present"
        )));
    }
    if data_len % BYTES_PER_SAMPLE != 0 {
        return Err(AudioError::TruncatedData(format!(
            "data size {data_len} is not a whole number of 16-bit samples"
        )));
    }

    let block_align = channels as usize * BYTES_PER_SAMPLE;
    if data_len % block_align != 0 {
        return Err(AudioError::TruncatedData(format!(
            "data size {data_len} ends mid-frame for {channels} channels"
        )));
    }

    let samples = bytes[HEADER_LEN..HEADER_LEN + data_len]
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|word| i16::from_le_bytes([word[0], word[1]]) as f32 / 32768.0)
        .collect();

    PcmBuffer::new(sample_rate, channels, samples)
}

/// Clamp to [-1, 1] and round to the nearest 16-bit step
pub(crate) fn quantize(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    let scaled = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round();
    scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

fn expect_tag(bytes: &[u8], offset: usize, tag: &[u8; 4]) -> Result<()> {
    let found = &bytes[offset..offset + 4];
    if found != tag {
        return Err(AudioError::MalformedContainer(format!(
            "expected {:?} at offset {offset}, found {:?}",
            String::from_utf8_lossy(tag),
            String::from_utf8_lossy(found)
        )));
    }
    Ok(())
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
