//! Canonical mono 16-bit PCM WAV encoding and header inspection.

use crate::audio::error::EngineError;

pub const HEADER_LEN: usize = 44;

/// Largest mono 16-bit sample count whose data chunk still fits the 32-bit RIFF sizes.
pub const MAX_SAMPLES: usize = ((u32::MAX - 36) / 2) as usize;

const CHANNELS: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;
const BYTES_PER_SAMPLE: u16 = BITS_PER_SAMPLE / 8;
const PCM_FORMAT: u16 = 1;
const FMT_CHUNK_LEN: u32 = 16;

/// Fields of a canonical 44-byte WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub chunk_size: u32,
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_size: u32,
}

impl WavHeader {
    /// Header describing `sample_count` mono 16-bit samples.
    pub fn mono_pcm16(sample_count: usize, sample_rate: u32) -> Result<Self, EngineError> {
        let block_align = CHANNELS * BYTES_PER_SAMPLE;
        let data_size = u32::try_from(sample_count)
            .ok()
            .and_then(|n| n.checked_mul(block_align as u32))
            .filter(|size| size.checked_add(36).is_some())
            .ok_or_else(|| EngineError::Generation(format!("{} samples do not fit in a WAV container", sample_count)))?;
        let byte_rate = sample_rate
            .checked_mul(block_align as u32)
            .ok_or_else(|| EngineError::Generation(format!("Sample rate {} is too high for a WAV header", sample_rate)))?;

        Ok(WavHeader {
            chunk_size: 36 + data_size,
            audio_format: PCM_FORMAT,
            channels: CHANNELS,
            sample_rate,
            byte_rate,
            block_align,
            bits_per_sample: BITS_PER_SAMPLE,
            data_size,
        })
    }

    /// Parses and validates the header at the start of `bytes`.
    ///
    /// Only the canonical layout (fmt chunk immediately followed by data) is
    /// accepted, which is all this crate ever writes.
    pub fn parse(bytes: &[u8]) -> Result<Self, EngineError> {
        if bytes.len() < HEADER_LEN {
            return Err(invalid(format!("expected at least {} bytes, got {}", HEADER_LEN, bytes.len())));
        }
        if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            return Err(invalid("missing RIFF/WAVE tags".to_string()));
        }
        if &bytes[12..16] != b"fmt " || read_u32(bytes, 16) != FMT_CHUNK_LEN {
            return Err(invalid("unexpected fmt chunk".to_string()));
        }
        if &bytes[36..40] != b"data" {
            return Err(invalid("missing data chunk".to_string()));
        }

        let header = WavHeader {
            chunk_size: read_u32(bytes, 4),
            audio_format: read_u16(bytes, 20),
            channels: read_u16(bytes, 22),
            sample_rate: read_u32(bytes, 24),
            byte_rate: read_u32(bytes, 28),
            block_align: read_u16(bytes, 32),
            bits_per_sample: read_u16(bytes, 34),
            data_size: read_u32(bytes, 40),
        };

        if header.audio_format != PCM_FORMAT {
            return Err(invalid(format!("unsupported audio format {}", header.audio_format)));
        }
        if header.chunk_size != header.data_size.wrapping_add(36) {
            return Err(invalid(format!(
                "chunk size {} does not match data size {}",
                header.chunk_size, header.data_size
            )));
        }
        if header.channels == 0 || header.block_align == 0 || header.sample_rate == 0 {
            return Err(invalid("zero channels, block align or sample rate".to_string()));
        }
        Ok(header)
    }

    /// Length of the whole file this header describes.
    pub fn file_len(&self) -> u64 {
        HEADER_LEN as u64 + self.data_size as u64
    }

    pub fn frame_count(&self) -> u64 {
        self.data_size as u64 / self.block_align as u64
    }

    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&self.chunk_size.to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
        out.extend_from_slice(&self.audio_format.to_le_bytes());
        out.extend_from_slice(&self.channels.to_le_bytes());
        out.extend_from_slice(&self.sample_rate.to_le_bytes());
        out.extend_from_slice(&self.byte_rate.to_le_bytes());
        out.extend_from_slice(&self.block_align.to_le_bytes());
        out.extend_from_slice(&self.bits_per_sample.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&self.data_size.to_le_bytes());
    }
}

/// Encodes `samples` as a mono 16-bit PCM WAV file.
pub fn encode(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, EngineError> {
    if sample_rate == 0 {
        return Err(EngineError::Generation("Sample rate must be non-zero".to_string()));
    }
    let header = WavHeader::mono_pcm16(samples.len(), sample_rate)?;
    let mut out = Vec::with_capacity(header.file_len() as usize);
    header.write_to(&mut out);
    for &sample in samples {
        out.extend_from_slice(&sample_to_i16(sample).to_le_bytes());
    }
    Ok(out)
}

/// Maps a float sample onto the signed 16-bit range, asymmetric like most PCM writers.
pub fn sample_to_i16(sample: f32) -> i16 {
    // NaN would otherwise survive the clamp.
    let v = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
    if v < 0.0 {
        (v * 0x8000 as f32) as i16
    } else {
        (v * 0x7fff as f32) as i16
    }
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}

fn invalid(reason: String) -> EngineError {
    EngineError::Playback(format!("Invalid WAV header: {}", reason))
}
