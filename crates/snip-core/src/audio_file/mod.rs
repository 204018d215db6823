//! Audio file decoding
//!
//! Decoding is a collaborator of the engine: anything that turns bytes into
//! a [`Clip`] can implement [`AudioDecoder`]. The crate ships a WAV decoder
//! built on `hound` that accepts integer PCM (8/16/24/32-bit) and 32-bit
//! float files with any channel count.

use std::io::Cursor;
use std::path::Path;

use thiserror::Error;

use crate::clip::Clip;
use crate::types::Sample;

/// Errors raised while decoding input audio
#[derive(Error, Debug)]
pub enum DecodeError {
    /// File could not be read
    #[error("Failed to read audio file: {0}")]
    Io(#[from] std::io::Error),

    /// Container or sample data is malformed
    #[error("Malformed WAV data: {0}")]
    Wav(#[from] hound::Error),

    /// Sample format the decoder cannot convert
    #[error("Unsupported sample format: {bits}-bit {format}")]
    UnsupportedFormat { bits: u16, format: &'static str },

    /// Decoded data does not form a valid clip
    #[error("Invalid audio layout: {0}")]
    InvalidLayout(String),

    /// File decoded to zero frames
    #[error("Audio file contains no samples")]
    Empty,
}

/// Result type for decoding
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Turns encoded bytes into a clip
pub trait AudioDecoder: Send + Sync {
    /// Decode a complete file held in memory
    ///
    /// On failure no partial clip is produced.
    fn decode(&self, bytes: &[u8], name: &str) -> DecodeResult<Clip>;
}

/// WAV decoder backed by `hound`
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDecoder;

impl AudioDecoder for WavDecoder {
    fn decode(&self, bytes: &[u8], name: &str) -> DecodeResult<Clip> {
        let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();
        let num_channels = spec.channels as usize;
        if num_channels == 0 {
            return Err(DecodeError::InvalidLayout("no channels".to_string()));
        }

        let interleaved: Vec<Sample> = match spec.sample_format {
            hound::SampleFormat::Int => {
                if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                    return Err(DecodeError::UnsupportedFormat {
                        bits: spec.bits_per_sample,
                        format: "int",
                    });
                }
                let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<_, _>>()?
            }
            hound::SampleFormat::Float => {
                if spec.bits_per_sample != 32 {
                    return Err(DecodeError::UnsupportedFormat {
                        bits: spec.bits_per_sample,
                        format: "float",
                    });
                }
                reader.samples::<f32>().collect::<Result<_, _>>()?
            }
        };

        let frames = interleaved.len() / num_channels;
        if frames == 0 {
            return Err(DecodeError::Empty);
        }

        let mut channels = vec![Vec::with_capacity(frames); num_channels];
        for frame in interleaved.chunks_exact(num_channels) {
            for (channel, &sample) in channels.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }

        log::info!(
            "Decoded {}: {} channels, {} Hz, {} frames",
            name,
            num_channels,
            spec.sample_rate,
            frames
        );

        Clip::new(name, spec.sample_rate, channels)
    }
}

/// Read and decode a file from disk
///
/// The clip is named after the file name component of `path`.
pub fn decode_file(decoder: &dyn AudioDecoder, path: &Path) -> DecodeResult<Clip> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("Unknown")
        .to_string();
    decoder.decode(&bytes, &name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(spec: hound::WavSpec, frames: &[[i16; 2]]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for frame in frames {
                for &s in frame.iter().take(spec.channels as usize) {
                    writer.write_sample(s).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_stereo_16_bit() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let bytes = wav_bytes(spec, &[[16384, -16384], [0, 32767], [-32768, 0]]);
        let clip = WavDecoder.decode(&bytes, "test.wav").unwrap();

        assert_eq!(clip.name(), "test.wav");
        assert_eq!(clip.sample_rate(), 22050);
        assert_eq!(clip.num_channels(), 2);
        assert_eq!(clip.frames(), 3);
        assert_eq!(clip.channel(0).unwrap(), &[0.5, 0.0, -1.0]);
        assert_eq!(clip.channel(1).unwrap()[0], -0.5);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = WavDecoder.decode(b"definitely not a riff file", "junk.wav");
        assert!(matches!(result, Err(DecodeError::Wav(_))));
    }

    #[test]
    fn test_decode_rejects_empty_data() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let bytes = wav_bytes(spec, &[]);
        assert!(matches!(WavDecoder.decode(&bytes, "empty.wav"), Err(DecodeError::Empty)));
    }

    #[test]
    fn test_decode_file_missing() {
        let result = decode_file(&WavDecoder, Path::new("/nonexistent/clip.wav"));
        assert!(matches!(result, Err(DecodeError::Io(_))));
    }
}
