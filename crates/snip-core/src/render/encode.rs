//! Deterministic WAV encoding and content-addressed naming
//!
//! The exported file name is the lowercase hex SHA-256 of the exact bytes
//! written, plus `.wav`. Identical inputs always give identical bytes, so
//! re-exporting the same region with the same effects lands on the same
//! name.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Instant;

use sha2::{Digest, Sha256};

use super::effects::EffectsConfig;
use super::renderer::{render_region, RenderedAudio};
use super::{EncodeResult, ExportResult};
use crate::clip::Clip;
use crate::timeline::Region;

/// Bits per exported sample
pub const EXPORT_BITS_PER_SAMPLE: u16 = 16;

/// Encode rendered audio as interleaved 16-bit PCM WAV bytes
pub fn encode_wav(audio: &RenderedAudio) -> EncodeResult<Vec<u8>> {
    let channels = audio.buffer.num_channels();
    let spec = hound::WavSpec {
        channels: channels as u16,
        sample_rate: audio.sample_rate,
        bits_per_sample: EXPORT_BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + audio.frames() * channels * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for frame in 0..audio.frames() {
            for channel in audio.buffer.channels() {
                writer.write_sample(to_pcm16(channel[frame]))?;
            }
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

/// Quantize a float sample to 16-bit PCM
#[inline]
fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

/// Content-addressed file name: lowercase hex SHA-256 plus `.wav`
pub fn content_name(bytes: &[u8]) -> String {
    format!("{:x}.wav", Sha256::digest(bytes))
}

/// An encoded export held in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    /// Content-addressed file name
    pub name: String,
    /// Complete WAV file contents
    pub bytes: Vec<u8>,
    /// Length in frames
    pub frames: usize,
    /// Channel count
    pub channels: usize,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl ExportedFile {
    /// Wrap encoded bytes, deriving the name from them
    pub fn from_rendered(audio: &RenderedAudio, bytes: Vec<u8>) -> Self {
        Self {
            name: content_name(&bytes),
            frames: audio.frames(),
            channels: audio.buffer.num_channels(),
            sample_rate: audio.sample_rate,
            bytes,
        }
    }

    /// Write the file into `dir` under its content name
    ///
    /// Creates `dir` if needed. Writing the same export twice overwrites the
    /// file with identical bytes.
    pub fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.name);
        std::fs::write(&path, &self.bytes)?;
        log::info!("Exported {} ({} frames) to {:?}", self.name, self.frames, path);
        Ok(path)
    }
}

/// Render and encode a region in one step
pub fn export_region(
    clip: &Clip,
    region: &Region,
    effects: &EffectsConfig,
    fade_ms: f32,
) -> ExportResult<ExportedFile> {
    let start_time = Instant::now();
    let audio = render_region(clip, region, effects, fade_ms)?;
    let bytes = encode_wav(&audio)?;
    let file = ExportedFile::from_rendered(&audio, bytes);

    log::debug!(
        "[PERF] Exported {} [{:.3}, {:.3}) as {} in {:?}",
        clip.name(),
        region.start,
        region.end,
        file.name,
        start_time.elapsed()
    );
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{EffectsError, ExportError};

    fn tone_clip() -> Clip {
        let samples: Vec<f32> = (0..44_100)
            .map(|i| 0.3 * (2.0 * std::f32::consts::PI * 220.0 * i as f32 / 44100.0).sin())
            .collect();
        Clip::new("tone", 44100, vec![samples.clone(), samples]).unwrap()
    }

    #[test]
    fn test_same_input_same_bytes_and_name() {
        let clip = tone_clip();
        let region = Region::new(0.25, 0.75);
        let effects = EffectsConfig {
            high_pass_hz: 80.0,
            threshold_db: -18.0,
            ..EffectsConfig::default()
        };

        let a = export_region(&clip, &region, &effects, 1.0).unwrap();
        let b = export_region(&clip, &region, &effects, 1.0).unwrap();
        assert_eq!(a.bytes, b.bytes);
        assert_eq!(a.name, b.name);
    }

    #[test]
    fn test_changed_gain_changes_name() {
        let clip = tone_clip();
        let region = Region::full();
        let a = export_region(&clip, &region, &EffectsConfig::default(), 1.0).unwrap();
        let louder = EffectsConfig { gain: 1.5, ..EffectsConfig::default() };
        let b = export_region(&clip, &region, &louder, 1.0).unwrap();

        assert_ne!(a.bytes, b.bytes);
        assert_ne!(a.name, b.name);
    }

    #[test]
    fn test_name_is_lowercase_hex_digest() {
        let name = content_name(b"region");
        let (digest, extension) = name.split_at(64);
        assert_eq!(extension, ".wav");
        assert!(digest.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_wav_layout() {
        let clip = tone_clip();
        let file = export_region(&clip, &Region::new(0.0, 0.5), &EffectsConfig::default(), 1.0).unwrap();

        assert_eq!(file.frames, 22_050);
        assert_eq!(file.channels, 2);

        let reader = hound::WavReader::new(Cursor::new(&file.bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 44100);
        assert_eq!(reader.len() as usize, 22_050 * 2);
    }

    #[test]
    fn test_pcm_quantization_clips() {
        assert_eq!(to_pcm16(0.0), 0);
        assert_eq!(to_pcm16(1.0), 32767);
        assert_eq!(to_pcm16(2.0), 32767);
        assert_eq!(to_pcm16(-1.0), -32767);
    }

    #[test]
    fn test_invalid_effects_not_written() {
        let clip = tone_clip();
        let bad = EffectsConfig { threshold_db: 6.0, ..EffectsConfig::default() };
        let result = export_region(&clip, &Region::full(), &bad, 1.0);
        assert!(matches!(
            result,
            Err(ExportError::InvalidEffects(EffectsError::InvalidParameter { field: "threshold_db", .. }))
        ));
    }

    #[test]
    fn test_write_to_uses_content_name() {
        let dir = tempfile::tempdir().unwrap();
        let clip = tone_clip();
        let file = export_region(&clip, &Region::full(), &EffectsConfig::default(), 1.0).unwrap();

        let path = file.write_to(&dir.path().join("out")).unwrap();
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), file.name);
        assert_eq!(std::fs::read(&path).unwrap(), file.bytes);
    }
}
