//! Immutable decoded audio clip
//!
//! A clip is created once per load and shared by reference (`Arc<Clip>`)
//! with waveform workers, the audio thread and the export pool. Nothing
//! mutates it after construction; loading a new file replaces it wholesale.

use std::ops::Range;

use crate::audio_file::DecodeError;
use crate::timeline::Region;
use crate::types::{ChannelBuffer, Sample};

/// Decoded multi-channel audio with its sample rate and display name
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    /// Display name (usually the source file name)
    name: String,
    /// Samples per second per channel
    sample_rate: u32,
    /// Planar sample data
    buffer: ChannelBuffer,
}

impl Clip {
    /// Create a clip from planar channel data
    ///
    /// Rejects zero channels, a zero sample rate and ragged channel lengths.
    pub fn new(
        name: impl Into<String>,
        sample_rate: u32,
        channels: Vec<Vec<Sample>>,
    ) -> Result<Self, DecodeError> {
        if sample_rate == 0 {
            return Err(DecodeError::InvalidLayout("sample rate is zero".to_string()));
        }
        if channels.is_empty() {
            return Err(DecodeError::InvalidLayout("no channels".to_string()));
        }
        let buffer = ChannelBuffer::from_channels(channels).ok_or_else(|| {
            DecodeError::InvalidLayout("channels have different lengths".to_string())
        })?;
        Ok(Self {
            name: name.into(),
            sample_rate,
            buffer,
        })
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of channels
    pub fn num_channels(&self) -> usize {
        self.buffer.num_channels()
    }

    /// Length in frames
    pub fn frames(&self) -> usize {
        self.buffer.len()
    }

    /// Length in seconds
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Samples of one channel
    pub fn channel(&self, index: usize) -> Option<&[Sample]> {
        self.buffer.channel(index)
    }

    /// Underlying planar buffer
    pub fn buffer(&self) -> &ChannelBuffer {
        &self.buffer
    }

    /// Convert a normalized timeline position to a frame index
    ///
    /// Rounds to the nearest frame and clamps to `[0, frames]`.
    pub fn frame_at(&self, position: f64) -> usize {
        let frames = self.frames();
        if !position.is_finite() || position <= 0.0 {
            return 0;
        }
        ((position * frames as f64).round() as usize).min(frames)
    }

    /// Frame range covered by a region
    pub fn region_frames(&self, region: &Region) -> Range<usize> {
        self.frame_at(region.start)..self.frame_at(region.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_layout() {
        assert!(Clip::new("a", 0, vec![vec![0.0]]).is_err());
        assert!(Clip::new("a", 44100, vec![]).is_err());
        assert!(Clip::new("a", 44100, vec![vec![0.0; 2], vec![0.0; 3]]).is_err());
    }

    #[test]
    fn test_region_frames() {
        let clip = Clip::new("five-seconds", 44100, vec![vec![0.0; 220_500]]).unwrap();
        assert_eq!(clip.duration_secs(), 5.0);
        let region = Region::new(0.0, 0.5);
        assert_eq!(clip.region_frames(&region), 0..110_250);
        assert_eq!(clip.frame_at(1.0), 220_500);
        assert_eq!(clip.frame_at(-3.0), 0);
    }
}
