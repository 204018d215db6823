//! Common types for Snip
//!
//! Sample buffers are planar: one `Vec<Sample>` per channel, all of equal
//! length. Every stage downstream of the decoder works channel by channel,
//! so planar storage avoids de-interleaving in each of them.

use std::collections::TryReserveError;

/// Sample rate assumed when nothing better is known (CD rate)
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Audio sample type (32-bit float for processing, stored as 16-bit in exports)
pub type Sample = f32;

/// Planar multi-channel sample buffer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelBuffer {
    channels: Vec<Vec<Sample>>,
}

impl ChannelBuffer {
    /// Create a silent buffer with the given channel count and length
    pub fn silence(num_channels: usize, frames: usize) -> Self {
        Self {
            channels: vec![vec![0.0; frames]; num_channels],
        }
    }

    /// Build a buffer from per-channel sample vectors
    ///
    /// Returns `None` when the channels have different lengths.
    pub fn from_channels(channels: Vec<Vec<Sample>>) -> Option<Self> {
        let frames = channels.first().map(Vec::len).unwrap_or(0);
        if channels.iter().any(|c| c.len() != frames) {
            return None;
        }
        Some(Self { channels })
    }

    /// Allocate an empty buffer with room for `frames` per channel
    ///
    /// Unlike `Vec::with_capacity` this reports allocation failure instead
    /// of aborting, so very long renders can fail gracefully.
    pub fn try_with_capacity(num_channels: usize, frames: usize) -> Result<Self, TryReserveError> {
        let mut channels = Vec::new();
        channels.try_reserve_exact(num_channels)?;
        for _ in 0..num_channels {
            let mut channel = Vec::new();
            channel.try_reserve_exact(frames)?;
            channels.push(channel);
        }
        Ok(Self { channels })
    }

    /// Number of channels
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames (samples per channel)
    #[inline]
    pub fn len(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    /// Check if the buffer holds no frames
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Samples of one channel
    #[inline]
    pub fn channel(&self, index: usize) -> Option<&[Sample]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Mutable samples of one channel
    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> Option<&mut [Sample]> {
        self.channels.get_mut(index).map(Vec::as_mut_slice)
    }

    /// All channels
    pub fn channels(&self) -> &[Vec<Sample>] {
        &self.channels
    }

    /// All channels, mutable
    ///
    /// Lengths must stay equal; callers only ever push to every channel
    /// in lockstep.
    pub fn channels_mut(&mut self) -> &mut [Vec<Sample>] {
        &mut self.channels
    }

    /// Iterate over all samples of all channels mutably
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Sample> {
        self.channels.iter_mut().flat_map(|c| c.iter_mut())
    }

    /// Multiply every sample by a gain factor
    pub fn scale(&mut self, factor: Sample) {
        for sample in self.iter_mut() {
            *sample *= factor;
        }
    }

    /// Peak amplitude of one frame across all channels
    #[inline]
    pub fn frame_peak(&self, frame: usize) -> Sample {
        self.channels
            .iter()
            .map(|c| c[frame].abs())
            .fold(0.0, Sample::max)
    }

    /// Peak amplitude of the whole buffer
    pub fn peak(&self) -> Sample {
        self.channels
            .iter()
            .flat_map(|c| c.iter())
            .fold(0.0, |acc: Sample, s| acc.max(s.abs()))
    }

    /// Consume the buffer and return its channels
    pub fn into_channels(self) -> Vec<Vec<Sample>> {
        self.channels
    }
}
