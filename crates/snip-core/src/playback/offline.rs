//! Pull-based output without an audio device
//!
//! Renders the transport on demand in the calling thread. Used by headless
//! tools and by tests, where output must be deterministic.

use super::transport::TransportProcessor;
use crate::types::ChannelBuffer;

/// Frames rendered per `process` call, like a device period
const BLOCK_FRAMES: usize = 256;

/// Deterministic output backend
pub struct OfflineOutput {
    processor: TransportProcessor,
    channels: usize,
    /// Interleaved scratch block
    block: Vec<f32>,
}

impl OfflineOutput {
    /// Wrap a processor, rendering at `sample_rate` with `channels` outputs
    pub fn new(mut processor: TransportProcessor, sample_rate: u32, channels: usize) -> Self {
        processor.prepare(sample_rate);
        let channels = channels.max(1);
        Self {
            processor,
            channels,
            block: vec![0.0; BLOCK_FRAMES * channels],
        }
    }

    /// Output channel count
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Check if any voice is still producing output
    pub fn is_active(&self) -> bool {
        self.processor.is_active()
    }

    /// Render `frames` output frames into a planar buffer
    pub fn pull(&mut self, frames: usize) -> ChannelBuffer {
        let mut out = vec![Vec::with_capacity(frames); self.channels];
        let mut remaining = frames;

        while remaining > 0 {
            let block_frames = remaining.min(BLOCK_FRAMES);
            let block = &mut self.block[..block_frames * self.channels];
            self.processor.process(block, self.channels);

            for frame in block.chunks_exact(self.channels) {
                for (channel, &sample) in out.iter_mut().zip(frame) {
                    channel.push(sample);
                }
            }
            remaining -= block_frames;
        }

        ChannelBuffer::from_channels(out).unwrap_or_default()
    }

    /// Render into an interleaved slice
    pub fn pull_interleaved(&mut self, out: &mut [f32]) {
        self.processor.process(out, self.channels);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::transport::{transport_command_channel, TransportAtomics};
    use std::sync::Arc;

    #[test]
    fn test_pull_spans_blocks() {
        let (_tx, rx) = transport_command_channel(4);
        let processor = TransportProcessor::new(rx, Arc::new(TransportAtomics::new()), 1.0);
        let mut output = OfflineOutput::new(processor, 48000, 2);

        let buffer = output.pull(BLOCK_FRAMES * 2 + 88);
        assert_eq!(buffer.num_channels(), 2);
        assert_eq!(buffer.len(), BLOCK_FRAMES * 2 + 88);
        assert!(!output.is_active());
    }
}
