//! Offline region renderer
//!
//! ```text
//!   Clip[region] ──► rate change ──► high-pass ──► low-pass ──► compressor
//!                                                                   │
//!                           RenderedAudio ◄── fade ◄── gain ◄───────┘
//! ```
//!
//! Rendering is a pure function of `(clip, region, effects, fade_ms)`: no
//! clock, no randomness, and the stages always run in the same order.

use std::time::Instant;

use super::chain::{CompressorEffect, EffectChain, FadeEffect, FilterMode, GainEffect, SvfFilterEffect};
use super::effects::EffectsConfig;
use super::{RenderError, RenderResult};
use crate::clip::Clip;
use crate::playback::fade::fade_frames;
use crate::timeline::Region;
use crate::types::{ChannelBuffer, Sample};

/// Rendered audio at the clip's sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedAudio {
    /// Planar output samples
    pub buffer: ChannelBuffer,
    /// Sample rate in Hz (the clip's rate)
    pub sample_rate: u32,
}

impl RenderedAudio {
    /// Length in frames
    pub fn frames(&self) -> usize {
        self.buffer.len()
    }

    /// Length in seconds
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Longest channel a render may allocate, in frames
pub const MAX_RENDER_FRAMES: usize = isize::MAX as usize / std::mem::size_of::<Sample>();

/// Output length in frames for a region at a playback rate
///
/// `round(clip_frames * (end - start) / speed)`. Lengths that do not fit in
/// `usize` come back as `usize::MAX`, which is above [`MAX_RENDER_FRAMES`].
pub fn output_frames(clip_frames: usize, region: &Region, speed: f32) -> usize {
    let frames = (clip_frames as f64 * (region.end - region.start) / speed as f64).round();
    if frames.is_nan() || frames <= 0.0 {
        0
    } else if frames >= usize::MAX as f64 {
        usize::MAX
    } else {
        frames as usize
    }
}

/// Render a region of a clip through the effects chain
///
/// Validates the configuration first; nothing is rendered for an invalid
/// one.
pub fn render_region(
    clip: &Clip,
    region: &Region,
    effects: &EffectsConfig,
    fade_ms: f32,
) -> RenderResult<RenderedAudio> {
    let sample_rate = clip.sample_rate();
    effects.validate(sample_rate)?;

    let start_time = Instant::now();
    let source = clip.region_frames(region);
    let frames = output_frames(clip.frames(), region, effects.speed);
    if frames == 0 || source.is_empty() {
        return Err(RenderError::EmptyRegion {
            start: region.start,
            end: region.end,
        });
    }

    if frames > MAX_RENDER_FRAMES {
        return Err(RenderError::OutOfMemory {
            frames,
            channels: clip.num_channels(),
        });
    }

    // Stage 1: rate change
    let mut buffer = ChannelBuffer::try_with_capacity(clip.num_channels(), frames)
        .map_err(|_| RenderError::OutOfMemory {
            frames,
            channels: clip.num_channels(),
        })?;
    for (out, input) in buffer.channels_mut().iter_mut().zip(clip.buffer().channels()) {
        resample_into(&input[source.clone()], effects.speed as f64, frames, out);
    }

    // Stages 2-6
    let mut chain = build_chain(effects, sample_rate, fade_ms);
    chain.process(&mut buffer);

    log::debug!(
        "[PERF] Rendered {} frames of {} via {} in {:?}",
        frames,
        clip.name(),
        chain.describe(),
        start_time.elapsed()
    );

    Ok(RenderedAudio {
        buffer,
        sample_rate,
    })
}

/// Effects after the rate change, in their fixed order
pub fn build_chain(effects: &EffectsConfig, sample_rate: u32, fade_ms: f32) -> EffectChain {
    let mut chain = EffectChain::new();
    chain.push(SvfFilterEffect::new(FilterMode::HighPass, effects.high_pass_hz, sample_rate));
    chain.push(SvfFilterEffect::new(FilterMode::LowPass, effects.low_pass_hz, sample_rate));
    chain.push(CompressorEffect::new(effects.threshold_db, sample_rate));
    chain.push(GainEffect::new(effects.gain));
    chain.push(FadeEffect::new(fade_frames(sample_rate, fade_ms)));
    chain
}

/// Linear-interpolation resampling of `input` read at `speed` input frames
/// per output frame
///
/// Pushes exactly `frames` samples. Reads past the end of the input hold
/// the last sample.
fn resample_into(input: &[Sample], speed: f64, frames: usize, out: &mut Vec<Sample>) {
    let last = input.len() - 1;
    for i in 0..frames {
        let position = i as f64 * speed;
        let index = (position as usize).min(last);
        let frac = if index == last { 0.0 } else { (position - index as f64) as f32 };
        let a = input[index];
        let b = input[(index + 1).min(last)];
        out.push(a + (b - a) * frac);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::EffectsError;

    fn five_second_clip() -> Clip {
        let samples: Vec<f32> = (0..220_500)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin())
            .collect();
        Clip::new("tone", 44100, vec![samples.clone(), samples]).unwrap()
    }

    #[test]
    fn test_first_half_at_unit_speed() {
        let clip = five_second_clip();
        let rendered =
            render_region(&clip, &Region::new(0.0, 0.5), &EffectsConfig::default(), 1.0).unwrap();

        assert_eq!(rendered.frames(), 110_250);
        assert_eq!(rendered.buffer.num_channels(), 2);
        assert_eq!(rendered.duration_secs(), 2.5);
    }

    #[test]
    fn test_speed_scales_length() {
        let clip = five_second_clip();
        let region = Region::new(0.0, 0.5);

        let double = EffectsConfig { speed: 2.0, ..EffectsConfig::default() };
        assert_eq!(render_region(&clip, &region, &double, 1.0).unwrap().frames(), 55_125);

        let half = EffectsConfig { speed: 0.5, ..EffectsConfig::default() };
        assert_eq!(render_region(&clip, &region, &half, 1.0).unwrap().frames(), 220_500);
    }

    #[test]
    fn test_invalid_config_rejected_before_render() {
        let clip = five_second_clip();
        let bad = EffectsConfig { speed: -1.0, ..EffectsConfig::default() };
        let result = render_region(&clip, &Region::full(), &bad, 1.0);
        assert!(matches!(
            result,
            Err(RenderError::InvalidEffects(EffectsError::InvalidParameter { field: "speed", .. }))
        ));
    }

    #[test]
    fn test_empty_region_fails() {
        let clip = five_second_clip();
        let result = render_region(&clip, &Region::new(0.5, 0.5), &EffectsConfig::default(), 1.0);
        assert!(matches!(result, Err(RenderError::EmptyRegion { .. })));
    }

    #[test]
    fn test_default_render_preserves_quiet_interior() {
        // -40 dBFS sits below the compressor knee at the default threshold
        let clip = Clip::new("dc", 44100, vec![vec![0.01; 44100]]).unwrap();
        let rendered = render_region(&clip, &Region::full(), &EffectsConfig::default(), 1.0).unwrap();
        let samples = rendered.buffer.channel(0).unwrap();

        assert_eq!(samples[0], 0.0);
        assert_eq!(samples[samples.len() - 1], 0.0);
        assert_eq!(samples[22050], 0.01);
    }

    #[test]
    fn test_oversized_output_fails_without_allocating() {
        let clip = five_second_clip();
        let crawl = EffectsConfig { speed: f32::MIN_POSITIVE, ..EffectsConfig::default() };
        assert_eq!(output_frames(clip.frames(), &Region::new(0.0, 0.5), crawl.speed), usize::MAX);

        let result = render_region(&clip, &Region::new(0.0, 0.5), &crawl, 1.0);
        match result {
            Err(RenderError::OutOfMemory { frames, channels }) => {
                assert!(frames > MAX_RENDER_FRAMES);
                assert_eq!(channels, 2);
            }
            other => panic!("expected OutOfMemory, got {:?}", other.map(|r| r.frames())),
        }
    }

    #[test]
    fn test_resample_interpolates() {
        let mut out = Vec::new();
        resample_into(&[0.0, 1.0, 2.0], 0.5, 6, &mut out);
        assert_eq!(out, vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.0]);
    }

    #[test]
    fn test_render_is_deterministic() {
        let clip = five_second_clip();
        let config = EffectsConfig {
            speed: 1.3,
            low_pass_hz: 5000.0,
            high_pass_hz: 120.0,
            threshold_db: -12.0,
            gain: 0.8,
        };
        let region = Region::new(0.2, 0.7);
        let a = render_region(&clip, &region, &config, 1.0).unwrap();
        let b = render_region(&clip, &region, &config, 1.0).unwrap();
        assert_eq!(a, b);
    }
}
