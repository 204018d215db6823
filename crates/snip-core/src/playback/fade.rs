//! Linear gain ramps for click-free starts and stops
//!
//! Every start ramps up from zero and every stop ramps down to zero over a
//! short fixed duration (1 ms by default). The same ramp length is used by
//! the live voice and by the export fade stage.

use crate::types::ChannelBuffer;

/// Default ramp duration in milliseconds
pub const DEFAULT_FADE_MS: f32 = 1.0;

/// Ramp length in frames for a duration at a sample rate
pub fn fade_frames(sample_rate: u32, fade_ms: f32) -> usize {
    if !fade_ms.is_finite() || fade_ms <= 0.0 {
        return 0;
    }
    (fade_ms as f64 / 1000.0 * sample_rate as f64).round() as usize
}

/// Per-frame linear gain ramp
///
/// `next()` returns the gain for the current frame and then advances, so a
/// ramp from 0 to 1 over N frames yields `0, 1/N, ..., (N-1)/N` and settles
/// at exactly 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainRamp {
    current: f32,
    target: f32,
    step: f32,
    remaining: usize,
}

impl GainRamp {
    /// Ramp resting at a fixed gain
    pub fn new(gain: f32) -> Self {
        Self {
            current: gain,
            target: gain,
            step: 0.0,
            remaining: 0,
        }
    }

    /// Start moving toward `target` over `frames` frames
    ///
    /// Zero frames jumps immediately.
    pub fn ramp_to(&mut self, target: f32, frames: usize) {
        self.target = target;
        if frames == 0 {
            self.current = target;
            self.step = 0.0;
            self.remaining = 0;
        } else {
            self.step = (target - self.current) / frames as f32;
            self.remaining = frames;
        }
    }

    /// Gain for this frame; advances the ramp
    #[inline]
    pub fn next(&mut self) -> f32 {
        let gain = self.current;
        if self.remaining > 0 {
            self.remaining -= 1;
            self.current = if self.remaining == 0 {
                self.target
            } else {
                self.current + self.step
            };
        }
        gain
    }

    /// Current gain without advancing
    pub fn value(&self) -> f32 {
        self.current
    }

    /// Gain the ramp is heading to
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Check if the ramp has reached its target
    pub fn is_settled(&self) -> bool {
        self.remaining == 0
    }
}

/// Apply a fade-in over the first `frames` and a fade-out over the last
/// `frames` of a buffer
///
/// The first sample is scaled by 0 and the last by 0. Ramps are shortened to
/// half the buffer when it is too short for both.
pub fn apply_fades(buffer: &mut ChannelBuffer, frames: usize) {
    let len = buffer.len();
    let ramp = frames.min(len / 2);
    if ramp == 0 {
        return;
    }

    for channel in buffer.channels_mut() {
        for (i, sample) in channel.iter_mut().take(ramp).enumerate() {
            *sample *= i as f32 / ramp as f32;
        }
        for (i, sample) in channel.iter_mut().rev().take(ramp).enumerate() {
            *sample *= i as f32 / ramp as f32;
        }
    }
}
