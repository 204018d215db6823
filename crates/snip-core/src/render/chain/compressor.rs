//! Feed-forward compressor
//!
//! Placed after the filters in the export chain:
//!   rate → high-pass → low-pass → **compressor** → gain → fade
//!
//! # Algorithm
//!
//! 1. The peak across all channels of a frame is converted to dBFS.
//! 2. A soft-knee gain computer maps the level to a target gain reduction:
//!    nothing below `threshold - knee/2`, the full `1/ratio` slope above
//!    `threshold + knee/2`, and a quadratic blend in between.
//! 3. An exponential envelope follower smooths the reduction in dB
//!    (fast attack when reduction grows, slow release when it shrinks).
//! 4. Every channel of the frame is scaled by the same linear gain, so the
//!    stereo image does not shift.

use super::{Effect, EffectBase, EffectInfo, ParamInfo};
use crate::types::ChannelBuffer;

/// Compression ratio above the knee
const RATIO: f32 = 12.0;

/// Knee width in dB
const KNEE_DB: f32 = 30.0;

/// Attack time-constant in seconds
const ATTACK_SECS: f32 = 0.003;

/// Release time-constant in seconds
const RELEASE_SECS: f32 = 0.25;

/// Level floor so silence maps to a finite dB value
const LEVEL_FLOOR: f32 = 1e-6;

/// Soft-knee compressor with linked channels
pub struct CompressorEffect {
    base: EffectBase,
    /// Threshold in dBFS
    threshold_db: f32,
    /// Attack coefficient: exponential with `ATTACK_SECS` τ
    attack_coeff: f32,
    /// Release coefficient: exponential with `RELEASE_SECS` τ
    release_coeff: f32,
    /// Smoothed gain reduction in dB (≤ 0)
    envelope_db: f32,
}

impl CompressorEffect {
    /// Create a compressor for audio at `sample_rate`
    pub fn new(threshold_db: f32, sample_rate: u32) -> Self {
        let info = EffectInfo::new("Compressor", "Dynamics")
            .with_param(ParamInfo::new("threshold", threshold_db).with_unit("dB"))
            .with_param(ParamInfo::new("ratio", RATIO).with_unit(":1"))
            .with_param(ParamInfo::new("knee", KNEE_DB).with_unit("dB"));

        // coeff = exp(-1 / (τ × fs))
        let fs = sample_rate.max(1) as f32;
        let attack_coeff = (-1.0 / (ATTACK_SECS * fs)).exp();
        let release_coeff = (-1.0 / (RELEASE_SECS * fs)).exp();

        Self {
            base: EffectBase::new(info),
            threshold_db,
            attack_coeff,
            release_coeff,
            envelope_db: 0.0,
        }
    }

    /// Static gain reduction in dB for an input level in dBFS
    pub fn gain_reduction_db(&self, level_db: f32) -> f32 {
        let over = level_db - self.threshold_db;
        let slope = 1.0 / RATIO - 1.0;

        if 2.0 * over < -KNEE_DB {
            0.0
        } else if 2.0 * over.abs() <= KNEE_DB {
            let x = over + KNEE_DB / 2.0;
            slope * x * x / (2.0 * KNEE_DB)
        } else {
            slope * over
        }
    }
}

impl Effect for CompressorEffect {
    fn process(&mut self, buffer: &mut ChannelBuffer) {
        if self.base.is_bypassed() {
            return;
        }

        for frame in 0..buffer.len() {
            let peak = buffer.frame_peak(frame).max(LEVEL_FLOOR);
            let level_db = 20.0 * peak.log10();
            let target = self.gain_reduction_db(level_db);

            let coeff = if target < self.envelope_db {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope_db = target + coeff * (self.envelope_db - target);

            let gain = 10.0_f32.powf(self.envelope_db / 20.0);
            for channel in buffer.channels_mut() {
                channel[frame] *= gain;
            }
        }
    }

    fn info(&self) -> &EffectInfo {
        self.base.info()
    }

    fn set_bypass(&mut self, bypass: bool) {
        self.base.set_bypass(bypass);
    }

    fn is_bypassed(&self) -> bool {
        self.base.is_bypassed()
    }

    fn reset(&mut self) {
        self.envelope_db = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_computer_regions() {
        let compressor = CompressorEffect::new(-20.0, 44100);
        // Well below the knee
        assert_eq!(compressor.gain_reduction_db(-40.0), 0.0);
        // Above the knee: full ratio
        let above = compressor.gain_reduction_db(0.0);
        assert!((above - (1.0 / 12.0 - 1.0) * 20.0).abs() < 1e-4);
        // Knee is continuous at its upper edge
        let edge = compressor.gain_reduction_db(-5.0);
        assert!((edge - (1.0 / 12.0 - 1.0) * 15.0).abs() < 1e-3);
    }

    #[test]
    fn test_quiet_signal_untouched() {
        let mut compressor = CompressorEffect::new(0.0, 44100);
        let mut buffer = ChannelBuffer::from_channels(vec![vec![0.1; 1000], vec![-0.1; 1000]]).unwrap();
        compressor.process(&mut buffer);
        assert!(buffer.channel(0).unwrap().iter().all(|&s| s == 0.1));
        assert!(buffer.channel(1).unwrap().iter().all(|&s| s == -0.1));
    }

    #[test]
    fn test_loud_signal_reduced() {
        let mut compressor = CompressorEffect::new(-20.0, 44100);
        let mut buffer = ChannelBuffer::from_channels(vec![vec![1.0; 44100]]).unwrap();
        compressor.process(&mut buffer);

        let settled = buffer.channel(0).unwrap()[44000];
        // -18.3 dB of reduction ≈ 0.12 linear
        assert!(settled > 0.1 && settled < 0.15, "settled at {}", settled);
    }
}
