//! Export effects configuration and validation

use serde::{Deserialize, Serialize};

use super::{EffectsError, EffectsResult};
use crate::types::DEFAULT_SAMPLE_RATE;

/// Highest accepted playback-rate multiplier
pub const MAX_SPEED: f32 = 16.0;

/// Highest accepted output gain (about +24 dB)
pub const MAX_GAIN: f32 = 16.0;

/// Lowest accepted compressor threshold in dBFS
pub const MIN_THRESHOLD_DB: f32 = -100.0;

/// Parameters of the export effects chain
///
/// Each field is validated on its own; there are no cross-field rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsConfig {
    /// Playback-rate multiplier (1.0 = unchanged, 2.0 = twice as fast)
    pub speed: f32,
    /// Low-pass cutoff in Hz (Nyquist = transparent)
    pub low_pass_hz: f32,
    /// High-pass cutoff in Hz (0 = transparent)
    pub high_pass_hz: f32,
    /// Compressor threshold in dBFS
    ///
    /// The 30 dB soft knee is centred here, so gain reduction begins 15 dB
    /// below the threshold.
    pub threshold_db: f32,
    /// Linear output gain
    pub gain: f32,
}

impl EffectsConfig {
    /// Default settings for a clip at `sample_rate`
    ///
    /// Filters open, unity speed and gain, threshold at 0 dBFS. This is not
    /// a bypass: the compressor's knee still reduces peaks above -15 dBFS.
    pub fn for_sample_rate(sample_rate: u32) -> Self {
        Self {
            speed: 1.0,
            low_pass_hz: nyquist(sample_rate),
            high_pass_hz: 0.0,
            threshold_db: 0.0,
            gain: 1.0,
        }
    }

    /// Check every field against its range for a clip at `sample_rate`
    ///
    /// Returns the first failing field. Values are never clamped.
    pub fn validate(&self, sample_rate: u32) -> EffectsResult<()> {
        let nyquist = nyquist(sample_rate);

        check("speed", self.speed, self.speed > 0.0 && self.speed <= MAX_SPEED, "must be > 0 and <= 16")?;
        check(
            "high_pass_hz",
            self.high_pass_hz,
            self.high_pass_hz >= 0.0 && self.high_pass_hz < nyquist,
            "must be >= 0 Hz and below Nyquist",
        )?;
        check(
            "low_pass_hz",
            self.low_pass_hz,
            self.low_pass_hz > 0.0 && self.low_pass_hz <= nyquist,
            "must be > 0 Hz and at most Nyquist",
        )?;
        check(
            "threshold_db",
            self.threshold_db,
            (MIN_THRESHOLD_DB..=0.0).contains(&self.threshold_db),
            "must be between -100 and 0 dBFS",
        )?;
        check("gain", self.gain, self.gain >= 0.0 && self.gain <= MAX_GAIN, "must be >= 0 and <= 16")?;

        Ok(())
    }

    /// Clamp the low-pass cutoff to a clip's Nyquist frequency
    ///
    /// Saved defaults assume 44.1 kHz; a clip at a lower rate would
    /// otherwise reject them. Only call this on defaults, never on values a
    /// user entered.
    pub fn fit_default_to(mut self, sample_rate: u32) -> Self {
        let nyquist = nyquist(sample_rate);
        if self.low_pass_hz > nyquist {
            self.low_pass_hz = nyquist;
        }
        self
    }
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self::for_sample_rate(DEFAULT_SAMPLE_RATE)
    }
}

/// Half the sample rate
pub fn nyquist(sample_rate: u32) -> f32 {
    sample_rate as f32 / 2.0
}

fn check(field: &'static str, value: f32, in_range: bool, reason: &'static str) -> EffectsResult<()> {
    if value.is_finite() && in_range {
        Ok(())
    } else {
        Err(EffectsError::InvalidParameter { field, value, reason })
    }
}
