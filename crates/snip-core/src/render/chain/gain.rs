//! Output gain and edge fades

use super::{Effect, EffectBase, EffectInfo, ParamInfo};
use crate::playback::fade::apply_fades;
use crate::types::ChannelBuffer;

/// A simple gain (volume) effect
///
/// Bypassed at unity gain.
pub struct GainEffect {
    base: EffectBase,
    gain: f32,
}

impl GainEffect {
    /// Create a gain effect with a linear multiplier
    pub fn new(gain: f32) -> Self {
        let info = EffectInfo::new("Gain", "Utility")
            .with_param(ParamInfo::new("gain", gain).with_unit("×"));
        let mut base = EffectBase::new(info);
        base.set_bypass(gain == 1.0);
        Self { base, gain }
    }
}

impl Effect for GainEffect {
    fn process(&mut self, buffer: &mut ChannelBuffer) {
        if self.base.is_bypassed() {
            return;
        }
        buffer.scale(self.gain);
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
        // No state to reset
    }
}

/// Linear fade-in at the start and fade-out at the end of the buffer
///
/// Uses the same ramp length as live playback.
pub struct FadeEffect {
    base: EffectBase,
    frames: usize,
}

impl FadeEffect {
    /// Create a fade of `frames` frames at each edge
    pub fn new(frames: usize) -> Self {
        let info = EffectInfo::new("Fade", "Utility")
            .with_param(ParamInfo::new("frames", frames as f32));
        let mut base = EffectBase::new(info);
        base.set_bypass(frames == 0);
        Self { base, frames }
    }
}

impl Effect for FadeEffect {
    fn process(&mut self, buffer: &mut ChannelBuffer) {
        if self.base.is_bypassed() {
            return;
        }
        apply_fades(buffer, self.frames);
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
        // No state to reset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unity_gain_bypasses() {
        assert!(GainEffect::new(1.0).is_bypassed());
        assert!(!GainEffect::new(0.5).is_bypassed());
    }

    #[test]
    fn test_fade_edges() {
        let mut fade = FadeEffect::new(4);
        let mut buffer = ChannelBuffer::from_channels(vec![vec![1.0; 16]]).unwrap();
        fade.process(&mut buffer);
        let samples = buffer.channel(0).unwrap();
        assert_eq!(samples[0], 0.0);
        assert_eq!(samples[2], 0.5);
        assert_eq!(samples[8], 1.0);
        assert_eq!(samples[15], 0.0);
    }
}
