//! Effect chain for offline rendering
//!
//! Every stage after the rate change is an [`Effect`] that processes a
//! planar buffer in place. Stages run in a fixed order, so the same input
//! always yields the same output.

pub mod compressor;
pub mod filter;
pub mod gain;

pub use compressor::CompressorEffect;
pub use filter::{FilterMode, SvfFilterEffect};
pub use gain::{FadeEffect, GainEffect};

use crate::types::ChannelBuffer;

/// Information about an effect parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParamInfo {
    /// Parameter name for display
    pub name: String,
    /// Configured value
    pub value: f32,
    /// Unit label (e.g., "Hz", "dB", "×")
    pub unit: String,
}

impl ParamInfo {
    /// Create a new parameter info with name and value
    pub fn new(name: impl Into<String>, value: f32) -> Self {
        Self {
            name: name.into(),
            value,
            unit: String::new(),
        }
    }

    /// Set the unit label
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }
}

/// Information about an effect
#[derive(Debug, Clone, PartialEq)]
pub struct EffectInfo {
    /// Effect name for display
    pub name: String,
    /// Effect category (e.g., "Filter", "Dynamics", "Utility")
    pub category: String,
    /// Configured parameters
    pub params: Vec<ParamInfo>,
}

impl EffectInfo {
    /// Create a new effect info
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            params: Vec::new(),
        }
    }

    /// Add a parameter to this effect
    pub fn with_param(mut self, param: ParamInfo) -> Self {
        self.params.push(param);
        self
    }
}

impl std::fmt::Display for EffectInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}{}", param.name, param.value, param.unit)?;
        }
        write!(f, ")")
    }
}

/// An offline audio effect
pub trait Effect: Send {
    /// Process a planar buffer in place
    fn process(&mut self, buffer: &mut ChannelBuffer);

    /// Get information about this effect (name, category, parameters)
    fn info(&self) -> &EffectInfo;

    /// Set the bypass state
    fn set_bypass(&mut self, bypass: bool);

    /// Check if the effect is bypassed
    fn is_bypassed(&self) -> bool;

    /// Reset the effect state
    fn reset(&mut self);
}

/// Base implementation helper for effects
///
/// Holds the info block and bypass flag shared by every effect.
#[derive(Debug, Clone)]
pub struct EffectBase {
    info: EffectInfo,
    bypassed: bool,
}

impl EffectBase {
    /// Create a new effect base from effect info
    pub fn new(info: EffectInfo) -> Self {
        Self {
            info,
            bypassed: false,
        }
    }

    /// Get the effect info
    pub fn info(&self) -> &EffectInfo {
        &self.info
    }

    /// Set bypass state
    pub fn set_bypass(&mut self, bypass: bool) {
        self.bypassed = bypass;
    }

    /// Check if bypassed
    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }
}

/// Ordered list of effects applied one after another
#[derive(Default)]
pub struct EffectChain {
    effects: Vec<Box<dyn Effect>>,
}

impl EffectChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an effect
    pub fn push(&mut self, effect: impl Effect + 'static) {
        self.effects.push(Box::new(effect));
    }

    /// Number of effects, bypassed ones included
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// Check if the chain has no effects
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Run every non-bypassed effect in order
    pub fn process(&mut self, buffer: &mut ChannelBuffer) {
        for effect in self.effects.iter_mut() {
            if !effect.is_bypassed() {
                effect.process(buffer);
            }
        }
    }

    /// Reset every effect
    pub fn reset(&mut self) {
        for effect in self.effects.iter_mut() {
            effect.reset();
        }
    }

    /// One-line summary of active stages, for logging
    pub fn describe(&self) -> String {
        let active: Vec<String> = self
            .effects
            .iter()
            .filter(|e| !e.is_bypassed())
            .map(|e| e.info().to_string())
            .collect();
        if active.is_empty() {
            "(none)".to_string()
        } else {
            active.join(" → ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effect_info_display() {
        let info = EffectInfo::new("Low-pass", "Filter")
            .with_param(ParamInfo::new("cutoff", 8000.0).with_unit("Hz"));
        assert_eq!(info.to_string(), "Low-pass(cutoff=8000Hz)");
    }

    #[test]
    fn test_chain_skips_bypassed() {
        let mut chain = EffectChain::new();
        chain.push(GainEffect::new(0.5));
        let mut muted = GainEffect::new(0.0);
        muted.set_bypass(true);
        chain.push(muted);

        let mut buffer = ChannelBuffer::from_channels(vec![vec![1.0, -1.0]]).unwrap();
        chain.process(&mut buffer);

        assert_eq!(buffer.channel(0).unwrap(), &[0.5, -0.5]);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.describe(), "Gain(gain=0.5×)");
    }
}
