//! High-pass and low-pass filters

use super::{Effect, EffectBase, EffectInfo, ParamInfo};
use crate::types::ChannelBuffer;

/// Butterworth Q for a maximally flat two-pole response
pub const BUTTERWORTH_Q: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Which output of the state-variable filter to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    LowPass,
    HighPass,
}

/// Two-pole (12dB/octave) state-variable filter coefficients
#[derive(Debug, Clone, Copy)]
struct SvfCoefficients {
    k: f32,
    a1: f32,
    a2: f32,
    a3: f32,
}

impl SvfCoefficients {
    fn new(cutoff: f32, q: f32, sample_rate: u32) -> Self {
        let g = (std::f32::consts::PI * cutoff / sample_rate as f32).tan();
        let k = 1.0 / q;
        let a1 = 1.0 / (1.0 + g * (g + k));
        let a2 = g * a1;
        let a3 = g * a2;
        Self { k, a1, a2, a3 }
    }
}

/// Integrator state of one channel
#[derive(Debug, Clone, Copy, Default)]
struct SvfState {
    ic1eq: f32,
    ic2eq: f32,
}

impl SvfState {
    /// Process one sample and return (lowpass, highpass)
    #[inline]
    fn tick(&mut self, c: &SvfCoefficients, x: f32) -> (f32, f32) {
        let v3 = x - self.ic2eq;
        let v1 = c.a1 * self.ic1eq + c.a2 * v3;
        let v2 = self.ic2eq + c.a2 * self.ic1eq + c.a3 * v3;
        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;

        let low = v2;
        let band = v1;
        let high = x - c.k * band - low;
        (low, high)
    }
}

/// High-pass or low-pass filter at a fixed cutoff
///
/// Bypasses itself when the cutoff makes it transparent: a high-pass at
/// 0 Hz or a low-pass at (or above) Nyquist.
pub struct SvfFilterEffect {
    base: EffectBase,
    mode: FilterMode,
    coefficients: SvfCoefficients,
    states: Vec<SvfState>,
}

impl SvfFilterEffect {
    /// Create a filter for audio at `sample_rate`
    pub fn new(mode: FilterMode, cutoff_hz: f32, sample_rate: u32) -> Self {
        let name = match mode {
            FilterMode::LowPass => "Low-pass",
            FilterMode::HighPass => "High-pass",
        };
        let info = EffectInfo::new(name, "Filter")
            .with_param(ParamInfo::new("cutoff", cutoff_hz).with_unit("Hz"));

        let transparent = match mode {
            FilterMode::HighPass => cutoff_hz <= 0.0,
            FilterMode::LowPass => cutoff_hz >= sample_rate as f32 / 2.0,
        };

        let mut base = EffectBase::new(info);
        base.set_bypass(transparent);

        Self {
            base,
            mode,
            coefficients: SvfCoefficients::new(cutoff_hz, BUTTERWORTH_Q, sample_rate),
            states: Vec::new(),
        }
    }

    /// Filter mode
    pub fn mode(&self) -> FilterMode {
        self.mode
    }
}

impl Effect for SvfFilterEffect {
    fn process(&mut self, buffer: &mut ChannelBuffer) {
        if self.base.is_bypassed() {
            return;
        }

        if self.states.len() != buffer.num_channels() {
            self.states = vec![SvfState::default(); buffer.num_channels()];
        }

        let c = self.coefficients;
        let mode = self.mode;
        for (channel, state) in buffer.channels_mut().iter_mut().zip(self.states.iter_mut()) {
            for sample in channel.iter_mut() {
                let (low, high) = state.tick(&c, *sample);
                *sample = match mode {
                    FilterMode::LowPass => low,
                    FilterMode::HighPass => high,
                };
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
        self.states.iter_mut().for_each(|s| *s = SvfState::default());
    }
}
