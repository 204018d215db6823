//! One playing region
//!
//! A voice reads a frame range of a clip at the output rate, resampling
//! linearly when the output rate differs from the clip rate. Its gain
//! follows a [`GainRamp`]:
//!
//! ```text
//!   gain 1 ┤   ┌──────────────────────┐
//!          │  ╱                        ╲
//!   gain 0 ┼─┘                          └─  (natural end)
//!          start                        end
//!            fade-in          scheduled fade-out
//! ```
//!
//! An explicit stop starts the fade-out immediately and replaces the
//! scheduled one.

use super::fade::GainRamp;
use super::transport::SharedClip;

/// How a voice finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceEnd {
    /// Reached the end of its region
    Natural,
    /// Faded out after an explicit stop
    Stopped,
}

/// Audio-thread playback of one region
pub struct Voice {
    /// Clip being played; released through the collector
    clip: SharedClip,
    /// Play request this voice belongs to
    generation: u64,
    /// Region end in clip frames (exclusive)
    end_frame: usize,
    /// Read position in clip frames
    position: f64,
    /// Clip frames advanced per output frame
    step: f64,
    /// Gain envelope
    ramp: GainRamp,
    /// Ramp length in output frames
    fade_frames: usize,
    /// Explicit stop in progress
    stopping: bool,
    /// Natural-end fade already scheduled
    end_fade_scheduled: bool,
    /// Set once the voice produces no more output
    ended: Option<VoiceEnd>,
}

impl Voice {
    /// Start a voice over clip frames `start_frame..end_frame`
    ///
    /// `output_rate` is the device rate; the fade-in starts immediately.
    pub fn new(
        clip: SharedClip,
        generation: u64,
        start_frame: usize,
        end_frame: usize,
        output_rate: u32,
        fade_frames: usize,
    ) -> Self {
        let end_frame = end_frame.min(clip.frames());
        let step = clip.sample_rate() as f64 / output_rate.max(1) as f64;

        // Regions shorter than two ramps split their length between them
        let total_frames = (end_frame.saturating_sub(start_frame) as f64 / step).ceil() as usize;
        let fade_frames = fade_frames.min(total_frames / 2);

        let mut ramp = GainRamp::new(0.0);
        ramp.ramp_to(1.0, fade_frames);

        let ended = (start_frame >= end_frame).then_some(VoiceEnd::Natural);

        Self {
            clip,
            generation,
            end_frame,
            position: start_frame as f64,
            step,
            ramp,
            fade_frames,
            stopping: false,
            end_fade_scheduled: false,
            ended,
        }
    }

    /// Play request this voice belongs to
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// How the voice finished, once it has
    pub fn ended(&self) -> Option<VoiceEnd> {
        self.ended
    }

    /// Check if the voice still produces output
    pub fn is_active(&self) -> bool {
        self.ended.is_none()
    }

    /// Begin the stop fade from the current gain
    ///
    /// Cancels a scheduled natural-end fade. Calling it twice is harmless.
    pub fn stop(&mut self) {
        if self.stopping || self.ended.is_some() {
            return;
        }
        self.stopping = true;
        let frames = self.fade_frames.min(self.remaining_output_frames());
        self.ramp.ramp_to(0.0, frames);
        if frames == 0 {
            self.ended = Some(VoiceEnd::Stopped);
        }
    }

    /// Mix one output frame into `frame`
    ///
    /// Output channel `c` reads clip channel `c % clip_channels`, so mono
    /// clips play on every output channel.
    #[inline]
    pub fn mix_frame(&mut self, frame: &mut [f32]) {
        if self.ended.is_some() {
            return;
        }

        if !self.stopping && !self.end_fade_scheduled {
            let remaining = self.remaining_output_frames();
            if remaining <= self.fade_frames {
                self.end_fade_scheduled = true;
                self.ramp.ramp_to(0.0, remaining);
            }
        }

        let gain = self.ramp.next();
        let index = self.position as usize;
        let frac = (self.position - index as f64) as f32;
        let next_index = (index + 1).min(self.end_frame - 1);
        let clip_channels = self.clip.buffer().channels();

        for (c, out) in frame.iter_mut().enumerate() {
            let samples = &clip_channels[c % clip_channels.len()];
            let a = samples[index];
            let b = samples[next_index];
            *out += (a + (b - a) * frac) * gain;
        }

        self.position += self.step;

        if self.stopping && self.ramp.is_settled() {
            self.ended = Some(VoiceEnd::Stopped);
        } else if self.position >= self.end_frame as f64 {
            self.ended = Some(if self.stopping { VoiceEnd::Stopped } else { VoiceEnd::Natural });
        }
    }

    fn remaining_output_frames(&self) -> usize {
        let remaining_clip = (self.end_frame as f64 - self.position).max(0.0);
        (remaining_clip / self.step).ceil() as usize
    }
}
