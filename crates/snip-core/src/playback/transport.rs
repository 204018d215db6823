//! Audio-thread side of playback
//!
//! Lock-free architecture:
//! - Commands sent via `rtrb` SPSC ringbuffer (control → audio)
//! - State read via atomics (audio → control)
//! - The audio thread owns its voices exclusively
//!
//! The processor does not know about any device. Backends call
//! [`TransportProcessor::process`] with an interleaved output slice: the
//! cpal stream callback for live playback, [`super::OfflineOutput`] for
//! deterministic headless rendering.
//!
//! Nothing the audio thread drops frees memory: clips arrive as
//! [`SharedClip`] handles whose release is deferred to a collector on the
//! control thread.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use basedrop::Shared;

use super::fade::fade_frames;
use super::voice::{Voice, VoiceEnd};
use crate::clip::Clip;
use crate::types::DEFAULT_SAMPLE_RATE;

/// Voices that may still be fading out at once
const MAX_OUTGOING: usize = 4;

/// Clip handle owned by the audio thread
///
/// Dropping the last one on the audio thread only enqueues it; the inner
/// `Arc` is released when the owning collector runs.
pub type SharedClip = Shared<Arc<Clip>>;

/// Commands sent from the control thread to the audio thread
pub enum TransportCommand {
    /// Fade out whatever plays and start a new voice
    Play {
        clip: SharedClip,
        start_frame: usize,
        end_frame: usize,
        generation: u64,
    },
    /// Fade out the voice of this generation
    Stop { generation: u64 },
}

impl std::fmt::Debug for TransportCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportCommand::Play {
                clip,
                start_frame,
                end_frame,
                generation,
            } => f
                .debug_struct("Play")
                .field("clip", &format!("<SharedClip {}>", clip.name()))
                .field("start_frame", start_frame)
                .field("end_frame", end_frame)
                .field("generation", generation)
                .finish(),
            TransportCommand::Stop { generation } => {
                f.debug_struct("Stop").field("generation", generation).finish()
            }
        }
    }
}

/// Create a transport command channel
pub fn transport_command_channel(
    capacity: usize,
) -> (rtrb::Producer<TransportCommand>, rtrb::Consumer<TransportCommand>) {
    rtrb::RingBuffer::new(capacity.max(1))
}

/// Lock-free atomics for the control thread to read audio state
pub struct TransportAtomics {
    /// Generation of the voice currently rendering (0 = none yet)
    active_generation: AtomicU64,
    /// Output frames rendered by the active voice
    frames_rendered: AtomicU64,
    /// Last generation that reached its natural end
    finished_generation: AtomicU64,
    /// Output device sample rate
    output_rate: AtomicU32,
}

impl TransportAtomics {
    pub(crate) fn new() -> Self {
        Self {
            active_generation: AtomicU64::new(0),
            frames_rendered: AtomicU64::new(0),
            finished_generation: AtomicU64::new(0),
            output_rate: AtomicU32::new(DEFAULT_SAMPLE_RATE),
        }
    }

    /// Output frames rendered for `generation`, or 0 if the audio thread
    /// has not started it yet
    pub fn frames_rendered(&self, generation: u64) -> u64 {
        let before = self.active_generation.load(Ordering::Acquire);
        let frames = self.frames_rendered.load(Ordering::Acquire);
        let after = self.active_generation.load(Ordering::Acquire);
        if before == generation && after == generation {
            frames
        } else {
            0
        }
    }

    /// Last generation that played to its natural end
    pub fn finished_generation(&self) -> u64 {
        self.finished_generation.load(Ordering::Acquire)
    }

    /// Output sample rate in Hz
    pub fn output_rate(&self) -> u32 {
        self.output_rate.load(Ordering::Relaxed)
    }
}

/// Audio-thread processor
///
/// Owns all voices; nothing here allocates once constructed.
pub struct TransportProcessor {
    /// Command receiver from the control thread
    command_rx: rtrb::Consumer<TransportCommand>,
    /// Atomics for the control thread to read state
    atomics: Arc<TransportAtomics>,
    /// Ramp duration in milliseconds
    fade_ms: f32,
    /// Ramp duration in output frames
    fade_frames: usize,
    /// Output device sample rate
    output_rate: u32,
    /// Voice of the latest play request
    active: Option<Voice>,
    /// Voices fading out after a stop or restart
    outgoing: Vec<Voice>,
    /// Frames rendered by the active voice
    active_frames: u64,
}

impl TransportProcessor {
    pub(crate) fn new(
        command_rx: rtrb::Consumer<TransportCommand>,
        atomics: Arc<TransportAtomics>,
        fade_ms: f32,
    ) -> Self {
        let mut processor = Self {
            command_rx,
            atomics,
            fade_ms,
            fade_frames: 0,
            output_rate: DEFAULT_SAMPLE_RATE,
            active: None,
            outgoing: Vec::with_capacity(MAX_OUTGOING),
            active_frames: 0,
        };
        processor.prepare(DEFAULT_SAMPLE_RATE);
        processor
    }

    /// Configure for an output rate; call before the first `process`
    pub fn prepare(&mut self, output_rate: u32) {
        self.output_rate = output_rate.max(1);
        self.fade_frames = fade_frames(self.output_rate, self.fade_ms);
        self.atomics.output_rate.store(self.output_rate, Ordering::Relaxed);
    }

    /// Output sample rate
    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Check if any voice is still producing output
    pub fn is_active(&self) -> bool {
        self.active.is_some() || !self.outgoing.is_empty()
    }

    /// Render interleaved output frames
    ///
    /// `out.len()` must be a multiple of `channels`. The buffer is
    /// overwritten, silence where nothing plays.
    pub fn process(&mut self, out: &mut [f32], channels: usize) {
        self.drain_commands();

        if channels == 0 {
            return;
        }

        for frame in out.chunks_exact_mut(channels) {
            frame.fill(0.0);

            for voice in self.outgoing.iter_mut() {
                voice.mix_frame(frame);
            }

            if let Some(voice) = self.active.as_mut() {
                voice.mix_frame(frame);
                self.active_frames += 1;
                if let Some(end) = voice.ended() {
                    if end == VoiceEnd::Natural {
                        self.atomics
                            .finished_generation
                            .store(voice.generation(), Ordering::Release);
                    }
                    self.active = None;
                }
            }
        }

        self.outgoing.retain(Voice::is_active);
        self.atomics
            .frames_rendered
            .store(self.active_frames, Ordering::Release);
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.command_rx.pop() {
            match command {
                TransportCommand::Play {
                    clip,
                    start_frame,
                    end_frame,
                    generation,
                } => {
                    self.retire_active();
                    self.active = Some(Voice::new(
                        clip,
                        generation,
                        start_frame,
                        end_frame,
                        self.output_rate,
                        self.fade_frames,
                    ));
                    self.active_frames = 0;
                    self.atomics.frames_rendered.store(0, Ordering::Release);
                    self.atomics
                        .active_generation
                        .store(generation, Ordering::Release);
                }
                TransportCommand::Stop { generation } => {
                    if self.active.as_ref().map(Voice::generation) == Some(generation) {
                        self.retire_active();
                    }
                }
            }
        }
    }

    /// Move the active voice to the fading set
    fn retire_active(&mut self) {
        let Some(mut voice) = self.active.take() else {
            return;
        };
        voice.stop();
        if !voice.is_active() {
            return;
        }
        if self.outgoing.len() == MAX_OUTGOING {
            // Capacity is fixed; the oldest fade is closest to silence
            self.outgoing.remove(0);
        }
        self.outgoing.push(voice);
    }
}
