//! Control-thread side of playback
//!
//! ```text
//!            play()                     stop() / natural end
//!   Idle ──────────────► Playing ─────────────────────────► Idle
//!     ▲                   │  ▲
//!     │ stop(): no-op     │  │ play(): stop first, then start
//!     └───────            └──┘
//! ```
//!
//! Every `play` gets a new generation. The audio thread reports which
//! generation reached its natural end; the scheduler only reacts when that
//! is still the current one, so the end transition fires exactly once and
//! never after an explicit stop or a restart.
//!
//! Clips reach the audio thread as `basedrop::Shared` handles. A voice that
//! ends there only enqueues its handle; the scheduler's collector frees it
//! on the control thread in [`PlaybackScheduler::collect`].

use std::sync::Arc;

use basedrop::{Collector, Shared};

use super::transport::{
    transport_command_channel, TransportAtomics, TransportCommand, TransportProcessor,
};
use super::{PlaybackError, PlaybackResult};
use crate::clip::Clip;
use crate::config::PlaybackConfig;
use crate::timeline::Region;

/// Playback state as seen by the control thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
}

/// What is currently scheduled
#[derive(Debug, Clone)]
struct ActivePlayback {
    clip: Arc<Clip>,
    region: Region,
}

/// Schedules region playback on the audio thread
pub struct PlaybackScheduler {
    /// Command sender for the audio thread
    command_tx: rtrb::Producer<TransportCommand>,
    /// Atomics for reading audio state
    atomics: Arc<TransportAtomics>,
    /// Current state
    state: PlaybackState,
    /// Generation of the latest play request
    generation: u64,
    /// Clip and region of the latest play request
    current: Option<ActivePlayback>,
    /// Progress reported while idle
    last_progress: f64,
    /// Reclaims clips released by the audio thread
    collector: Collector,
}

impl PlaybackScheduler {
    /// Create a scheduler and the processor it drives
    ///
    /// Hand the processor to an output backend (offline or cpal).
    pub fn new(config: &PlaybackConfig) -> (Self, TransportProcessor) {
        let (command_tx, command_rx) = transport_command_channel(config.command_queue_capacity);
        let atomics = Arc::new(TransportAtomics::new());
        let processor = TransportProcessor::new(command_rx, atomics.clone(), config.fade_ms);

        let scheduler = Self {
            command_tx,
            atomics,
            state: PlaybackState::Idle,
            generation: 0,
            current: None,
            last_progress: 0.0,
            collector: Collector::new(),
        };

        (scheduler, processor)
    }

    /// Start playing `region` of `clip`
    ///
    /// Anything already playing is stopped first (fading out while the new
    /// region fades in). If the previous region cannot be stopped the error
    /// is returned and it keeps playing; on any other error the scheduler is
    /// left idle.
    pub fn play(&mut self, clip: Arc<Clip>, region: Region) -> PlaybackResult<()> {
        self.stop()?;
        self.collect();

        let frames = clip.region_frames(&region);
        if frames.is_empty() {
            return Err(PlaybackError::EmptyRegion {
                start: region.start,
                end: region.end,
            });
        }
        if self.command_tx.is_abandoned() {
            return Err(PlaybackError::Disconnected);
        }

        self.generation += 1;
        let command = TransportCommand::Play {
            clip: Shared::new(&self.collector.handle(), clip.clone()),
            start_frame: frames.start,
            end_frame: frames.end,
            generation: self.generation,
        };
        if self.command_tx.push(command).is_err() {
            return Err(PlaybackError::QueueFull);
        }

        log::debug!(
            "PlaybackScheduler: play {} [{:.4}, {:.4}) generation {}",
            clip.name(),
            region.start,
            region.end,
            self.generation
        );

        self.last_progress = region.start;
        self.current = Some(ActivePlayback { clip, region });
        self.state = PlaybackState::Playing;
        Ok(())
    }

    /// Fade out and go idle; does nothing when already idle
    ///
    /// Stays `Playing` when the stop cannot be queued.
    pub fn stop(&mut self) -> PlaybackResult<()> {
        if self.state == PlaybackState::Idle {
            return Ok(());
        }

        let progress = self.live_progress();
        if self
            .command_tx
            .push(TransportCommand::Stop {
                generation: self.generation,
            })
            .is_err()
        {
            log::warn!("PlaybackScheduler: command queue full, generation {} still playing", self.generation);
            return Err(PlaybackError::QueueFull);
        }

        log::debug!("PlaybackScheduler: stop generation {}", self.generation);
        self.last_progress = progress;
        self.state = PlaybackState::Idle;
        self.current = None;
        Ok(())
    }

    /// Check for a natural end and report whether playback is running
    pub fn playing(&mut self) -> bool {
        self.poll_natural_end();
        self.collect();
        self.state == PlaybackState::Playing
    }

    /// Free clips the audio thread has let go of
    ///
    /// Call regularly from the control thread.
    pub fn collect(&mut self) {
        self.collector.collect();
    }

    /// Transition to idle if the current region has played to its end
    ///
    /// Returns true exactly once per play request that ends naturally.
    pub fn poll_natural_end(&mut self) -> bool {
        if self.state != PlaybackState::Playing
            || self.atomics.finished_generation() != self.generation
        {
            return false;
        }

        if let Some(current) = &self.current {
            self.last_progress = current.region.end;
        }
        log::debug!("PlaybackScheduler: generation {} reached its end", self.generation);
        self.state = PlaybackState::Idle;
        self.current = None;
        true
    }

    /// Current state without polling the audio thread
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Region of the current play request
    pub fn current_region(&self) -> Option<Region> {
        self.current.as_ref().map(|c| c.region)
    }

    /// Playback position as a fraction of the whole clip
    ///
    /// `(elapsed + region start) / clip duration`, measured on the output
    /// clock and clamped to `[0, 1]`. While idle this is the position where
    /// playback last stopped or ended.
    pub fn progress(&self) -> f64 {
        match self.state {
            PlaybackState::Playing => self.live_progress(),
            PlaybackState::Idle => self.last_progress,
        }
    }

    fn live_progress(&self) -> f64 {
        let Some(current) = &self.current else {
            return self.last_progress;
        };
        let duration = current.clip.duration_secs();
        if duration <= 0.0 {
            return 0.0;
        }
        let frames = self.atomics.frames_rendered(self.generation);
        let elapsed = frames as f64 / self.atomics.output_rate().max(1) as f64;
        let offset = current.region.start * duration;
        ((elapsed + offset) / duration).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::OfflineOutput;

    const RATE: u32 = 1000;

    /// One second of DC at `rate`, played at the same rate
    fn setup_at(rate: u32) -> (PlaybackScheduler, OfflineOutput, Arc<Clip>) {
        let config = PlaybackConfig::default();
        let (scheduler, processor) = PlaybackScheduler::new(&config);
        let output = OfflineOutput::new(processor, rate, 1);
        let clip = Arc::new(Clip::new("dc", rate, vec![vec![0.5; rate as usize]]).unwrap());
        (scheduler, output, clip)
    }

    fn setup() -> (PlaybackScheduler, OfflineOutput, Arc<Clip>) {
        setup_at(RATE)
    }

    #[test]
    fn test_play_then_stop() {
        let (mut scheduler, mut output, clip) = setup();
        assert!(!scheduler.playing());

        scheduler.play(clip, Region::new(0.0, 0.5)).unwrap();
        assert!(scheduler.playing());
        output.pull(100);

        scheduler.stop().unwrap();
        assert!(!scheduler.playing());
        assert_eq!(scheduler.state(), PlaybackState::Idle);
        assert!((scheduler.progress() - 0.1).abs() < 1e-9);

        // Second stop is a no-op
        scheduler.stop().unwrap();
        assert!(!scheduler.playing());
    }

    #[test]
    fn test_progress_includes_region_offset() {
        let (mut scheduler, mut output, clip) = setup();
        scheduler.play(clip, Region::new(0.5, 1.0)).unwrap();
        assert_eq!(scheduler.progress(), 0.5);

        output.pull(250);
        assert!((scheduler.progress() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_natural_end_fires_once() {
        let (mut scheduler, mut output, clip) = setup();
        scheduler.play(clip, Region::new(0.0, 0.1)).unwrap();

        output.pull(50);
        assert!(scheduler.playing());
        output.pull(100);

        assert!(scheduler.poll_natural_end());
        assert!(!scheduler.poll_natural_end());
        assert!(!scheduler.playing());
        assert_eq!(scheduler.progress(), 0.1);
    }

    #[test]
    fn test_stop_racing_natural_end_does_not_fire() {
        let (mut scheduler, mut output, clip) = setup();
        scheduler.play(clip, Region::new(0.0, 0.1)).unwrap();
        output.pull(200);

        // Audio side has finished; the explicit stop wins
        scheduler.stop().unwrap();
        assert!(!scheduler.poll_natural_end());
    }

    #[test]
    fn test_restart_ignores_previous_end() {
        let (mut scheduler, mut output, clip) = setup();
        scheduler.play(clip.clone(), Region::new(0.0, 0.1)).unwrap();
        output.pull(200);

        scheduler.play(clip, Region::new(0.5, 1.0)).unwrap();
        assert!(scheduler.playing());
        output.pull(10);
        assert!(scheduler.playing());
    }

    #[test]
    fn test_empty_region_rejected() {
        let (mut scheduler, _output, clip) = setup();
        let result = scheduler.play(clip, Region::new(0.5, 0.5));
        assert!(matches!(result, Err(PlaybackError::EmptyRegion { .. })));
        assert!(!scheduler.playing());
    }

    #[test]
    fn test_restart_is_click_free() {
        let (mut scheduler, mut output, clip) = setup_at(44100);
        let fade = crate::playback::fade_frames(44100, PlaybackConfig::default().fade_ms);
        assert_eq!(fade, 44);
        let max_step = 0.5 / fade as f32 + 1e-5;

        scheduler.play(clip.clone(), Region::new(0.0, 0.5)).unwrap();
        let mut samples = output.pull(500).into_channels().remove(0);
        scheduler.play(clip, Region::new(0.5, 1.0)).unwrap();
        samples.extend(output.pull(500).into_channels().remove(0));
        scheduler.stop().unwrap();
        samples.extend(output.pull(100).into_channels().remove(0));

        assert_eq!(samples[0], 0.0);
        assert_eq!(*samples.last().unwrap(), 0.0);
        for pair in samples.windows(2) {
            assert!((pair[1] - pair[0]).abs() <= max_step, "jump {:?}", pair);
        }
    }

    #[test]
    fn test_full_queue_keeps_playing() {
        let config = PlaybackConfig {
            command_queue_capacity: 1,
            ..PlaybackConfig::default()
        };
        let (mut scheduler, processor) = PlaybackScheduler::new(&config);
        let mut output = OfflineOutput::new(processor, RATE, 1);
        let clip = Arc::new(Clip::new("dc", RATE, vec![vec![0.5; RATE as usize]]).unwrap());

        scheduler.play(clip, Region::full()).unwrap();
        assert_eq!(scheduler.stop(), Err(PlaybackError::QueueFull));
        assert_eq!(scheduler.state(), PlaybackState::Playing);

        // Audio thread drains the play command; the retry goes through
        output.pull(10);
        scheduler.stop().unwrap();
        let tail = output.pull(100).into_channels().remove(0);
        assert_eq!(*tail.last().unwrap(), 0.0);
        assert!(!output.is_active());
    }

    #[test]
    fn test_clip_freed_by_collector_not_audio_thread() {
        let (mut scheduler, mut output, clip) = setup();
        let weak = Arc::downgrade(&clip);
        scheduler.play(clip, Region::new(0.0, 0.1)).unwrap();

        // Swap to another clip: only the audio thread's voice keeps the first
        let other = Arc::new(Clip::new("other", RATE, vec![vec![0.25; RATE as usize]]).unwrap());
        scheduler.play(other, Region::full()).unwrap();
        output.pull(200);
        assert!(weak.upgrade().is_some());

        // Routine polling runs the collector
        assert!(scheduler.playing());
        assert!(weak.upgrade().is_none());
    }
}
