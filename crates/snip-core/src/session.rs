//! Editing session
//!
//! The session owns everything a slicing view works on and is the only
//! object a presentation layer talks to:
//!
//! ```text
//!                 ┌────────────────────── Session ──────────────────────┐
//!   load() ─────► │ Arc<Clip>   Timeline   ZoomLevel                    │
//!   slice/heal ─► │    │           │                                    │
//!   zoom ───────► │    ├──► PeaksComputer ──► WaveformCache             │
//!   play/stop ──► │    ├──► PlaybackScheduler ──► (TransportProcessor)  │
//!   export ─────► │    └──► ExportService ──► ExportHandle              │
//!                 └───────────────────────┬─────────────────────────────┘
//!                                         │ SessionEvent (crossbeam)
//!                                         ▼
//!                                    subscribers
//! ```
//!
//! All mutation happens through `&mut self` on one control thread. Workers
//! only ever see `Arc<Clip>` snapshots.
//!
//! Lifecycle: [`Session::init`] installs a clip with a fresh timeline,
//! [`Session::reset`] drops it and returns to defaults, and
//! [`Session::teardown`] stops everything for good.

use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use crossbeam::channel::{self, Receiver, Sender};

use crate::audio_file::{decode_file, AudioDecoder};
use crate::clip::Clip;
use crate::config::SnipConfig;
use crate::error::{SessionError, SessionResult};
use crate::playback::{PlaybackScheduler, TransportProcessor};
use crate::render::{EffectsConfig, ExportHandle, ExportService};
use crate::timeline::{Region, Timeline, TimelineError};
use crate::waveform::{
    tile, tile_count, tile_span, CachedEnvelope, PeaksComputer, PeaksError, PeaksRequest,
    PeaksTicket, TileOutcome, TileUpdate, Viewport, ZoomLevel,
};

/// Change notifications published by the session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A clip was installed with a fresh timeline
    ClipLoaded {
        name: String,
        frames: usize,
        sample_rate: u32,
        channels: usize,
    },
    /// Breakpoints changed; carries the new partition
    RegionsChanged(Vec<Region>),
    /// Session zoom changed; cached envelopes were dropped
    ZoomChanged(ZoomLevel),
    /// An envelope was applied to the cache
    EnvelopeUpdated { element: usize },
    PlaybackStarted(Region),
    PlaybackStopped,
    /// Playback reached the end of its region
    PlaybackFinished(Region),
    /// An export was handed to the worker pool
    ExportQueued(Region),
    /// Clip dropped, timeline and zoom back to defaults
    Reset,
    TornDown,
}

/// Broadcast of session events to every subscriber
///
/// Each subscriber gets its own unbounded channel; subscribers that have
/// dropped their receiver are pruned on the next publish.
#[derive(Default)]
struct EventBus {
    subscribers: Vec<Sender<SessionEvent>>,
}

impl EventBus {
    fn subscribe(&mut self) -> Receiver<SessionEvent> {
        let (tx, rx) = channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn publish(&mut self, event: SessionEvent) {
        log::debug!("Session: {:?}", event);
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// A clip being sliced, previewed and exported
pub struct Session {
    config: SnipConfig,
    clip: Option<Arc<Clip>>,
    timeline: Timeline,
    zoom: ZoomLevel,
    peaks: PeaksComputer,
    scheduler: PlaybackScheduler,
    /// Audio-side half of the scheduler until an output takes it
    processor: Option<TransportProcessor>,
    exports: ExportService,
    events: EventBus,
    /// Region of the latest play request until it stops or finishes
    playing_region: Option<Region>,
    torn_down: bool,
}

impl Session {
    /// Create an empty session with its worker pools
    pub fn new(config: SnipConfig) -> SessionResult<Self> {
        let peaks = PeaksComputer::new(config.waveform.worker_threads, config.waveform.chunk_frames);
        let (scheduler, processor) = PlaybackScheduler::new(&config.playback);
        let exports = ExportService::new(config.export.worker_threads, config.playback.fade_ms)?;

        log::info!(
            "Session: created (fade {} ms, {} waveform threads, {} export threads)",
            config.playback.fade_ms,
            config.waveform.worker_threads,
            config.export.worker_threads
        );

        Ok(Self {
            zoom: config.waveform.default_zoom,
            config,
            clip: None,
            timeline: Timeline::new(),
            peaks,
            scheduler,
            processor: Some(processor),
            exports,
            events: EventBus::default(),
            playing_region: None,
            torn_down: false,
        })
    }

    /// Take the audio-side processor to hand to an output backend
    ///
    /// Returns `None` after the first call.
    pub fn take_processor(&mut self) -> Option<TransportProcessor> {
        self.processor.take()
    }

    /// Receive every event published from now on
    pub fn subscribe(&mut self) -> Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Active configuration
    pub fn config(&self) -> &SnipConfig {
        &self.config
    }

    // ─── Lifecycle ──────────────────────────────────────────────────────

    /// Install a clip with a single-region timeline
    ///
    /// Stops playback and drops envelopes of the previous clip.
    pub fn init(&mut self, clip: Clip) -> SessionResult<()> {
        self.ensure_live()?;
        self.clear_state();

        log::info!(
            "Session: loaded {} ({} ch, {} Hz, {:.2} s)",
            clip.name(),
            clip.num_channels(),
            clip.sample_rate(),
            clip.duration_secs()
        );
        self.events.publish(SessionEvent::ClipLoaded {
            name: clip.name().to_string(),
            frames: clip.frames(),
            sample_rate: clip.sample_rate(),
            channels: clip.num_channels(),
        });
        self.clip = Some(Arc::new(clip));
        Ok(())
    }

    /// Decode `bytes` and install the result
    ///
    /// On a decode failure the current clip and timeline stay as they were.
    pub fn load(&mut self, decoder: &dyn AudioDecoder, bytes: &[u8], name: &str) -> SessionResult<()> {
        self.ensure_live()?;
        let clip = decoder.decode(bytes, name)?;
        self.init(clip)
    }

    /// Read and decode a file, then install it
    pub fn load_file(&mut self, decoder: &dyn AudioDecoder, path: &Path) -> SessionResult<()> {
        self.ensure_live()?;
        let clip = decode_file(decoder, path)?;
        self.init(clip)
    }

    /// Drop the clip and return timeline and zoom to defaults
    pub fn reset(&mut self) {
        if self.torn_down {
            return;
        }
        self.clear_state();
        self.clip = None;
        log::info!("Session: reset");
        self.events.publish(SessionEvent::Reset);
    }

    /// Stop everything; every later operation fails with `TornDown`
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.clear_state();
        self.clip = None;
        self.torn_down = true;
        log::info!("Session: torn down");
        self.events.publish(SessionEvent::TornDown);
        self.events.subscribers.clear();
    }

    fn clear_state(&mut self) {
        if let Err(e) = self.scheduler.stop() {
            log::warn!("Session: could not stop playback: {}", e);
        }
        self.playing_region = None;
        self.peaks.reset();
        self.timeline.clear();
        self.zoom = self.config.waveform.default_zoom;
    }

    /// Loaded clip
    pub fn clip(&self) -> Option<&Arc<Clip>> {
        self.clip.as_ref()
    }

    // ─── Regions ────────────────────────────────────────────────────────

    /// Current partition of the timeline
    pub fn regions(&self) -> Vec<Region> {
        self.timeline.regions()
    }

    /// Current breakpoints
    pub fn breakpoints(&self) -> &[f64] {
        self.timeline.breakpoints()
    }

    /// Split the region containing `position`
    ///
    /// Returns the index of the new region, or `None` when the position is
    /// already a breakpoint or outside `[0, 1)`.
    pub fn slice(&mut self, position: f64) -> SessionResult<Option<usize>> {
        self.ensure_clip()?;
        let index = self.timeline.slice(position);
        if index.is_some() {
            self.events.publish(SessionEvent::RegionsChanged(self.timeline.regions()));
        }
        Ok(index)
    }

    /// Merge region `index` into its predecessor and return the result
    pub fn heal(&mut self, index: usize) -> SessionResult<Region> {
        self.ensure_clip()?;
        let merged = self.timeline.heal(index)?;
        self.events.publish(SessionEvent::RegionsChanged(self.timeline.regions()));
        Ok(merged)
    }

    /// Index of the region containing `position`
    pub fn region_containing(&self, position: f64) -> usize {
        self.timeline.region_containing(position)
    }

    /// Index of the first region starting after `position`
    pub fn next_region_after(&self, position: f64) -> Option<usize> {
        self.timeline.next_region_after(position)
    }

    // ─── Zoom & envelopes ───────────────────────────────────────────────

    /// Session-wide zoom level
    pub fn zoom(&self) -> ZoomLevel {
        self.zoom
    }

    /// Set the zoom in samples per pixel
    ///
    /// Values that are not a power of two in `[1, 1024]` are rejected and
    /// leave the zoom unchanged.
    pub fn set_zoom(&mut self, samples_per_pixel: u32) -> SessionResult<ZoomLevel> {
        self.ensure_live()?;
        let zoom = ZoomLevel::new(samples_per_pixel)?;
        self.apply_zoom(zoom);
        Ok(zoom)
    }

    /// Halve samples per pixel (saturating)
    pub fn zoom_in(&mut self) -> ZoomLevel {
        self.apply_zoom(self.zoom.zoom_in());
        self.zoom
    }

    /// Double samples per pixel (saturating)
    pub fn zoom_out(&mut self) -> ZoomLevel {
        self.apply_zoom(self.zoom.zoom_out());
        self.zoom
    }

    fn apply_zoom(&mut self, zoom: ZoomLevel) {
        if zoom == self.zoom || self.torn_down {
            return;
        }
        self.zoom = zoom;
        // Tiles at the old zoom cover different frames
        self.peaks.reset();
        self.events.publish(SessionEvent::ZoomChanged(zoom));
    }

    /// Number of tiles covering the clip at the current zoom
    pub fn tile_count(&self) -> usize {
        self.clip
            .as_ref()
            .map_or(0, |clip| tile_count(clip.frames(), self.config.waveform.tile_width_px, self.zoom))
    }

    /// Tiles overlapping a viewport at the current zoom
    pub fn visible_tiles(&self, viewport: &Viewport) -> Range<usize> {
        match &self.clip {
            Some(clip) => viewport.visible_tiles(clip.frames(), self.config.waveform.tile_width_px, self.zoom),
            None => 0..0,
        }
    }

    /// Request the envelope of tile `tile_index` of `channel` for `element`
    ///
    /// Supersedes any unresolved request for the same element.
    pub fn request_tile(
        &mut self,
        element: usize,
        channel: usize,
        tile_index: usize,
    ) -> SessionResult<PeaksTicket> {
        let clip = self.ensure_clip()?.clone();
        let width_px = self.config.waveform.tile_width_px;
        let Some(tile) = tile(tile_index, width_px, self.zoom, clip.frames()) else {
            let start = tile_index.saturating_mul(tile_span(width_px, self.zoom));
            return Err(PeaksError::RangeOutOfBounds {
                start,
                end: start.saturating_add(tile_span(width_px, self.zoom)),
                frames: clip.frames(),
            }
            .into());
        };

        Ok(self.peaks.request(PeaksRequest {
            element,
            clip,
            channel,
            frames: tile.frames,
            buckets: tile.buckets,
        }))
    }

    /// Apply every finished envelope (non-blocking)
    pub fn poll_envelopes(&mut self) -> Vec<TileUpdate> {
        self.scheduler.collect();
        let updates = self.peaks.poll();
        for update in &updates {
            if update.outcome == TileOutcome::Applied {
                self.events.publish(SessionEvent::EnvelopeUpdated { element: update.element });
            }
        }
        updates
    }

    /// Block until a tile request resolves
    pub fn wait_envelope(&mut self, ticket: PeaksTicket) -> TileOutcome {
        let element = ticket.element();
        let outcome = self.peaks.wait(ticket);
        if outcome == TileOutcome::Applied {
            self.events.publish(SessionEvent::EnvelopeUpdated { element });
        }
        outcome
    }

    /// Last applied envelope of an element
    pub fn envelope(&self, element: usize) -> Option<&CachedEnvelope> {
        self.peaks.cache().get(element)
    }

    // ─── Playback ───────────────────────────────────────────────────────

    /// Play region `index` from its start, stopping anything already playing
    pub fn play(&mut self, index: usize) -> SessionResult<Region> {
        let region = self.region_by_index(index)?;
        self.play_region(region)?;
        Ok(region)
    }

    /// Play the region containing `position`
    pub fn play_at(&mut self, position: f64) -> SessionResult<Region> {
        self.play(self.timeline.region_containing(position))
    }

    /// Play the first region starting after `position`, if there is one
    pub fn play_next_after(&mut self, position: f64) -> SessionResult<Option<Region>> {
        match self.timeline.next_region_after(position) {
            Some(index) => self.play(index).map(Some),
            None => Ok(None),
        }
    }

    fn play_region(&mut self, region: Region) -> SessionResult<()> {
        let clip = self.ensure_clip()?.clone();
        if self.scheduler.poll_natural_end() {
            self.publish_finished();
        }
        self.scheduler.play(clip, region)?;
        self.playing_region = Some(region);
        self.events.publish(SessionEvent::PlaybackStarted(region));
        Ok(())
    }

    /// Fade out and stop; does nothing when idle
    ///
    /// Fails with a full command queue, in which case playback continues.
    pub fn stop(&mut self) -> SessionResult<()> {
        if self.scheduler.poll_natural_end() {
            self.publish_finished();
            return Ok(());
        }
        if self.scheduler.playing() {
            self.scheduler.stop()?;
            self.playing_region = None;
            self.events.publish(SessionEvent::PlaybackStopped);
        }
        Ok(())
    }

    /// Whether a region is playing
    ///
    /// Publishes `PlaybackFinished` the one time a region reaches its end.
    pub fn playing(&mut self) -> bool {
        if self.scheduler.poll_natural_end() {
            self.publish_finished();
        }
        self.scheduler.playing()
    }

    /// Playback position as a fraction of the clip
    pub fn progress(&self) -> f64 {
        self.scheduler.progress()
    }

    fn publish_finished(&mut self) {
        if let Some(region) = self.playing_region.take() {
            self.events.publish(SessionEvent::PlaybackFinished(region));
        }
    }

    // ─── Export ─────────────────────────────────────────────────────────

    /// Export region `index` in the background
    ///
    /// `effects = None` uses the configured defaults fitted to the clip's
    /// sample rate. Parameters are validated before the job is queued.
    pub fn export(&mut self, index: usize, effects: Option<EffectsConfig>) -> SessionResult<ExportHandle> {
        let region = self.region_by_index(index)?;
        self.export_region(region, effects)
    }

    /// Export an arbitrary region in the background
    pub fn export_region(
        &mut self,
        region: Region,
        effects: Option<EffectsConfig>,
    ) -> SessionResult<ExportHandle> {
        let clip = self.ensure_clip()?.clone();
        let effects = effects.unwrap_or_else(|| {
            self.config.export.default_effects.fit_default_to(clip.sample_rate())
        });
        effects.validate(clip.sample_rate())?;

        let handle = self.exports.export(clip, region, effects);
        self.events.publish(SessionEvent::ExportQueued(region));
        Ok(handle)
    }

    // ─── Helpers ────────────────────────────────────────────────────────

    fn ensure_live(&self) -> SessionResult<()> {
        if self.torn_down {
            Err(SessionError::TornDown)
        } else {
            Ok(())
        }
    }

    fn ensure_clip(&self) -> SessionResult<&Arc<Clip>> {
        self.ensure_live()?;
        self.clip.as_ref().ok_or(SessionError::NoClip)
    }

    fn region_by_index(&self, index: usize) -> SessionResult<Region> {
        self.ensure_clip()?;
        self.timeline.region(index).ok_or_else(|| {
            TimelineError::InvalidRegionIndex {
                index,
                count: self.timeline.len(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_file::WavDecoder;
    use crate::playback::OfflineOutput;
    use crate::render::ExportError;

    /// Five seconds of a 440 Hz tone at 44.1 kHz, mono
    fn five_second_clip() -> Clip {
        let samples = (0..220_500)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin())
            .collect();
        Clip::new("tone.wav", 44100, vec![samples]).unwrap()
    }

    fn loaded_session() -> Session {
        let mut session = Session::new(SnipConfig::default()).unwrap();
        session.init(five_second_clip()).unwrap();
        session
    }

    fn drain(rx: &Receiver<SessionEvent>) -> Vec<SessionEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn test_slice_then_heal() {
        let mut session = loaded_session();
        assert_eq!(session.regions(), vec![Region::new(0.0, 1.0)]);

        assert_eq!(session.slice(0.5).unwrap(), Some(1));
        assert_eq!(session.regions(), vec![Region::new(0.0, 0.5), Region::new(0.5, 1.0)]);

        assert_eq!(session.heal(1).unwrap(), Region::new(0.0, 1.0));
        assert_eq!(session.regions(), vec![Region::new(0.0, 1.0)]);
    }

    #[test]
    fn test_heal_first_region_rejected() {
        let mut session = loaded_session();
        session.slice(0.5).unwrap();
        assert!(matches!(
            session.heal(0),
            Err(SessionError::Timeline(TimelineError::InvalidRegionIndex { index: 0, count: 2 }))
        ));
        assert_eq!(session.regions().len(), 2);
    }

    #[test]
    fn test_operations_need_a_clip() {
        let mut session = Session::new(SnipConfig::default()).unwrap();
        assert!(matches!(session.slice(0.5), Err(SessionError::NoClip)));
        assert!(matches!(session.play(0), Err(SessionError::NoClip)));
        assert!(matches!(session.export(0, None), Err(SessionError::NoClip)));
        assert_eq!(session.tile_count(), 0);
    }

    #[test]
    fn test_events_follow_mutations() {
        let mut session = Session::new(SnipConfig::default()).unwrap();
        let rx = session.subscribe();

        session.init(five_second_clip()).unwrap();
        session.slice(0.25).unwrap();
        // Duplicate slice is a no-op and publishes nothing
        session.slice(0.25).unwrap();
        session.zoom_in();

        let events = drain(&rx);
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], SessionEvent::ClipLoaded { frames: 220_500, .. }));
        assert_eq!(
            events[1],
            SessionEvent::RegionsChanged(vec![Region::new(0.0, 0.25), Region::new(0.25, 1.0)])
        );
        assert_eq!(events[2], SessionEvent::ZoomChanged(ZoomLevel::new(32).unwrap()));
    }

    #[test]
    fn test_invalid_zoom_leaves_level_unchanged() {
        let mut session = loaded_session();
        let before = session.zoom();
        assert!(matches!(session.set_zoom(100), Err(SessionError::Peaks(PeaksError::InvalidZoom(100)))));
        assert_eq!(session.zoom(), before);
        assert_eq!(u32::from(session.set_zoom(256).unwrap()), 256);
    }

    #[test]
    fn test_tile_envelope_is_cached() {
        let mut session = loaded_session();
        let rx = session.subscribe();

        let ticket = session.request_tile(7, 0, 0).unwrap();
        assert_eq!(session.wait_envelope(ticket), TileOutcome::Applied);

        let cached = session.envelope(7).unwrap();
        assert_eq!(cached.envelope.len(), 512);
        assert!(cached.envelope.iter().all(|&(min, max)| min <= max));
        assert_eq!(drain(&rx), vec![SessionEvent::EnvelopeUpdated { element: 7 }]);
    }

    #[test]
    fn test_tile_past_end_rejected() {
        let mut session = loaded_session();
        let past = session.tile_count();
        assert!(matches!(
            session.request_tile(0, 0, past),
            Err(SessionError::Peaks(PeaksError::RangeOutOfBounds { .. }))
        ));
    }

    #[test]
    fn test_play_and_stop_through_offline_output() {
        let mut session = loaded_session();
        let processor = session.take_processor().unwrap();
        assert!(session.take_processor().is_none());
        let mut output = OfflineOutput::new(processor, 44100, 2);

        session.slice(0.5).unwrap();
        assert_eq!(session.play(1).unwrap(), Region::new(0.5, 1.0));
        assert!(session.playing());
        assert_eq!(session.progress(), 0.5);

        output.pull(22_050);
        assert!((session.progress() - 0.6).abs() < 1e-9);

        session.stop().unwrap();
        assert!(!session.playing());
        session.stop().unwrap();
        assert!(!session.playing());
    }

    #[test]
    fn test_natural_end_published_once() {
        let mut session = loaded_session();
        let mut output = OfflineOutput::new(session.take_processor().unwrap(), 44100, 1);
        session.slice(0.1).unwrap();
        let rx = session.subscribe();

        session.play(0).unwrap();
        output.pull(22_050 + 1000);

        assert!(!session.playing());
        assert!(!session.playing());
        let finished: Vec<_> = drain(&rx)
            .into_iter()
            .filter(|e| matches!(e, SessionEvent::PlaybackFinished(_)))
            .collect();
        assert_eq!(finished, vec![SessionEvent::PlaybackFinished(Region::new(0.0, 0.1))]);
    }

    #[test]
    fn test_restart_after_unpolled_end_reports_finish() {
        let mut session = loaded_session();
        let mut output = OfflineOutput::new(session.take_processor().unwrap(), 44100, 1);
        session.slice(0.1).unwrap();
        let rx = session.subscribe();

        session.play(0).unwrap();
        output.pull(22_050 + 1000);
        session.play(1).unwrap();

        let playback: Vec<_> = drain(&rx)
            .into_iter()
            .filter(|e| {
                matches!(e, SessionEvent::PlaybackStarted(_) | SessionEvent::PlaybackFinished(_))
            })
            .collect();
        assert_eq!(
            playback,
            vec![
                SessionEvent::PlaybackStarted(Region::new(0.0, 0.1)),
                SessionEvent::PlaybackFinished(Region::new(0.0, 0.1)),
                SessionEvent::PlaybackStarted(Region::new(0.1, 1.0)),
            ]
        );
    }

    #[test]
    fn test_export_first_half() {
        let mut session = loaded_session();
        session.slice(0.5).unwrap();

        let file = session.export(0, None).unwrap().wait().unwrap();
        assert_eq!(file.frames, 110_250);
        assert!(file.name.ends_with(".wav"));

        let again = session.export(0, None).unwrap().wait().unwrap();
        assert_eq!(again.name, file.name);
    }

    #[test]
    fn test_export_rejects_invalid_effects_before_queueing() {
        let mut session = loaded_session();
        let rx = session.subscribe();
        let bad = EffectsConfig { low_pass_hz: 0.0, ..EffectsConfig::default() };

        assert!(matches!(session.export(0, Some(bad)), Err(SessionError::Effects(_))));
        assert!(drain(&rx).is_empty());

        let empty = session.export_region(Region::new(0.3, 0.3), None).unwrap().wait();
        assert!(matches!(empty, Err(ExportError::Render(_))));
    }

    #[test]
    fn test_decode_failure_keeps_previous_clip() {
        let mut session = loaded_session();
        session.slice(0.5).unwrap();

        let result = session.load(&WavDecoder, b"not a wav file", "broken.wav");
        assert!(matches!(result, Err(SessionError::Decode(_))));
        assert_eq!(session.clip().unwrap().name(), "tone.wav");
        assert_eq!(session.regions().len(), 2);
    }

    #[test]
    fn test_reset_and_teardown() {
        let mut session = loaded_session();
        session.slice(0.5).unwrap();
        session.zoom_out();
        let rx = session.subscribe();

        session.reset();
        assert!(session.clip().is_none());
        assert_eq!(session.regions(), vec![Region::new(0.0, 1.0)]);
        assert_eq!(session.zoom(), ZoomLevel::DEFAULT);

        session.teardown();
        assert!(matches!(session.init(five_second_clip()), Err(SessionError::TornDown)));
        assert_eq!(drain(&rx), vec![SessionEvent::Reset, SessionEvent::TornDown]);
    }
}
