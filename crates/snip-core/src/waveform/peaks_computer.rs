//! Background envelope computation for waveform displays
//!
//! Envelope generation for a long clip at fine zoom can take tens of
//! milliseconds per tile. The `PeaksComputer` runs it on a small reusable
//! rayon pool so the control thread never blocks:
//!
//! 1. Caller submits a `PeaksRequest` for a display element (one tile slot)
//! 2. Any in-flight request for the same element is cancelled
//! 3. A worker scans the channel slice, checking its cancel flag per chunk
//! 4. The report comes back over a channel; it is applied to the cache only
//!    if it is still the latest request for that element
//!
//! ## Usage
//!
//! ```ignore
//! let mut computer = PeaksComputer::new(2, 65536);
//!
//! let ticket = computer.request(PeaksRequest {
//!     element: 0,
//!     clip: clip.clone(),
//!     channel: 0,
//!     frames: tile.frames.clone(),
//!     buckets: tile.buckets,
//! });
//!
//! // Either block on one ticket...
//! let outcome = computer.wait(ticket);
//!
//! // ...or drain whatever finished from a tick handler
//! for update in computer.poll() {
//!     redraw(update.element);
//! }
//! ```

use std::collections::HashMap;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};

use super::peaks::{compute_envelope_cancellable, Envelope};
use super::{PeaksError, PeaksResult};
use crate::clip::Clip;

/// Request to compute one tile's envelope
pub struct PeaksRequest {
    /// Display element the envelope belongs to
    pub element: usize,
    /// Clip snapshot (shared, never mutated)
    pub clip: Arc<Clip>,
    /// Channel to downsample
    pub channel: usize,
    /// Frame range within the clip
    pub frames: Range<usize>,
    /// Number of buckets to produce
    pub buckets: usize,
}

impl std::fmt::Debug for PeaksRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeaksRequest")
            .field("element", &self.element)
            .field("clip", &format!("<Arc<Clip> {} frames>", self.clip.frames()))
            .field("channel", &self.channel)
            .field("frames", &self.frames)
            .field("buckets", &self.buckets)
            .finish()
    }
}

/// What happened to a request once its report was processed
#[derive(Debug, Clone, PartialEq)]
pub enum TileOutcome {
    /// Envelope stored in the cache
    Applied,
    /// A newer request for the element replaced this one
    Superseded,
    /// Computation failed; the previous envelope stays cached
    Failed(PeaksError),
}

/// Processed report, returned from [`PeaksComputer::poll`]
#[derive(Debug, Clone, PartialEq)]
pub struct TileUpdate {
    pub element: usize,
    pub generation: u64,
    pub outcome: TileOutcome,
}

/// Handle for one submitted request
#[derive(Debug)]
pub struct PeaksTicket {
    element: usize,
    generation: u64,
    outcome_rx: Receiver<TileOutcome>,
}

impl PeaksTicket {
    /// Element the request was made for
    pub fn element(&self) -> usize {
        self.element
    }

    /// Monotonic request number
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Last applied envelope of an element
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEnvelope {
    /// Request that produced it
    pub generation: u64,
    /// Source channel
    pub channel: usize,
    /// Source frame range
    pub frames: Range<usize>,
    /// Min/max buckets
    pub envelope: Envelope,
}

/// Applied envelopes keyed by element
#[derive(Debug, Default)]
pub struct WaveformCache {
    entries: HashMap<usize, CachedEnvelope>,
}

impl WaveformCache {
    /// Envelope for an element, if one has been applied
    pub fn get(&self, element: usize) -> Option<&CachedEnvelope> {
        self.entries.get(&element)
    }

    /// Number of elements with an envelope
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every cached envelope
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn insert(&mut self, element: usize, envelope: CachedEnvelope) {
        self.entries.insert(element, envelope);
    }
}

/// Worker → owner report
struct WorkerReport {
    element: usize,
    generation: u64,
    channel: usize,
    frames: Range<usize>,
    result: PeaksResult<Envelope>,
}

/// Latest request per element
struct InFlight {
    generation: u64,
    cancel: Arc<AtomicBool>,
}

/// Bounded worker pool for envelope computation
///
/// Keeps only the latest result per element. All bookkeeping happens on the
/// owning thread; workers see nothing but their request and cancel flag.
pub struct PeaksComputer {
    /// Worker pool (None if it could not be created)
    pool: Option<rayon::ThreadPool>,
    /// Why the pool is missing
    pool_error: Option<String>,
    /// Reports from workers
    report_tx: Sender<WorkerReport>,
    report_rx: Receiver<WorkerReport>,
    /// Latest unresolved request per element
    latest: HashMap<usize, InFlight>,
    /// Outcome channels of unresolved tickets, keyed by generation
    waiters: HashMap<u64, Sender<TileOutcome>>,
    /// Last issued generation
    generation: u64,
    /// Input samples scanned between cancel checks
    chunk_frames: usize,
    /// Applied envelopes
    cache: WaveformCache,
}

impl PeaksComputer {
    /// Create the computer with `worker_threads` pool threads
    ///
    /// If the pool cannot be built every request fails with
    /// [`PeaksError::PoolUnavailable`]; the computer itself stays usable.
    pub fn new(worker_threads: usize, chunk_frames: usize) -> Self {
        let threads = worker_threads.max(1);
        let (pool, pool_error) = match rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("waveform-peaks-{}", i))
            .build()
        {
            Ok(pool) => {
                log::info!("PeaksComputer: worker pool started with {} threads", threads);
                (Some(pool), None)
            }
            Err(e) => {
                log::error!("PeaksComputer: failed to build worker pool: {}", e);
                (None, Some(e.to_string()))
            }
        };

        let (report_tx, report_rx) = channel::unbounded();

        Self {
            pool,
            pool_error,
            report_tx,
            report_rx,
            latest: HashMap::new(),
            waiters: HashMap::new(),
            generation: 0,
            chunk_frames: chunk_frames.max(1),
            cache: WaveformCache::default(),
        }
    }

    /// Submit a request (non-blocking)
    ///
    /// Cancels any unresolved request for the same element.
    pub fn request(&mut self, request: PeaksRequest) -> PeaksTicket {
        self.generation += 1;
        let generation = self.generation;
        let element = request.element;

        let cancel = Arc::new(AtomicBool::new(false));
        let previous = self.latest.insert(
            element,
            InFlight {
                generation,
                cancel: cancel.clone(),
            },
        );
        if let Some(previous) = previous {
            previous.cancel.store(true, Ordering::Relaxed);
            log::debug!(
                "PeaksComputer: element {} request {} superseded by {}",
                element,
                previous.generation,
                generation
            );
        }

        let (outcome_tx, outcome_rx) = channel::bounded(1);
        self.waiters.insert(generation, outcome_tx);

        let report_tx = self.report_tx.clone();
        match &self.pool {
            Some(pool) => {
                let chunk_frames = self.chunk_frames;
                pool.spawn(move || {
                    let report = run_request(request, generation, chunk_frames, &cancel);
                    let _ = report_tx.send(report);
                });
            }
            None => {
                let reason = self.pool_error.clone().unwrap_or_default();
                let _ = report_tx.send(WorkerReport {
                    element,
                    generation,
                    channel: request.channel,
                    frames: request.frames,
                    result: Err(PeaksError::PoolUnavailable(reason)),
                });
            }
        }

        PeaksTicket {
            element,
            generation,
            outcome_rx,
        }
    }

    /// Process every report that has arrived (non-blocking)
    ///
    /// Call this from a tick handler and redraw the elements it returns.
    pub fn poll(&mut self) -> Vec<TileUpdate> {
        let mut updates = Vec::new();
        loop {
            match self.report_rx.try_recv() {
                Ok(report) => updates.push(self.process_report(report)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    log::error!("PeaksComputer: report channel disconnected unexpectedly");
                    break;
                }
            }
        }
        updates
    }

    /// Block until the ticket's request has been resolved
    ///
    /// Reports for other requests that arrive in the meantime are processed
    /// as well.
    pub fn wait(&mut self, ticket: PeaksTicket) -> TileOutcome {
        loop {
            match ticket.outcome_rx.try_recv() {
                Ok(outcome) => return outcome,
                Err(TryRecvError::Disconnected) => return TileOutcome::Superseded,
                Err(TryRecvError::Empty) => {}
            }
            match self.report_rx.recv() {
                Ok(report) => {
                    self.process_report(report);
                }
                Err(_) => return TileOutcome::Superseded,
            }
        }
    }

    /// Cancel the unresolved request for an element, if any
    pub fn cancel(&mut self, element: usize) {
        if let Some(in_flight) = self.latest.remove(&element) {
            in_flight.cancel.store(true, Ordering::Relaxed);
        }
    }

    /// Cancel every unresolved request and drop all cached envelopes
    pub fn reset(&mut self) {
        for (_, in_flight) in self.latest.drain() {
            in_flight.cancel.store(true, Ordering::Relaxed);
        }
        self.cache.clear();
    }

    /// Number of elements with an unresolved request
    pub fn pending(&self) -> usize {
        self.latest.len()
    }

    /// Applied envelopes
    pub fn cache(&self) -> &WaveformCache {
        &self.cache
    }

    fn process_report(&mut self, report: WorkerReport) -> TileUpdate {
        let is_latest = self
            .latest
            .get(&report.element)
            .is_some_and(|f| f.generation == report.generation);

        let outcome = if !is_latest {
            TileOutcome::Superseded
        } else {
            self.latest.remove(&report.element);
            match report.result {
                Ok(envelope) => {
                    self.cache.insert(
                        report.element,
                        CachedEnvelope {
                            generation: report.generation,
                            channel: report.channel,
                            frames: report.frames,
                            envelope,
                        },
                    );
                    TileOutcome::Applied
                }
                Err(PeaksError::Cancelled) => TileOutcome::Superseded,
                Err(e) => {
                    log::warn!(
                        "PeaksComputer: element {} request {} failed, keeping previous envelope: {}",
                        report.element,
                        report.generation,
                        e
                    );
                    TileOutcome::Failed(e)
                }
            }
        };

        if let Some(waiter) = self.waiters.remove(&report.generation) {
            let _ = waiter.send(outcome.clone());
        }

        TileUpdate {
            element: report.element,
            generation: report.generation,
            outcome,
        }
    }
}

/// Worker body: validate, downsample, report
fn run_request(
    request: PeaksRequest,
    generation: u64,
    chunk_frames: usize,
    cancel: &AtomicBool,
) -> WorkerReport {
    let start_time = Instant::now();
    let result = compute(&request, chunk_frames, cancel);

    if result.is_ok() {
        log::debug!(
            "[PERF] Envelope element {} ({} buckets over {} frames): {:?}",
            request.element,
            request.buckets,
            request.frames.len(),
            start_time.elapsed()
        );
    }

    WorkerReport {
        element: request.element,
        generation,
        channel: request.channel,
        frames: request.frames,
        result,
    }
}

fn compute(request: &PeaksRequest, chunk_frames: usize, cancel: &AtomicBool) -> PeaksResult<Envelope> {
    let samples = request
        .clip
        .channel(request.channel)
        .ok_or(PeaksError::ChannelOutOfRange {
            channel: request.channel,
            channels: request.clip.num_channels(),
        })?;

    let frames = samples.len();
    let Range { start, end } = request.frames;
    if start > end || end > frames {
        return Err(PeaksError::RangeOutOfBounds { start, end, frames });
    }

    compute_envelope_cancellable(&samples[start..end], request.buckets, chunk_frames, cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::compute_envelope;

    fn sine_clip(frames: usize) -> Arc<Clip> {
        let samples: Vec<f32> = (0..frames).map(|i| (i as f32 * 0.01).sin()).collect();
        Arc::new(Clip::new("sine", 44100, vec![samples]).unwrap())
    }

    fn request(clip: &Arc<Clip>, element: usize, channel: usize, frames: Range<usize>) -> PeaksRequest {
        PeaksRequest {
            element,
            clip: clip.clone(),
            channel,
            frames,
            buckets: 100,
        }
    }

    #[test]
    fn test_request_applies_envelope() {
        let clip = sine_clip(10_000);
        let mut computer = PeaksComputer::new(2, 1024);

        let ticket = computer.request(request(&clip, 7, 0, 0..10_000));
        assert_eq!(computer.wait(ticket), TileOutcome::Applied);

        let cached = computer.cache().get(7).unwrap();
        assert_eq!(cached.envelope, compute_envelope(clip.channel(0).unwrap(), 100));
        assert_eq!(computer.pending(), 0);
    }

    #[test]
    fn test_newer_request_supersedes_older() {
        let clip = sine_clip(2_000_000);
        let mut computer = PeaksComputer::new(2, 1024);

        let first = computer.request(request(&clip, 0, 0, 0..2_000_000));
        let second = computer.request(request(&clip, 0, 0, 0..1_000));
        let second_generation = second.generation();

        assert_eq!(computer.wait(second), TileOutcome::Applied);
        assert_eq!(computer.wait(first), TileOutcome::Superseded);

        let cached = computer.cache().get(0).unwrap();
        assert_eq!(cached.generation, second_generation);
        assert_eq!(cached.frames, 0..1_000);
    }

    #[test]
    fn test_failure_keeps_previous_envelope() {
        let clip = sine_clip(5_000);
        let mut computer = PeaksComputer::new(1, 1024);

        let ticket = computer.request(request(&clip, 3, 0, 0..5_000));
        assert_eq!(computer.wait(ticket), TileOutcome::Applied);
        let before = computer.cache().get(3).unwrap().clone();

        let bad_channel = computer.request(request(&clip, 3, 4, 0..5_000));
        assert_eq!(
            computer.wait(bad_channel),
            TileOutcome::Failed(PeaksError::ChannelOutOfRange { channel: 4, channels: 1 })
        );

        let bad_range = computer.request(request(&clip, 3, 0, 4_000..6_000));
        assert!(matches!(
            computer.wait(bad_range),
            TileOutcome::Failed(PeaksError::RangeOutOfBounds { .. })
        ));

        assert_eq!(computer.cache().get(3), Some(&before));
    }

    #[test]
    fn test_cancel_discards_result() {
        let clip = sine_clip(50_000);
        let mut computer = PeaksComputer::new(1, 1024);

        let ticket = computer.request(request(&clip, 1, 0, 0..50_000));
        computer.cancel(1);
        assert_eq!(computer.wait(ticket), TileOutcome::Superseded);
        assert!(computer.cache().get(1).is_none());
    }

    #[test]
    fn test_elements_are_independent() {
        let clip = sine_clip(20_000);
        let mut computer = PeaksComputer::new(2, 1024);

        let a = computer.request(request(&clip, 0, 0, 0..10_000));
        let b = computer.request(request(&clip, 1, 0, 10_000..20_000));
        assert_eq!(computer.wait(b), TileOutcome::Applied);
        assert_eq!(computer.wait(a), TileOutcome::Applied);
        assert_eq!(computer.cache().len(), 2);
    }
}
