//! Min/max envelope generation for waveform display
//!
//! These functions downsample a channel into `(min, max)` bucket pairs
//! suitable for drawing at any zoom level.

use std::sync::atomic::{AtomicBool, Ordering};

use super::{PeaksError, PeaksResult};
use crate::types::Sample;

/// One `(min, max)` pair per display column
pub type Envelope = Vec<(Sample, Sample)>;

/// Samples per bucket for `len` samples split into `buckets` columns
///
/// Rounds up so the buckets always cover the whole input; the last
/// non-empty bucket may be shorter than the others.
pub fn window_size(len: usize, buckets: usize) -> usize {
    if buckets == 0 {
        return 0;
    }
    len.div_ceil(buckets)
}

/// Downsample `samples` into exactly `buckets` min/max pairs
///
/// Bucket `i` covers `[i * w, min((i + 1) * w, len))` with
/// `w = ceil(len / buckets)`. Buckets whose window lies entirely past the
/// end of the data are silence `(0.0, 0.0)`. Empty input or zero buckets
/// yield an empty envelope.
pub fn compute_envelope(samples: &[Sample], buckets: usize) -> Envelope {
    if samples.is_empty() || buckets == 0 {
        return Vec::new();
    }
    let window = window_size(samples.len(), buckets);
    (0..buckets).map(|i| bucket(samples, i, window)).collect()
}

/// Cancellable variant of [`compute_envelope`] used by the worker pool
///
/// The flag is checked each time roughly `chunk_frames` input samples have
/// been scanned. Once it is set the computation stops and returns
/// [`PeaksError::Cancelled`].
pub fn compute_envelope_cancellable(
    samples: &[Sample],
    buckets: usize,
    chunk_frames: usize,
    cancel: &AtomicBool,
) -> PeaksResult<Envelope> {
    if samples.is_empty() || buckets == 0 {
        return Ok(Vec::new());
    }
    let window = window_size(samples.len(), buckets);
    let check_every = (chunk_frames / window).max(1);

    let mut envelope = Vec::with_capacity(buckets);
    for i in 0..buckets {
        if i % check_every == 0 && cancel.load(Ordering::Relaxed) {
            return Err(PeaksError::Cancelled);
        }
        envelope.push(bucket(samples, i, window));
    }
    Ok(envelope)
}

#[inline]
fn bucket(samples: &[Sample], index: usize, window: usize) -> (Sample, Sample) {
    let len = samples.len();
    let start = (index * window).min(len);
    let end = ((index + 1) * window).min(len);

    // Entire window past the data: silence
    if start >= end {
        return (0.0, 0.0);
    }

    samples[start..end]
        .iter()
        .fold((Sample::INFINITY, Sample::NEG_INFINITY), |(min, max), &s| {
            (min.min(s), max.max(s))
        })
}
