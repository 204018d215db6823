//! Waveform envelopes
//!
//! - [`peaks`]: min/max bucket downsampling
//! - [`zoom`]: zoom levels, tile and viewport geometry
//! - [`peaks_computer`]: bounded worker pool with per-element cancellation

pub mod peaks;
pub mod peaks_computer;
pub mod zoom;

pub use peaks::{compute_envelope, window_size, Envelope};
pub use peaks_computer::{
    CachedEnvelope, PeaksComputer, PeaksRequest, PeaksTicket, TileOutcome, TileUpdate,
    WaveformCache,
};
pub use zoom::{tile, tile_count, tile_span, Tile, Viewport, ZoomLevel};

use thiserror::Error;

/// Errors raised while computing envelopes
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PeaksError {
    /// A newer request for the same element superseded this one
    #[error("Envelope computation cancelled")]
    Cancelled,

    /// The worker pool could not be created
    #[error("Waveform worker pool unavailable: {0}")]
    PoolUnavailable(String),

    /// Requested channel does not exist in the clip
    #[error("Channel {channel} out of range (clip has {channels} channels)")]
    ChannelOutOfRange { channel: usize, channels: usize },

    /// Requested frame range lies outside the clip
    #[error("Frame range {start}..{end} outside clip of {frames} frames")]
    RangeOutOfBounds { start: usize, end: usize, frames: usize },

    /// Zoom level is not a power of two in [1, 1024]
    #[error("Invalid zoom level {0} (expected a power of two between 1 and 1024)")]
    InvalidZoom(u32),
}

/// Result type for envelope operations
pub type PeaksResult<T> = Result<T, PeaksError>;
