//! Click-free region playback
//!
//! - [`scheduler`]: control-thread state machine (Idle / Playing)
//! - [`transport`]: audio-thread processor, command queue and atomics
//! - [`voice`]: one region with its gain envelope
//! - [`fade`]: linear gain ramps shared with the export fade stage
//! - [`offline`]: deterministic pull-based output
//! - `cpal_backend`: live output on the default device (feature `cpal-backend`)

pub mod fade;
pub mod offline;
pub mod scheduler;
pub mod transport;
pub mod voice;

#[cfg(feature = "cpal-backend")]
pub mod cpal_backend;

pub use fade::{apply_fades, fade_frames, GainRamp, DEFAULT_FADE_MS};
pub use offline::OfflineOutput;
pub use scheduler::{PlaybackScheduler, PlaybackState};
pub use transport::{TransportAtomics, TransportCommand, TransportProcessor};

#[cfg(feature = "cpal-backend")]
pub use cpal_backend::CpalOutput;

use thiserror::Error;

/// Errors raised when scheduling playback
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    /// Region maps to zero frames of the clip
    #[error("Region [{start}, {end}) contains no audio frames")]
    EmptyRegion { start: f64, end: f64 },

    /// Command queue to the audio thread is full
    #[error("Playback command queue full")]
    QueueFull,

    /// The audio-thread processor has been dropped
    #[error("Playback output disconnected")]
    Disconnected,
}

/// Result type for playback scheduling
pub type PlaybackResult<T> = Result<T, PlaybackError>;

/// Errors that can occur while opening an output device
#[derive(Error, Debug)]
pub enum AudioError {
    /// No audio devices available
    #[error("No audio output devices found")]
    NoDevices,

    /// Failed to get device configuration
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// Unsupported sample format
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// Failed to build audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),
}

/// Result type for audio device operations
pub type AudioResult<T> = Result<T, AudioError>;
