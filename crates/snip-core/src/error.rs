//! Session-level error type
//!
//! Every module keeps its own error enum; the session wraps them so a
//! presentation layer handles one type.

use thiserror::Error;

use crate::audio_file::DecodeError;
use crate::playback::PlaybackError;
use crate::render::{EffectsError, ExportError};
use crate::timeline::TimelineError;
use crate::waveform::PeaksError;

/// Errors returned by [`crate::Session`]
#[derive(Error, Debug)]
pub enum SessionError {
    /// Operation needs a loaded clip
    #[error("No clip loaded")]
    NoClip,

    /// Session was torn down
    #[error("Session has been torn down")]
    TornDown,

    #[error(transparent)]
    Timeline(#[from] TimelineError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Peaks(#[from] PeaksError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error(transparent)]
    Effects(#[from] EffectsError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
