//! Offline rendering and export
//!
//! - [`effects`]: effects parameters and validation
//! - [`chain`]: the effect trait and the filter, compressor, gain and fade stages
//! - [`renderer`]: rate change plus the chain, producing planar audio
//! - [`encode`]: deterministic 16-bit WAV bytes and content-addressed names
//! - [`service`]: background export on a worker pool

pub mod chain;
pub mod effects;
pub mod encode;
pub mod renderer;
pub mod service;

pub use effects::{nyquist, EffectsConfig};
pub use encode::{content_name, encode_wav, export_region, ExportedFile};
pub use renderer::{output_frames, render_region, RenderedAudio, MAX_RENDER_FRAMES};
pub use service::{ExportHandle, ExportService};

use thiserror::Error;

/// An effects parameter outside its accepted range
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EffectsError {
    #[error("Invalid effects parameter `{field}` = {value}: {reason}")]
    InvalidParameter {
        field: &'static str,
        value: f32,
        reason: &'static str,
    },
}

/// Result type for effects validation
pub type EffectsResult<T> = Result<T, EffectsError>;

/// Errors raised while rendering a region
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// Effects configuration rejected before rendering started
    #[error(transparent)]
    InvalidEffects(#[from] EffectsError),

    /// Region maps to zero output frames
    #[error("Region [{start}, {end}) contains no audio frames")]
    EmptyRegion { start: f64, end: f64 },

    /// The output buffer could not be allocated
    #[error("Cannot allocate {frames} frames × {channels} channels for rendering")]
    OutOfMemory { frames: usize, channels: usize },
}

/// Result type for rendering
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors raised while encoding rendered audio
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("WAV encoding failed: {0}")]
    Wav(#[from] hound::Error),
}

/// Result type for encoding
pub type EncodeResult<T> = Result<T, EncodeError>;

/// Errors reported by an export
///
/// Invalid parameters are kept apart from rendering failures so callers
/// can point at the offending field.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    InvalidEffects(EffectsError),

    #[error("Render failed: {0}")]
    Render(RenderError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The worker dropped the job without reporting
    #[error("Export worker stopped before finishing")]
    WorkerGone,

    /// The worker pool could not be created
    #[error("Export worker pool unavailable: {0}")]
    PoolUnavailable(String),
}

impl From<EffectsError> for ExportError {
    fn from(err: EffectsError) -> Self {
        ExportError::InvalidEffects(err)
    }
}

impl From<RenderError> for ExportError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::InvalidEffects(err) => ExportError::InvalidEffects(err),
            other => ExportError::Render(other),
        }
    }
}

/// Result type for exports
pub type ExportResult<T> = Result<T, ExportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_error_keeps_invalid_parameters_distinct() {
        let invalid = EffectsError::InvalidParameter {
            field: "gain",
            value: -1.0,
            reason: "must be >= 0 and <= 16",
        };
        let export: ExportError = RenderError::from(invalid).into();
        assert!(matches!(export, ExportError::InvalidEffects(EffectsError::InvalidParameter { field: "gain", .. })));

        let export: ExportError = RenderError::EmptyRegion { start: 0.5, end: 0.5 }.into();
        assert!(matches!(export, ExportError::Render(RenderError::EmptyRegion { .. })));
    }
}
