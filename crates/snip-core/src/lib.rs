//! Snip Core - Region timeline, waveform envelopes, playback and export
//!
//! ```text
//!   AudioDecoder ──► Clip (Arc) ──┬──► Timeline (breakpoints → regions)
//!                                 ├──► PeaksComputer (rayon pool) ──► WaveformCache
//!                                 ├──► PlaybackScheduler ──rtrb──► TransportProcessor ──► output
//!                                 └──► Renderer ──► encode_wav ──► <sha256>.wav
//! ```
//!
//! [`session::Session`] ties the pieces together and is the only surface a
//! presentation layer needs.

pub mod audio_file;
pub mod clip;
pub mod config;
pub mod error;
pub mod playback;
pub mod render;
pub mod session;
pub mod timeline;
pub mod types;
pub mod waveform;

pub use clip::Clip;
pub use error::{SessionError, SessionResult};
pub use session::{Session, SessionEvent};
pub use timeline::{Region, Timeline};
pub use types::*;
