//! Snip configuration
//!
//! ```ignore
//! use snip_core::config::{default_config_path, load_config, SnipConfig};
//!
//! let config: SnipConfig = load_config(&default_config_path());
//! ```

mod io;

pub use io::{load_config, save_config};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::playback::DEFAULT_FADE_MS;
use crate::render::EffectsConfig;
use crate::waveform::ZoomLevel;

/// Config file name inside the config directory
pub const CONFIG_FILE_NAME: &str = "snip.yaml";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnipConfig {
    pub playback: PlaybackConfig,
    pub waveform: WaveformConfig,
    pub export: ExportConfig,
}

/// Live playback settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Fade length at region edges and on stop, in milliseconds
    /// Default: 1.0 ms
    pub fade_ms: f32,

    /// Capacity of the command queue to the audio thread
    /// Default: 64
    pub command_queue_capacity: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            fade_ms: DEFAULT_FADE_MS,
            command_queue_capacity: 64,
        }
    }
}

/// Waveform envelope settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveformConfig {
    /// Envelope worker threads
    /// Default: 2
    pub worker_threads: usize,

    /// Width of one waveform tile in pixels
    /// Default: 512
    pub tile_width_px: usize,

    /// Zoom level of a freshly loaded clip
    pub default_zoom: ZoomLevel,

    /// Frames scanned between cancellation checks
    /// Default: 65536
    pub chunk_frames: usize,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            tile_width_px: 512,
            default_zoom: ZoomLevel::DEFAULT,
            chunk_frames: 65_536,
        }
    }
}

/// Export settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Export worker threads
    /// Default: 1
    pub worker_threads: usize,

    /// Directory exports are written to (None = caller decides)
    pub output_dir: Option<PathBuf>,

    /// Effects applied when the caller does not pass any
    pub default_effects: EffectsConfig,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            worker_threads: 1,
            output_dir: None,
            default_effects: EffectsConfig::default(),
        }
    }
}

/// Default config file path
///
/// Returns: `{config dir}/snip/snip.yaml`, falling back to the working
/// directory when the platform has no config dir.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("snip")
        .join(CONFIG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_ends_with_file_name() {
        assert!(default_config_path().ends_with(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_defaults() {
        let config = SnipConfig::default();
        assert_eq!(config.playback.fade_ms, 1.0);
        assert_eq!(config.waveform.default_zoom, ZoomLevel::DEFAULT);
        assert_eq!(config.export.worker_threads, 1);
        assert!(config.export.default_effects.validate(44100).is_ok());
    }
}
