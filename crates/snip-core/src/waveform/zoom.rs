//! Zoom levels and tile geometry
//!
//! A waveform view is drawn as fixed-width tiles. At zoom `spp` (samples
//! per pixel) a tile of `width_px` pixels spans `width_px * spp` frames and
//! holds one envelope bucket per pixel:
//!
//! ```text
//!   frames:  0        span      2·span     3·span   total
//!            │ tile 0  │ tile 1  │ tile 2  │ tile 3 │
//! ```
//!
//! The last tile is usually partial and gets fewer buckets.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::PeaksError;

/// Samples per pixel, a power of two in `[1, 1024]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct ZoomLevel(u32);

impl ZoomLevel {
    /// Most detailed level (one sample per pixel)
    pub const MIN: ZoomLevel = ZoomLevel(1);
    /// Least detailed level
    pub const MAX: ZoomLevel = ZoomLevel(1024);
    /// Level used for a freshly loaded clip
    pub const DEFAULT: ZoomLevel = ZoomLevel(64);

    /// Create a zoom level, rejecting values that are not a power of two
    /// within bounds
    pub fn new(samples_per_pixel: u32) -> Result<Self, PeaksError> {
        if samples_per_pixel.is_power_of_two()
            && (Self::MIN.0..=Self::MAX.0).contains(&samples_per_pixel)
        {
            Ok(Self(samples_per_pixel))
        } else {
            Err(PeaksError::InvalidZoom(samples_per_pixel))
        }
    }

    /// Samples represented by one pixel column
    pub fn samples_per_pixel(self) -> u32 {
        self.0
    }

    /// Halve samples per pixel, saturating at [`ZoomLevel::MIN`]
    pub fn zoom_in(self) -> Self {
        Self((self.0 / 2).max(Self::MIN.0))
    }

    /// Double samples per pixel, saturating at [`ZoomLevel::MAX`]
    pub fn zoom_out(self) -> Self {
        Self((self.0 * 2).min(Self::MAX.0))
    }
}

impl Default for ZoomLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u32> for ZoomLevel {
    type Error = PeaksError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ZoomLevel> for u32 {
    fn from(zoom: ZoomLevel) -> Self {
        zoom.0
    }
}

/// Frame span and bucket count of one waveform tile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    /// Tile index from the start of the clip
    pub index: usize,
    /// Frames covered, clamped to the clip
    pub frames: Range<usize>,
    /// Envelope buckets (pixel columns) for this tile
    pub buckets: usize,
}

/// Frames spanned by a full tile
pub fn tile_span(width_px: usize, zoom: ZoomLevel) -> usize {
    width_px * zoom.samples_per_pixel() as usize
}

/// Number of tiles needed to cover `total_frames`
pub fn tile_count(total_frames: usize, width_px: usize, zoom: ZoomLevel) -> usize {
    let span = tile_span(width_px, zoom);
    if span == 0 {
        return 0;
    }
    total_frames.div_ceil(span)
}

/// Geometry of tile `index`, or `None` past the end of the clip
pub fn tile(index: usize, width_px: usize, zoom: ZoomLevel, total_frames: usize) -> Option<Tile> {
    let span = tile_span(width_px, zoom);
    let start = index.checked_mul(span)?;
    if span == 0 || start >= total_frames {
        return None;
    }
    let end = (start + span).min(total_frames);
    let spp = zoom.samples_per_pixel() as usize;
    Some(Tile {
        index,
        frames: start..end,
        buckets: (end - start).div_ceil(spp),
    })
}

/// Visible window of a scrolling waveform view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Left edge as a normalized timeline position
    pub scroll: f64,
    /// Visible width in pixels
    pub width_px: usize,
}

impl Viewport {
    /// Tiles overlapping this viewport
    pub fn visible_tiles(
        &self,
        total_frames: usize,
        tile_width_px: usize,
        zoom: ZoomLevel,
    ) -> Range<usize> {
        let span = tile_span(tile_width_px, zoom);
        let count = tile_count(total_frames, tile_width_px, zoom);
        if span == 0 || count == 0 {
            return 0..0;
        }

        let scroll = if self.scroll.is_finite() { self.scroll.clamp(0.0, 1.0) } else { 0.0 };
        let first_frame = (scroll * total_frames as f64).round() as usize;
        let visible_frames = self.width_px * zoom.samples_per_pixel() as usize;

        let first = (first_frame / span).min(count);
        let last = (first_frame + visible_frames).div_ceil(span).min(count);
        first..last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_bounds() {
        assert!(ZoomLevel::new(0).is_err());
        assert!(ZoomLevel::new(3).is_err());
        assert!(ZoomLevel::new(2048).is_err());
        assert_eq!(ZoomLevel::new(256).unwrap().samples_per_pixel(), 256);

        assert_eq!(ZoomLevel::MIN.zoom_in(), ZoomLevel::MIN);
        assert_eq!(ZoomLevel::MAX.zoom_out(), ZoomLevel::MAX);
        assert_eq!(ZoomLevel::DEFAULT.zoom_in().samples_per_pixel(), 32);
        assert_eq!(ZoomLevel::DEFAULT.zoom_out().samples_per_pixel(), 128);
    }

    #[test]
    fn test_zoom_yaml_rejects_non_power_of_two() {
        assert!(serde_yaml::from_str::<ZoomLevel>("48").is_err());
        assert_eq!(serde_yaml::from_str::<ZoomLevel>("512").unwrap().samples_per_pixel(), 512);
    }

    #[test]
    fn test_tile_geometry() {
        let zoom = ZoomLevel::new(4).unwrap();
        // span = 400 frames
        assert_eq!(tile_count(1000, 100, zoom), 3);

        let last = tile(2, 100, zoom, 1000).unwrap();
        assert_eq!(last.frames, 800..1000);
        assert_eq!(last.buckets, 50);

        let partial_pixel = tile(0, 100, zoom, 10).unwrap();
        assert_eq!(partial_pixel.buckets, 3);

        assert!(tile(3, 100, zoom, 1000).is_none());
    }

    #[test]
    fn test_viewport_tiles() {
        let zoom = ZoomLevel::new(1).unwrap();
        let viewport = Viewport { scroll: 0.5, width_px: 150 };
        // 1000 frames, tiles of 100: visible frames 500..650
        assert_eq!(viewport.visible_tiles(1000, 100, zoom), 5..7);

        let at_end = Viewport { scroll: 1.0, width_px: 150 };
        assert_eq!(at_end.visible_tiles(1000, 100, zoom), 10..10);
    }
}
