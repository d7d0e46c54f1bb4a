//! Render request and response types

use std::sync::Arc;

use crate::document::Generation;
use crate::geometry::{Rect, Rotation};
use crate::source::{PixelBuffer, SourceError};

/// Unique identifier for render requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Cache key for one rasterized tile.
///
/// Scale is stored in millionths for stable hashing. Two keys differing
/// only in tile coordinates are distinct entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// Page number
    pub page: usize,
    /// Effective render scale (page scale x viewport zoom) in millionths
    pub scale_millionths: u32,
    /// Page rotation baked into the raster
    pub rotation: Rotation,
    /// Tile column in the page's tile grid
    pub col: u32,
    /// Tile row in the page's tile grid
    pub row: u32,
}

impl TileKey {
    #[must_use]
    pub fn new(page: usize, scale: f32, rotation: Rotation, col: u32, row: u32) -> Self {
        Self {
            page,
            scale_millionths: (scale * 1_000_000.0) as u32,
            rotation,
            col,
            row,
        }
    }

    /// Effective render scale as a float
    #[must_use]
    pub fn scale(&self) -> f32 {
        self.scale_millionths as f32 / 1_000_000.0
    }
}

/// Pixel region of a tile within the rotated page frame, clipped to the
/// frame bounds. Returns `None` for tiles entirely off the page.
#[must_use]
pub fn tile_region(key: &TileKey, frame_px: (f32, f32), tile_size: u32) -> Option<Rect> {
    let tile = tile_size as f32;
    let x = key.col as f32 * tile;
    let y = key.row as f32 * tile;
    if x >= frame_px.0 || y >= frame_px.1 {
        return None;
    }
    let width = tile.min(frame_px.0 - x);
    let height = tile.min(frame_px.1 - y);
    Some(Rect::new(x, y, width, height))
}

/// Tile grid coordinates covering a pixel rect of the page frame
#[must_use]
pub fn tiles_covering(rect_px: Rect, frame_px: (f32, f32), tile_size: u32) -> Vec<(u32, u32)> {
    let tile = tile_size as f32;
    let x0 = rect_px.x.max(0.0);
    let y0 = rect_px.y.max(0.0);
    let x1 = rect_px.right().min(frame_px.0);
    let y1 = rect_px.bottom().min(frame_px.1);
    if x0 >= x1 || y0 >= y1 {
        return Vec::new();
    }

    let col0 = (x0 / tile) as u32;
    let row0 = (y0 / tile) as u32;
    // ceil-minus-one keeps an edge exactly on a tile boundary out of the
    // next tile
    let col1 = ((x1 / tile).ceil() as u32).saturating_sub(1).max(col0);
    let row1 = ((y1 / tile).ceil() as u32).saturating_sub(1).max(row0);

    let mut tiles = Vec::with_capacity(((col1 - col0 + 1) * (row1 - row0 + 1)) as usize);
    for row in row0..=row1 {
        for col in col0..=col1 {
            tiles.push((col, row));
        }
    }
    tiles
}

/// Errors from render workers
#[derive(Debug, thiserror::Error)]
pub enum RenderFault {
    #[error("source: {0}")]
    Source(#[from] SourceError),

    #[error("{detail}")]
    Generic { detail: String },
}

impl RenderFault {
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic { detail: msg.into() }
    }
}

/// One unit of work handed to a worker
#[derive(Debug)]
pub struct RenderJob {
    pub id: RequestId,
    pub key: TileKey,
    /// Pixel region within the rotated page frame
    pub region: Rect,
    /// Page generation at dispatch time, stamped into the cache entry
    pub generation: Generation,
    pub cancel: super::cancel::CancelToken,
}

/// Messages on the worker request channel
#[derive(Debug)]
pub enum WorkerMessage {
    Render(RenderJob),
    Shutdown,
}

/// Response from render workers
#[derive(Debug)]
pub enum RenderResponse {
    /// Tile rendered (or satisfied from cache by the worker)
    Tile {
        id: RequestId,
        key: TileKey,
        tile: Arc<PixelBuffer>,
    },

    /// Render failed; the fault is also cached with a short TTL
    Failed {
        id: RequestId,
        key: TileKey,
        fault: Arc<RenderFault>,
    },

    /// Request was cancelled before or during rendering
    Cancelled { id: RequestId, key: TileKey },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_key_scale_round_trips() {
        let key = TileKey::new(3, 1.5, Rotation::Deg90, 2, 4);
        assert!((key.scale() - 1.5).abs() < 1e-5);
        assert_eq!(key.scale_millionths, 1_500_000);
    }

    #[test]
    fn keys_differing_in_tile_are_distinct() {
        let a = TileKey::new(0, 1.0, Rotation::Deg0, 0, 0);
        let b = TileKey::new(0, 1.0, Rotation::Deg0, 1, 0);
        assert_ne!(a, b);
    }

    #[test]
    fn tile_region_clips_to_frame() {
        let key = TileKey::new(0, 1.0, Rotation::Deg0, 2, 1);
        let region = tile_region(&key, (600.0, 500.0), 256).unwrap();
        assert_eq!(region, Rect::new(512.0, 256.0, 88.0, 244.0));

        let off = TileKey::new(0, 1.0, Rotation::Deg0, 3, 0);
        assert!(tile_region(&off, (600.0, 500.0), 256).is_none());
    }

    #[test]
    fn tiles_covering_spans_the_rect() {
        let tiles = tiles_covering(
            Rect::new(200.0, 200.0, 400.0, 120.0),
            (600.0, 500.0),
            256,
        );
        assert_eq!(tiles, vec![(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1)]);
    }

    #[test]
    fn tiles_covering_empty_outside_frame() {
        let tiles = tiles_covering(Rect::new(700.0, 0.0, 100.0, 100.0), (600.0, 500.0), 256);
        assert!(tiles.is_empty());
    }
}
