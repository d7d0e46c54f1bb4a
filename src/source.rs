//! Page source capability
//!
//! The engine never parses document formats itself. Anything that can
//! report page sizes and rasterize page regions (PDF backend, image
//! decoder, scan stack) plugs in through [`PageSource`].

use crate::geometry::{Rect, Rotation, Size};

/// Errors a page source can surface
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("page {page} does not exist")]
    NotFound { page: usize },

    #[error("page {page} is corrupt: {detail}")]
    Corrupt { page: usize, detail: String },

    #[error("I/O failure: {detail}")]
    Io { detail: String },
}

impl SourceError {
    pub fn corrupt(page: usize, detail: impl Into<String>) -> Self {
        Self::Corrupt {
            page,
            detail: detail.into(),
        }
    }

    pub fn io(detail: impl Into<String>) -> Self {
        Self::Io {
            detail: detail.into(),
        }
    }
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            detail: err.to_string(),
        }
    }
}

/// Raw rasterized output for one tile region.
///
/// RGB, 3 bytes per pixel, row-major, no padding.
#[derive(Clone)]
pub struct PixelBuffer {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl PixelBuffer {
    #[must_use]
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize * 3);
        Self {
            pixels,
            width,
            height,
        }
    }

    /// Uniform-color buffer. Handy for placeholders and synthetic sources.
    #[must_use]
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 3);
        for _ in 0..(width as usize * height as usize) {
            pixels.extend_from_slice(&rgb);
        }
        Self {
            pixels,
            width,
            height,
        }
    }

    /// Heap footprint, used for cache byte accounting
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Capability consumed by the render pipeline.
///
/// `render` receives the region in output pixels of the rotated page
/// rasterized at `scale`; the source clips the region to the page frame.
/// Implementations must tolerate concurrent calls for different pages;
/// the cache deduplicates concurrent requests for the same region.
pub trait PageSource: Send + Sync {
    fn page_count(&self) -> usize;

    /// Natural (unrotated, unscaled) page size in document units
    fn natural_size(&self, page: usize) -> Result<Size, SourceError>;

    fn render(
        &self,
        page: usize,
        region: Rect,
        scale: f32,
        rotation: Rotation,
    ) -> Result<PixelBuffer, SourceError>;
}

impl<S: PageSource + ?Sized> PageSource for std::sync::Arc<S> {
    fn page_count(&self) -> usize {
        (**self).page_count()
    }

    fn natural_size(&self, page: usize) -> Result<Size, SourceError> {
        (**self).natural_size(page)
    }

    fn render(
        &self,
        page: usize,
        region: Rect,
        scale: f32,
        rotation: Rotation,
    ) -> Result<PixelBuffer, SourceError> {
        (**self).render(page, region, scale, rotation)
    }
}
