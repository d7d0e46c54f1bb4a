//! Synthetic page sources for tests and examples

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::geometry::{Rect, Rotation, Size};
use crate::source::{PageSource, PixelBuffer, SourceError};

/// A page source that renders uniform-color tiles.
///
/// Pages can be marked as failing, and an artificial render delay can be
/// set to exercise scheduling and cancellation paths.
pub struct SolidSource {
    sizes: Vec<Size>,
    failing: HashSet<usize>,
    delay: Option<Duration>,
    page_delays: HashMap<usize, Duration>,
    rgb: [u8; 3],
    render_calls: AtomicUsize,
}

impl SolidSource {
    #[must_use]
    pub fn new(sizes: Vec<(f32, f32)>) -> Self {
        Self {
            sizes: sizes.into_iter().map(|(w, h)| Size::new(w, h)).collect(),
            failing: HashSet::new(),
            delay: None,
            page_delays: HashMap::new(),
            rgb: [240, 240, 240],
            render_calls: AtomicUsize::new(0),
        }
    }

    /// Make a page's render calls fail with a corrupt-page error
    pub fn fail_page(&mut self, page: usize) {
        self.failing.insert(page);
    }

    /// Sleep this long inside every render call
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = Some(delay);
    }

    /// Sleep this long when rendering one specific page, overriding the
    /// global delay
    pub fn set_page_delay(&mut self, page: usize, delay: Duration) {
        self.page_delays.insert(page, delay);
    }

    /// How many times `render` has been invoked
    #[must_use]
    pub fn render_calls(&self) -> usize {
        self.render_calls.load(Ordering::SeqCst)
    }
}

impl PageSource for SolidSource {
    fn page_count(&self) -> usize {
        self.sizes.len()
    }

    fn natural_size(&self, page: usize) -> Result<Size, SourceError> {
        self.sizes
            .get(page)
            .copied()
            .ok_or(SourceError::NotFound { page })
    }

    fn render(
        &self,
        page: usize,
        region: Rect,
        scale: f32,
        rotation: Rotation,
    ) -> Result<PixelBuffer, SourceError> {
        self.render_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.page_delays.get(&page).copied().or(self.delay) {
            std::thread::sleep(delay);
        }

        if self.failing.contains(&page) {
            return Err(SourceError::corrupt(page, "synthetic failure"));
        }

        let natural = self.natural_size(page)?;
        let frame = rotation.frame_size(natural);
        let frame_px = (frame.width * scale, frame.height * scale);

        let width = region.width.min(frame_px.0 - region.x).max(0.0);
        let height = region.height.min(frame_px.1 - region.y).max(0.0);
        if width <= 0.0 || height <= 0.0 {
            return Err(SourceError::corrupt(page, "region outside page frame"));
        }

        Ok(PixelBuffer::solid(
            width.ceil() as u32,
            height.ceil() as u32,
            self.rgb,
        ))
    }
}
