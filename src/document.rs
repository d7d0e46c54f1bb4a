//! Document and page entities
//!
//! A [`Document`] owns the ordered page sequence plus a per-page
//! generation stamp. The stamp moves forward on every rotation or scale
//! change, which is what invalidates cached tiles for that page.

use crate::geometry::{Rotation, Size};
use crate::source::{PageSource, SourceError};

/// Monotonic version marker for a page's (rotation, scale) state
pub type Generation = u64;

/// One unit of paginated content
#[derive(Clone, Debug)]
pub struct Page {
    natural_size: Size,
    rotation: Rotation,
    scale: f32,
}

impl Page {
    /// Lowest accepted per-page scale
    pub const MIN_SCALE: f32 = 0.01;
    /// Highest accepted per-page scale. Bounded so the effective render
    /// scale (page scale x viewport zoom) always fits the cache key's
    /// millionths encoding.
    pub const MAX_SCALE: f32 = 100.0;

    #[must_use]
    pub fn new(natural_size: Size) -> Self {
        Self {
            natural_size,
            rotation: Rotation::Deg0,
            scale: 1.0,
        }
    }

    /// Size in document units, fixed at load
    #[must_use]
    pub fn natural_size(&self) -> Size {
        self.natural_size
    }

    #[must_use]
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Per-page zoom factor, multiplied with the viewport zoom at render time
    #[must_use]
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Rotated and scaled footprint used by the layout engine
    #[must_use]
    pub fn frame_size(&self) -> Size {
        let frame = self.rotation.frame_size(self.natural_size);
        Size::new(frame.width * self.scale, frame.height * self.scale)
    }
}

/// Ordered page sequence with generation tracking
///
/// All rotation/scale mutation goes through the document so the
/// generation stamps can never drift from page state.
#[derive(Clone, Debug, Default)]
pub struct Document {
    pages: Vec<Page>,
    generations: Vec<Generation>,
}

impl Document {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document by querying a source for every page's natural size
    pub fn from_source<S: PageSource + ?Sized>(source: &S) -> Result<Self, SourceError> {
        let count = source.page_count();
        let mut doc = Self::new();
        for page in 0..count {
            doc.push_page(source.natural_size(page)?);
        }
        Ok(doc)
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    #[must_use]
    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.pages.iter()
    }

    #[must_use]
    pub fn generation(&self, index: usize) -> Generation {
        self.generations.get(index).copied().unwrap_or(0)
    }

    pub fn push_page(&mut self, natural_size: Size) {
        self.pages.push(Page::new(natural_size));
        self.generations.push(0);
    }

    /// Insert a page at `index`, shifting later pages
    pub fn insert_page(&mut self, index: usize, natural_size: Size) {
        let index = index.min(self.pages.len());
        self.pages.insert(index, Page::new(natural_size));
        self.generations.insert(index, 0);
    }

    pub fn remove_page(&mut self, index: usize) -> Option<Page> {
        if index >= self.pages.len() {
            return None;
        }
        self.generations.remove(index);
        Some(self.pages.remove(index))
    }

    /// Reorder a page, keeping its generation stamp attached
    pub fn move_page(&mut self, from: usize, to: usize) -> bool {
        if from >= self.pages.len() || to >= self.pages.len() {
            return false;
        }
        let page = self.pages.remove(from);
        let generation = self.generations.remove(from);
        self.pages.insert(to, page);
        self.generations.insert(to, generation);
        true
    }

    /// Set a page's rotation; bumps its generation when it changes
    pub fn rotate_page(&mut self, index: usize, rotation: Rotation) -> bool {
        let Some(page) = self.pages.get_mut(index) else {
            return false;
        };
        if page.rotation == rotation {
            return false;
        }
        page.rotation = rotation;
        self.generations[index] += 1;
        true
    }

    /// Rotate every page by the given amount relative to its current rotation
    pub fn rotate_all_by(&mut self, rotation: Rotation) {
        if rotation == Rotation::Deg0 {
            return;
        }
        for (page, generation) in self.pages.iter_mut().zip(self.generations.iter_mut()) {
            page.rotation = page.rotation.plus(rotation);
            *generation += 1;
        }
    }

    /// Set a page's zoom scale; bumps its generation when it changes.
    /// Non-finite or non-positive scales are ignored; valid scales are
    /// clamped to [`Page::MIN_SCALE`]..=[`Page::MAX_SCALE`].
    pub fn set_page_scale(&mut self, index: usize, scale: f32) -> bool {
        if !scale.is_finite() || scale <= 0.0 {
            return false;
        }
        let scale = scale.clamp(Page::MIN_SCALE, Page::MAX_SCALE);
        let Some(page) = self.pages.get_mut(index) else {
            return false;
        };
        if (page.scale - scale).abs() <= f32::EPSILON {
            return false;
        }
        page.scale = scale;
        self.generations[index] += 1;
        true
    }

    /// Bump every page's generation. Used when a global parameter that
    /// feeds the render resolution (viewport zoom) changes.
    pub fn bump_all_generations(&mut self) {
        for generation in &mut self.generations {
            *generation += 1;
        }
    }
}
