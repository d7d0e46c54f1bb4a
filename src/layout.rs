//! Layout engine
//!
//! Arranges a document's pages on a 2-D plane. A layout pass is a pure
//! function of (page frames, strategy, spacing): identical inputs always
//! produce identical rects, and a failed pass publishes nothing.

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::geometry::{Rect, Size};

/// Page arrangement strategy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutStrategy {
    /// Pages stacked top to bottom, centered in the widest page
    ContinuousVertical,
    /// Same stacking geometry, but the controller jumps the viewport so a
    /// single page fills it at a time
    SinglePage,
    /// Pages paired side by side; `cover_offset = 1` gives the first page
    /// a row of its own
    FacingPages { cover_offset: usize },
    /// Fixed-column grid; row height follows the tallest page in the row
    Grid { columns: usize },
}

impl Default for LayoutStrategy {
    fn default() -> Self {
        Self::ContinuousVertical
    }
}

/// Layout pass failures
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("page {page} has invalid geometry ({width}x{height})")]
    InvalidGeometry {
        page: usize,
        width: f32,
        height: f32,
    },

    #[error("spacing {0} is not a finite non-negative value")]
    InvalidSpacing(f32),
}

/// One completed, immutable layout pass
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayoutResult {
    rects: Vec<Rect>,
    total_size: Size,
}

impl LayoutResult {
    #[must_use]
    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    #[must_use]
    pub fn rect(&self, page: usize) -> Option<Rect> {
        self.rects.get(page).copied()
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.rects.len()
    }

    /// Content size including nothing beyond the page bounding box
    #[must_use]
    pub fn total_size(&self) -> Size {
        self.total_size
    }

    /// Bounding box of all page rects; always within `total_size`
    #[must_use]
    pub fn bounding_box(&self) -> Rect {
        let mut iter = self.rects.iter();
        let Some(first) = iter.next() else {
            return Rect::default();
        };
        iter.fold(*first, |acc, r| acc.union(r))
    }
}

/// Run one layout pass.
///
/// Fails wholesale on the first invalid page frame; the caller keeps its
/// previously published [`LayoutResult`] in that case.
pub fn layout(
    doc: &Document,
    strategy: LayoutStrategy,
    spacing: f32,
) -> Result<LayoutResult, LayoutError> {
    if !spacing.is_finite() || spacing < 0.0 {
        return Err(LayoutError::InvalidSpacing(spacing));
    }

    let mut frames = Vec::with_capacity(doc.page_count());
    for (index, page) in doc.pages().enumerate() {
        let frame = page.frame_size();
        if !frame.is_valid() {
            return Err(LayoutError::InvalidGeometry {
                page: index,
                width: page.natural_size().width,
                height: page.natural_size().height,
            });
        }
        frames.push(frame);
    }

    if frames.is_empty() {
        return Ok(LayoutResult::default());
    }

    let result = match strategy {
        LayoutStrategy::ContinuousVertical | LayoutStrategy::SinglePage => {
            stack_vertical(&frames, spacing)
        }
        LayoutStrategy::FacingPages { cover_offset } => {
            facing_pages(&frames, spacing, cover_offset.min(1))
        }
        LayoutStrategy::Grid { columns } => grid(&frames, spacing, columns.max(1)),
    };

    log::trace!(
        "layout pass: {} pages, strategy {:?}, total {}x{}",
        frames.len(),
        strategy,
        result.total_size.width,
        result.total_size.height,
    );

    Ok(result)
}

fn stack_vertical(frames: &[Size], spacing: f32) -> LayoutResult {
    let max_width = frames.iter().fold(0.0f32, |w, f| w.max(f.width));

    let mut rects = Vec::with_capacity(frames.len());
    let mut y = 0.0f32;
    for (i, frame) in frames.iter().enumerate() {
        if i > 0 {
            y += spacing;
        }
        let x = (max_width - frame.width) / 2.0;
        rects.push(Rect::new(x, y, frame.width, frame.height));
        y += frame.height;
    }

    LayoutResult {
        rects,
        total_size: Size::new(max_width, y),
    }
}

fn facing_pages(frames: &[Size], spacing: f32, cover_offset: usize) -> LayoutResult {
    // Group into rows: optional lone cover, then pairs.
    let mut rows: Vec<&[Size]> = Vec::new();
    let mut start = 0;
    if cover_offset == 1 {
        rows.push(&frames[0..1]);
        start = 1;
    }
    while start < frames.len() {
        let end = (start + 2).min(frames.len());
        rows.push(&frames[start..end]);
        start = end;
    }

    let row_width = |row: &[Size]| -> f32 {
        row.iter().map(|f| f.width).sum::<f32>() + spacing * (row.len().saturating_sub(1)) as f32
    };
    let max_row_width = rows.iter().fold(0.0f32, |w, row| w.max(row_width(row)));

    let mut rects = Vec::with_capacity(frames.len());
    let mut y = 0.0f32;
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            y += spacing;
        }
        let row_height = row.iter().fold(0.0f32, |h, f| h.max(f.height));
        let mut x = (max_row_width - row_width(row)) / 2.0;
        for frame in *row {
            rects.push(Rect::new(x, y, frame.width, frame.height));
            x += frame.width + spacing;
        }
        y += row_height;
    }

    LayoutResult {
        rects,
        total_size: Size::new(max_row_width, y),
    }
}

fn grid(frames: &[Size], spacing: f32, columns: usize) -> LayoutResult {
    let cell_width = frames.iter().fold(0.0f32, |w, f| w.max(f.width));
    let used_columns = columns.min(frames.len());

    let mut rects = Vec::with_capacity(frames.len());
    let mut y = 0.0f32;
    for (row_index, row) in frames.chunks(columns).enumerate() {
        if row_index > 0 {
            y += spacing;
        }
        let row_height = row.iter().fold(0.0f32, |h, f| h.max(f.height));
        for (col, frame) in row.iter().enumerate() {
            let cell_x = col as f32 * (cell_width + spacing);
            let x = cell_x + (cell_width - frame.width) / 2.0;
            rects.push(Rect::new(x, y, frame.width, frame.height));
        }
        y += row_height;
    }

    let total_width =
        used_columns as f32 * cell_width + spacing * used_columns.saturating_sub(1) as f32;

    LayoutResult {
        rects,
        total_size: Size::new(total_width, y),
    }
}
