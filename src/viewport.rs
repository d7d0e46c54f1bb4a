//! Viewport state
//!
//! Scroll offset, visible size and zoom factor. Scroll is expressed in
//! zoomed (screen) coordinates; the mapper converts to document space.

use crate::geometry::{Point, Rect, Size};

/// The visible window into the laid-out document
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Scroll offset in zoomed coordinates
    pub scroll: Point,
    /// Visible size in screen units
    pub size: Size,
    /// Global zoom factor (1.0 = 100%)
    pub zoom: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            scroll: Point::default(),
            size: Size::default(),
            zoom: 1.0,
        }
    }
}

impl Viewport {
    /// Zoom-in multiplier per step
    pub const ZOOM_IN_RATE: f32 = 1.1;
    /// Zoom-out divisor per step
    pub const ZOOM_OUT_RATE: f32 = 1.1;
    /// Lowest allowed zoom factor
    pub const MIN_ZOOM: f32 = 0.1;
    /// Highest allowed zoom factor
    pub const MAX_ZOOM: f32 = 10.0;

    #[must_use]
    pub fn new(size: Size) -> Self {
        Self {
            scroll: Point::default(),
            size,
            zoom: 1.0,
        }
    }

    /// Zoom in by one step
    pub fn step_in(&mut self) {
        self.zoom = Self::clamp_zoom(self.zoom * Self::ZOOM_IN_RATE);
    }

    /// Zoom out by one step
    pub fn step_out(&mut self) {
        self.zoom = Self::clamp_zoom(self.zoom / Self::ZOOM_OUT_RATE);
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = Self::clamp_zoom(zoom);
    }

    pub fn scroll_by(&mut self, dx: f32, dy: f32) {
        self.scroll.x += dx;
        self.scroll.y += dy;
    }

    /// The visible rectangle in document coordinates
    #[must_use]
    pub fn document_rect(&self) -> Rect {
        Rect::new(
            self.scroll.x / self.zoom,
            self.scroll.y / self.zoom,
            self.size.width / self.zoom,
            self.size.height / self.zoom,
        )
    }

    /// Keep the scroll offset within the zoomed content bounds.
    /// Content smaller than the viewport pins to the origin.
    pub fn clamp_scroll(&mut self, content: Size) {
        let max_x = (content.width * self.zoom - self.size.width).max(0.0);
        let max_y = (content.height * self.zoom - self.size.height).max(0.0);
        self.scroll.x = self.scroll.x.clamp(0.0, max_x);
        self.scroll.y = self.scroll.y.clamp(0.0, max_y);
    }

    /// Clamp a zoom factor to the valid range, mapping NaN/Inf to 1.0
    #[must_use]
    pub fn clamp_zoom(zoom: f32) -> f32 {
        if !zoom.is_finite() {
            1.0
        } else {
            zoom.clamp(Self::MIN_ZOOM, Self::MAX_ZOOM)
        }
    }
}
