//! Geometry primitives for page layout
//!
//! All coordinates are f32 in abstract document units. Rects are
//! axis-aligned with a top-left origin, matching raster conventions.

use serde::{Deserialize, Serialize};

/// A point in document or viewport coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Width and height pair
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Size is usable for layout: strictly positive and finite
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }
}

/// Axis-aligned rectangle, top-left origin
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[must_use]
    pub fn from_size(size: Size) -> Self {
        Self::new(0.0, 0.0, size.width, size.height)
    }

    #[must_use]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Point containment, inclusive of the top/left edge, exclusive of
    /// bottom/right (adjacent pages never both claim a boundary point)
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
    }

    #[must_use]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    #[must_use]
    pub fn translated(&self, dx: f32, dy: f32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    #[must_use]
    pub fn scaled(&self, factor: f32) -> Rect {
        Rect::new(
            self.x * factor,
            self.y * factor,
            self.width * factor,
            self.height * factor,
        )
    }

    /// Smallest rect covering both
    #[must_use]
    pub fn union(&self, other: &Rect) -> Rect {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = self.right().max(other.right());
        let y1 = self.bottom().max(other.bottom());
        Rect::new(x0, y0, x1 - x0, y1 - y0)
    }
}

/// Page rotation in quarter turns, clockwise
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Parse from degrees; accepts any multiple of 90, normalized mod 360
    #[must_use]
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Self::Deg0),
            90 => Some(Self::Deg90),
            180 => Some(Self::Deg180),
            270 => Some(Self::Deg270),
            _ => None,
        }
    }

    #[must_use]
    pub const fn degrees(self) -> i32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Compose two rotations
    #[must_use]
    pub const fn plus(self, other: Rotation) -> Rotation {
        match (self.degrees() + other.degrees()) % 360 {
            90 => Self::Deg90,
            180 => Self::Deg180,
            270 => Self::Deg270,
            _ => Self::Deg0,
        }
    }

    /// 90 and 270 exchange the page's width and height for layout
    #[must_use]
    pub const fn swaps_axes(self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }

    /// Size of the rotated bounding frame for a page of `natural` size
    #[must_use]
    pub fn frame_size(self, natural: Size) -> Size {
        if self.swaps_axes() {
            Size::new(natural.height, natural.width)
        } else {
            natural
        }
    }

    /// Map a point in natural page coordinates into the rotated frame
    #[must_use]
    pub fn apply(self, p: Point, natural: Size) -> Point {
        match self {
            Self::Deg0 => p,
            Self::Deg90 => Point::new(natural.height - p.y, p.x),
            Self::Deg180 => Point::new(natural.width - p.x, natural.height - p.y),
            Self::Deg270 => Point::new(p.y, natural.width - p.x),
        }
    }

    /// Inverse of [`Rotation::apply`]
    #[must_use]
    pub fn unapply(self, p: Point, natural: Size) -> Point {
        match self {
            Self::Deg0 => p,
            Self::Deg90 => Point::new(p.y, natural.height - p.x),
            Self::Deg180 => Point::new(natural.width - p.x, natural.height - p.y),
            Self::Deg270 => Point::new(natural.width - p.y, p.x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROTATIONS: [Rotation; 4] = [
        Rotation::Deg0,
        Rotation::Deg90,
        Rotation::Deg180,
        Rotation::Deg270,
    ];

    #[test]
    fn rect_intersection_and_containment() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(50.0, 50.0, 100.0, 100.0);
        let c = Rect::new(200.0, 200.0, 10.0, 10.0);

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(a.contains(Point::new(0.0, 0.0)));
        assert!(!a.contains(Point::new(100.0, 100.0)));
    }

    #[test]
    fn rect_union_covers_both() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(20.0, 5.0, 10.0, 30.0);
        let u = a.union(&b);
        assert_eq!(u, Rect::new(0.0, 0.0, 30.0, 35.0));
    }

    #[test]
    fn rotation_degrees_round_trip() {
        for rot in ROTATIONS {
            assert_eq!(Rotation::from_degrees(rot.degrees()), Some(rot));
        }
        assert_eq!(Rotation::from_degrees(-90), Some(Rotation::Deg270));
        assert_eq!(Rotation::from_degrees(450), Some(Rotation::Deg90));
        assert_eq!(Rotation::from_degrees(45), None);
    }

    #[test]
    fn rotation_frame_size_swaps_axes() {
        let natural = Size::new(600.0, 800.0);
        assert_eq!(Rotation::Deg0.frame_size(natural), natural);
        assert_eq!(
            Rotation::Deg90.frame_size(natural),
            Size::new(800.0, 600.0)
        );
    }

    #[test]
    fn rotation_apply_unapply_round_trips() {
        let natural = Size::new(600.0, 800.0);
        let points = [
            Point::new(0.0, 0.0),
            Point::new(600.0, 800.0),
            Point::new(123.5, 456.25),
        ];

        for rot in ROTATIONS {
            for p in points {
                let mapped = rot.apply(p, natural);
                let back = rot.unapply(mapped, natural);
                assert!((back.x - p.x).abs() < 1e-4, "{rot:?} x: {back:?} vs {p:?}");
                assert!((back.y - p.y).abs() < 1e-4, "{rot:?} y: {back:?} vs {p:?}");
            }
        }
    }

    #[test]
    fn rotation_90_maps_origin_to_top_right() {
        let natural = Size::new(600.0, 800.0);
        let mapped = Rotation::Deg90.apply(Point::new(0.0, 0.0), natural);
        // Clockwise quarter turn: the natural top-left lands at the
        // rotated frame's top-right corner.
        assert_eq!(mapped, Point::new(800.0, 0.0));
    }
}
