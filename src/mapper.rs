//! Coordinate mapping between viewport and document space
//!
//! Built from one completed layout pass. Local page coordinates are
//! always natural (unrotated, unscaled) page units, so rotation and
//! scale invert exactly on the round trip.

use crate::document::Document;
use crate::geometry::{Point, Rect, Rotation, Size};
use crate::layout::LayoutResult;
use crate::rects::RectIndex;
use crate::viewport::Viewport;

#[derive(Clone, Copy, Debug)]
struct PageGeom {
    natural: Size,
    rotation: Rotation,
    scale: f32,
}

/// Maps viewport points to (page, natural local point) and back
#[derive(Clone, Debug, Default)]
pub struct CoordinateMapper {
    pages: Vec<PageGeom>,
    rects: Vec<Rect>,
    index: RectIndex,
}

impl CoordinateMapper {
    /// Snapshot the document geometry against a completed layout pass.
    /// The mapper owns its data: a later (failed or in-flight) layout
    /// pass cannot skew answers from this one.
    #[must_use]
    pub fn new(doc: &Document, layout: &LayoutResult) -> Self {
        debug_assert_eq!(doc.page_count(), layout.page_count());
        let pages = doc
            .pages()
            .map(|p| PageGeom {
                natural: p.natural_size(),
                rotation: p.rotation(),
                scale: p.scale(),
            })
            .collect();
        Self {
            pages,
            rects: layout.rects().to_vec(),
            index: RectIndex::new(layout.rects()),
        }
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.rects.len()
    }

    /// Map a viewport point to the page under it plus the natural-page
    /// local point. `None` over inter-page spacing or outside the content.
    #[must_use]
    pub fn viewport_to_document(&self, vp: &Viewport, point: Point) -> Option<(usize, Point)> {
        let doc_pt = Point::new(
            (point.x + vp.scroll.x) / vp.zoom,
            (point.y + vp.scroll.y) / vp.zoom,
        );

        let page = self.index.at(doc_pt).into_iter().next()?;
        let geom = self.pages[page];
        let rect = self.rects[page];

        let rotated = Point::new(
            (doc_pt.x - rect.x) / geom.scale,
            (doc_pt.y - rect.y) / geom.scale,
        );
        let local = geom.rotation.unapply(rotated, geom.natural);
        Some((page, local))
    }

    /// Map a natural-page local point to viewport coordinates
    #[must_use]
    pub fn document_to_viewport(&self, vp: &Viewport, page: usize, local: Point) -> Option<Point> {
        let geom = self.pages.get(page)?;
        let rect = self.rects.get(page)?;

        let rotated = geom.rotation.apply(local, geom.natural);
        let doc_pt = Point::new(
            rect.x + rotated.x * geom.scale,
            rect.y + rotated.y * geom.scale,
        );
        Some(Point::new(
            doc_pt.x * vp.zoom - vp.scroll.x,
            doc_pt.y * vp.zoom - vp.scroll.y,
        ))
    }

    /// Pages whose rect intersects the viewport, in page order
    #[must_use]
    pub fn visible_pages(&self, vp: &Viewport) -> Vec<usize> {
        self.index.intersecting(&vp.document_rect())
    }

    /// A page's rect in viewport coordinates
    #[must_use]
    pub fn page_view_rect(&self, vp: &Viewport, page: usize) -> Option<Rect> {
        let rect = self.rects.get(page)?;
        Some(
            rect.scaled(vp.zoom)
                .translated(-vp.scroll.x, -vp.scroll.y),
        )
    }

    /// A page's rect in document coordinates
    #[must_use]
    pub fn page_rect(&self, page: usize) -> Option<Rect> {
        self.rects.get(page).copied()
    }

    /// Page closest to a viewport point, even when the point is over a
    /// gutter. Used for snap-to-page navigation.
    #[must_use]
    pub fn nearest_page(&self, vp: &Viewport, point: Point) -> Option<usize> {
        let doc_pt = Point::new(
            (point.x + vp.scroll.x) / vp.zoom,
            (point.y + vp.scroll.y) / vp.zoom,
        );
        self.index.nearest(doc_pt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{LayoutStrategy, layout};

    fn mapper_with_rotations() -> (CoordinateMapper, Document) {
        let mut doc = Document::new();
        doc.push_page(Size::new(600.0, 800.0));
        doc.push_page(Size::new(600.0, 800.0));
        doc.push_page(Size::new(600.0, 1000.0));
        doc.rotate_page(1, Rotation::Deg90);
        doc.set_page_scale(2, 1.5);

        let result = layout(&doc, LayoutStrategy::ContinuousVertical, 10.0).unwrap();
        (CoordinateMapper::new(&doc, &result), doc)
    }

    #[test]
    fn round_trip_across_rotations_and_scales() {
        let rotations = [
            Rotation::Deg0,
            Rotation::Deg90,
            Rotation::Deg180,
            Rotation::Deg270,
        ];
        let scales = [0.25f32, 1.0, 3.5, 10.0];

        for rotation in rotations {
            for scale in scales {
                let mut doc = Document::new();
                doc.push_page(Size::new(600.0, 800.0));
                doc.rotate_page(0, rotation);
                doc.set_page_scale(0, scale);

                let result = layout(&doc, LayoutStrategy::ContinuousVertical, 0.0).unwrap();
                let mapper = CoordinateMapper::new(&doc, &result);
                let mut vp = Viewport::new(Size::new(400.0, 300.0));
                vp.set_zoom(1.75);
                vp.scroll = Point::new(13.0, 27.0);

                let local = Point::new(150.0, 220.0);
                let view = mapper.document_to_viewport(&vp, 0, local).unwrap();
                let (page, back) = mapper.viewport_to_document(&vp, view).unwrap();

                assert_eq!(page, 0);
                assert!(
                    (back.x - local.x).abs() < 1e-2 && (back.y - local.y).abs() < 1e-2,
                    "rotation {rotation:?} scale {scale}: {back:?} vs {local:?}",
                );
            }
        }
    }

    #[test]
    fn gutter_maps_to_none() {
        let (mapper, _doc) = mapper_with_rotations();
        let vp = Viewport::new(Size::new(900.0, 3000.0));

        // Page 0 is 800 tall, the gutter spans y in [800, 810)
        assert!(mapper
            .viewport_to_document(&vp, Point::new(400.0, 805.0))
            .is_none());
    }

    #[test]
    fn visible_pages_follow_scroll() {
        let (mapper, _doc) = mapper_with_rotations();
        let mut vp = Viewport::new(Size::new(900.0, 700.0));

        assert_eq!(mapper.visible_pages(&vp), vec![0]);

        vp.scroll = Point::new(0.0, 700.0);
        assert_eq!(mapper.visible_pages(&vp), vec![0, 1]);

        vp.scroll = Point::new(0.0, 2000.0);
        assert!(mapper.visible_pages(&vp).contains(&2));
    }

    #[test]
    fn zoom_scales_visible_set() {
        let (mapper, _doc) = mapper_with_rotations();
        let mut vp = Viewport::new(Size::new(900.0, 700.0));
        vp.set_zoom(0.25);

        // Zoomed far out, everything fits
        assert_eq!(mapper.visible_pages(&vp), vec![0, 1, 2]);
    }

    #[test]
    fn page_view_rect_applies_zoom_and_scroll() {
        let (mapper, _doc) = mapper_with_rotations();
        let mut vp = Viewport::new(Size::new(900.0, 700.0));
        vp.set_zoom(2.0);
        vp.scroll = Point::new(100.0, 50.0);

        let doc_rect = mapper.page_rect(0).unwrap();
        let view_rect = mapper.page_view_rect(&vp, 0).unwrap();
        assert_eq!(view_rect.width, doc_rect.width * 2.0);
        assert_eq!(view_rect.x, doc_rect.x * 2.0 - 100.0);
    }

    #[test]
    fn nearest_page_snaps_over_gutters() {
        let (mapper, _doc) = mapper_with_rotations();
        let vp = Viewport::new(Size::new(900.0, 3000.0));

        // Just above the gutter midpoint: page 0; just below: page 1
        assert_eq!(mapper.nearest_page(&vp, Point::new(400.0, 802.0)), Some(0));
        assert_eq!(mapper.nearest_page(&vp, Point::new(400.0, 809.0)), Some(1));
    }
}
