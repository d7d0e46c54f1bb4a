//! Spatial index over page rects
//!
//! Four side-sorted coordinate lists answer point and rectangle queries
//! with binary search plus a counting intersection, so hit testing stays
//! cheap even for documents with thousands of pages. Rebuilt wholesale
//! after every layout pass; the index itself is immutable.

use crate::geometry::{Point, Rect};

/// Immutable rect index keyed by page number
#[derive(Clone, Debug, Default)]
pub struct RectIndex {
    rects: Vec<Rect>,
    // (coordinate, page) pairs sorted by coordinate
    lefts: Vec<(f32, usize)>,
    tops: Vec<(f32, usize)>,
    rights: Vec<(f32, usize)>,
    bottoms: Vec<(f32, usize)>,
}

impl RectIndex {
    #[must_use]
    pub fn new(rects: &[Rect]) -> Self {
        let mut index = Self {
            rects: rects.to_vec(),
            lefts: Vec::with_capacity(rects.len()),
            tops: Vec::with_capacity(rects.len()),
            rights: Vec::with_capacity(rects.len()),
            bottoms: Vec::with_capacity(rects.len()),
        };

        for (page, rect) in rects.iter().enumerate() {
            index.lefts.push((rect.x, page));
            index.tops.push((rect.y, page));
            index.rights.push((rect.right(), page));
            index.bottoms.push((rect.bottom(), page));
        }

        let by_coord = |a: &(f32, usize), b: &(f32, usize)| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        };
        index.lefts.sort_by(by_coord);
        index.tops.sort_by(by_coord);
        index.rights.sort_by(by_coord);
        index.bottoms.sort_by(by_coord);

        index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Pages whose rect contains the point, ascending page order
    #[must_use]
    pub fn at(&self, p: Point) -> Vec<usize> {
        self.run_tests(&[
            Test::AtMost(&self.lefts, p.x),
            Test::AtLeast(&self.rights, p.x),
            Test::AtMost(&self.tops, p.y),
            Test::AtLeast(&self.bottoms, p.y),
        ])
    }

    /// Pages whose rect intersects `area`, ascending page order
    #[must_use]
    pub fn intersecting(&self, area: &Rect) -> Vec<usize> {
        self.run_tests(&[
            Test::AtMost(&self.lefts, area.right()),
            Test::AtLeast(&self.rights, area.x),
            Test::AtMost(&self.tops, area.bottom()),
            Test::AtLeast(&self.bottoms, area.y),
        ])
    }

    /// Pages whose rect lies fully inside `area`, ascending page order
    #[must_use]
    pub fn inside(&self, area: &Rect) -> Vec<usize> {
        self.run_tests(&[
            Test::AtLeast(&self.lefts, area.x),
            Test::AtMost(&self.rights, area.right()),
            Test::AtLeast(&self.tops, area.y),
            Test::AtMost(&self.bottoms, area.bottom()),
        ])
    }

    /// Page with the smallest manhattan distance to the point.
    ///
    /// If several rects contain the point, the one whose center is
    /// closest wins. Returns `None` only for an empty index.
    #[must_use]
    pub fn nearest(&self, p: Point) -> Option<usize> {
        let containing = self.at(p);
        if !containing.is_empty() {
            return containing.into_iter().min_by(|&a, &b| {
                let da = center_distance(&self.rects[a], p);
                let db = center_distance(&self.rects[b], p);
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        self.rects
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let da = edge_distance(a, p);
                let db = edge_distance(b, p);
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(page, _)| page)
    }

    fn run_tests(&self, tests: &[Test<'_>]) -> Vec<usize> {
        if self.rects.is_empty() {
            return Vec::new();
        }

        let mut hits = vec![0u8; self.rects.len()];
        for test in tests {
            match test {
                Test::AtMost(list, value) => {
                    let end = list.partition_point(|(coord, _)| *coord <= *value);
                    for &(_, page) in &list[..end] {
                        hits[page] += 1;
                    }
                }
                Test::AtLeast(list, value) => {
                    let start = list.partition_point(|(coord, _)| *coord < *value);
                    for &(_, page) in &list[start..] {
                        hits[page] += 1;
                    }
                }
            }
        }

        let required = tests.len() as u8;
        hits.iter()
            .enumerate()
            .filter(|&(_, &count)| count == required)
            .map(|(page, _)| page)
            .collect()
    }
}

enum Test<'a> {
    /// Side coordinate <= value
    AtMost(&'a [(f32, usize)], f32),
    /// Side coordinate >= value
    AtLeast(&'a [(f32, usize)], f32),
}

fn center_distance(rect: &Rect, p: Point) -> f32 {
    let c = rect.center();
    (c.x - p.x).abs() + (c.y - p.y).abs()
}

fn edge_distance(rect: &Rect, p: Point) -> f32 {
    let dx = (rect.x - p.x).max(p.x - rect.right()).max(0.0);
    let dy = (rect.y - p.y).max(p.y - rect.bottom()).max(0.0);
    dx + dy
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column() -> RectIndex {
        RectIndex::new(&[
            Rect::new(0.0, 0.0, 600.0, 800.0),
            Rect::new(0.0, 810.0, 600.0, 800.0),
            Rect::new(0.0, 1620.0, 600.0, 1000.0),
        ])
    }

    #[test]
    fn at_finds_containing_page() {
        let index = column();
        assert_eq!(index.at(Point::new(300.0, 400.0)), vec![0]);
        assert_eq!(index.at(Point::new(300.0, 900.0)), vec![1]);
        // Inter-page gutter hits nothing
        assert_eq!(index.at(Point::new(300.0, 805.0)), Vec::<usize>::new());
        // Off to the side hits nothing
        assert_eq!(index.at(Point::new(700.0, 400.0)), Vec::<usize>::new());
    }

    #[test]
    fn intersecting_returns_pages_in_order() {
        let index = column();
        let view = Rect::new(0.0, 700.0, 600.0, 1000.0);
        assert_eq!(index.intersecting(&view), vec![0, 1, 2]);

        let view = Rect::new(0.0, 820.0, 600.0, 100.0);
        assert_eq!(index.intersecting(&view), vec![1]);
    }

    #[test]
    fn inside_requires_full_containment() {
        let index = column();
        let area = Rect::new(-1.0, -1.0, 602.0, 812.0);
        assert_eq!(index.inside(&area), vec![0]);
        assert_eq!(index.inside(&Rect::new(0.0, 0.0, 10.0, 10.0)), Vec::<usize>::new());
    }

    #[test]
    fn nearest_prefers_containing_then_closest_edge() {
        let index = column();
        assert_eq!(index.nearest(Point::new(300.0, 100.0)), Some(0));
        // In the gutter between pages 0 and 1, page 1's top edge is closer
        assert_eq!(index.nearest(Point::new(300.0, 809.0)), Some(1));
        // Far below everything
        assert_eq!(index.nearest(Point::new(300.0, 9000.0)), Some(2));
    }

    #[test]
    fn empty_index_answers_empty() {
        let index = RectIndex::new(&[]);
        assert!(index.at(Point::new(0.0, 0.0)).is_empty());
        assert_eq!(index.nearest(Point::new(0.0, 0.0)), None);
    }
}
