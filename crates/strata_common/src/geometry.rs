//! Rectangles and integer segments.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle with real-valued corners.
///
/// Used for block footprints and grid-bin boundaries during global
/// placement, where cell coordinates are continuous.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Lower-left x coordinate.
    pub llx: f64,
    /// Lower-left y coordinate.
    pub lly: f64,
    /// Upper-right x coordinate.
    pub urx: f64,
    /// Upper-right y coordinate.
    pub ury: f64,
}

impl Rect {
    /// Creates a rectangle from its lower-left and upper-right corners.
    pub fn new(llx: f64, lly: f64, urx: f64, ury: f64) -> Self {
        Self { llx, lly, urx, ury }
    }

    /// Returns the width of the rectangle.
    pub fn width(&self) -> f64 {
        self.urx - self.llx
    }

    /// Returns the height of the rectangle.
    pub fn height(&self) -> f64 {
        self.ury - self.lly
    }

    /// Returns the area of the rectangle.
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Returns whether the point `(x, y)` lies inside the rectangle
    /// (boundaries included).
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.llx && x <= self.urx && y >= self.lly && y <= self.ury
    }

    /// Returns whether this rectangle and `other` overlap with positive area.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.overlap_area(other) > 0.0
    }

    /// Returns the area of the intersection of this rectangle and `other`,
    /// or zero if they are disjoint.
    pub fn overlap_area(&self, other: &Rect) -> f64 {
        let w = self.urx.min(other.urx) - self.llx.max(other.llx);
        let h = self.ury.min(other.ury) - self.lly.max(other.lly);
        if w <= 0.0 || h <= 0.0 {
            0.0
        } else {
            w * h
        }
    }
}

/// An axis-aligned rectangle in integer grid units.
///
/// Used for the placement region and for legalized cluster and well shapes,
/// which always land on the site grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RectInt {
    /// Lower-left x coordinate.
    pub llx: i32,
    /// Lower-left y coordinate.
    pub lly: i32,
    /// Upper-right x coordinate.
    pub urx: i32,
    /// Upper-right y coordinate.
    pub ury: i32,
}

impl RectInt {
    /// Creates a rectangle from its lower-left and upper-right corners.
    pub fn new(llx: i32, lly: i32, urx: i32, ury: i32) -> Self {
        Self { llx, lly, urx, ury }
    }

    /// Returns the width of the rectangle.
    pub fn width(&self) -> i32 {
        self.urx - self.llx
    }

    /// Returns the height of the rectangle.
    pub fn height(&self) -> i32 {
        self.ury - self.lly
    }

    /// Returns the area of the rectangle as a wide integer.
    pub fn area(&self) -> i64 {
        i64::from(self.width()) * i64::from(self.height())
    }

    /// Converts to a real-valued rectangle.
    pub fn to_rect(&self) -> Rect {
        Rect::new(
            f64::from(self.llx),
            f64::from(self.lly),
            f64::from(self.urx),
            f64::from(self.ury),
        )
    }
}

/// A half-open 1-D interval `[lo, hi)` in integer grid units.
///
/// Used for per-row white-space bookkeeping in the legalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentInt {
    /// Inclusive lower bound.
    pub lo: i32,
    /// Exclusive upper bound.
    pub hi: i32,
}

impl SegmentInt {
    /// Creates a segment from its bounds.
    pub fn new(lo: i32, hi: i32) -> Self {
        Self { lo, hi }
    }

    /// Returns the length of the segment.
    pub fn len(&self) -> i32 {
        self.hi - self.lo
    }

    /// Returns whether the segment is empty.
    pub fn is_empty(&self) -> bool {
        self.hi <= self.lo
    }

    /// Returns the intersection with `other`, or `None` if disjoint.
    pub fn intersect(&self, other: &SegmentInt) -> Option<SegmentInt> {
        let lo = self.lo.max(other.lo);
        let hi = self.hi.min(other.hi);
        if hi > lo {
            Some(SegmentInt::new(lo, hi))
        } else {
            None
        }
    }
}

/// Merges overlapping or touching segments in place.
///
/// The result is sorted by lower bound and pairwise disjoint. Empty
/// segments are dropped.
pub fn merge_segments(segments: &mut Vec<SegmentInt>) {
    segments.retain(|s| !s.is_empty());
    if segments.len() < 2 {
        return;
    }
    segments.sort_unstable_by_key(|s| (s.lo, s.hi));
    let mut merged: Vec<SegmentInt> = Vec::with_capacity(segments.len());
    for seg in segments.drain(..) {
        match merged.last_mut() {
            Some(last) if seg.lo <= last.hi => last.hi = last.hi.max(seg.hi),
            _ => merged.push(seg),
        }
    }
    *segments = merged;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_dimensions() {
        let r = Rect::new(1.0, 2.0, 4.0, 8.0);
        assert_eq!(r.width(), 3.0);
        assert_eq!(r.height(), 6.0);
        assert_eq!(r.area(), 18.0);
    }

    #[test]
    fn rect_contains_boundary() {
        let r = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(r.contains(0.0, 0.0));
        assert!(r.contains(10.0, 10.0));
        assert!(r.contains(5.0, 5.0));
        assert!(!r.contains(10.1, 5.0));
    }

    #[test]
    fn overlap_area_partial() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 15.0, 15.0);
        assert_eq!(a.overlap_area(&b), 25.0);
        assert!(a.overlaps(&b));
    }

    #[test]
    fn overlap_area_disjoint() {
        let a = Rect::new(0.0, 0.0, 2.0, 2.0);
        let b = Rect::new(3.0, 3.0, 5.0, 5.0);
        assert_eq!(a.overlap_area(&b), 0.0);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn overlap_area_touching_edges_is_zero() {
        let a = Rect::new(0.0, 0.0, 2.0, 2.0);
        let b = Rect::new(2.0, 0.0, 4.0, 2.0);
        assert_eq!(a.overlap_area(&b), 0.0);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn rect_int_area_is_wide() {
        let r = RectInt::new(0, 0, 100_000, 100_000);
        assert_eq!(r.area(), 10_000_000_000i64);
    }

    #[test]
    fn rect_int_to_rect() {
        let r = RectInt::new(1, 2, 3, 4).to_rect();
        assert_eq!(r, Rect::new(1.0, 2.0, 3.0, 4.0));
    }

    #[test]
    fn segment_intersect() {
        let a = SegmentInt::new(0, 10);
        let b = SegmentInt::new(5, 15);
        assert_eq!(a.intersect(&b), Some(SegmentInt::new(5, 10)));
        let c = SegmentInt::new(10, 20);
        assert_eq!(a.intersect(&c), None);
    }

    #[test]
    fn merge_overlapping_segments() {
        let mut segs = vec![
            SegmentInt::new(5, 10),
            SegmentInt::new(0, 6),
            SegmentInt::new(12, 14),
        ];
        merge_segments(&mut segs);
        assert_eq!(
            segs,
            vec![SegmentInt::new(0, 10), SegmentInt::new(12, 14)]
        );
    }

    #[test]
    fn merge_touching_segments() {
        let mut segs = vec![SegmentInt::new(0, 5), SegmentInt::new(5, 10)];
        merge_segments(&mut segs);
        assert_eq!(segs, vec![SegmentInt::new(0, 10)]);
    }

    #[test]
    fn merge_drops_empty_segments() {
        let mut segs = vec![SegmentInt::new(3, 3), SegmentInt::new(1, 2)];
        merge_segments(&mut segs);
        assert_eq!(segs, vec![SegmentInt::new(1, 2)]);
    }

    #[test]
    fn serde_roundtrip() {
        let r = RectInt::new(0, 0, 4, 4);
        let json = serde_json::to_string(&r).unwrap();
        let back: RectInt = serde_json::from_str(&json).unwrap();
        assert_eq!(r, back);
    }
}
