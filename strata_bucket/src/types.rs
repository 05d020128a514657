// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Integer bucket geometry and helpers.

use kurbo::{Point, Rect, Size};

/// Integer, origin-and-size rectangle covered by a bucket.
///
/// Buckets tile the container on an integer grid, so their extents are kept as
/// `i32` like the container's pixel bounds. Edge arithmetic is widened to `i64`
/// so that rectangles reaching the end of the `i32` range never wrap around and
/// flip an intersection test.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BucketRect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width.
    pub w: i32,
    /// Height.
    pub h: i32,
}

impl BucketRect {
    /// Create a rectangle from origin and size.
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// True if the rectangle has no area.
    pub const fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    /// Right edge, widened.
    #[inline]
    pub const fn right(&self) -> i64 {
        self.x as i64 + self.w as i64
    }

    /// Bottom edge, widened.
    #[inline]
    pub const fn bottom(&self) -> i64 {
        self.y as i64 + self.h as i64
    }

    /// Whether the interiors of two rectangles overlap.
    ///
    /// Touching edges do not count, and an empty rectangle never intersects anything.
    pub fn intersects(&self, other: &Self) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        other.right() > i64::from(self.x)
            && other.bottom() > i64::from(self.y)
            && self.right() > i64::from(other.x)
            && self.bottom() > i64::from(other.y)
    }

    /// Whether the point lies inside the rectangle, edges included.
    pub fn contains_point(&self, pt: Point) -> bool {
        pt.x >= f64::from(self.x)
            && pt.y >= f64::from(self.y)
            && pt.x <= self.right() as f64
            && pt.y <= self.bottom() as f64
    }

    /// Smallest integer rectangle covering `rect`, saturating at the `i32` range.
    pub fn enclosing(rect: Rect) -> Self {
        let rect = rect.abs();
        let x0 = saturate(rect.x0.floor());
        let y0 = saturate(rect.y0.floor());
        let x1 = saturate(rect.x1.ceil());
        let y1 = saturate(rect.y1.ceil());
        Self::new(x0, y0, span(x0, x1), span(y0, y1))
    }

    /// Root rectangle for a container of the given size, anchored at the origin.
    ///
    /// Sizes are truncated to whole units after a tiny upward nudge, so that a
    /// width stored as `4095.99999` still yields `4096`.
    pub fn from_size(size: Size) -> Self {
        let w = saturate((size.width + 0.00005).floor()).max(0);
        let h = saturate((size.height + 0.00005).floor()).max(0);
        Self::new(0, 0, w, h)
    }

    /// Convert to a Kurbo rectangle.
    pub fn to_rect(self) -> Rect {
        Rect::new(
            f64::from(self.x),
            f64::from(self.y),
            self.right() as f64,
            self.bottom() as f64,
        )
    }
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "The value is clamped to the i32 range before the cast."
)]
fn saturate(v: f64) -> i32 {
    v.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "The span is clamped to the i32 range before the cast."
)]
fn span(lo: i32, hi: i32) -> i32 {
    (i64::from(hi) - i64::from(lo)).clamp(0, i64::from(i32::MAX)) as i32
}
