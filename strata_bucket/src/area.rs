// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Closed 2D regions with exact point, rectangle, and region predicates.
//!
//! An [`Area`] is built from a Kurbo path interpreted with the non-zero winding rule.
//! Curves are flattened once at construction; all predicates then run on the
//! resulting polygon rings, so they agree with each other exactly.
//!
//! Overlap tests are about interiors: two regions that only share an edge or a
//! corner do not intersect.

use kurbo::{Affine, BezPath, PathEl, Point, Rect, Shape, Vec2};

/// Tolerance used when flattening curved outlines into polygon rings.
pub const FLATTEN_TOLERANCE: f64 = 0.1;

/// A closed region of the plane.
#[derive(Clone, Debug, PartialEq)]
pub struct Area {
    path: BezPath,
    rings: Vec<Vec<Point>>,
    bounds: Rect,
}

impl Area {
    /// Build an area from a path. Open subpaths are closed implicitly.
    pub fn new(path: BezPath) -> Self {
        let rings = flatten_rings(&path);
        let bounds = rings_bounds(&rings);
        Self {
            path,
            rings,
            bounds,
        }
    }

    /// An axis-aligned rectangular area.
    pub fn from_rect(rect: Rect) -> Self {
        Self::new(rect.abs().to_path(FLATTEN_TOLERANCE))
    }

    /// A polygonal area through `points`.
    pub fn from_polygon(points: &[Point]) -> Self {
        let mut path = BezPath::new();
        let mut it = points.iter().copied();
        if let Some(first) = it.next() {
            path.move_to(first);
            for p in it {
                path.line_to(p);
            }
            path.close_path();
        }
        Self::new(path)
    }

    /// The source path.
    pub fn path(&self) -> &BezPath {
        &self.path
    }

    /// Axis-aligned bounds. `Rect::ZERO` for an area without rings.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// True if the area cannot cover any interior point.
    pub fn is_degenerate(&self) -> bool {
        self.bounds.width() <= 0.0
            || self.bounds.height() <= 0.0
            || self.rings.iter().all(|r| r.len() < 3)
    }

    /// A copy of the area moved by `delta`.
    pub fn translate(&self, delta: Vec2) -> Self {
        let mut path = self.path.clone();
        path.apply_affine(Affine::translate(delta));
        Self::new(path)
    }

    /// Non-zero winding containment.
    pub fn contains(&self, pt: Point) -> bool {
        if !within_closed(self.bounds, pt) {
            return false;
        }
        self.winding(pt) != 0
    }

    /// Whether the interior of the area overlaps the interior of `rect`.
    pub fn intersects_rect(&self, rect: Rect) -> bool {
        let rect = rect.abs();
        if rect.width() <= 0.0 || rect.height() <= 0.0 || !overlaps_open(self.bounds, rect) {
            return false;
        }
        if self.is_degenerate() {
            return false;
        }
        let inside_open = |p: Point| p.x > rect.x0 && p.x < rect.x1 && p.y > rect.y0 && p.y < rect.y1;
        if self.rings.iter().flatten().any(|&p| inside_open(p)) {
            return true;
        }
        if self.edges().any(|(a, b)| segment_crosses_open_rect(a, b, rect)) {
            return true;
        }
        // The outline never enters the rectangle, so its interior is either fully in or fully out.
        self.contains(rect.center())
    }

    /// Whether the interiors of two areas overlap.
    pub fn intersects_area(&self, other: &Self) -> bool {
        if !overlaps_open(self.bounds, other.bounds) {
            return false;
        }
        if self.is_degenerate() || other.is_degenerate() {
            return false;
        }
        for (a, b) in self.edges() {
            for (c, d) in other.edges() {
                if segments_cross(a, b, c, d) {
                    return true;
                }
            }
        }
        // No proper crossing: one outline lies within the other, the outlines only
        // meet along shared edges, or they are disjoint.
        self.interior_samples().any(|p| other.contains(p))
            || other.interior_samples().any(|p| self.contains(p))
    }

    fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        self.rings.iter().flat_map(|ring| {
            let n = ring.len();
            (0..n).map(move |i| (ring[i], ring[(i + 1) % n]))
        })
    }

    fn winding(&self, pt: Point) -> i32 {
        let mut wn = 0;
        for (a, b) in self.edges() {
            if a.y <= pt.y {
                if b.y > pt.y && is_left(a, b, pt) > 0.0 {
                    wn += 1;
                }
            } else if b.y <= pt.y && is_left(a, b, pt) < 0.0 {
                wn -= 1;
            }
        }
        wn
    }

    /// Points strictly inside the area, one per edge, found by probing each
    /// edge's midpoint slightly to either side.
    fn interior_samples(&self) -> impl Iterator<Item = Point> + '_ {
        let eps = (self.bounds.width().min(self.bounds.height()) * 1e-6).max(1e-9);
        self.edges().filter_map(move |(a, b)| {
            let d = b - a;
            let len = d.hypot();
            if len == 0.0 {
                return None;
            }
            let mid = a.midpoint(b);
            let normal = Vec2::new(-d.y, d.x) * (eps / len);
            [mid + normal, mid - normal]
                .into_iter()
                .find(|&p| self.winding(p) != 0)
        })
    }
}

impl From<Rect> for Area {
    fn from(rect: Rect) -> Self {
        Self::from_rect(rect)
    }
}

fn flatten_rings(path: &BezPath) -> Vec<Vec<Point>> {
    let mut rings: Vec<Vec<Point>> = Vec::new();
    let mut current: Vec<Point> = Vec::new();
    kurbo::flatten(path.iter(), FLATTEN_TOLERANCE, |el| match el {
        PathEl::MoveTo(p) => {
            if current.len() >= 2 {
                rings.push(core::mem::take(&mut current));
            }
            current.clear();
            current.push(p);
        }
        PathEl::LineTo(p) => {
            if current.last() != Some(&p) {
                current.push(p);
            }
        }
        PathEl::ClosePath => {
            if current.len() >= 2 {
                rings.push(core::mem::take(&mut current));
            }
            current.clear();
        }
        // `flatten` only emits lines.
        PathEl::QuadTo(..) | PathEl::CurveTo(..) => {}
    });
    if current.len() >= 2 {
        rings.push(current);
    }
    for ring in &mut rings {
        if ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }
    }
    rings
}

fn rings_bounds(rings: &[Vec<Point>]) -> Rect {
    let mut it = rings.iter().flatten();
    let Some(&first) = it.next() else {
        return Rect::ZERO;
    };
    it.fold(Rect::from_points(first, first), |r, &p| r.union_pt(p))
}

fn overlaps_open(a: Rect, b: Rect) -> bool {
    a.x0 < b.x1 && b.x0 < a.x1 && a.y0 < b.y1 && b.y0 < a.y1
}

fn within_closed(r: Rect, p: Point) -> bool {
    p.x >= r.x0 && p.x <= r.x1 && p.y >= r.y0 && p.y <= r.y1
}

#[inline]
fn is_left(a: Point, b: Point, p: Point) -> f64 {
    (b.x - a.x) * (p.y - a.y) - (p.x - a.x) * (b.y - a.y)
}

/// Proper crossing: each segment strictly separates the endpoints of the other.
fn segments_cross(a: Point, b: Point, c: Point, d: Point) -> bool {
    let d1 = is_left(c, d, a);
    let d2 = is_left(c, d, b);
    let d3 = is_left(a, b, c);
    let d4 = is_left(a, b, d);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

/// Liang-Barsky clip against the closed rectangle, then require the clipped
/// piece to have length and pass through the open interior.
fn segment_crosses_open_rect(a: Point, b: Point, rect: Rect) -> bool {
    let d = b - a;
    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;
    for (p, q) in [
        (-d.x, a.x - rect.x0),
        (d.x, rect.x1 - a.x),
        (-d.y, a.y - rect.y0),
        (d.y, rect.y1 - a.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return false;
            }
        } else {
            let t = q / p;
            if p < 0.0 {
                t0 = t0.max(t);
            } else {
                t1 = t1.min(t);
            }
        }
    }
    if t0 >= t1 {
        return false;
    }
    let mid = a + d * (0.5 * (t0 + t1));
    mid.x > rect.x0 && mid.x < rect.x1 && mid.y > rect.y0 && mid.y < rect.y1
}
