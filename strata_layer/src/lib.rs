// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Strata Layer: paint-ordered layers of displayables, indexed by [`strata_bucket`].
//!
//! A [`Layer`] owns an ordered stack of [`Displayable`]s. Each displayable has a
//! type tag ([`DisplayableKind`]), state flags ([`DisplayableFlags`]), and one
//! footprint per layer it appears in. The layer keeps its [`SpatialIndex`] in
//! sync with every stacking and geometry change, so point, rectangle, and area
//! queries stay cheap on layers with many displayables.
//!
//! ## Stacking rules
//!
//! - Patches (image tiles) stay at the bottom, labels stay on top, everything
//!   else goes in between. See [`Layer::add`].
//! - [`Layer::move_up`], [`Layer::move_down`], [`Layer::move_top`], and
//!   [`Layer::move_bottom`] only reorder a displayable among neighbours of the
//!   same kind.
//!
//! ## Layer sets
//!
//! A [`LayerSet`] holds the displayables that span several layers (the
//! [`DisplayableKind::ZDisplayable`] kinds) in one shared paint order, with one
//! bucket index per layer. Every change is applied to each layer the
//! displayable has a footprint in; a layer without an index is logged and
//! skipped, and its queries fall back to a scan.
//!
//! ## Buckets
//!
//! Buckets are built lazily by [`Layer::check_buckets`] and can be turned off
//! with [`Layer::set_buckets_enabled`]. Without buckets, or when a query covers
//! most of the layer (see [`SpatialIndex::is_better`]), queries scan the stack
//! with the same predicates, so results never depend on whether an index exists.
//!
//! ### Minimal usage
//!
//! ```
//! use std::sync::Arc;
//! use kurbo::{Point, Rect, Size, Vec2};
//! use strata_bucket::Area;
//! use strata_layer::{Displayable, DisplayableId, DisplayableKind, Layer, LayerFilter, LayerId};
//!
//! let lid = LayerId(0);
//! let mut layer = Layer::new(lid, Size::new(10_000.0, 10_000.0));
//! layer.check_buckets();
//!
//! let outline = |id, r| {
//!     Arc::new(Displayable::new(DisplayableId(id), DisplayableKind::Profile)
//!         .with_footprint(lid, Area::from_rect(r)))
//! };
//! layer.add(outline(1, Rect::new(0.0, 0.0, 100.0, 100.0)));
//! layer.add(outline(2, Rect::new(50.0, 50.0, 150.0, 150.0)));
//!
//! let top = layer.top_at(Point::new(75.0, 75.0), LayerFilter::visible()).unwrap();
//! assert_eq!(top.id(), DisplayableId(2));
//!
//! layer.translate(DisplayableId(2), Vec2::new(1000.0, 0.0));
//! let top = layer.top_at(Point::new(75.0, 75.0), LayerFilter::visible()).unwrap();
//! assert_eq!(top.id(), DisplayableId(1));
//! ```

mod displayable;
mod layer;
mod layer_set;
mod types;

pub use displayable::Displayable;
pub use layer::{Layer, LayerFilter};
pub use layer_set::LayerSet;
pub use types::{DisplayableFlags, DisplayableId, DisplayableKind, LayerId};

pub use strata_bucket::{Area, SpatialIndex};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use kurbo::{Point, Rect, Size, Vec2};
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use strata_bucket::{Bucketable, IndexConfig};

    const LID: LayerId = LayerId(1);
    const SIDE: f64 = 6000.0;

    const KINDS: [DisplayableKind; 6] = [
        DisplayableKind::Patch,
        DisplayableKind::Profile,
        DisplayableKind::Label,
        DisplayableKind::Ball,
        DisplayableKind::AreaList,
        DisplayableKind::Treeline,
    ];

    fn random_rect(rng: &mut StdRng, max: f64) -> Rect {
        let w = rng.random_range(1.0..max);
        let h = rng.random_range(1.0..max);
        let x = rng.random_range(0.0..SIDE - w);
        let y = rng.random_range(0.0..SIDE - h);
        Rect::new(x, y, x + w, y + h)
    }

    fn random_filter(rng: &mut StdRng) -> LayerFilter {
        let base = if rng.random_bool(0.5) {
            LayerFilter::visible()
        } else {
            LayerFilter::all()
        };
        match rng.random_range(0..4) {
            0 => base.of_kind(DisplayableKind::Profile),
            1 => base.subtype_of(DisplayableKind::ZDisplayable),
            _ => base,
        }
    }

    fn ids(found: &[Arc<Displayable>]) -> Vec<u64> {
        found.iter().map(|d| d.id().0).collect()
    }

    /// Brute force over the layer's own stack.
    fn expect(layer: &Layer, filter: LayerFilter, hit: impl Fn(&Displayable) -> bool) -> Vec<u64> {
        layer
            .displayables()
            .iter()
            .filter(|d| {
                let d: &Displayable = d;
                filter.accepts(d) && hit(d)
            })
            .map(|d| d.id().0)
            .collect()
    }

    fn check(rng: &mut StdRng, layer: &Layer) {
        for _ in 0..25 {
            let filter = random_filter(rng);
            let pt = Point::new(rng.random_range(0.0..SIDE), rng.random_range(0.0..SIDE));
            assert_eq!(
                ids(&layer.find_at(pt, filter)),
                expect(layer, filter, |d| d.contains_point(&LID, pt))
            );
            let rect = random_rect(rng, 2500.0);
            let exact = ids(&layer.find_in_rect(rect, filter));
            assert_eq!(exact, expect(layer, filter, |d| d.intersects_rect(&LID, rect)));
            let rough = ids(&layer.roughly_find(rect, filter));
            assert!(exact.iter().all(|id| rough.contains(id)));
        }
    }

    /// Any id handed out so far, including removed ones.
    fn pick(rng: &mut StdRng, next: u64) -> DisplayableId {
        DisplayableId(rng.random_range(0..next.max(1)))
    }

    #[test]
    fn indexed_layer_agrees_with_its_stack() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut layer = Layer::with_config(LID, Size::new(SIDE, SIDE), IndexConfig::with_bucket_side(800));
        layer.check_buckets();
        let mut next = 0_u64;

        for step in 0..400 {
            let len = layer.len();
            match rng.random_range(0..8) {
                0 | 1 => {
                    let kind = KINDS[rng.random_range(0..KINDS.len())];
                    let d = Displayable::new(DisplayableId(next), kind)
                        .with_footprint(LID, Area::from_rect(random_rect(&mut rng, 700.0)));
                    next += 1;
                    assert!(layer.add(Arc::new(d)));
                }
                2 => {
                    let id = pick(&mut rng, next);
                    match rng.random_range(0..4) {
                        0 => layer.move_up(id),
                        1 => layer.move_down(id),
                        2 => layer.move_top(id),
                        _ => layer.move_bottom(id),
                    };
                }
                3 => {
                    let delta = Vec2::new(rng.random_range(-300.0..300.0), rng.random_range(-300.0..300.0));
                    layer.translate(pick(&mut rng, next), delta);
                }
                4 => {
                    let area = Area::from_rect(random_rect(&mut rng, 700.0));
                    layer.set_footprint(pick(&mut rng, next), Some(area));
                }
                5 => {
                    let visible = rng.random_bool(0.5);
                    layer.set_visible(pick(&mut rng, next), visible);
                }
                6 if len > 10 => {
                    layer.remove(pick(&mut rng, next));
                }
                _ if len > 10 => {
                    let doomed = [pick(&mut rng, next), pick(&mut rng, next)];
                    layer.remove_all(&doomed);
                }
                _ => {}
            }
            if step % 40 == 0 {
                check(&mut rng, &layer);
            }
        }
        check(&mut rng, &layer);

        for (i, d) in layer.displayables().iter().enumerate() {
            let key = layer.index().and_then(|index| index.registered_key(d.id()));
            let inside = d
                .footprint(LID)
                .is_some_and(|a| a.bounds().intersect(Rect::new(0.0, 0.0, SIDE, SIDE)).area() > 0.0);
            if inside {
                assert_eq!(key, Some(i), "{:?}", d.id());
            }
        }
    }
}
