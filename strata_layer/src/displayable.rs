// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Displayables: tagged shapes with per-layer footprints.

use core::sync::atomic::{AtomicU8, Ordering};
use std::collections::HashMap;

use kurbo::{Point, Rect, Vec2};
use parking_lot::RwLock;
use strata_bucket::{Area, Bucketable};

use crate::types::{DisplayableFlags, DisplayableId, DisplayableKind, LayerId};

/// A paintable object living in one or more layers.
///
/// Displayables are shared as `Arc<Displayable>` between layers and the index.
/// State changes go through `&self`; the owning [`Layer`](crate::Layer) is
/// responsible for reporting geometry changes to its index, so prefer the
/// layer's mutators (for example [`Layer::translate`](crate::Layer::translate))
/// over the ones here.
pub struct Displayable {
    id: DisplayableId,
    kind: DisplayableKind,
    flags: AtomicU8,
    footprints: RwLock<HashMap<LayerId, Area>>,
}

impl Displayable {
    /// Create a visible, unlocked displayable with no footprint anywhere.
    pub fn new(id: DisplayableId, kind: DisplayableKind) -> Self {
        debug_assert!(!kind.is_abstract(), "{kind:?} cannot tag a displayable");
        Self {
            id,
            kind,
            flags: AtomicU8::new(DisplayableFlags::default().bits()),
            footprints: RwLock::new(HashMap::new()),
        }
    }

    /// Builder-style footprint for `layer`.
    #[must_use]
    pub fn with_footprint(mut self, layer: LayerId, area: Area) -> Self {
        self.footprints.get_mut().insert(layer, area);
        self
    }

    /// Identifier.
    pub fn id(&self) -> DisplayableId {
        self.id
    }

    /// Type tag.
    pub fn kind(&self) -> DisplayableKind {
        self.kind
    }

    /// Current flags.
    pub fn flags(&self) -> DisplayableFlags {
        DisplayableFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    fn set_flag(&self, flag: DisplayableFlags, on: bool) {
        if on {
            self.flags.fetch_or(flag.bits(), Ordering::AcqRel);
        } else {
            self.flags.fetch_and(!flag.bits(), Ordering::AcqRel);
        }
    }

    /// Whether the displayable is painted.
    pub fn is_visible(&self) -> bool {
        self.flags().contains(DisplayableFlags::VISIBLE)
    }

    /// Show or hide.
    pub fn set_visible(&self, visible: bool) {
        self.set_flag(DisplayableFlags::VISIBLE, visible);
    }

    /// Whether the displayable refuses to move.
    pub fn is_locked(&self) -> bool {
        self.flags().contains(DisplayableFlags::LOCKED)
    }

    /// Lock or unlock.
    pub fn set_locked(&self, locked: bool) {
        self.set_flag(DisplayableFlags::LOCKED, locked);
    }

    /// Footprint in `layer`, if any.
    pub fn footprint(&self, layer: LayerId) -> Option<Area> {
        self.footprints.read().get(&layer).cloned()
    }

    /// Replace or clear the footprint in `layer`.
    pub fn set_footprint(&self, layer: LayerId, area: Option<Area>) {
        let mut footprints = self.footprints.write();
        match area {
            Some(area) => {
                footprints.insert(layer, area);
            }
            None => {
                footprints.remove(&layer);
            }
        }
    }

    /// Shift the footprint in `layer` by `delta`. Locked displayables and
    /// displayables absent from `layer` stay put; returns whether anything moved.
    pub fn translate(&self, layer: LayerId, delta: Vec2) -> bool {
        if self.is_locked() {
            log::debug!("{:?} is locked; not moving it", self.id);
            return false;
        }
        let mut footprints = self.footprints.write();
        let Some(area) = footprints.get_mut(&layer) else {
            return false;
        };
        *area = area.translate(delta);
        true
    }

    /// Layers this displayable has a footprint in.
    pub fn layers(&self) -> Vec<LayerId> {
        let mut layers: Vec<LayerId> = self.footprints.read().keys().copied().collect();
        layers.sort_unstable();
        layers
    }
}

impl Bucketable for Displayable {
    type Id = DisplayableId;
    type Kind = DisplayableKind;
    type Context = LayerId;

    fn id(&self) -> DisplayableId {
        self.id
    }

    fn kind(&self) -> DisplayableKind {
        self.kind
    }

    fn is_visible(&self) -> bool {
        Self::is_visible(self)
    }

    fn area_in(&self, layer: &LayerId) -> Option<Area> {
        self.footprint(*layer)
    }

    fn contains_point(&self, layer: &LayerId, pt: Point) -> bool {
        self.footprints
            .read()
            .get(layer)
            .is_some_and(|a| a.contains(pt))
    }

    fn intersects_rect(&self, layer: &LayerId, rect: Rect) -> bool {
        self.footprints
            .read()
            .get(layer)
            .is_some_and(|a| a.intersects_rect(rect))
    }

    fn intersects_area(&self, layer: &LayerId, area: &Area) -> bool {
        self.footprints
            .read()
            .get(layer)
            .is_some_and(|a| a.intersects_area(area))
    }
}

impl core::fmt::Debug for Displayable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Displayable")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("flags", &self.flags())
            .field("layers", &self.layers())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const L0: LayerId = LayerId(0);
    const L1: LayerId = LayerId(1);

    fn ball() -> Displayable {
        Displayable::new(DisplayableId(7), DisplayableKind::Ball)
            .with_footprint(L0, Area::from_rect(Rect::new(0.0, 0.0, 10.0, 10.0)))
    }

    #[test]
    fn flags_toggle_independently() {
        let d = ball();
        assert!(d.is_visible());
        assert!(!d.is_locked());
        d.set_locked(true);
        d.set_visible(false);
        assert_eq!(d.flags(), DisplayableFlags::LOCKED);
        d.set_visible(true);
        assert_eq!(d.flags(), DisplayableFlags::LOCKED | DisplayableFlags::VISIBLE);
    }

    #[test]
    fn footprints_are_per_layer() {
        let d = ball();
        assert!(d.contains_point(&L0, Point::new(5.0, 5.0)));
        assert!(!d.contains_point(&L1, Point::new(5.0, 5.0)));
        d.set_footprint(L1, Some(Area::from_rect(Rect::new(100.0, 100.0, 110.0, 110.0))));
        assert_eq!(d.layers(), vec![L0, L1]);
        d.set_footprint(L0, None);
        assert!(d.area_in(&L0).is_none());
    }

    #[test]
    fn locked_displayables_do_not_translate() {
        let d = ball();
        assert!(d.translate(L0, Vec2::new(5.0, 0.0)));
        assert_eq!(d.footprint(L0).map(|a| a.bounds()), Some(Rect::new(5.0, 0.0, 15.0, 10.0)));
        d.set_locked(true);
        assert!(!d.translate(L0, Vec2::new(5.0, 0.0)));
        assert!(!ball().translate(L1, Vec2::new(1.0, 1.0)));
    }
}
