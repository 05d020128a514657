// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer sets: displayables spanning several layers, with one bucket index per
//! layer.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use kurbo::{Point, Rect, Size, Vec2};
use strata_bucket::{Area, Bucketable, Container, IndexConfig, Kind, SpatialIndex};

use crate::displayable::Displayable;
use crate::layer::LayerFilter;
use crate::types::{DisplayableId, DisplayableKind, LayerId};

/// A stack of layers sharing one list of multi-layer displayables.
///
/// Only [`ZDisplayable`](DisplayableKind::ZDisplayable) kinds live here. They
/// share a single paint order across all layers, and each one shows up in
/// every layer it has a footprint in. Every layer gets its own
/// [`SpatialIndex`] over the whole list, keyed by the shared stack index;
/// displayables without a footprint in a layer are simply absent from that
/// layer's index.
///
/// Buckets are built on demand by [`LayerSet::check_buckets`]. Once built, a
/// footprint in a layer without an index is logged and skipped, and queries on
/// such a layer scan the list instead.
pub struct LayerSet {
    size: Size,
    layers: Vec<LayerId>,
    items: Vec<Arc<Displayable>>,
    config: IndexConfig,
    buckets: HashMap<LayerId, SpatialIndex<Displayable>>,
}

impl LayerSet {
    /// Create an empty set whose layers all cover `size`.
    pub fn new(size: Size) -> Self {
        Self::with_config(size, IndexConfig::default())
    }

    /// Create an empty set whose per-layer indices use `config`.
    pub fn with_config(size: Size, config: IndexConfig) -> Self {
        Self {
            size,
            layers: Vec::new(),
            items: Vec::new(),
            config,
            buckets: HashMap::new(),
        }
    }

    /// Extent shared by every layer.
    pub fn size(&self) -> Size {
        self.size
    }

    /// Resize every layer, rebuilding the buckets if they exist.
    pub fn set_size(&mut self, size: Size) {
        if self.size == size {
            return;
        }
        self.size = size;
        if !self.buckets.is_empty() {
            self.recreate_buckets();
        }
    }

    /// Layers in order.
    pub fn layers(&self) -> &[LayerId] {
        &self.layers
    }

    /// Append a layer. Returns `false` if it is already part of the set.
    pub fn add_layer(&mut self, layer: LayerId) -> bool {
        if self.layers.contains(&layer) {
            return false;
        }
        self.layers.push(layer);
        if !self.buckets.is_empty() {
            self.recreate_layer_buckets(layer);
        }
        true
    }

    /// Drop a layer and its index. Footprints in it are left on the displayables.
    pub fn remove_layer(&mut self, layer: LayerId) -> bool {
        let Some(i) = self.layers.iter().position(|l| *l == layer) else {
            return false;
        };
        self.layers.remove(i);
        self.buckets.remove(&layer);
        true
    }

    /// Displayables in paint order.
    pub fn displayables(&self) -> &[Arc<Displayable>] {
        &self.items
    }

    /// Number of displayables.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if the set holds no displayable.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Stack index of `id`.
    pub fn index_of(&self, id: DisplayableId) -> Option<usize> {
        self.items.iter().position(|d| d.id() == id)
    }

    /// Look up a displayable.
    pub fn get(&self, id: DisplayableId) -> Option<&Arc<Displayable>> {
        self.items.iter().find(|d| d.id() == id)
    }

    /// Whether `id` is in this set.
    pub fn contains(&self, id: DisplayableId) -> bool {
        self.index_of(id).is_some()
    }

    /// The bucket index of `layer`, if built.
    pub fn index(&self, layer: LayerId) -> Option<&SpatialIndex<Displayable>> {
        self.buckets.get(&layer)
    }

    /// Index of `layer` for maintenance and queries. Logs when buckets exist but
    /// this layer has none.
    fn layer_bucket(&self, layer: LayerId) -> Option<&SpatialIndex<Displayable>> {
        if self.buckets.is_empty() {
            return None;
        }
        let index = self.buckets.get(&layer);
        if index.is_none() {
            log::warn!("no buckets for {layer:?}");
        }
        index
    }

    fn footprint_buckets(&self, d: &Displayable) -> Vec<(LayerId, &SpatialIndex<Displayable>)> {
        d.layers()
            .into_iter()
            .filter_map(|layer| Some((layer, self.layer_bucket(layer)?)))
            .collect()
    }

    fn positions(&self, lo: usize, hi: usize) -> HashMap<DisplayableId, usize> {
        self.items
            .iter()
            .enumerate()
            .skip(lo)
            .take((hi - lo).saturating_add(1))
            .map(|(i, d)| (d.id(), i))
            .collect()
    }

    /// Add a displayable on top of the stack, indexing it in every layer it has
    /// a footprint in.
    ///
    /// Returns `false` for displayables already here and for kinds that are not
    /// [`ZDisplayable`](DisplayableKind::ZDisplayable)s.
    pub fn add(&mut self, d: Arc<Displayable>) -> bool {
        if !d.kind().is_subtype_of(DisplayableKind::ZDisplayable) {
            log::debug!("{:?} is a {:?}; it belongs in a single layer", d.id(), d.kind());
            return false;
        }
        if self.contains(d.id()) {
            return false;
        }
        let stack_index = self.items.len();
        self.items.push(Arc::clone(&d));
        for (layer, index) in self.footprint_buckets(&d) {
            index.insert(stack_index, &d, &layer);
        }
        true
    }

    /// Remove a displayable. Every layer index is re-keyed, since the stack
    /// indices above it shift in all layers.
    pub fn remove(&mut self, id: DisplayableId) -> bool {
        let Some(i) = self.index_of(id) else {
            log::debug!("{id:?} is not in the layer set");
            return false;
        };
        self.items.remove(i);
        if !self.buckets.is_empty() {
            let positions = self.positions(i, self.items.len());
            for index in self.buckets.values() {
                index.remove_at(id, i, |d: &Displayable| positions.get(&d.id()).copied());
            }
        }
        true
    }

    /// Remove several displayables at once. Returns whether any was removed.
    pub fn remove_all(&mut self, ids: &[DisplayableId]) -> bool {
        let doomed: HashSet<DisplayableId> = ids.iter().copied().collect();
        let old: Vec<usize> = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, d)| doomed.contains(&d.id()))
            .map(|(i, _)| i)
            .collect();
        let Some(&lowest) = old.first() else {
            return false;
        };
        self.items.retain(|d| !doomed.contains(&d.id()));
        if !self.buckets.is_empty() {
            let positions = self.positions(lowest, self.items.len());
            for index in self.buckets.values() {
                index.remove_all(old.iter().copied(), |d: &Displayable| {
                    positions.get(&d.id()).copied()
                });
            }
        }
        true
    }

    fn reorder(&mut self, from: usize, to: usize) {
        let d = self.items.remove(from);
        self.items.insert(to, d);
        let (lo, hi) = (from.min(to), from.max(to));
        let positions = self.positions(lo, hi);
        for index in self.buckets.values() {
            index.update_range_with(lo, hi, |d: &Displayable| positions.get(&d.id()).copied());
        }
    }

    /// Swap with the displayable above. Returns `false` at the top.
    pub fn move_up(&mut self, id: DisplayableId) -> bool {
        match self.index_of(id) {
            Some(i) if i + 1 < self.items.len() => {
                self.reorder(i, i + 1);
                true
            }
            _ => false,
        }
    }

    /// Swap with the displayable below. Returns `false` at the bottom.
    pub fn move_down(&mut self, id: DisplayableId) -> bool {
        match self.index_of(id) {
            Some(i) if i > 0 => {
                self.reorder(i, i - 1);
                true
            }
            _ => false,
        }
    }

    /// Raise above every other displayable.
    pub fn move_top(&mut self, id: DisplayableId) -> bool {
        let top = self.items.len().saturating_sub(1);
        match self.index_of(id) {
            Some(i) if i < top => {
                self.reorder(i, top);
                true
            }
            _ => false,
        }
    }

    /// Lower below every other displayable.
    pub fn move_bottom(&mut self, id: DisplayableId) -> bool {
        match self.index_of(id) {
            Some(i) if i > 0 => {
                self.reorder(i, 0);
                true
            }
            _ => false,
        }
    }

    /// Shift a displayable's footprint in every layer it appears in. Refused for
    /// locked displayables.
    pub fn translate(&mut self, id: DisplayableId, delta: Vec2) -> bool {
        let Some(i) = self.index_of(id) else {
            return false;
        };
        let d = &self.items[i];
        if d.is_locked() {
            log::debug!("{id:?} is locked; not moving it");
            return false;
        }
        for layer in d.layers() {
            d.translate(layer, delta);
        }
        for (layer, index) in self.footprint_buckets(d) {
            index.update_position(i, d, &layer);
        }
        true
    }

    /// Replace or clear a displayable's footprint in `layer`.
    pub fn set_footprint(&mut self, id: DisplayableId, layer: LayerId, area: Option<Area>) -> bool {
        let Some(i) = self.index_of(id) else {
            return false;
        };
        let d = &self.items[i];
        d.set_footprint(layer, area);
        if let Some(index) = self.layer_bucket(layer) {
            index.update_position(i, d, &layer);
        }
        true
    }

    /// Show or hide a displayable in every layer.
    pub fn set_visible(&mut self, id: DisplayableId, visible: bool) -> bool {
        let Some(d) = self.get(id) else {
            return false;
        };
        d.set_visible(visible);
        true
    }

    fn scan(
        &self,
        filter: LayerFilter,
        hit: impl Fn(&Displayable) -> bool,
    ) -> Vec<Arc<Displayable>> {
        self.items
            .iter()
            .filter(|d| {
                let d: &Displayable = d;
                filter.accepts(d) && hit(d)
            })
            .cloned()
            .collect()
    }

    /// Displayables containing `pt` in `layer`, bottom first.
    pub fn find_at(&self, layer: LayerId, pt: Point, filter: LayerFilter) -> Vec<Arc<Displayable>> {
        match self.layer_bucket(layer) {
            Some(index) => index.find_at_point(pt, &layer, filter),
            None => self.scan(filter, |d| d.contains_point(&layer, pt)),
        }
    }

    /// The topmost displayable containing `pt` in `layer`.
    pub fn top_at(&self, layer: LayerId, pt: Point, filter: LayerFilter) -> Option<Arc<Displayable>> {
        self.find_at(layer, pt, filter).pop()
    }

    /// Displayables overlapping `rect` in `layer`, bottom first.
    pub fn find_in_rect(&self, layer: LayerId, rect: Rect, filter: LayerFilter) -> Vec<Arc<Displayable>> {
        match self.layer_bucket(layer) {
            Some(index) => index.find_in_rect(rect, &layer, filter),
            None => self.scan(filter, |d| d.intersects_rect(&layer, rect)),
        }
    }

    /// Displayables overlapping `area` in `layer`, bottom first.
    pub fn find_in_area(&self, layer: LayerId, area: &Area, filter: LayerFilter) -> Vec<Arc<Displayable>> {
        match self.layer_bucket(layer) {
            Some(index) => index.find_in_area(area, &layer, filter),
            None => self.scan(filter, |d| d.intersects_area(&layer, area)),
        }
    }

    /// Cheap superset of [`find_in_rect`](Self::find_in_rect).
    pub fn roughly_find(&self, layer: LayerId, rect: Rect, filter: LayerFilter) -> Vec<Arc<Displayable>> {
        match self.layer_bucket(layer) {
            Some(index) => index.roughly_find_in_rect(rect, &layer, filter),
            None => self.scan(filter, |d| d.is_roughly_inside(&layer, rect)),
        }
    }

    /// Rebuild the index of every layer.
    pub fn recreate_buckets(&mut self) {
        let mut buckets = HashMap::with_capacity(self.layers.len());
        for &layer in &self.layers {
            let index = SpatialIndex::new(self.config);
            index.populate(&*self, &layer);
            buckets.insert(layer, index);
        }
        log::debug!("built buckets for {} layers", buckets.len());
        self.buckets = buckets;
    }

    /// Rebuild the index of one layer. Returns `false` for unknown layers.
    pub fn recreate_layer_buckets(&mut self, layer: LayerId) -> bool {
        if !self.layers.contains(&layer) {
            log::debug!("{layer:?} is not part of the layer set");
            return false;
        }
        let index = SpatialIndex::new(self.config);
        index.populate(&*self, &layer);
        self.buckets.insert(layer, index);
        true
    }

    /// Build the buckets if none exist yet.
    pub fn check_buckets(&mut self) {
        if self.buckets.is_empty() {
            self.recreate_buckets();
        }
    }
}

impl Container for LayerSet {
    type Item = Displayable;

    fn items(&self) -> Vec<Arc<Displayable>> {
        self.items.clone()
    }

    fn size(&self) -> Size {
        self.size
    }
}

impl core::fmt::Debug for LayerSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LayerSet")
            .field("size", &self.size)
            .field("layers", &self.layers)
            .field("displayables", &self.items.len())
            .field("indexed_layers", &self.buckets.len())
            .finish_non_exhaustive()
    }
}
