// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer implementation: stacking, index synchronization, queries.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use kurbo::{Point, Rect, Size, Vec2};
use strata_bucket::{Area, Bucketable, Container, IndexConfig, QueryFilter, SpatialIndex};

use crate::displayable::Displayable;
use crate::types::{DisplayableId, DisplayableKind, LayerId};

/// Filter over displayable kinds.
pub type LayerFilter = QueryFilter<DisplayableKind>;

/// An ordered stack of displayables, optionally backed by a bucket index.
///
/// The first displayable paints first, so it ends up at the bottom. Patches
/// are kept below everything else and labels above everything else; see
/// [`Layer::add`].
///
/// Buckets are enabled by default but not built until [`Layer::check_buckets`]
/// or [`Layer::recreate_buckets`] is called. Until then, and whenever they are
/// disabled, queries fall back to scanning the stack.
pub struct Layer {
    id: LayerId,
    size: Size,
    items: Vec<Arc<Displayable>>,
    config: IndexConfig,
    buckets_enabled: bool,
    index: Option<SpatialIndex<Displayable>>,
}

impl Layer {
    /// Create an empty layer covering `size`.
    pub fn new(id: LayerId, size: Size) -> Self {
        Self::with_config(id, size, IndexConfig::default())
    }

    /// Create an empty layer whose index uses `config`.
    pub fn with_config(id: LayerId, size: Size, config: IndexConfig) -> Self {
        Self {
            id,
            size,
            items: Vec::new(),
            config,
            buckets_enabled: true,
            index: None,
        }
    }

    /// Layer identifier; also the context footprints are looked up in.
    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Layer extent.
    pub fn size(&self) -> Size {
        self.size
    }

    /// Resize the layer. A built index is rebuilt over the new extent.
    pub fn set_size(&mut self, size: Size) {
        if self.size == size {
            return;
        }
        self.size = size;
        if self.index.is_some() {
            self.recreate_buckets();
        }
    }

    /// Displayables in paint order.
    pub fn displayables(&self) -> &[Arc<Displayable>] {
        &self.items
    }

    /// Number of displayables.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if the layer holds nothing.
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

    /// Whether `id` is in this layer.
    pub fn contains(&self, id: DisplayableId) -> bool {
        self.index_of(id).is_some()
    }

    /// Displayables passing `filter`, regardless of where they are.
    pub fn displayables_of(&self, filter: LayerFilter) -> Vec<Arc<Displayable>> {
        self.scan(filter, |_| true)
    }

    /// The bucket index, if built.
    pub fn index(&self) -> Option<&SpatialIndex<Displayable>> {
        self.index.as_ref()
    }

    fn positions(&self) -> HashMap<DisplayableId, usize> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, d)| (d.id(), i))
            .collect()
    }

    /// Where a new displayable of `kind` goes.
    fn slot_for(&self, kind: DisplayableKind) -> usize {
        match kind {
            DisplayableKind::Patch => self
                .items
                .iter()
                .take_while(|d| d.kind() == DisplayableKind::Patch)
                .count(),
            DisplayableKind::Label => self.items.len(),
            _ => self
                .items
                .iter()
                .rposition(|d| d.kind() != DisplayableKind::Label)
                .map_or(0, |i| i + 1),
        }
    }

    /// Add a displayable.
    ///
    /// Patches go right above the last patch at the bottom of the stack, labels
    /// go on top, and everything else goes right below the labels. Returns
    /// `false` if the displayable is already here.
    pub fn add(&mut self, d: Arc<Displayable>) -> bool {
        if self.contains(d.id()) {
            return false;
        }
        let stack_index = self.slot_for(d.kind());
        let old_len = self.items.len();
        self.items.insert(stack_index, Arc::clone(&d));
        if let Some(index) = &self.index {
            // Append under the first free key, then shift the displaced range.
            index.insert(old_len, &d, &self.id);
            if stack_index != old_len {
                index.update_range(&*self, stack_index, old_len);
            }
        }
        log::trace!("added {:?} at {stack_index} in {:?}", d.id(), self.id);
        true
    }

    /// Remove a displayable. Returns `false` if it is not here.
    pub fn remove(&mut self, id: DisplayableId) -> bool {
        let Some(i) = self.index_of(id) else {
            log::debug!("{id:?} is not in {:?}", self.id);
            return false;
        };
        self.items.remove(i);
        if let Some(index) = &self.index {
            let positions = self.positions();
            index.remove_at(id, i, |d: &Displayable| positions.get(&d.id()).copied());
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
        if old.is_empty() {
            return false;
        }
        self.items.retain(|d| !doomed.contains(&d.id()));
        if let Some(index) = &self.index {
            let positions = self.positions();
            index.remove_all(old, |d: &Displayable| positions.get(&d.id()).copied());
        }
        true
    }

    fn reorder(&mut self, from: usize, to: usize) {
        let d = self.items.remove(from);
        self.items.insert(to, d);
        if let Some(index) = &self.index {
            index.update_range(&*self, from, to);
        }
    }

    /// Swap with the displayable above, if it is of the same kind.
    pub fn move_up(&mut self, id: DisplayableId) -> bool {
        let Some(i) = self.index_of(id) else {
            return false;
        };
        let kind = self.items[i].kind();
        if self.items.get(i + 1).is_none_or(|d| d.kind() != kind) {
            return false;
        }
        self.reorder(i, i + 1);
        true
    }

    /// Swap with the displayable below, if it is of the same kind.
    pub fn move_down(&mut self, id: DisplayableId) -> bool {
        let Some(i) = self.index_of(id) else {
            return false;
        };
        let kind = self.items[i].kind();
        if i == 0 || self.items[i - 1].kind() != kind {
            return false;
        }
        self.reorder(i, i - 1);
        true
    }

    /// Raise above every displayable of the same kind in its run.
    pub fn move_top(&mut self, id: DisplayableId) -> bool {
        let Some(i) = self.index_of(id) else {
            return false;
        };
        let kind = self.items[i].kind();
        let run = self.items[i + 1..]
            .iter()
            .take_while(|d| d.kind() == kind)
            .count();
        if run == 0 {
            return false;
        }
        self.reorder(i, i + run);
        true
    }

    /// Lower below every displayable of the same kind in its run.
    pub fn move_bottom(&mut self, id: DisplayableId) -> bool {
        let Some(i) = self.index_of(id) else {
            return false;
        };
        let kind = self.items[i].kind();
        let run = self.items[..i]
            .iter()
            .rev()
            .take_while(|d| d.kind() == kind)
            .count();
        if run == 0 {
            return false;
        }
        self.reorder(i, i - run);
        true
    }

    fn update_bucket(&self, stack_index: usize) {
        if let Some(index) = &self.index {
            index.update_position(stack_index, &self.items[stack_index], &self.id);
        }
    }

    /// Shift a displayable's footprint in this layer. Refused for locked
    /// displayables.
    pub fn translate(&mut self, id: DisplayableId, delta: Vec2) -> bool {
        let Some(i) = self.index_of(id) else {
            return false;
        };
        if !self.items[i].translate(self.id, delta) {
            return false;
        }
        self.update_bucket(i);
        true
    }

    /// Replace or clear a displayable's footprint in this layer.
    pub fn set_footprint(&mut self, id: DisplayableId, area: Option<Area>) -> bool {
        let Some(i) = self.index_of(id) else {
            return false;
        };
        self.items[i].set_footprint(self.id, area);
        self.update_bucket(i);
        true
    }

    /// Show or hide a displayable.
    pub fn set_visible(&mut self, id: DisplayableId, visible: bool) -> bool {
        let Some(i) = self.index_of(id) else {
            return false;
        };
        self.items[i].set_visible(visible);
        self.update_bucket(i);
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

    /// Index to answer a query over `rect` with, if it beats a scan.
    fn index_for(&self, rect: Rect) -> Option<&SpatialIndex<Displayable>> {
        self.index.as_ref().filter(|index| index.is_better(rect))
    }

    /// Displayables containing `pt`, bottom first.
    pub fn find_at(&self, pt: Point, filter: LayerFilter) -> Vec<Arc<Displayable>> {
        match &self.index {
            Some(index) => index.find_at_point(pt, &self.id, filter),
            None => self.scan(filter, |d| d.contains_point(&self.id, pt)),
        }
    }

    /// The topmost displayable containing `pt`.
    pub fn top_at(&self, pt: Point, filter: LayerFilter) -> Option<Arc<Displayable>> {
        self.find_at(pt, filter).pop()
    }

    /// Displayables overlapping `rect`, bottom first.
    pub fn find_in_rect(&self, rect: Rect, filter: LayerFilter) -> Vec<Arc<Displayable>> {
        match self.index_for(rect) {
            Some(index) => index.find_in_rect(rect, &self.id, filter),
            None => self.scan(filter, |d| d.intersects_rect(&self.id, rect)),
        }
    }

    /// Displayables overlapping `area`, bottom first.
    pub fn find_in_area(&self, area: &Area, filter: LayerFilter) -> Vec<Arc<Displayable>> {
        match self.index_for(area.bounds()) {
            Some(index) => index.find_in_area(area, &self.id, filter),
            None => self.scan(filter, |d| d.intersects_area(&self.id, area)),
        }
    }

    /// Cheap superset of [`find_in_rect`](Self::find_in_rect) for callers that
    /// redo the exact test themselves, such as a painter.
    pub fn roughly_find(&self, rect: Rect, filter: LayerFilter) -> Vec<Arc<Displayable>> {
        match &self.index {
            Some(index) => index.roughly_find_in_rect(rect, &self.id, filter),
            None => self.scan(filter, |d| d.is_roughly_inside(&self.id, rect)),
        }
    }

    /// Displayables whose footprint overlaps that of `id`, excluding `id`.
    pub fn intersecting(&self, id: DisplayableId, filter: LayerFilter) -> Vec<Arc<Displayable>> {
        let Some(area) = self.get(id).and_then(|d| d.footprint(self.id)) else {
            return Vec::new();
        };
        let mut hits = self.find_in_area(&area, filter);
        hits.retain(|d| d.id() != id);
        hits
    }

    /// Build the index from scratch, replacing any existing one. Does nothing
    /// while buckets are disabled.
    pub fn recreate_buckets(&mut self) {
        if !self.buckets_enabled {
            log::debug!("buckets are disabled for {:?}", self.id);
            return;
        }
        if let Some(index) = &self.index {
            index.populate(&*self, &self.id);
            return;
        }
        let index = SpatialIndex::new(self.config);
        index.populate(&*self, &self.id);
        self.index = Some(index);
    }

    /// Build the index if buckets are enabled and it does not exist yet.
    pub fn check_buckets(&mut self) {
        if self.buckets_enabled && self.index.is_none() {
            self.recreate_buckets();
        }
    }

    /// Enable or disable buckets. Disabling drops the index.
    pub fn set_buckets_enabled(&mut self, enabled: bool) {
        self.buckets_enabled = enabled;
        if !enabled {
            self.index = None;
        }
    }

    /// Whether buckets are enabled.
    pub fn buckets_enabled(&self) -> bool {
        self.buckets_enabled
    }
}

impl Container for Layer {
    type Item = Displayable;

    fn items(&self) -> Vec<Arc<Displayable>> {
        self.items.clone()
    }

    fn size(&self) -> Size {
        self.size
    }
}

impl core::fmt::Debug for Layer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Layer")
            .field("id", &self.id)
            .field("size", &self.size)
            .field("displayables", &self.items.len())
            .field("buckets_enabled", &self.buckets_enabled)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}
