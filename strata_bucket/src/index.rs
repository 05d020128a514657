// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public [`SpatialIndex`] API.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::RangeInclusive;
use std::sync::Arc;

use kurbo::{Point, Rect};
use parking_lot::{Mutex, RwLock};

use crate::area::Area;
use crate::bucket::{BucketTree, Candidate};
use crate::item::{Bucketable, Container, QueryFilter};
use crate::reverse::ReverseIndex;
use crate::sizing::{IndexConfig, bucket_side_for};
use crate::types::BucketRect;

/// One built tree together with the registrations that describe it.
struct Generation<I: Bucketable> {
    tree: BucketTree<I>,
    reverse: Mutex<ReverseIndex<I::Id>>,
}

impl<I: Bucketable> Generation<I> {
    fn empty() -> Self {
        Self {
            tree: BucketTree::empty(),
            reverse: Mutex::new(ReverseIndex::default()),
        }
    }

    /// Two-pass re-key restricted to the leaves holding a key in `range`.
    fn rekey<F>(&self, range: RangeInclusive<usize>, new_index_of: &F, reverse: &mut ReverseIndex<I::Id>)
    where
        F: Fn(&I) -> Option<usize>,
    {
        let leaves = reverse.leaves_keyed_in(&range);
        self.tree.rekey(&leaves, range, new_index_of, reverse);
    }
}

/// Hierarchical bucket index over the items of one container.
///
/// Items are kept by stack index, so every query returns its hits in paint
/// order without sorting. The container stays the owner of the item list and
/// reports every change to it through the incremental operations below;
/// [`SpatialIndex::populate`] rebuilds from scratch.
///
/// All operations take `&self`. Mutations, [`populate`](Self::populate)
/// included, are serialized by one writer lock, while queries only take short
/// per-leaf read locks and never wait on each other. A rebuild is prepared off
/// to the side and swapped in at once, so a query observes either the old tree
/// or the new one.
pub struct SpatialIndex<I: Bucketable> {
    config: IndexConfig,
    /// Held by every mutation from its first read of `current` to its last write.
    writer: Mutex<()>,
    current: RwLock<Arc<Generation<I>>>,
}

impl<I: Bucketable> SpatialIndex<I> {
    /// Create an empty index. Nothing is found until the first [`populate`](Self::populate).
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            writer: Mutex::new(()),
            current: RwLock::new(Arc::new(Generation::empty())),
        }
    }

    /// The configuration this index was created with.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    fn snapshot(&self) -> Arc<Generation<I>> {
        Arc::clone(&self.current.read())
    }

    /// Rebuild the whole tree from `container`.
    ///
    /// The root covers the container's size. Items without a shape in `ctx`, or
    /// with a degenerate one, are not indexed.
    ///
    /// Queries keep running on the previous tree until the swap. Other mutations
    /// wait for the rebuild to finish and then apply to the new tree, so a change
    /// reported while the container was being read is not lost.
    pub fn populate<C>(&self, container: &C, ctx: &I::Context)
    where
        C: Container<Item = I> + ?Sized,
    {
        let _writer = self.writer.lock();
        let items = container.items();
        let areas: Vec<Option<Area>> = items
            .iter()
            .map(|it| it.area_in(ctx).filter(|a| !a.is_degenerate()))
            .collect();
        let side = bucket_side_for(&self.config, areas.iter().map(Option::as_ref));
        let root = BucketRect::from_size(container.size());
        let candidates: Vec<Candidate<'_, I>> = items
            .iter()
            .zip(&areas)
            .enumerate()
            .filter_map(|(key, (item, area))| Some((key, item, area.as_ref()?)))
            .collect();

        let mut reverse = ReverseIndex::default();
        let tree = BucketTree::build(root, side, &candidates, &mut reverse);
        log::debug!(
            "populated bucket index: root {root:?}, side {side}, {} leaves, {} of {} items indexed",
            tree.leaf_count(),
            reverse.len(),
            items.len()
        );
        let next = Arc::new(Generation {
            tree,
            reverse: Mutex::new(reverse),
        });
        *self.current.write() = next;
    }

    /// Add `item` at `stack_index`, using its current shape in `ctx`.
    ///
    /// Returns whether any bucket took the item.
    pub fn insert(&self, stack_index: usize, item: &Arc<I>, ctx: &I::Context) -> bool {
        match item.area_in(ctx) {
            Some(area) => self.insert_area(stack_index, item, &area),
            None => {
                log::trace!("{:?} has no shape here; not indexed", item.id());
                false
            }
        }
    }

    /// Add `item` at `stack_index` with an explicitly supplied shape.
    pub fn insert_area(&self, stack_index: usize, item: &Arc<I>, area: &Area) -> bool {
        if area.is_degenerate() {
            log::trace!("{:?} has a degenerate shape; not indexed", item.id());
            return false;
        }
        let _writer = self.writer.lock();
        let current = self.current.read();
        let mut reverse = current.reverse.lock();
        current.tree.insert(stack_index, item, area, &mut reverse)
    }

    /// Remove an item from every bucket holding it. Stack indices of the other
    /// items are left alone.
    ///
    /// Returns `false` if the item was not indexed.
    pub fn remove(&self, id: I::Id) -> bool {
        let _writer = self.writer.lock();
        let current = self.current.read();
        let mut reverse = current.reverse.lock();
        remove_registered(&current, &mut reverse, id)
    }

    /// Remove an item that sat at `old_stack_index`, then re-key everything
    /// above it through `new_index_of`.
    pub fn remove_at<F>(&self, id: I::Id, old_stack_index: usize, new_index_of: F) -> bool
    where
        F: Fn(&I) -> Option<usize>,
    {
        let _writer = self.writer.lock();
        let current = self.current.read();
        let mut reverse = current.reverse.lock();
        let removed = remove_registered(&current, &mut reverse, id);
        if let Some(first) = old_stack_index.checked_add(1) {
            current.rekey(first..=usize::MAX, &new_index_of, &mut reverse);
        }
        removed
    }

    /// Remove every item keyed at one of `old_indices`, then re-key the survivors
    /// through `new_index_of`.
    ///
    /// Returns the number of items removed.
    pub fn remove_all<F>(&self, old_indices: impl IntoIterator<Item = usize>, new_index_of: F) -> usize
    where
        F: Fn(&I) -> Option<usize>,
    {
        let keys: BTreeSet<usize> = old_indices.into_iter().collect();
        let Some(&lowest) = keys.first() else {
            return 0;
        };
        let _writer = self.writer.lock();
        let current = self.current.read();
        let mut reverse = current.reverse.lock();
        let mut removed = 0;
        for id in reverse.ids_keyed_in(&keys) {
            if remove_registered(&current, &mut reverse, id) {
                removed += 1;
            }
        }
        current.rekey(lowest..=usize::MAX, &new_index_of, &mut reverse);
        log::debug!("removed {removed} items for {} stack indices", keys.len());
        removed
    }

    /// Re-key the entries between stack indices `old` and `new` (inclusive, in
    /// either order) after the container reordered them.
    ///
    /// The new stack index of each affected item is its current position in
    /// `container`.
    pub fn update_range<C>(&self, container: &C, old: usize, new: usize)
    where
        C: Container<Item = I> + ?Sized,
    {
        let (lo, hi) = (old.min(new), old.max(new));
        let items = container.items();
        let positions: HashMap<I::Id, usize> = items
            .iter()
            .enumerate()
            .skip(lo)
            .take((hi - lo).saturating_add(1))
            .map(|(i, it)| (it.id(), i))
            .collect();
        self.update_range_with(lo, hi, |it: &I| positions.get(&it.id()).copied());
    }

    /// Re-key the entries between `old` and `new` (inclusive, in either order)
    /// with an explicit mapping. Items the mapping does not cover are dropped
    /// from their buckets with a warning.
    pub fn update_range_with<F>(&self, old: usize, new: usize, new_index_of: F)
    where
        F: Fn(&I) -> Option<usize>,
    {
        let (lo, hi) = (old.min(new), old.max(new));
        let _writer = self.writer.lock();
        let current = self.current.read();
        let mut reverse = current.reverse.lock();
        current.rekey(lo..=hi, &new_index_of, &mut reverse);
    }

    /// Re-place `item` after its shape in `ctx` changed.
    ///
    /// Buckets the item no longer touches forget it; buckets it now touches
    /// gain it. Returns whether the item is indexed afterwards.
    pub fn update_position(&self, stack_index: usize, item: &Arc<I>, ctx: &I::Context) -> bool {
        let area = item.area_in(ctx).filter(|a| !a.is_degenerate());
        let id = item.id();
        let _writer = self.writer.lock();
        let current = self.current.read();
        let mut reverse = current.reverse.lock();
        if let Some(reg) = reverse.get(id).cloned() {
            // A changed key would leave the old entries behind next to the new ones.
            let rekeyed = reg.key != stack_index;
            for leaf in reg.leaves {
                if rekeyed || !current.tree.leaf_touches(leaf, area.as_ref()) {
                    current.tree.remove_from_leaf(leaf, reg.key, id);
                    reverse.unregister(id, leaf);
                }
            }
        }
        match area {
            Some(area) => current.tree.insert(stack_index, item, &area, &mut reverse),
            None => false,
        }
    }

    /// Items whose shape contains `pt`, in stack order.
    pub fn find_at_point(
        &self,
        pt: Point,
        ctx: &I::Context,
        filter: QueryFilter<I::Kind>,
    ) -> Vec<Arc<I>> {
        self.query(
            |r| r.contains_point(pt),
            |it, _| filter.accepts(it) && it.contains_point(ctx, pt),
        )
    }

    /// Items whose shape overlaps `rect`, in stack order.
    pub fn find_in_rect(
        &self,
        rect: Rect,
        ctx: &I::Context,
        filter: QueryFilter<I::Kind>,
    ) -> Vec<Arc<I>> {
        let window = BucketRect::enclosing(rect);
        self.query(
            |r| r.intersects(&window),
            |it, _| filter.accepts(it) && it.intersects_rect(ctx, rect),
        )
    }

    /// Items whose shape overlaps `area`, in stack order.
    pub fn find_in_area(
        &self,
        area: &Area,
        ctx: &I::Context,
        filter: QueryFilter<I::Kind>,
    ) -> Vec<Arc<I>> {
        if area.is_degenerate() {
            return Vec::new();
        }
        let window = BucketRect::enclosing(area.bounds());
        self.query(
            |r| r.intersects(&window),
            |it, _| filter.accepts(it) && it.intersects_area(ctx, area),
        )
    }

    /// Cheap superset of [`find_in_rect`](Self::find_in_rect).
    ///
    /// Items are tested against the bucket they were found in rather than
    /// against `rect`, so every item an exact query returns is included, along
    /// with some that merely share a bucket with `rect`.
    pub fn roughly_find_in_rect(
        &self,
        rect: Rect,
        ctx: &I::Context,
        filter: QueryFilter<I::Kind>,
    ) -> Vec<Arc<I>> {
        let window = BucketRect::enclosing(rect);
        self.query(
            |r| r.intersects(&window),
            |it, leaf| filter.accepts(it) && it.is_roughly_inside(ctx, leaf.to_rect()),
        )
    }

    fn query<V, A>(&self, visit: V, accept: A) -> Vec<Arc<I>>
    where
        V: Fn(&BucketRect) -> bool,
        A: Fn(&I, &BucketRect) -> bool,
    {
        let current = self.snapshot();
        let mut hits = BTreeMap::new();
        current.tree.search(&visit, &accept, &mut hits);
        hits.into_values().collect()
    }

    /// Whether a query over `rect` is expected to beat a linear scan.
    ///
    /// True when `rect` is smaller than the container shrunk by one bucket side
    /// along each axis. A container no larger than one bucket side in either
    /// direction therefore never prefers the index; with the default sizing that
    /// covers every container under [`MIN_BUCKET_SIDE`](crate::MIN_BUCKET_SIDE).
    pub fn is_better(&self, rect: Rect) -> bool {
        let current = self.snapshot();
        let root = current.tree.root_rect();
        let side = f64::from(current.tree.bucket_side());
        let w = (f64::from(root.w) - side).max(0.0);
        let h = (f64::from(root.h) - side).max(0.0);
        rect.width().abs() * rect.height().abs() < w * h
    }

    /// Maximum leaf side of the current tree.
    pub fn bucket_side(&self) -> u32 {
        self.snapshot().tree.bucket_side()
    }

    /// Number of leaves in the current tree.
    pub fn leaf_count(&self) -> usize {
        self.snapshot().tree.leaf_count()
    }

    /// Rectangles of all leaves.
    pub fn leaf_rects(&self) -> Vec<BucketRect> {
        self.snapshot().tree.leaf_rects()
    }

    /// Number of indexed items.
    pub fn len(&self) -> usize {
        self.snapshot().reverse.lock().len()
    }

    /// True if no item is indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stack index an item is currently keyed under, if indexed.
    pub fn registered_key(&self, id: I::Id) -> Option<usize> {
        self.snapshot().reverse.lock().get(id).map(|reg| reg.key)
    }

    /// Rectangles of the leaves currently holding `id`.
    pub fn registered_buckets(&self, id: I::Id) -> Vec<BucketRect> {
        let current = self.snapshot();
        let reverse = current.reverse.lock();
        reverse
            .get(id)
            .map(|reg| {
                reg.leaves
                    .iter()
                    .filter_map(|&leaf| current.tree.rect(leaf))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn remove_registered<I: Bucketable>(
    current: &Generation<I>,
    reverse: &mut ReverseIndex<I::Id>,
    id: I::Id,
) -> bool {
    let Some(reg) = reverse.take(id) else {
        log::debug!("{id:?} is not in the bucket index");
        return false;
    };
    for leaf in reg.leaves {
        if !current.tree.remove_from_leaf(leaf, reg.key, id) {
            log::debug!("{id:?} was registered in a bucket that no longer holds it");
        }
    }
    true
}

impl<I: Bucketable> Default for SpatialIndex<I> {
    fn default() -> Self {
        Self::new(IndexConfig::default())
    }
}

impl<I: Bucketable> core::fmt::Debug for SpatialIndex<I> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let current = self.snapshot();
        f.debug_struct("SpatialIndex")
            .field("config", &self.config)
            .field("tree", &current.tree)
            .field("items", &current.reverse.lock().len())
            .finish_non_exhaustive()
    }
}
