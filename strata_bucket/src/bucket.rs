// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bucket tree: an arena of rectangular nodes tiling the container.
//!
//! Leaves map stack index → item. Internal nodes hold children that tile their
//! rectangle exactly; children are power-of-two sized so boundaries line up
//! across scales, with the last row and column truncated to fit.
//!
//! The node layout is fixed once built. Only leaf maps and the cached `empty`
//! flags change afterwards: each leaf map sits behind its own lock, and the
//! flags are atomics, so readers of disjoint leaves never contend.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::area::Area;
use crate::item::Bucketable;
use crate::reverse::ReverseIndex;
use crate::types::BucketRect;

/// Index of a node in the arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct BucketId(pub(crate) u32);

impl BucketId {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Arenas are far below u32::MAX nodes."
    )]
    const fn new(idx: usize) -> Self {
        Self(idx as u32)
    }

    const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Stack-ordered contents of a leaf.
pub(crate) type LeafMap<I> = BTreeMap<usize, Arc<I>>;

/// `(stack index, item, shape)` considered while building a subtree.
pub(crate) type Candidate<'a, I> = (usize, &'a Arc<I>, &'a Area);

enum Body<I> {
    Leaf(RwLock<LeafMap<I>>),
    Internal(Vec<BucketId>),
}

struct Bucket<I> {
    rect: BucketRect,
    parent: Option<BucketId>,
    empty: AtomicBool,
    body: Body<I>,
}

impl<I> Bucket<I> {
    fn is_empty(&self) -> bool {
        self.empty.load(Ordering::Acquire)
    }

    fn set_empty(&self, empty: bool) {
        self.empty.store(empty, Ordering::Release);
    }
}

/// Bucket tree over items of type `I`.
pub(crate) struct BucketTree<I> {
    nodes: Vec<Bucket<I>>,
    bucket_side: u32,
}

impl<I: Bucketable> BucketTree<I> {
    /// A tree with a single empty leaf covering nothing.
    pub(crate) fn empty() -> Self {
        Self {
            nodes: vec![Bucket {
                rect: BucketRect::new(0, 0, 0, 0),
                parent: None,
                empty: AtomicBool::new(true),
                body: Body::Leaf(RwLock::new(BTreeMap::new())),
            }],
            bucket_side: 0,
        }
    }

    /// Build a tree over `root`, registering every placement in `reverse`.
    pub(crate) fn build(
        root: BucketRect,
        bucket_side: u32,
        candidates: &[Candidate<'_, I>],
        reverse: &mut ReverseIndex<I::Id>,
    ) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            bucket_side: bucket_side.max(1),
        };
        let root_rect = root.to_rect();
        let local: Vec<Candidate<'_, I>> = candidates
            .iter()
            .copied()
            .filter(|(_, _, area)| area.intersects_rect(root_rect))
            .collect();
        tree.build_node(root, None, &local, reverse);
        tree
    }

    /// `candidates` must already be filtered down to those touching `rect`.
    fn build_node(
        &mut self,
        rect: BucketRect,
        parent: Option<BucketId>,
        candidates: &[Candidate<'_, I>],
        reverse: &mut ReverseIndex<I::Id>,
    ) -> BucketId {
        let id = BucketId::new(self.nodes.len());
        let side = i64::from(self.bucket_side);
        if i64::from(rect.w) <= side || i64::from(rect.h) <= side {
            let mut map = BTreeMap::new();
            for &(key, item, _) in candidates {
                map.insert(key, Arc::clone(item));
                reverse.register(item.id(), key, id);
            }
            self.nodes.push(Bucket {
                rect,
                parent,
                empty: AtomicBool::new(map.is_empty()),
                body: Body::Leaf(RwLock::new(map)),
            });
            return id;
        }

        self.nodes.push(Bucket {
            rect,
            parent,
            empty: AtomicBool::new(true),
            body: Body::Internal(Vec::new()),
        });
        let child = child_side(rect);
        let (cw, ch) = (child.min(rect.w), child.min(rect.h));
        let mut children = Vec::new();
        let mut empty = true;
        let mut local: Vec<Candidate<'_, I>> = Vec::with_capacity(candidates.len());
        for dx in (0..rect.w).step_by(step(cw)) {
            for dy in (0..rect.h).step_by(step(ch)) {
                let sub = BucketRect::new(
                    rect.x + dx,
                    rect.y + dy,
                    cw.min(rect.w - dx),
                    ch.min(rect.h - dy),
                );
                let sub_rect = sub.to_rect();
                local.clear();
                local.extend(
                    candidates
                        .iter()
                        .copied()
                        .filter(|(_, _, area)| area.intersects_rect(sub_rect)),
                );
                let cid = self.build_node(sub, Some(id), &local, reverse);
                empty &= self.nodes[cid.idx()].is_empty();
                children.push(cid);
            }
        }
        let node = &mut self.nodes[id.idx()];
        node.body = Body::Internal(children);
        node.set_empty(empty);
        id
    }

    pub(crate) fn bucket_side(&self) -> u32 {
        self.bucket_side
    }

    pub(crate) fn root_rect(&self) -> BucketRect {
        self.nodes[0].rect
    }

    pub(crate) fn rect(&self, id: BucketId) -> Option<BucketRect> {
        self.nodes.get(id.idx()).map(|n| n.rect)
    }

    /// All leaves, in arena order.
    fn leaves(&self) -> impl Iterator<Item = (BucketId, &RwLock<LeafMap<I>>)> + '_ {
        self.nodes.iter().enumerate().filter_map(|(i, n)| match &n.body {
            Body::Leaf(map) => Some((BucketId::new(i), map)),
            Body::Internal(_) => None,
        })
    }

    fn leaf_map(&self, id: BucketId) -> Option<&RwLock<LeafMap<I>>> {
        match &self.nodes.get(id.idx())?.body {
            Body::Leaf(map) => Some(map),
            Body::Internal(_) => None,
        }
    }

    pub(crate) fn leaf_count(&self) -> usize {
        self.leaves().count()
    }

    pub(crate) fn leaf_rects(&self) -> Vec<BucketRect> {
        self.leaves()
            .map(|(id, _)| self.nodes[id.idx()].rect)
            .collect()
    }

    /// Place `item` under `key` in every leaf its shape touches. Returns whether
    /// any leaf took it.
    pub(crate) fn insert(
        &self,
        key: usize,
        item: &Arc<I>,
        area: &Area,
        reverse: &mut ReverseIndex<I::Id>,
    ) -> bool {
        self.insert_at(BucketId(0), key, item, area, reverse)
    }

    fn insert_at(
        &self,
        id: BucketId,
        key: usize,
        item: &Arc<I>,
        area: &Area,
        reverse: &mut ReverseIndex<I::Id>,
    ) -> bool {
        let node = &self.nodes[id.idx()];
        if !area.intersects_rect(node.rect.to_rect()) {
            return false;
        }
        node.set_empty(false);
        match &node.body {
            Body::Internal(children) => {
                let mut placed = false;
                for &c in children {
                    placed |= self.insert_at(c, key, item, area, reverse);
                }
                placed
            }
            Body::Leaf(map) => {
                let evicted = map.write().insert(key, Arc::clone(item));
                if let Some(prev) = evicted
                    && prev.id() != item.id()
                {
                    log::warn!(
                        "stack index {key} in bucket {:?} held {:?}, replaced by {:?}",
                        node.rect,
                        prev.id(),
                        item.id()
                    );
                    reverse.unregister(prev.id(), id);
                }
                reverse.register(item.id(), key, id);
                true
            }
        }
    }

    /// Whether the leaf's rectangle still touches `area`.
    pub(crate) fn leaf_touches(&self, leaf: BucketId, area: Option<&Area>) -> bool {
        match (self.nodes.get(leaf.idx()), area) {
            (Some(node), Some(area)) => area.intersects_rect(node.rect.to_rect()),
            _ => false,
        }
    }

    /// Remove `id` from one leaf, preferably at `key`. Falls back to a scan of the
    /// leaf when the entry at `key` belongs to someone else.
    pub(crate) fn remove_from_leaf(&self, leaf: BucketId, key: usize, id: I::Id) -> bool {
        let Some(node) = self.nodes.get(leaf.idx()) else {
            return false;
        };
        let Body::Leaf(map) = &node.body else {
            return false;
        };
        let (removed, now_empty) = {
            let mut map = map.write();
            let removed = if map.get(&key).is_some_and(|it| it.id() == id) {
                map.remove(&key);
                true
            } else {
                let before = map.len();
                map.retain(|_, it| it.id() != id);
                if before != map.len() {
                    log::debug!("{id:?} found in bucket {:?} under a stale key", node.rect);
                }
                before != map.len()
            };
            (removed, map.is_empty())
        };
        if now_empty {
            self.refresh_upward(leaf);
        }
        removed
    }

    /// Re-key the entries of `leaves` whose key lies in `range`, using
    /// `new_key_of`. Other leaves are not touched.
    ///
    /// Entries are first pulled out of the leaf, then reinserted, so that a new
    /// key can never clobber an entry of the same range that has not moved yet.
    pub(crate) fn rekey<F>(
        &self,
        leaves: &BTreeSet<BucketId>,
        range: RangeInclusive<usize>,
        new_key_of: &F,
        reverse: &mut ReverseIndex<I::Id>,
    ) where
        F: Fn(&I) -> Option<usize> + ?Sized,
    {
        let mut emptied = Vec::new();
        for &leaf in leaves {
            let Some(map) = self.leaf_map(leaf) else {
                continue;
            };
            let mut map = map.write();
            let keys: Vec<usize> = map.range(range.clone()).map(|(k, _)| *k).collect();
            if keys.is_empty() {
                continue;
            }
            let moved: Vec<Arc<I>> = keys.iter().filter_map(|k| map.remove(k)).collect();
            for item in moved {
                let Some(key) = new_key_of(&item) else {
                    log::warn!("no new stack index for {:?}; dropping it from its bucket", item.id());
                    reverse.unregister(item.id(), leaf);
                    continue;
                };
                if let Some(prev) = map.insert(key, Arc::clone(&item))
                    && prev.id() != item.id()
                {
                    log::warn!("re-keying {:?} to {key} evicted {:?}", item.id(), prev.id());
                    reverse.unregister(prev.id(), leaf);
                }
                reverse.set_key(item.id(), key);
            }
            if map.is_empty() {
                emptied.push(leaf);
            }
        }
        for leaf in emptied {
            self.refresh_upward(leaf);
        }
    }

    fn refresh_upward(&self, leaf: BucketId) {
        let node = &self.nodes[leaf.idx()];
        if let Body::Leaf(map) = &node.body {
            node.set_empty(map.read().is_empty());
        }
        let mut cur = node.parent;
        while let Some(pid) = cur {
            let parent = &self.nodes[pid.idx()];
            let Body::Internal(children) = &parent.body else {
                break;
            };
            let empty = children.iter().all(|c| self.nodes[c.idx()].is_empty());
            parent.set_empty(empty);
            if !empty {
                break;
            }
            cur = parent.parent;
        }
    }

    /// Depth-first search into one shared, stack-ordered accumulator.
    ///
    /// `visit` prunes subtrees by their rectangle; `accept` is the leaf-level
    /// test, given the item and the rectangle of the leaf holding it.
    pub(crate) fn search<V, A>(&self, visit: &V, accept: &A, accum: &mut LeafMap<I>)
    where
        V: Fn(&BucketRect) -> bool,
        A: Fn(&I, &BucketRect) -> bool,
    {
        self.search_at(BucketId(0), visit, accept, accum);
    }

    fn search_at<V, A>(&self, id: BucketId, visit: &V, accept: &A, accum: &mut LeafMap<I>)
    where
        V: Fn(&BucketRect) -> bool,
        A: Fn(&I, &BucketRect) -> bool,
    {
        let node = &self.nodes[id.idx()];
        if node.is_empty() || !visit(&node.rect) {
            return;
        }
        match &node.body {
            Body::Internal(children) => {
                for &c in children {
                    self.search_at(c, visit, accept, accum);
                }
            }
            Body::Leaf(map) => {
                let map = map.read();
                for (key, item) in map.iter() {
                    if accum.contains_key(key) {
                        continue;
                    }
                    if accept(item, &node.rect) {
                        accum.insert(*key, Arc::clone(item));
                    }
                }
            }
        }
    }
}

impl<I> core::fmt::Debug for BucketTree<I> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let leaves = self
            .nodes
            .iter()
            .filter(|n| matches!(n.body, Body::Leaf(_)))
            .count();
        f.debug_struct("BucketTree")
            .field("root", &self.nodes[0].rect)
            .field("bucket_side", &self.bucket_side)
            .field("nodes", &self.nodes.len())
            .field("leaves", &leaves)
            .finish_non_exhaustive()
    }
}

/// Largest power of two not above half of the rectangle's longer side.
fn child_side(rect: BucketRect) -> i32 {
    let half = (rect.w.max(rect.h) / 2).max(1);
    1 << half.ilog2()
}

#[allow(
    clippy::cast_sign_loss,
    reason = "Tile sides are always positive."
)]
fn step(side: i32) -> usize {
    side.max(1) as usize
}
