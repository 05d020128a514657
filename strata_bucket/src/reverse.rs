// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Item → leaf registrations, for removal and updates without tree descent.

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;
use std::ops::RangeBounds;

use smallvec::SmallVec;

use crate::bucket::BucketId;

/// Leaves holding one item. Most items touch a handful of leaves.
pub(crate) type LeafSet = SmallVec<[BucketId; 4]>;

#[derive(Clone, Debug, Default)]
pub(crate) struct Registration {
    /// Stack index the item is keyed under in its leaves.
    pub(crate) key: usize,
    pub(crate) leaves: LeafSet,
}

/// Reverse index: which leaves currently hold each item.
#[derive(Debug)]
pub(crate) struct ReverseIndex<Id> {
    entries: HashMap<Id, Registration>,
}

impl<Id> Default for ReverseIndex<Id> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<Id: Copy + Eq + Hash> ReverseIndex<Id> {
    /// Record that `leaf` holds `id` under `key`.
    pub(crate) fn register(&mut self, id: Id, key: usize, leaf: BucketId) {
        let reg = self.entries.entry(id).or_default();
        reg.key = key;
        if !reg.leaves.contains(&leaf) {
            reg.leaves.push(leaf);
        }
    }

    /// Drop a single leaf from an item's registrations; the entry goes away with its last leaf.
    pub(crate) fn unregister(&mut self, id: Id, leaf: BucketId) {
        if let Some(reg) = self.entries.get_mut(&id) {
            reg.leaves.retain(|l| *l != leaf);
            if reg.leaves.is_empty() {
                self.entries.remove(&id);
            }
        }
    }

    pub(crate) fn set_key(&mut self, id: Id, key: usize) {
        if let Some(reg) = self.entries.get_mut(&id) {
            reg.key = key;
        }
    }

    pub(crate) fn get(&self, id: Id) -> Option<&Registration> {
        self.entries.get(&id)
    }

    pub(crate) fn take(&mut self, id: Id) -> Option<Registration> {
        self.entries.remove(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Items registered under one of `keys`.
    pub(crate) fn ids_keyed_in(&self, keys: &BTreeSet<usize>) -> Vec<Id> {
        self.entries
            .iter()
            .filter(|(_, reg)| keys.contains(&reg.key))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Leaves holding at least one entry keyed inside `range`.
    pub(crate) fn leaves_keyed_in<R: RangeBounds<usize>>(&self, range: &R) -> BTreeSet<BucketId> {
        self.entries
            .values()
            .filter(|reg| range.contains(&reg.key))
            .flat_map(|reg| reg.leaves.iter().copied())
            .collect()
    }
}
