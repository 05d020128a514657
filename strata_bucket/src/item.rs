// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Capabilities the index consumes from items and their container.

use core::fmt::Debug;
use core::hash::Hash;
use std::sync::Arc;

use kurbo::{Point, Rect, Size};

use crate::area::Area;

/// Runtime type tag of an item.
///
/// Tags form a single-inheritance hierarchy through [`Kind::parent`], which is
/// what [`KindFilter::SubtypeOf`] walks.
pub trait Kind: Copy + Eq + Debug + Send + Sync {
    /// The immediate supertype, or `None` at the top of the hierarchy.
    fn parent(self) -> Option<Self>;

    /// True if `self` is `other` or one of its descendants.
    fn is_subtype_of(self, other: Self) -> bool {
        let mut cur = Some(self);
        while let Some(k) = cur {
            if k == other {
                return true;
            }
            cur = k.parent();
        }
        false
    }
}

/// An object the bucket index can hold.
///
/// The index keeps items as `Arc<Self>` and never mutates them; shape and
/// visibility changes happen on the item itself and are reported to the index
/// by the container (see [`SpatialIndex::update_position`](crate::SpatialIndex::update_position)).
///
/// Only [`Bucketable::area_in`] is needed for indexing. The precise predicates
/// default to the [`Area`] operations and can be overridden when an item has a
/// cheaper or more exact test.
pub trait Bucketable: Send + Sync {
    /// Stable identity, used by the reverse index.
    type Id: Copy + Eq + Hash + Debug + Send + Sync;
    /// Type tag.
    type Kind: Kind;
    /// Coordinate context the shape is expressed in, for example a layer.
    type Context: ?Sized;

    /// Identity of this item.
    fn id(&self) -> Self::Id;

    /// Type tag of this item. Must not change while the item is indexed.
    fn kind(&self) -> Self::Kind;

    /// Whether the item is currently visible.
    fn is_visible(&self) -> bool;

    /// Current shape in `ctx`, or `None` if the item has no presence there.
    fn area_in(&self, ctx: &Self::Context) -> Option<Area>;

    /// Whether the item's shape in `ctx` contains `pt`.
    fn contains_point(&self, ctx: &Self::Context, pt: Point) -> bool {
        self.area_in(ctx).is_some_and(|a| a.contains(pt))
    }

    /// Whether the item's shape in `ctx` overlaps `rect`.
    fn intersects_rect(&self, ctx: &Self::Context, rect: Rect) -> bool {
        self.area_in(ctx).is_some_and(|a| a.intersects_rect(rect))
    }

    /// Whether the item's shape in `ctx` overlaps `area`.
    fn intersects_area(&self, ctx: &Self::Context, area: &Area) -> bool {
        self.area_in(ctx).is_some_and(|a| a.intersects_area(area))
    }

    /// Cheap test used by rough queries. May answer `true` for items that do not
    /// actually touch `rect`, but must never answer `false` for one that does.
    fn is_roughly_inside(&self, ctx: &Self::Context, rect: Rect) -> bool {
        self.area_in(ctx).is_some_and(|a| {
            let b = a.bounds();
            b.x0 <= rect.x1 && rect.x0 <= b.x1 && b.y0 <= rect.y1 && rect.y0 <= b.y1
        })
    }
}

/// The owner of an ordered item list, as seen by the index.
pub trait Container {
    /// Item type.
    type Item: Bucketable;

    /// Items in paint order. The position of an item is its stack index.
    fn items(&self) -> Vec<Arc<Self::Item>>;

    /// Extent of the container, starting at the origin. The root bucket covers it.
    fn size(&self) -> Size;
}

/// Type-tag filter applied by queries.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KindFilter<K> {
    /// Accept every item.
    Any,
    /// Accept only items whose tag equals this one.
    Exact(K),
    /// Accept items whose tag is this one or a descendant of it.
    SubtypeOf(K),
}

impl<K> Default for KindFilter<K> {
    fn default() -> Self {
        Self::Any
    }
}

impl<K: Kind> KindFilter<K> {
    /// Whether an item tagged `kind` passes.
    pub fn accepts(&self, kind: K) -> bool {
        match *self {
            Self::Any => true,
            Self::Exact(k) => kind == k,
            Self::SubtypeOf(k) => kind.is_subtype_of(k),
        }
    }
}

/// Filters applied to every query.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct QueryFilter<K> {
    /// If true, invisible items are skipped.
    pub visible_only: bool,
    /// Type-tag restriction.
    pub kind: KindFilter<K>,
}

impl<K> Default for QueryFilter<K> {
    fn default() -> Self {
        Self {
            visible_only: false,
            kind: KindFilter::Any,
        }
    }
}

impl<K: Kind> QueryFilter<K> {
    /// Every item, visible or not.
    pub const fn all() -> Self {
        Self {
            visible_only: false,
            kind: KindFilter::Any,
        }
    }

    /// Visible items only.
    pub const fn visible() -> Self {
        Self {
            visible_only: true,
            kind: KindFilter::Any,
        }
    }

    /// Restrict to items tagged exactly `kind`.
    #[must_use]
    pub fn of_kind(mut self, kind: K) -> Self {
        self.kind = KindFilter::Exact(kind);
        self
    }

    /// Restrict to items tagged `kind` or a descendant of it.
    #[must_use]
    pub fn subtype_of(mut self, kind: K) -> Self {
        self.kind = KindFilter::SubtypeOf(kind);
        self
    }

    /// Whether `item` passes the visibility and tag filters.
    pub fn accepts<I: Bucketable<Kind = K> + ?Sized>(&self, item: &I) -> bool {
        (!self.visible_only || item.is_visible()) && self.kind.accepts(item.kind())
    }
}
