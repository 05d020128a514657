// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Strata Bucket: a hierarchical bucket index over paint-ordered 2D items.
//!
//! A container (a layer, a canvas, a slide) owns an ordered list of items, and
//! the position of an item in that list is its stack index. The index answers
//! "what is under this point / inside this rectangle / overlapping this shape"
//! and returns the hits in stack order, ready for painting or hit testing.
//!
//! - The container extent is tiled by a fixed tree of rectangular buckets. Leaves
//!   map stack index → item, so results come out ordered without a sort.
//! - An item is registered in every leaf its shape touches; a reverse index
//!   remembers which leaves those are for cheap removal and relocation.
//! - Queries run the item's exact predicates ([`Bucketable::contains_point`],
//!   [`Bucketable::intersects_rect`], [`Bucketable::intersects_area`]) at the
//!   leaves. [`SpatialIndex::roughly_find_in_rect`] trades exactness for speed
//!   and may over-report, never under-report.
//! - Reordering, removal, and shape changes are applied incrementally; a full
//!   [`SpatialIndex::populate`] is only needed when the container is resized.
//!
//! The leaf side defaults to twice the median item extent, but never less than
//! [`MIN_BUCKET_SIDE`]. See [`IndexConfig`] to fix it.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use kurbo::{Point, Rect, Size};
//! use strata_bucket::{Area, Bucketable, Container, IndexConfig, Kind, QueryFilter, SpatialIndex};
//!
//! #[derive(Copy, Clone, Debug, PartialEq, Eq)]
//! struct Box2;
//! impl Kind for Box2 {
//!     fn parent(self) -> Option<Self> { None }
//! }
//!
//! struct Tile { id: u32, rect: Rect }
//! impl Bucketable for Tile {
//!     type Id = u32;
//!     type Kind = Box2;
//!     type Context = ();
//!     fn id(&self) -> u32 { self.id }
//!     fn kind(&self) -> Box2 { Box2 }
//!     fn is_visible(&self) -> bool { true }
//!     fn area_in(&self, _: &()) -> Option<Area> { Some(Area::from_rect(self.rect)) }
//! }
//!
//! struct Board(Vec<Arc<Tile>>);
//! impl Container for Board {
//!     type Item = Tile;
//!     fn items(&self) -> Vec<Arc<Tile>> { self.0.clone() }
//!     fn size(&self) -> Size { Size::new(8192.0, 8192.0) }
//! }
//!
//! let board = Board(vec![
//!     Arc::new(Tile { id: 1, rect: Rect::new(0.0, 0.0, 100.0, 100.0) }),
//!     Arc::new(Tile { id: 2, rect: Rect::new(50.0, 50.0, 150.0, 150.0) }),
//! ]);
//! let index = SpatialIndex::new(IndexConfig::default());
//! index.populate(&board, &());
//!
//! // Bottom-most first.
//! let hits = index.find_at_point(Point::new(75.0, 75.0), &(), QueryFilter::all());
//! assert_eq!(hits.iter().map(|t| t.id).collect::<Vec<_>>(), [1, 2]);
//! ```
//!
//! ## Concurrency
//!
//! Every operation takes `&self`. Queries only take per-leaf read locks, so any
//! number of them run side by side. Mutations, [`SpatialIndex::populate`]
//! included, are serialized against each other by a single writer lock.
//! A rebuild does not block queries: they keep reading the previous tree until
//! the new one is swapped in, while other mutations wait for the swap and then
//! apply to the new tree.

pub mod area;
mod bucket;
pub mod index;
pub mod item;
mod reverse;
pub mod sizing;
pub mod types;

#[cfg(test)]
mod agreement_tests;

pub use area::Area;
pub use index::SpatialIndex;
pub use item::{Bucketable, Container, Kind, KindFilter, QueryFilter};
pub use sizing::{IndexConfig, MIN_BUCKET_SIDE, bucket_side_for};
pub use types::BucketRect;
