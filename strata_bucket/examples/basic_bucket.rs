// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Basic usage of Strata Bucket: populate, reorder, move, and query.
//!
//! Run with `RUST_LOG=debug` to see the index's own log lines.

use std::sync::Arc;

use kurbo::{Point, Rect, Size};
use parking_lot::RwLock;
use strata_bucket::{Area, Bucketable, Container, IndexConfig, Kind, QueryFilter, SpatialIndex};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Mark {
    Note,
    Region,
}

impl Kind for Mark {
    fn parent(self) -> Option<Self> {
        None
    }
}

#[derive(Debug)]
struct Annotation {
    id: u32,
    mark: Mark,
    area: RwLock<Area>,
}

impl Bucketable for Annotation {
    type Id = u32;
    type Kind = Mark;
    type Context = ();

    fn id(&self) -> u32 {
        self.id
    }
    fn kind(&self) -> Mark {
        self.mark
    }
    fn is_visible(&self) -> bool {
        true
    }
    fn area_in(&self, _: &()) -> Option<Area> {
        Some(self.area.read().clone())
    }
}

struct Sheet(Vec<Arc<Annotation>>);

impl Container for Sheet {
    type Item = Annotation;
    fn items(&self) -> Vec<Arc<Annotation>> {
        self.0.clone()
    }
    fn size(&self) -> Size {
        Size::new(16384.0, 16384.0)
    }
}

fn note(id: u32, mark: Mark, r: Rect) -> Arc<Annotation> {
    Arc::new(Annotation {
        id,
        mark,
        area: RwLock::new(Area::from_rect(r)),
    })
}

fn main() {
    env_logger::init();

    let mut sheet = Sheet(vec![
        note(1, Mark::Region, Rect::new(0.0, 0.0, 5000.0, 5000.0)),
        note(2, Mark::Note, Rect::new(100.0, 100.0, 300.0, 200.0)),
        note(3, Mark::Region, Rect::new(4000.0, 4000.0, 9000.0, 9000.0)),
    ]);
    let index = SpatialIndex::new(IndexConfig::default());
    index.populate(&sheet, &());
    println!("{index:?}");

    let at = Point::new(150.0, 150.0);
    let hits: Vec<u32> = index
        .find_at_point(at, &(), QueryFilter::all())
        .iter()
        .map(|a| a.id)
        .collect();
    println!("hits at {at:?}, bottom first: {hits:?}");

    // Send the note to the bottom of the stack.
    let top = sheet.0.remove(1);
    sheet.0.insert(0, top);
    index.update_range(&sheet, 1, 0);
    let hits: Vec<u32> = index
        .find_at_point(at, &(), QueryFilter::all())
        .iter()
        .map(|a| a.id)
        .collect();
    println!("after reordering: {hits:?}");

    // Drag the last region far away and look where it landed.
    let moved = &sheet.0[2];
    *moved.area.write() = Area::from_rect(Rect::new(12000.0, 12000.0, 13000.0, 13000.0));
    index.update_position(2, moved, &());
    println!("region 3 now lives in {:?}", index.registered_buckets(3));

    let regions = index.find_in_rect(
        Rect::new(0.0, 0.0, 16384.0, 16384.0),
        &(),
        QueryFilter::all().of_kind(Mark::Region),
    );
    println!("regions: {:?}", regions.iter().map(|a| a.id).collect::<Vec<_>>());
}
