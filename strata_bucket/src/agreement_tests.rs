// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Randomized agreement between the bucket index and a brute-force scan.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use kurbo::{Point, Rect, Size};
use parking_lot::RwLock;
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{Area, Bucketable, Container, IndexConfig, Kind, QueryFilter, SpatialIndex};

const W: f64 = 8192.0;
const H: f64 = 6144.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Tag {
    Any,
    Outline,
    Fill,
    Hatched,
}

impl Kind for Tag {
    fn parent(self) -> Option<Self> {
        match self {
            Self::Any => None,
            Self::Outline | Self::Fill => Some(Self::Any),
            Self::Hatched => Some(Self::Fill),
        }
    }
}

#[derive(Debug)]
struct Shape {
    id: u32,
    tag: Tag,
    visible: AtomicBool,
    area: RwLock<Area>,
}

impl Bucketable for Shape {
    type Id = u32;
    type Kind = Tag;
    type Context = ();

    fn id(&self) -> u32 {
        self.id
    }
    fn kind(&self) -> Tag {
        self.tag
    }
    fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Relaxed)
    }
    fn area_in(&self, _: &()) -> Option<Area> {
        Some(self.area.read().clone())
    }
}

#[derive(Debug, Default)]
struct Model {
    items: Vec<Arc<Shape>>,
}

impl Container for Model {
    type Item = Shape;
    fn items(&self) -> Vec<Arc<Shape>> {
        self.items.clone()
    }
    fn size(&self) -> Size {
        Size::new(W, H)
    }
}

impl Model {
    fn positions(&self) -> HashMap<u32, usize> {
        self.items.iter().enumerate().map(|(i, it)| (it.id, i)).collect()
    }

    fn scan(&self, filter: QueryFilter<Tag>, hit: impl Fn(&Shape) -> bool) -> Vec<u32> {
        self.items
            .iter()
            .map(|it| &**it)
            .filter(|it| filter.accepts(*it) && hit(*it))
            .map(|it| it.id)
            .collect()
    }
}

/// Rectangles and triangles that stay inside the container.
fn random_area(rng: &mut StdRng) -> Area {
    let w = rng.random_range(1.0..600.0);
    let h = rng.random_range(1.0..600.0);
    let x = rng.random_range(0.0..W - w);
    let y = rng.random_range(0.0..H - h);
    if rng.random_bool(0.5) {
        Area::from_rect(Rect::new(x, y, x + w, y + h))
    } else {
        let apex = rng.random_range(0.0..w);
        Area::from_polygon(&[
            Point::new(x, y + h),
            Point::new(x + w, y + h),
            Point::new(x + apex, y),
        ])
    }
}

fn random_shape(rng: &mut StdRng, id: u32) -> Arc<Shape> {
    let tag = match rng.random_range(0..3) {
        0 => Tag::Outline,
        1 => Tag::Fill,
        _ => Tag::Hatched,
    };
    Arc::new(Shape {
        id,
        tag,
        visible: AtomicBool::new(rng.random_bool(0.8)),
        area: RwLock::new(random_area(rng)),
    })
}

fn random_window(rng: &mut StdRng) -> Rect {
    let w = rng.random_range(1.0..1500.0);
    let h = rng.random_range(1.0..1500.0);
    let x = rng.random_range(0.0..W - w);
    let y = rng.random_range(0.0..H - h);
    Rect::new(x, y, x + w, y + h)
}

fn random_filter(rng: &mut StdRng) -> QueryFilter<Tag> {
    let base = if rng.random_bool(0.5) {
        QueryFilter::visible()
    } else {
        QueryFilter::all()
    };
    match rng.random_range(0..3) {
        0 => base,
        1 => base.of_kind(Tag::Fill),
        _ => base.subtype_of(Tag::Fill),
    }
}

fn ids(found: &[Arc<Shape>]) -> Vec<u32> {
    found.iter().map(|it| it.id).collect()
}

fn check_queries(rng: &mut StdRng, model: &Model, index: &SpatialIndex<Shape>) {
    let positions = model.positions();
    for _ in 0..40 {
        let filter = random_filter(rng);

        let rect = random_window(rng);
        let exact = ids(&index.find_in_rect(rect, &(), filter));
        assert_eq!(exact, model.scan(filter, |it| it.intersects_rect(&(), rect)), "rect {rect:?}");

        let rough = ids(&index.roughly_find_in_rect(rect, &(), filter));
        assert!(rough.is_sorted_by_key(|id| positions[id]), "rough hits out of stack order");
        for id in &exact {
            assert!(rough.contains(id), "rough query over {rect:?} missed {id}");
        }

        let pt = Point::new(rng.random_range(0.0..W), rng.random_range(0.0..H));
        let exact = ids(&index.find_at_point(pt, &(), filter));
        assert_eq!(exact, model.scan(filter, |it| it.contains_point(&(), pt)), "point {pt:?}");

        let area = random_area(rng);
        let exact = ids(&index.find_in_area(&area, &(), filter));
        assert_eq!(exact, model.scan(filter, |it| it.intersects_area(&(), &area)));
    }
}

#[test]
fn queries_match_brute_force_after_populate() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for side in [None, Some(512), Some(2000)] {
        let model = Model {
            items: (0..400).map(|id| random_shape(&mut rng, id)).collect(),
        };
        let config = IndexConfig { bucket_side: side };
        let index = SpatialIndex::new(config);
        index.populate(&model, &());
        assert_eq!(index.len(), model.items.len());
        check_queries(&mut rng, &model, &index);
    }
}

#[test]
fn incremental_maintenance_matches_brute_force() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut model = Model {
        items: (0..200).map(|id| random_shape(&mut rng, id)).collect(),
    };
    let mut next_id = 200;
    let index = SpatialIndex::new(IndexConfig::with_bucket_side(700));
    index.populate(&model, &());

    for step in 0..300 {
        let len = model.items.len();
        match rng.random_range(0..6) {
            0 if len > 1 => {
                let from = rng.random_range(0..len);
                let to = rng.random_range(0..len);
                let it = model.items.remove(from);
                model.items.insert(to, it);
                index.update_range(&model, from, to);
            }
            1 if len > 0 => {
                let i = rng.random_range(0..len);
                let it = &model.items[i];
                *it.area.write() = random_area(&mut rng);
                assert!(index.update_position(i, it, &()));
            }
            2 if len > 1 => {
                let i = rng.random_range(0..len);
                let gone = model.items.remove(i);
                let pos = model.positions();
                assert!(index.remove_at(gone.id, i, |it: &Shape| pos.get(&it.id).copied()));
            }
            3 if len > 3 => {
                let mut doomed: Vec<usize> = (0..3).map(|_| rng.random_range(0..len)).collect();
                doomed.sort_unstable();
                doomed.dedup();
                for &i in doomed.iter().rev() {
                    model.items.remove(i);
                }
                let pos = model.positions();
                let removed = index.remove_all(doomed.iter().copied(), |it: &Shape| pos.get(&it.id).copied());
                assert_eq!(removed, doomed.len());
            }
            4 if len > 0 => {
                let it = &model.items[rng.random_range(0..len)];
                it.visible.fetch_xor(true, Ordering::Relaxed);
            }
            _ => {
                let it = random_shape(&mut rng, next_id);
                next_id += 1;
                model.items.push(Arc::clone(&it));
                assert!(index.insert(model.items.len() - 1, &it, &()));
            }
        }
        assert_eq!(index.len(), model.items.len(), "after step {step}");
        if step % 25 == 0 {
            check_queries(&mut rng, &model, &index);
        }
    }
    check_queries(&mut rng, &model, &index);

    // A fresh build over the same model agrees with the maintained one.
    for it in &model.items {
        let maintained = index.registered_buckets(it.id);
        assert_eq!(index.registered_key(it.id), model.positions().get(&it.id).copied());
        assert!(!maintained.is_empty());
    }
    let rebuilt = SpatialIndex::new(IndexConfig::with_bucket_side(700));
    rebuilt.populate(&model, &());
    for it in &model.items {
        let mut a = index.registered_buckets(it.id);
        let mut b = rebuilt.registered_buckets(it.id);
        a.sort_by_key(|r| (r.x, r.y));
        b.sort_by_key(|r| (r.x, r.y));
        assert_eq!(a, b, "buckets of {}", it.id);
    }
}

/// Readers query while one writer moves shapes, re-keys, and rebuilds. Shapes
/// never change places in the stack, so ids come back strictly increasing.
#[test]
fn readers_run_alongside_maintenance() {
    let mut rng = StdRng::seed_from_u64(0xC0C0);
    let model = Model {
        items: (0..300).map(|id| random_shape(&mut rng, id)).collect(),
    };
    let index = SpatialIndex::new(IndexConfig::with_bucket_side(700));
    index.populate(&model, &());

    std::thread::scope(|scope| {
        for seed in 0..3_u64 {
            let index = &index;
            scope.spawn(move || {
                let mut rng = StdRng::seed_from_u64(seed);
                for _ in 0..400 {
                    let rect = random_window(&mut rng);
                    let found = ids(&index.find_in_rect(rect, &(), QueryFilter::all()));
                    assert!(found.is_sorted_by(|a, b| a < b), "{found:?} out of stack order");
                    let pt = Point::new(rng.random_range(0.0..W), rng.random_range(0.0..H));
                    let near = Rect::from_center_size(pt, (10.0, 10.0));
                    let found = ids(&index.roughly_find_in_rect(near, &(), QueryFilter::all()));
                    assert!(found.is_sorted_by(|a, b| a < b), "{found:?} out of stack order");
                }
            });
        }

        let (index, model) = (&index, &model);
        scope.spawn(move || {
            let mut rng = StdRng::seed_from_u64(0xF00D);
            for step in 0..200 {
                let i = rng.random_range(0..model.items.len());
                match step % 10 {
                    0 => index.populate(model, &()),
                    1 | 2 => {
                        let j = rng.random_range(0..model.items.len());
                        index.update_range(model, i, j);
                    }
                    _ => {
                        let it = &model.items[i];
                        *it.area.write() = random_area(&mut rng);
                        assert!(index.update_position(i, it, &()));
                    }
                }
            }
        });
    });

    assert_eq!(index.len(), model.items.len());
    check_queries(&mut rng, &model, &index);
}

/// Shapes appended while a rebuild is reading the model still end up indexed.
#[test]
fn appends_during_populate_are_kept() {
    let mut rng = StdRng::seed_from_u64(0xA99E);
    let shared = Shared(RwLock::new((0..100).map(|id| random_shape(&mut rng, id)).collect()));
    let extra: Vec<Arc<Shape>> = (100..140).map(|id| random_shape(&mut rng, id)).collect();
    let index = SpatialIndex::new(IndexConfig::with_bucket_side(700));
    index.populate(&shared, &());

    std::thread::scope(|scope| {
        let (index, shared) = (&index, &shared);
        scope.spawn(move || {
            for _ in 0..20 {
                index.populate(shared, &());
            }
        });
        scope.spawn(move || {
            for it in &extra {
                let key = {
                    let mut items = shared.0.write();
                    items.push(Arc::clone(it));
                    items.len() - 1
                };
                assert!(index.insert(key, it, &()));
            }
        });
    });

    let model = Model {
        items: shared.items(),
    };
    assert_eq!(index.len(), 140);
    for (i, it) in model.items.iter().enumerate() {
        assert_eq!(index.registered_key(it.id), Some(i), "key of {}", it.id);
    }
    check_queries(&mut rng, &model, &index);
}

/// A model other threads append to.
struct Shared(RwLock<Vec<Arc<Shape>>>);

impl Container for Shared {
    type Item = Shape;
    fn items(&self) -> Vec<Arc<Shape>> {
        self.0.read().clone()
    }
    fn size(&self) -> Size {
        Size::new(W, H)
    }
}
