// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Leaf sizing: explicit configuration or a median-based heuristic.

use crate::area::Area;

/// Smallest bucket side the heuristic will choose.
///
/// An explicitly configured side may go below this; it is accepted with a warning.
pub const MIN_BUCKET_SIDE: u32 = 4096;

/// Index configuration.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexConfig {
    /// Fixed maximum leaf side. `None` derives it from the items on each rebuild.
    pub bucket_side: Option<u32>,
}

impl IndexConfig {
    /// Use a fixed bucket side.
    pub const fn with_bucket_side(side: u32) -> Self {
        Self {
            bucket_side: Some(side),
        }
    }
}

/// Resolve the bucket side for a rebuild.
///
/// With no explicit side: twice the median of the items' larger bounding
/// dimension, but never below [`MIN_BUCKET_SIDE`]. Items without an area are
/// ignored.
pub fn bucket_side_for<'a>(
    config: &IndexConfig,
    areas: impl IntoIterator<Item = Option<&'a Area>>,
) -> u32 {
    if let Some(side) = config.bucket_side {
        if side < MIN_BUCKET_SIDE {
            log::warn!(
                "bucket side {side} is smaller than the recommended minimum of {MIN_BUCKET_SIDE}"
            );
        }
        return side.max(1);
    }
    let mut sizes: Vec<u32> = areas
        .into_iter()
        .flatten()
        .map(|a| {
            let b = a.bounds();
            to_side(b.width().max(b.height()))
        })
        .collect();
    if sizes.is_empty() {
        return MIN_BUCKET_SIDE;
    }
    sizes.sort_unstable();
    let side = sizes[sizes.len() / 2].saturating_mul(2);
    side.max(MIN_BUCKET_SIDE)
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "Extents are clamped to the u32 range before the cast."
)]
fn to_side(extent: f64) -> u32 {
    extent.ceil().clamp(0.0, f64::from(u32::MAX)) as u32
}
