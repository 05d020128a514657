// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for layers: identifiers, kinds, and flags.

use strata_bucket::Kind;

/// Identifier of a layer. Displayables keep one footprint per layer id.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub u32);

/// Identifier of a displayable, unique within a project.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct DisplayableId(pub u64);

/// Type tag of a displayable.
///
/// The tags form a hierarchy:
///
/// ```text
/// Patch   Profile   Label   ZDisplayable
///                           ├── Ball
///                           ├── Pipe
///                           ├── Polyline
///                           ├── AreaList
///                           └── Tree
///                               ├── Treeline
///                               ├── AreaTree
///                               └── Connector
/// ```
///
/// [`ZDisplayable`](Self::ZDisplayable) and [`Tree`](Self::Tree) are abstract:
/// they only appear in query filters, never on a displayable.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum DisplayableKind {
    /// Image tile. Patches paint first.
    Patch,
    /// Hand-drawn outline.
    Profile,
    /// Text label. Labels paint last.
    Label,
    /// Abstract: anything spanning several layers.
    ZDisplayable,
    /// Spheres placed across layers.
    Ball,
    /// Tube with per-node radius.
    Pipe,
    /// Open polyline across layers.
    Polyline,
    /// One filled area per layer.
    AreaList,
    /// Abstract: skeleton trees.
    Tree,
    /// Skeleton with radii.
    Treeline,
    /// Skeleton with an area at each node.
    AreaTree,
    /// Links between other displayables.
    Connector,
}

impl DisplayableKind {
    /// True for tags that only exist as filter targets.
    pub const fn is_abstract(self) -> bool {
        matches!(self, Self::ZDisplayable | Self::Tree)
    }
}

impl Kind for DisplayableKind {
    fn parent(self) -> Option<Self> {
        match self {
            Self::Patch | Self::Profile | Self::Label | Self::ZDisplayable => None,
            Self::Ball | Self::Pipe | Self::Polyline | Self::AreaList | Self::Tree => {
                Some(Self::ZDisplayable)
            }
            Self::Treeline | Self::AreaTree | Self::Connector => Some(Self::Tree),
        }
    }
}

bitflags::bitflags! {
    /// Displayable state flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct DisplayableFlags: u8 {
        /// Displayable is painted and found by visible-only queries.
        const VISIBLE = 0b0000_0001;
        /// Displayable refuses to be moved.
        const LOCKED  = 0b0000_0010;
    }
}

impl Default for DisplayableFlags {
    fn default() -> Self {
        Self::VISIBLE
    }
}
