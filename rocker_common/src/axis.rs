//! Range-checked axis identifier.
//!
//! Raw axis bytes arrive from the bus; they become an [`AxisId`] exactly once,
//! against the active axis count. Every per-axis collection is indexed by
//! `AxisId` only, so an out-of-range index can only come from mixing ids of
//! differently sized modules, which is a programming error.

use core::fmt;

use crate::consts::MAX_AXES;

/// Zero-based axis index, valid for the axis count it was created against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AxisId(u8);

impl AxisId {
    /// Validate a raw axis byte. Returns `None` when `raw >= axis_count`.
    #[inline]
    pub const fn new(raw: u8, axis_count: usize) -> Option<Self> {
        if (raw as usize) < axis_count && (raw as usize) < MAX_AXES {
            Some(Self(raw))
        } else {
            None
        }
    }

    /// Array index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Wire representation.
    #[inline]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// All axes of a module with `axis_count` axes, in index order.
    pub fn all(axis_count: usize) -> impl Iterator<Item = AxisId> {
        (0..axis_count.min(MAX_AXES) as u8).map(AxisId)
    }
}

impl fmt::Display for AxisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "axis{}", self.0)
    }
}
