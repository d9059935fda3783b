//! Per-axis runtime state.
//!
//! One [`axis::AxisUnit`] per active axis: dispatcher-owned motion state plus
//! the corrector, regulator and stall detector of that axis.

pub mod axis;
