//! Drive current and load supervision.
//!
//! coolStep current scaler and the stall comparator. Both consume the same
//! per-tick load sample.

pub mod coolstep;
pub mod stall;
