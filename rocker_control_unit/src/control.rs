//! Closed-loop control engine root.
//!
//! Integer velocity PI(D), encoder velocity mean filter, deviation monitor,
//! encoder scaling and the per-axis corrector that composes them.

pub mod corrector;
pub mod deviation;
pub mod encoder;
pub mod filters;
pub mod pid;
