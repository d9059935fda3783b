//! Command processing root.
//!
//! Decoded host requests are executed against the configuration store and
//! the per-axis runtime state by the [`dispatcher`].

pub mod dispatcher;
