//! Rocker Common Library
//!
//! Shared types for the rocker stepper motion core: compiled-in configuration
//! defaults and bounds, the stable parameter id tables, the command protocol
//! codec, error taxonomy and the narrow hardware contracts the control unit
//! depends on.
//!
//! # Module Structure
//!
//! - [`consts`] - System-wide limits and timing constants
//! - [`axis`] - Range-checked axis identifier
//! - [`config`] - Configuration records, defaults and TOML loading
//! - [`params`] - Axis/global parameter id tables
//! - [`protocol`] - Request/reply records and frame codecs
//! - [`error`] - Error enums and driver status bitflags
//! - [`hal`] - Driver, clock and heartbeat capability traits
//! - [`state`] - Closed-loop state enum
//! - [`prelude`] - Common re-exports for convenience

pub mod axis;
pub mod config;
pub mod consts;
pub mod error;
pub mod hal;
pub mod params;
pub mod prelude;
pub mod protocol;
pub mod state;
