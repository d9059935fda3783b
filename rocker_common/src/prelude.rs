//! Prelude module for common re-exports.
//!
//! ```rust
//! use rocker_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    AxisConfig, ClosedLoopConfig, ConfigError, ConfigLoader, CoolStepConfig, MachineConfig,
    ModuleConfig, MotorConfig,
};
pub use crate::params::{Access, AxisParam, GlobalParam, ParamGroup};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{MAX_AXES, MAX_FRAMES_PER_TICK};

// ─── Axis & State ───────────────────────────────────────────────────
pub use crate::axis::AxisId;
pub use crate::state::ClosedLoopState;

// ─── Protocol ───────────────────────────────────────────────────────
pub use crate::error::{DispatchError, DriverFlags, ProtocolError, TransportError};
pub use crate::protocol::{BusFrame, Datagram, Instruction, Reply, Request, Status, WireFrame};

// ─── Hardware ───────────────────────────────────────────────────────
pub use crate::hal::{AxisOutput, AxisSample, Heartbeat, MonotonicClock, MotionCommand, MotorDriver};
