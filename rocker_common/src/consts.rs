//! System-wide constants for the rocker workspace.
//!
//! Single source of truth for all numeric limits and timing defaults.

use static_assertions::const_assert;

/// Maximum number of axes a module can drive.
pub const MAX_AXES: usize = 4;

/// Axis count of the stock single-axis module.
pub const DEFAULT_AXIS_COUNT: u8 = 1;

/// Default scheduler tick period [timer units, 1 unit = 1 ms].
pub const DEFAULT_TICK_PERIOD: u32 = 1;

/// Heartbeat toggles once more than this many timer units elapsed.
pub const HEARTBEAT_PERIOD: u32 = 1000;

/// Upper bound of inbound frames handled in a single tick.
pub const MAX_FRAMES_PER_TICK: usize = 8;

/// Storage slots of the inbound hand-off queue (one slot stays free).
pub const FRAME_QUEUE_SLOTS: usize = 16;

/// Largest velocity magnitude accepted by ROTATE and the velocity parameters.
pub const MAX_VELOCITY: i32 = 8_388_096;

/// Largest acceleration/deceleration value.
pub const MAX_ACCELERATION: i32 = 16_777_215;

/// Key that must accompany a restore-defaults request.
pub const RESTORE_DEFAULTS_KEY: i32 = 1234;

/// Module type and firmware version as reported in text form (ASCII).
pub const VERSION_STRING: [u8; 8] = *b"1111V101";

/// Binary version: module type in the upper 16 bits, major.minor below.
pub const VERSION_BINARY: i32 = (1111 << 16) | (1 << 8) | 1;

/// Depth limit of the encoder velocity mean filter.
pub const MAX_VMEAN_DEPTH: usize = 32;

/// Default configuration file consulted by the simulation runner.
pub const DEFAULT_CONFIG_PATH: &str = "config/rocker.toml";

const_assert!(MAX_AXES > 0 && MAX_AXES <= u8::MAX as usize);
const_assert!(MAX_FRAMES_PER_TICK < FRAME_QUEUE_SLOTS);
