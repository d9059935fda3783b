//! Closed-loop state enum.
//!
//! `#[repr(u8)]` so the value can be reported directly through GAP 219.

use serde::{Deserialize, Serialize};

/// Per-axis closed-loop corrector state.
///
/// `Fault` is latched and exits only through an explicit re-enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum ClosedLoopState {
    /// Drive disabled, no correction.
    Disabled = 0,
    /// Trajectory passed through, deviation still monitored.
    #[default]
    OpenLoop = 1,
    /// Correction active.
    Tracking = 2,
    /// Deviation exceeded, correction suspended.
    Fault = 3,
}

impl ClosedLoopState {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Disabled),
            1 => Some(Self::OpenLoop),
            2 => Some(Self::Tracking),
            3 => Some(Self::Fault),
            _ => None,
        }
    }

    /// Correction output is produced in this state.
    #[inline]
    pub const fn is_correcting(self) -> bool {
        matches!(self, Self::Tracking)
    }
}
