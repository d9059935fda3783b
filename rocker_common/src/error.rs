//! Error taxonomy shared by the codec, the dispatcher and the transports.
//!
//! Driver status uses `bitflags` in the layout of the driver's status byte.
//! Everything else is a `thiserror` enum; no error is fatal inside a tick.

use bitflags::bitflags;
use thiserror::Error;

use crate::config::ConfigError;
use crate::protocol::Status;

bitflags! {
    /// Driver status byte, one sample per tick.
    ///
    /// FAULT flags are logged on their rising edge; no corrective action.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DriverFlags: u8 {
        /// Load reached the secondary stall threshold (`Beta`).
        const STALL_WARNING    = 0x01;
        /// Over-temperature shutdown. **FAULT**.
        const OVERTEMP         = 0x02;
        /// Over-temperature pre-warning.
        const OVERTEMP_WARNING = 0x04;
        /// Short to ground, bridge A. **FAULT**.
        const SHORT_A          = 0x08;
        /// Short to ground, bridge B. **FAULT**.
        const SHORT_B          = 0x10;
        /// Open load, bridge A.
        const OPEN_LOAD_A      = 0x20;
        /// Open load, bridge B.
        const OPEN_LOAD_B      = 0x40;
        /// Standstill detected by the driver.
        const STANDSTILL       = 0x80;
    }
}

impl DriverFlags {
    /// Mask of all FAULT flags.
    pub const FAULT_MASK: Self = Self::from_bits_truncate(
        Self::OVERTEMP.bits() | Self::SHORT_A.bits() | Self::SHORT_B.bits(),
    );

    /// Returns true if any FAULT flag is set.
    #[inline]
    pub const fn has_fault(&self) -> bool {
        self.intersects(Self::FAULT_MASK)
    }
}

impl Default for DriverFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Inbound frame rejected before dispatch. Dropped without reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("remote frame")]
    RemoteFrame,

    #[error("extended-id frame {id:#x}")]
    ExtendedFrame { id: u32 },

    #[error("frame too short: {len} bytes")]
    BadLength { len: u8 },

    #[error("frame id {id:#x} not addressed to this module")]
    NotAddressed { id: u32 },

    #[error("checksum mismatch: expected {expected:#04x}, received {received:#04x}")]
    Checksum { expected: u8, received: u8 },
}

/// Request rejected by the dispatcher. Maps 1:1 onto a reply [`Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("invalid instruction {0}")]
    InvalidInstruction(u8),

    #[error("invalid axis or bank {0}")]
    InvalidAxis(u8),

    #[error("invalid type {0}")]
    InvalidType(u8),

    #[error("invalid value")]
    InvalidValue,

    #[error("motor disabled")]
    MotorDisabled,
}

impl From<DispatchError> for Status {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::InvalidInstruction(_) => Status::InvalidInstruction,
            DispatchError::InvalidAxis(_) => Status::InvalidAxis,
            DispatchError::InvalidType(_) => Status::InvalidType,
            DispatchError::InvalidValue => Status::InvalidValue,
            DispatchError::MotorDisabled => Status::MotorDisabled,
        }
    }
}

impl From<ConfigError> for DispatchError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::UnknownField(id) => DispatchError::InvalidType(id),
            _ => DispatchError::InvalidValue,
        }
    }
}

/// Outbound send failure. Counted and logged, never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transmit buffer full")]
    TxFull,
}
