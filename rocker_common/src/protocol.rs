//! Command protocol: request/reply records and the two frame codecs.
//!
//! Serial and USB links carry the 9-byte [`Datagram`] directly. CAN links carry
//! a [`BusFrame`] whose payload drops the address and checksum bytes; the
//! frame id does the addressing instead.
//!
//! ```text
//! Datagram request:  [address, instruction, type, axis, value(4, BE), checksum]
//! Datagram reply:    [host, module, status, instruction, value(4, BE), checksum]
//! CAN request data:  [instruction, type, axis, value(4, BE)]           len >= 7
//! CAN reply data:    [host, module, status, instruction, value(4, BE)] len 8
//! ```

use static_assertions::const_assert_eq;

use crate::config::ModuleConfig;
use crate::error::ProtocolError;

/// Length of a datagram on serial links.
pub const DATAGRAM_LEN: usize = 9;

/// Minimum payload of an inbound CAN frame.
pub const CAN_REQUEST_LEN: u8 = 7;

const_assert_eq!(DATAGRAM_LEN, 1 + 1 + 1 + 1 + 4 + 1);

// ─── Instructions & Status ──────────────────────────────────────────

/// Supported instruction numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Instruction {
    RotateRight = 1,
    RotateLeft = 2,
    MotorStop = 3,
    MoveTo = 4,
    SetAxisParameter = 5,
    GetAxisParameter = 6,
    SetGlobalParameter = 9,
    GetGlobalParameter = 10,
    GetVersion = 136,
    RestoreDefaults = 137,
}

impl Instruction {
    /// Convert from raw `u8`. Returns `None` for unsupported instructions.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::RotateRight),
            2 => Some(Self::RotateLeft),
            3 => Some(Self::MotorStop),
            4 => Some(Self::MoveTo),
            5 => Some(Self::SetAxisParameter),
            6 => Some(Self::GetAxisParameter),
            9 => Some(Self::SetGlobalParameter),
            10 => Some(Self::GetGlobalParameter),
            136 => Some(Self::GetVersion),
            137 => Some(Self::RestoreDefaults),
            _ => None,
        }
    }
}

/// Reply status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Status {
    #[default]
    Ok = 0,
    /// Reserved: bad checksums are dropped without reply.
    WrongChecksum = 1,
    InvalidInstruction = 2,
    InvalidType = 3,
    InvalidValue = 4,
    InvalidAxis = 5,
    MotorDisabled = 6,
}

impl Status {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Ok),
            1 => Some(Self::WrongChecksum),
            2 => Some(Self::InvalidInstruction),
            3 => Some(Self::InvalidType),
            4 => Some(Self::InvalidValue),
            5 => Some(Self::InvalidAxis),
            6 => Some(Self::MotorDisabled),
            _ => None,
        }
    }
}

// ─── Records ────────────────────────────────────────────────────────

/// Decoded inbound request. The instruction stays raw so an unknown number
/// can still be answered with `InvalidInstruction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Request {
    pub address: u8,
    pub instruction: u8,
    /// Parameter id for SAP/GAP/SGP/GGP, sub-mode for MVP/GetVersion.
    pub kind: u8,
    /// Axis index, or bank for global parameters.
    pub axis: u8,
    pub value: i32,
}

impl Request {
    pub fn new(instruction: Instruction, kind: u8, axis: u8, value: i32) -> Self {
        Self {
            address: 0,
            instruction: instruction as u8,
            kind,
            axis,
            value,
        }
    }

    /// Same request, addressed to `address`.
    pub fn to(mut self, address: u8) -> Self {
        self.address = address;
        self
    }
}

/// Outbound reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    pub host_address: u8,
    pub module_address: u8,
    pub status: Status,
    pub instruction: u8,
    pub value: i32,
    /// Text payload replacing the standard layout (GetVersion type 0).
    pub text: Option<[u8; 8]>,
}

fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Frame codec used by a transport.
pub trait WireFrame: Sized {
    /// Decode an inbound frame. Errors mean "drop silently".
    fn decode(&self, module: &ModuleConfig) -> Result<Request, ProtocolError>;

    /// Build the outbound frame for `reply`.
    fn encode_reply(reply: &Reply, module: &ModuleConfig) -> Self;
}

// ─── Datagram (serial/USB) ──────────────────────────────────────────

/// 9-byte datagram with trailing checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Datagram(pub [u8; DATAGRAM_LEN]);

impl Datagram {
    /// Wrap eight bytes and append their checksum.
    pub fn with_checksum(head: [u8; DATAGRAM_LEN - 1]) -> Self {
        let mut bytes = [0u8; DATAGRAM_LEN];
        bytes[..DATAGRAM_LEN - 1].copy_from_slice(&head);
        bytes[DATAGRAM_LEN - 1] = checksum(&head);
        Self(bytes)
    }

    /// Encode a host request.
    pub fn from_request(req: &Request) -> Self {
        let v = req.value.to_be_bytes();
        Self::with_checksum([req.address, req.instruction, req.kind, req.axis, v[0], v[1], v[2], v[3]])
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; DATAGRAM_LEN] {
        &self.0
    }

    fn verify(&self) -> Result<(), ProtocolError> {
        let expected = checksum(&self.0[..DATAGRAM_LEN - 1]);
        let received = self.0[DATAGRAM_LEN - 1];
        if expected == received {
            Ok(())
        } else {
            Err(ProtocolError::Checksum { expected, received })
        }
    }

    /// Value field, big-endian.
    #[inline]
    pub fn value(&self) -> i32 {
        i32::from_be_bytes([self.0[4], self.0[5], self.0[6], self.0[7]])
    }

    /// Host side: the version text of a GetVersion type 0 reply.
    pub fn text_payload(&self) -> [u8; 8] {
        let mut text = [0u8; 8];
        text.copy_from_slice(&self.0[1..]);
        text
    }

    /// Host side: decode a reply datagram.
    pub fn parse_reply(&self) -> Result<Reply, ProtocolError> {
        self.verify()?;
        Ok(Reply {
            host_address: self.0[0],
            module_address: self.0[1],
            status: Status::from_u8(self.0[2]).unwrap_or(Status::InvalidInstruction),
            instruction: self.0[3],
            value: self.value(),
            text: None,
        })
    }
}

impl WireFrame for Datagram {
    fn decode(&self, _module: &ModuleConfig) -> Result<Request, ProtocolError> {
        self.verify()?;
        Ok(Request {
            address: self.0[0],
            instruction: self.0[1],
            kind: self.0[2],
            axis: self.0[3],
            value: self.value(),
        })
    }

    fn encode_reply(reply: &Reply, _module: &ModuleConfig) -> Self {
        // Text replies carry no checksum: host address, then the 8 bytes.
        if let Some(text) = reply.text {
            let mut bytes = [0u8; DATAGRAM_LEN];
            bytes[0] = reply.host_address;
            bytes[1..].copy_from_slice(&text);
            return Self(bytes);
        }
        let v = reply.value.to_be_bytes();
        Self::with_checksum([
            reply.host_address,
            reply.module_address,
            reply.status as u8,
            reply.instruction,
            v[0],
            v[1],
            v[2],
            v[3],
        ])
    }
}

// ─── BusFrame (CAN) ─────────────────────────────────────────────────

/// Raw CAN frame as handed over by the bus driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BusFrame {
    pub id: u32,
    pub extended: bool,
    pub remote: bool,
    /// Payload length, 0..=8.
    pub len: u8,
    pub data: [u8; 8],
}

impl BusFrame {
    /// Standard data frame carrying a host request on `id`.
    pub fn request(id: u32, instruction: u8, kind: u8, axis: u8, value: i32) -> Self {
        let v = value.to_be_bytes();
        Self {
            id,
            extended: false,
            remote: false,
            len: CAN_REQUEST_LEN,
            data: [instruction, kind, axis, v[0], v[1], v[2], v[3], 0],
        }
    }

    /// Host side: decode a reply frame.
    pub fn parse_reply(&self) -> Result<Reply, ProtocolError> {
        if self.len < 8 {
            return Err(ProtocolError::BadLength { len: self.len });
        }
        let d = &self.data;
        Ok(Reply {
            host_address: d[0],
            module_address: d[1],
            status: Status::from_u8(d[2]).unwrap_or(Status::InvalidInstruction),
            instruction: d[3],
            value: i32::from_be_bytes([d[4], d[5], d[6], d[7]]),
            text: None,
        })
    }
}

impl WireFrame for BusFrame {
    fn decode(&self, module: &ModuleConfig) -> Result<Request, ProtocolError> {
        if self.remote {
            return Err(ProtocolError::RemoteFrame);
        }
        if self.extended {
            return Err(ProtocolError::ExtendedFrame { id: self.id });
        }
        if self.len < CAN_REQUEST_LEN {
            return Err(ProtocolError::BadLength { len: self.len });
        }
        let ours = self.id == module.can_receive_id as u32
            || (module.secondary_id != 0 && self.id == module.secondary_id as u32);
        if !ours {
            return Err(ProtocolError::NotAddressed { id: self.id });
        }
        let d = &self.data;
        Ok(Request {
            address: module.module_address,
            instruction: d[0],
            kind: d[1],
            axis: d[2],
            value: i32::from_be_bytes([d[3], d[4], d[5], d[6]]),
        })
    }

    fn encode_reply(reply: &Reply, module: &ModuleConfig) -> Self {
        if let Some(text) = reply.text {
            return Self {
                id: module.can_send_id as u32,
                extended: false,
                remote: false,
                len: 8,
                data: text,
            };
        }
        let v = reply.value.to_be_bytes();
        Self {
            id: module.can_send_id as u32,
            extended: false,
            remote: false,
            len: 8,
            data: [
                reply.host_address,
                reply.module_address,
                reply.status as u8,
                reply.instruction,
                v[0],
                v[1],
                v[2],
                v[3],
            ],
        }
    }
}
