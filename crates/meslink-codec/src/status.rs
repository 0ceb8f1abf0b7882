//! Resource heartbeat framing.
//!
//! Wire format:
//! ```text
//! ┌──────────────┬──────────────┬────────────┬─────────────┐
//! │ Resource id  │ Resource id  │ Byte order │ Status byte │
//! │ high byte    │ low byte     │ 1=LE 2=BE  │ (bit field) │
//! └──────────────┴──────────────┴────────────┴─────────────┘
//! ```
//!
//! The id is always written big-endian; the byte-order byte only tells the
//! MES how the resource's PLC stores words.

use serde::{Deserialize, Serialize};

/// Length of one heartbeat frame.
pub const HEARTBEAT_FRAME_LEN: usize = 4;

/// Number of independently settable error flags in [`Status`].
pub const ERROR_FLAG_COUNT: usize = 3;

/// One encoded heartbeat.
pub type StatusFrame = [u8; HEARTBEAT_FRAME_LEN];

/// Status byte: resource runs in automatic mode.
pub const STATUS_AUTO: u8 = 1 << 0;
/// Status byte: resource runs in manual mode.
pub const STATUS_MANUAL: u8 = 1 << 1;
/// Status byte: resource is busy.
pub const STATUS_BUSY: u8 = 1 << 2;
/// Status byte: resource requests a reset.
pub const STATUS_RESET: u8 = 1 << 3;
/// Status byte: first error flag; flags 1 and 2 follow in the next bits.
pub const STATUS_ERROR_BASE: u8 = 1 << 4;
/// Status byte: resource runs under MES control.
pub const STATUS_MES_MODE: u8 = 1 << 7;

/// Word order of the resource's PLC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlcByteOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

impl PlcByteOrder {
    /// Code carried in heartbeat byte 2.
    pub fn wire_code(self) -> u8 {
        match self {
            Self::LittleEndian => 1,
            Self::BigEndian => 2,
        }
    }
}

/// Who is talking to the MES. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceIdentity {
    id: u16,
    byte_order: PlcByteOrder,
    is_resource: bool,
}

impl ResourceIdentity {
    /// Build an identity. A sender that is not a resource always has id 0.
    pub fn new(id: u16, byte_order: PlcByteOrder, is_resource: bool) -> Self {
        Self {
            id: if is_resource { id } else { 0 },
            byte_order,
            is_resource,
        }
    }

    /// Identity of resource `id`.
    pub fn resource(id: u16, byte_order: PlcByteOrder) -> Self {
        Self::new(id, byte_order, true)
    }

    /// Identity of a client that is not a resource (id 0, no `RequestId`).
    pub fn client(byte_order: PlcByteOrder) -> Self {
        Self::new(0, byte_order, false)
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn byte_order(&self) -> PlcByteOrder {
        self.byte_order
    }

    pub fn is_resource(&self) -> bool {
        self.is_resource
    }
}

/// Operating mode reported in the heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperatingMode {
    #[default]
    Auto,
    Manual,
}

/// Live resource status, reported once per heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Status {
    pub mode: OperatingMode,
    pub busy: bool,
    pub reset: bool,
    pub error_flags: [bool; ERROR_FLAG_COUNT],
    pub mes_mode: bool,
}

impl Status {
    /// Whether any error flag is raised.
    pub fn has_errors(&self) -> bool {
        self.error_flags.iter().any(|raised| *raised)
    }
}

/// Pack a status into its control byte.
pub fn status_byte(status: &Status) -> u8 {
    let mut byte = match status.mode {
        OperatingMode::Auto => STATUS_AUTO,
        OperatingMode::Manual => STATUS_MANUAL,
    };
    if status.busy {
        byte |= STATUS_BUSY;
    }
    if status.reset {
        byte |= STATUS_RESET;
    }
    for (slot, raised) in status.error_flags.iter().enumerate() {
        if *raised {
            byte |= STATUS_ERROR_BASE << slot;
        }
    }
    if status.mes_mode {
        byte |= STATUS_MES_MODE;
    }
    byte
}

/// Build the heartbeat frame for `identity` reporting `status`.
pub fn encode_status_frame(identity: &ResourceIdentity, status: &Status) -> StatusFrame {
    let [high, low] = identity.id().to_be_bytes();
    [
        high,
        low,
        identity.byte_order().wire_code(),
        status_byte(status),
    ]
}
