//! Wire codecs for the MES protocol.
//!
//! Two unrelated formats share this crate:
//! - the status heartbeat, a fixed 4-byte binary frame built from the
//!   resource identity and its current [`Status`]
//! - service packages, semicolon-delimited ASCII `key=value` text with a
//!   `444;` preamble and a `*` terminator
//!
//! Both are pure: nothing here touches a socket.

pub mod error;
pub mod package;
pub mod service;
pub mod status;

pub use error::{CodecError, Result};
pub use package::{ParamValue, ParameterMap, ServicePackage};
pub use service::{
    decode_response, decode_response_bytes, encode_request, REQUEST_PREAMBLE,
    RESPONSE_PREAMBLE_LEN, TERMINATOR,
};
pub use status::{
    encode_status_frame, status_byte, OperatingMode, PlcByteOrder, ResourceIdentity, Status,
    StatusFrame, ERROR_FLAG_COUNT, HEARTBEAT_FRAME_LEN,
};
