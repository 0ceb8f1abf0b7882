//! Dual TCP session management for the MES wire protocol.
//!
//! An MES host is reached over two independent TCP sessions:
//! - the status session, which carries the 4-byte resource heartbeat
//! - the service session, which carries ASCII request/response packages
//!
//! This is the lowest layer of meslink. [`ConnectionManager`] owns both
//! sockets and provides connect/close/reconnect plus raw send/receive
//! primitives to the codec-aware layers above.

pub mod channel;
pub mod error;
pub mod manager;

pub use channel::{Channel, ConnectionState, Endpoint, DEFAULT_SERVICE_PORT, DEFAULT_STATUS_PORT};
pub use error::{Result, TransportError};
pub use manager::{ConnectionManager, DEFAULT_CONNECT_TIMEOUT};
