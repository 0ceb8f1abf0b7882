use std::time::Duration;

use crate::channel::Channel;

/// Errors that can occur on the MES TCP sessions.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open a session.
    #[error("failed to connect {channel} session to {host}:{port}: {source}")]
    Connect {
        channel: Channel,
        host: String,
        port: u16,
        source: std::io::Error,
    },

    /// Opening a session did not complete in time.
    #[error("timed out connecting {channel} session to {host}:{port} after {timeout:?}")]
    ConnectTimeout {
        channel: Channel,
        host: String,
        port: u16,
        timeout: Duration,
    },

    /// The session has no open socket.
    #[error("{0} session is not connected")]
    NotConnected(Channel),

    /// The peer closed the session (zero-length read).
    #[error("{0} session closed by peer")]
    Closed(Channel),

    /// An I/O error occurred on an open session.
    #[error("{channel} session I/O error: {source}")]
    Io {
        channel: Channel,
        source: std::io::Error,
    },

    /// The session was torn down while an operation was using it.
    #[error("{0} session was closed while in use")]
    Aborted(Channel),

    /// No response arrived within the configured response timeout.
    #[error("no response on {channel} session within {timeout:?}")]
    Timeout { channel: Channel, timeout: Duration },

    /// Tearing a session down failed.
    #[error("failed to close {channel} session: {source}")]
    Disconnect {
        channel: Channel,
        source: std::io::Error,
    },
}

impl TransportError {
    /// The session the error was raised on.
    pub fn channel(&self) -> Channel {
        match self {
            TransportError::Connect { channel, .. }
            | TransportError::ConnectTimeout { channel, .. }
            | TransportError::Io { channel, .. }
            | TransportError::Timeout { channel, .. }
            | TransportError::Disconnect { channel, .. } => *channel,
            TransportError::NotConnected(channel)
            | TransportError::Closed(channel)
            | TransportError::Aborted(channel) => *channel,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
