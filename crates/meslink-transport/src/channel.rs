//! The two MES sessions and where they live.

use std::fmt;

/// Default TCP port of the status (heartbeat) session.
pub const DEFAULT_STATUS_PORT: u16 = 2001;

/// Default TCP port of the service (request/response) session.
pub const DEFAULT_SERVICE_PORT: u16 = 2000;

/// Identifies one of the two sessions held open against an MES host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Binary heartbeat, written once per interval.
    Status,
    /// ASCII request/response packages.
    Service,
}

impl Channel {
    /// Returns a human-readable name for the channel.
    pub fn name(self) -> &'static str {
        match self {
            Channel::Status => "status",
            Channel::Service => "service",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-session connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

/// Host and port pair for both sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub status_port: u16,
    pub service_port: u16,
}

impl Endpoint {
    /// Endpoint on `host` using the default ports.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            status_port: DEFAULT_STATUS_PORT,
            service_port: DEFAULT_SERVICE_PORT,
        }
    }

    /// Override both ports.
    pub fn with_ports(mut self, status_port: u16, service_port: u16) -> Self {
        self.status_port = status_port;
        self.service_port = service_port;
        self
    }

    /// Port used by `channel`.
    pub fn port(&self, channel: Channel) -> u16 {
        match channel {
            Channel::Status => self.status_port,
            Channel::Service => self.service_port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (status {}, service {})",
            self.host, self.status_port, self.service_port
        )
    }
}
