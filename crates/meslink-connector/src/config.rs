use std::time::Duration;

use meslink_transport::{
    Endpoint, DEFAULT_CONNECT_TIMEOUT, DEFAULT_SERVICE_PORT, DEFAULT_STATUS_PORT,
};

use crate::error::{ConnectorError, Result};

/// Default size of the single service read.
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 4096;

/// Default number of events buffered per subscriber before it lags.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Settings for one [`Connector`](crate::Connector).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorConfig {
    pub host: String,
    pub status_port: u16,
    pub service_port: u16,
    /// Upper bound on one service response read.
    pub recv_buffer_size: usize,
    /// Bound on opening each session. `None` waits for the OS.
    pub connect_timeout: Option<Duration>,
    /// Bound on waiting for a service response. `None` waits forever.
    pub response_timeout: Option<Duration>,
    pub event_capacity: usize,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            status_port: DEFAULT_STATUS_PORT,
            service_port: DEFAULT_SERVICE_PORT,
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            response_timeout: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ConnectorConfig {
    /// Default settings against `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    pub fn with_ports(mut self, status_port: u16, service_port: u16) -> Self {
        self.status_port = status_port;
        self.service_port = service_port;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Reject settings no connector could work with.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ConnectorError::InvalidHost);
        }
        Ok(())
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.trim()).with_ports(self.status_port, self.service_port)
    }
}
