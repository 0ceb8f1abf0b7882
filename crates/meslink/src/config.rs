//! JSON configuration document.
//!
//! ```json
//! {
//!   "connection": { "host": "10.1.2.3", "statusPort": 2001, "servicePort": 2000,
//!                   "responseTimeoutMs": 3000 },
//!   "resource": { "id": 50, "byteOrder": "little_endian" },
//!   "schemaFile": "parameters.json",
//!   "logging": { "format": "json", "level": "debug" }
//! }
//! ```
//!
//! Only `connection.host` and `resource.id` are required.

use std::path::{Path, PathBuf};
use std::time::Duration;

use meslink_codec::{PlcByteOrder, ResourceIdentity};
use meslink_connector::{ConnectorConfig, DEFAULT_EVENT_CAPACITY, DEFAULT_RECV_BUFFER_SIZE};
use meslink_schema::ParameterSchema;
use meslink_transport::{DEFAULT_SERVICE_PORT, DEFAULT_STATUS_PORT};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MeslinkError, Result};
use crate::logging::LoggingSettings;

const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MeslinkConfig {
    pub connection: ConnectionSettings,
    pub resource: ResourceSettings,
    /// JSON parameter document. Without one every response key is untyped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_file: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConnectionSettings {
    pub host: String,
    #[serde(default = "default_status_port")]
    pub status_port: u16,
    #[serde(default = "default_service_port")]
    pub service_port: u16,
    #[serde(default = "default_recv_buffer_size")]
    pub recv_buffer_size: usize,
    /// `null` waits for the OS.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: Option<u64>,
    /// Absent or `null` waits forever.
    #[serde(default)]
    pub response_timeout_ms: Option<u64>,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResourceSettings {
    pub id: u16,
    #[serde(default)]
    pub byte_order: PlcByteOrder,
    #[serde(default = "default_is_resource")]
    pub is_resource: bool,
}

fn default_status_port() -> u16 {
    DEFAULT_STATUS_PORT
}

fn default_service_port() -> u16 {
    DEFAULT_SERVICE_PORT
}

fn default_recv_buffer_size() -> usize {
    DEFAULT_RECV_BUFFER_SIZE
}

fn default_connect_timeout_ms() -> Option<u64> {
    Some(DEFAULT_CONNECT_TIMEOUT_MS)
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

fn default_is_resource() -> bool {
    true
}

impl MeslinkConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a configuration file. A relative `schemaFile` is resolved against
    /// the directory holding the configuration.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|err| MeslinkError::ConfigLoad(format!("{}: {err}", path.display())))?;
        let mut config = Self::from_json_str(&content)?;

        if let (Some(schema), Some(dir)) = (config.schema_file.as_mut(), path.parent()) {
            if schema.is_relative() {
                *schema = dir.join(&*schema);
            }
        }
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn connector_config(&self) -> ConnectorConfig {
        let connection = &self.connection;
        ConnectorConfig {
            host: connection.host.clone(),
            status_port: connection.status_port,
            service_port: connection.service_port,
            recv_buffer_size: connection.recv_buffer_size,
            connect_timeout: connection.connect_timeout_ms.map(Duration::from_millis),
            response_timeout: connection.response_timeout_ms.map(Duration::from_millis),
            event_capacity: connection.event_capacity,
        }
    }

    pub fn identity(&self) -> ResourceIdentity {
        ResourceIdentity::new(
            self.resource.id,
            self.resource.byte_order,
            self.resource.is_resource,
        )
    }

    /// Load and validate the parameter schema.
    pub fn load_schema(&self) -> Result<ParameterSchema> {
        match &self.schema_file {
            Some(path) => Ok(ParameterSchema::from_file(path)?),
            None => Ok(ParameterSchema::empty()),
        }
    }

    /// Everything a [`Connector`](meslink_connector::Connector) is built from.
    pub fn into_parts(self) -> Result<(ConnectorConfig, ResourceIdentity, ParameterSchema)> {
        let schema = self.load_schema()?;
        Ok((self.connector_config(), self.identity(), schema))
    }
}
