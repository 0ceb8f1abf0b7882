//! Client for MES resource heartbeat and service protocols.
//!
//! meslink keeps two TCP sessions open against one MES host: a status
//! session carrying a 4-byte heartbeat every second, and a service session
//! carrying ASCII `key=value` request/response packages decoded against an
//! ordered parameter schema.
//!
//! # Crate Structure
//!
//! - [`transport`]: the two TCP sessions and their reconnect
//! - [`schema`]: ordered parameter definitions, validated at load
//! - [`codec`]: heartbeat framing and the service package codec
//! - [`connector`]: the client façade, heartbeat task and events
//! - [`config`]: JSON configuration document
//! - [`logging`]: stderr `tracing` subscriber built from the configuration

pub mod config;
pub mod error;
pub mod logging;

/// Re-export transport types.
pub mod transport {
    pub use meslink_transport::*;
}

/// Re-export schema types.
pub mod schema {
    pub use meslink_schema::*;
}

/// Re-export codec types.
pub mod codec {
    pub use meslink_codec::*;
}

/// Re-export connector types.
pub mod connector {
    pub use meslink_connector::*;
}

pub use config::MeslinkConfig;
pub use logging::LoggingSettings;
pub use error::{MeslinkError, Result};
pub use meslink_codec::{ParamValue, ResourceIdentity, ServicePackage, Status};
pub use meslink_connector::{Connector, ConnectorConfig, ConnectorEvent};

/// Build an idle [`Connector`] from a configuration document, initialising
/// logging as it asks.
pub fn open(config: MeslinkConfig) -> Result<Connector> {
    config.logging.init();
    let (connector_config, identity, schema) = config.into_parts()?;
    Ok(Connector::new(connector_config, identity, schema)?)
}
