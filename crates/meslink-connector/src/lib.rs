//! MES connector.
//!
//! Ties the session layer and the codecs together into one client:
//! - [`Connector`] owns both sessions, the heartbeat and the shared status,
//!   and performs typed service calls
//! - [`HeartbeatScheduler`] writes the status frame once per
//!   [`HEARTBEAT_INTERVAL`] and reconnects on failure
//! - everything noteworthy is published as a [`ConnectorEvent`]
//!
//! # Example
//!
//! ```no_run
//! use meslink_codec::{PlcByteOrder, ResourceIdentity, ServicePackage};
//! use meslink_connector::{Connector, ConnectorConfig};
//! use meslink_schema::ParameterSchema;
//!
//! # async fn run() -> meslink_connector::Result<()> {
//! let connector = Connector::new(
//!     ConnectorConfig::new("mes.plant.local"),
//!     ResourceIdentity::resource(50, PlcByteOrder::LittleEndian),
//!     ParameterSchema::empty(),
//! )?;
//! connector.connect().await?;
//!
//! let request = ServicePackage::request(100, 1).with_parameter("ResourceID", 50i16);
//! let response = connector.call_service(&request).await?;
//! println!("error state {}", response.error_state);
//!
//! connector.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connector;
pub mod error;
pub mod event;
pub mod heartbeat;
pub mod policy;
pub mod status;

pub use config::{ConnectorConfig, DEFAULT_EVENT_CAPACITY, DEFAULT_RECV_BUFFER_SIZE};
pub use connector::{Connector, ConnectorState};
pub use error::{ConnectorError, Result};
pub use event::ConnectorEvent;
pub use heartbeat::{HeartbeatHandle, HeartbeatScheduler, StatusLink, HEARTBEAT_INTERVAL};
pub use policy::ReconnectPolicy;
pub use status::StatusHandle;
