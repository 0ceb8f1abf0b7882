use meslink_codec::{ServicePackage, Status, StatusFrame};

/// Notifications published on the connector's event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorEvent {
    /// Both sessions are open, after `connect` or a successful reconnect.
    Connected,
    /// The connector was shut down by its owner.
    Disconnected,
    /// A heartbeat frame was written.
    StatusSent(StatusFrame),
    /// A heartbeat could not be written.
    StatusTransferFailed(String),
    /// A service request was written to the service session.
    ServiceRequestSent(ServicePackage),
    /// A service call failed.
    ServiceCallFailed(String),
    /// The owner changed the resource status.
    ResourceStatusChanged(Status),
}
