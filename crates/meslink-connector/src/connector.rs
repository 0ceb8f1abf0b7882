use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use meslink_codec::{
    decode_response_bytes, encode_request, ResourceIdentity, ServicePackage, Status,
};
use meslink_schema::{ParameterDefinition, ParameterSchema};
use meslink_transport::{Channel, ConnectionManager, TransportError};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::config::ConnectorConfig;
use crate::error::{ConnectorError, Result};
use crate::event::ConnectorEvent;
use crate::heartbeat::{HeartbeatHandle, HeartbeatScheduler};
use crate::policy::ReconnectPolicy;
use crate::status::StatusHandle;

/// Lifecycle state of a [`Connector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectorState {
    #[default]
    Idle,
    Connected,
}

/// Client for one MES host.
///
/// Owns both sessions, the heartbeat task and the shared resource status.
/// Service calls and the heartbeat run concurrently; both recover lost
/// sessions through the same serialized reconnect.
pub struct Connector {
    manager: Arc<ConnectionManager>,
    identity: ResourceIdentity,
    schema: Arc<ParameterSchema>,
    status: StatusHandle,
    events: broadcast::Sender<ConnectorEvent>,
    heartbeat: Mutex<Option<HeartbeatHandle>>,
    connected: AtomicBool,
    recv_buffer_size: usize,
    response_timeout: Option<Duration>,
}

impl Connector {
    /// Build an idle connector. Nothing is opened until [`connect`](Self::connect)
    /// or the first service call.
    pub fn new(
        config: ConnectorConfig,
        identity: ResourceIdentity,
        schema: ParameterSchema,
    ) -> Result<Self> {
        config.validate()?;

        let manager =
            ConnectionManager::new(config.endpoint()).with_connect_timeout(config.connect_timeout);
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        debug!(
            endpoint = %manager.endpoint(),
            resource = identity.id(),
            parameters = schema.len(),
            "connector created"
        );

        Ok(Self {
            manager: Arc::new(manager),
            identity,
            schema: Arc::new(schema),
            status: StatusHandle::default(),
            events,
            heartbeat: Mutex::new(None),
            connected: AtomicBool::new(false),
            recv_buffer_size: config.recv_buffer_size,
            response_timeout: config.response_timeout,
        })
    }

    /// Build a connector from raw definitions, validating them first.
    pub fn from_definitions(
        config: ConnectorConfig,
        identity: ResourceIdentity,
        definitions: Vec<ParameterDefinition>,
    ) -> Result<Self> {
        let schema = ParameterSchema::new(definitions)?;
        Self::new(config, identity, schema)
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectorEvent> {
        self.events.subscribe()
    }

    pub fn identity(&self) -> &ResourceIdentity {
        &self.identity
    }

    pub fn schema(&self) -> &ParameterSchema {
        &self.schema
    }

    /// Lifecycle state. `Connected` means the owner connected (or a service
    /// call reconnected) and has not disconnected since; the heartbeat keeps
    /// healing the sessions in that state. See
    /// [`sessions_live`](Self::sessions_live) for the sockets themselves.
    pub fn state(&self) -> ConnectorState {
        if self.connected.load(Ordering::SeqCst) {
            ConnectorState::Connected
        } else {
            ConnectorState::Idle
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectorState::Connected
    }

    /// Whether both sessions currently have an open socket.
    pub fn sessions_live(&self) -> bool {
        self.manager.is_connected(Channel::Status) && self.manager.is_connected(Channel::Service)
    }

    /// Reconnects attempted so far, by either the heartbeat or service calls.
    pub fn reconnect_attempts(&self) -> u64 {
        self.manager.reconnect_attempts()
    }

    /// Shared status read by the heartbeat. Writes made directly through the
    /// handle are not announced on the event channel.
    pub fn status_handle(&self) -> StatusHandle {
        self.status.clone()
    }

    pub fn status(&self) -> Status {
        self.status.snapshot()
    }

    /// Replace the resource status, announcing it if it changed.
    pub fn set_status(&self, status: Status) {
        if self.status.set(status) {
            self.emit(ConnectorEvent::ResourceStatusChanged(status));
        }
    }

    /// Edit the resource status in place, announcing it if it changed.
    pub fn update_status(&self, change: impl FnOnce(&mut Status)) -> Status {
        let (status, changed) = self.status.update(change);
        if changed {
            self.emit(ConnectorEvent::ResourceStatusChanged(status));
        }
        status
    }

    /// Open both sessions and start the heartbeat. No-op when connected.
    pub async fn connect(&self) -> Result<()> {
        let mut heartbeat = self.heartbeat.lock().await;
        if heartbeat.is_some() {
            debug!("connect ignored; already connected");
            return Ok(());
        }

        self.manager.connect().await?;
        *heartbeat = Some(self.start_heartbeat());
        self.connected.store(true, Ordering::SeqCst);
        info!(endpoint = %self.manager.endpoint(), "connector connected");
        self.emit(ConnectorEvent::Connected);
        Ok(())
    }

    /// Stop the heartbeat and close both sessions. No-op when idle.
    pub async fn disconnect(&self) {
        let mut heartbeat = self.heartbeat.lock().await;
        let Some(handle) = heartbeat.take() else {
            debug!("disconnect ignored; not connected");
            return;
        };

        handle.shutdown().await;
        self.manager.close().await;
        self.connected.store(false, Ordering::SeqCst);
        info!(endpoint = %self.manager.endpoint(), "connector disconnected");
        self.emit(ConnectorEvent::Disconnected);
    }

    /// Send `request` on the service session and decode the reply.
    ///
    /// A connector that is not connected gets exactly one reconnect attempt
    /// first. Encoding happens before anything touches the wire. A call still
    /// waiting for its response when the sessions are torn down, by
    /// [`disconnect`](Self::disconnect) or a heartbeat reconnect, fails with
    /// [`ConnectorError::ServiceCall`].
    pub async fn call_service(&self, request: &ServicePackage) -> Result<ServicePackage> {
        let wire = encode_request(request, &self.identity)?;

        if !self.service_ready() {
            self.reconnect_for_service(ReconnectPolicy::Once)
                .await
                .map_err(|err| self.service_failure(err))?;
        }

        let response = self
            .manager
            .round_trip_observed(
                wire.as_bytes(),
                self.recv_buffer_size,
                self.response_timeout,
                || self.emit(ConnectorEvent::ServiceRequestSent(request.clone())),
            )
            .await
            .map_err(|err| self.service_failure(err))?;

        decode_response_bytes(&response, &self.schema).map_err(|err| {
            warn!(error = %err, "undecodable service response");
            self.emit(ConnectorEvent::ServiceCallFailed(err.to_string()));
            ConnectorError::from(err)
        })
    }

    fn service_ready(&self) -> bool {
        self.is_connected() && self.manager.is_connected(Channel::Service)
    }

    async fn reconnect_for_service(
        &self,
        policy: ReconnectPolicy,
    ) -> meslink_transport::Result<()> {
        let mut heartbeat = self.heartbeat.lock().await;
        // Another caller may have restored the sessions while we waited.
        if self.service_ready() {
            return Ok(());
        }

        let mut attempts = 0;
        let mut outcome = Err(TransportError::NotConnected(Channel::Service));
        while outcome.is_err() && policy.allows(attempts) {
            attempts += 1;
            outcome = self.manager.reconnect().await;
        }
        outcome?;

        if heartbeat.is_none() {
            *heartbeat = Some(self.start_heartbeat());
        }
        self.connected.store(true, Ordering::SeqCst);
        info!(endpoint = %self.manager.endpoint(), "service call restored sessions");
        self.emit(ConnectorEvent::Connected);
        Ok(())
    }

    fn service_failure(&self, err: TransportError) -> ConnectorError {
        warn!(error = %err, "service call failed");
        self.emit(ConnectorEvent::ServiceCallFailed(err.to_string()));
        ConnectorError::ServiceCall(err)
    }

    fn start_heartbeat(&self) -> HeartbeatHandle {
        HeartbeatScheduler::new(
            Arc::clone(&self.manager),
            self.identity,
            self.status.clone(),
            self.events.clone(),
        )
        .with_policy(ReconnectPolicy::Unlimited)
        .spawn()
    }

    fn emit(&self, event: ConnectorEvent) {
        let _ = self.events.send(event);
    }
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("state", &self.state())
            .field("identity", &self.identity)
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}
