//! Background status heartbeat.
//!
//! Once per [`HEARTBEAT_INTERVAL`] the scheduler frames the current
//! [`Status`](meslink_codec::Status) and writes it on the status session.
//! Failures are reported on the event channel and answered with a reconnect;
//! they never stop the loop. Only cancellation does.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use meslink_codec::{encode_status_frame, ResourceIdentity, StatusFrame};
use meslink_transport::{Channel, ConnectionManager};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::event::ConnectorEvent;
use crate::policy::ReconnectPolicy;
use crate::status::StatusHandle;

/// Fixed heartbeat period.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(1000);

const NOT_ESTABLISHED: &str = "connection not established";

/// What the heartbeat needs from the session layer.
pub trait StatusLink: Send + Sync + 'static {
    /// Whether the status session currently has an open socket.
    fn is_status_live(&self) -> bool;

    /// Write one frame on the status session.
    fn send_frame(
        &self,
        frame: &StatusFrame,
    ) -> impl Future<Output = meslink_transport::Result<()>> + Send;

    /// Tear down and rebuild both sessions.
    fn reconnect_sessions(&self) -> impl Future<Output = meslink_transport::Result<()>> + Send;
}

impl StatusLink for ConnectionManager {
    fn is_status_live(&self) -> bool {
        self.is_connected(Channel::Status)
    }

    fn send_frame(
        &self,
        frame: &StatusFrame,
    ) -> impl Future<Output = meslink_transport::Result<()>> + Send {
        self.send_status(frame)
    }

    fn reconnect_sessions(&self) -> impl Future<Output = meslink_transport::Result<()>> + Send {
        self.reconnect()
    }
}

/// Builds and launches the heartbeat task.
pub struct HeartbeatScheduler<L> {
    link: Arc<L>,
    identity: ResourceIdentity,
    status: StatusHandle,
    events: broadcast::Sender<ConnectorEvent>,
    policy: ReconnectPolicy,
    failed_reconnects: u32,
}

impl<L: StatusLink> HeartbeatScheduler<L> {
    pub fn new(
        link: Arc<L>,
        identity: ResourceIdentity,
        status: StatusHandle,
        events: broadcast::Sender<ConnectorEvent>,
    ) -> Self {
        Self {
            link,
            identity,
            status,
            events,
            policy: ReconnectPolicy::Unlimited,
            failed_reconnects: 0,
        }
    }

    /// Override how often consecutive failed reconnects are retried.
    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Spawn the loop on the current tokio runtime. The first beat is sent
    /// immediately.
    pub fn spawn(self) -> HeartbeatHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(cancel.clone()));
        HeartbeatHandle {
            cancel,
            task: Some(task),
        }
    }

    async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(resource = self.identity.id(), "heartbeat started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.beat() => {}
            }
        }

        debug!(resource = self.identity.id(), "heartbeat stopped");
    }

    async fn beat(&mut self) {
        if !self.link.is_status_live() {
            self.emit(ConnectorEvent::StatusTransferFailed(NOT_ESTABLISHED.to_string()));
            self.recover().await;
            return;
        }

        let frame = encode_status_frame(&self.identity, &self.status.snapshot());
        match self.link.send_frame(&frame).await {
            Ok(()) => {
                trace!(?frame, "heartbeat sent");
                self.emit(ConnectorEvent::StatusSent(frame));
            }
            Err(err) => {
                warn!(error = %err, "heartbeat failed");
                self.emit(ConnectorEvent::StatusTransferFailed(err.to_string()));
                self.recover().await;
            }
        }
    }

    async fn recover(&mut self) {
        if !self.policy.allows(self.failed_reconnects) {
            trace!(
                failed = self.failed_reconnects,
                "reconnect budget spent; waiting"
            );
            return;
        }

        match self.link.reconnect_sessions().await {
            Ok(()) => {
                self.failed_reconnects = 0;
                info!("heartbeat restored sessions");
                self.emit(ConnectorEvent::Connected);
            }
            Err(err) => {
                self.failed_reconnects = self.failed_reconnects.saturating_add(1);
                warn!(
                    error = %err,
                    failed = self.failed_reconnects,
                    "heartbeat reconnect failed; retrying next tick"
                );
            }
        }
    }

    fn emit(&self, event: ConnectorEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Owner's handle on a running heartbeat. Dropping it cancels the loop.
#[derive(Debug)]
pub struct HeartbeatHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl HeartbeatHandle {
    /// Cancel the loop and wait for it to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "heartbeat task ended abnormally");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
