use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::channel::{Channel, ConnectionState, Endpoint};
use crate::error::{Result, TransportError};

/// Default bound on opening a single session.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns the status and service sessions to one MES host.
///
/// Connect, close and reconnect all run under a single lifecycle lock, so a
/// reconnect triggered by the heartbeat task and one triggered by a service
/// call never interleave their teardown and rebuild. Each session keeps its
/// own stream lock, held for a whole write or round trip. Teardown first
/// aborts whatever operation holds that lock, which then fails with
/// [`TransportError::Aborted`], and only then closes the socket. A stalled
/// service read therefore never blocks a close or a reconnect.
pub struct ConnectionManager {
    endpoint: Endpoint,
    connect_timeout: Option<Duration>,
    status: Session,
    service: Session,
    lifecycle: Mutex<()>,
    reconnect_attempts: AtomicU64,
}

impl ConnectionManager {
    /// Create a manager for `endpoint`. No sockets are opened until
    /// [`connect`](Self::connect).
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            status: Session::new(Channel::Status),
            service: Session::new(Channel::Service),
            lifecycle: Mutex::new(()),
            reconnect_attempts: AtomicU64::new(0),
        }
    }

    /// Override the per-session connect timeout. `None` waits for the OS.
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Host and ports this manager connects to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Open both sessions.
    ///
    /// Any sessions left over from a previous connect are closed first. If
    /// either session fails to open, neither stays open.
    pub async fn connect(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        self.rebuild_locked().await
    }

    /// Close both sessions. Idempotent; close failures are logged and dropped.
    pub async fn close(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        self.close_locked().await;
        debug!(endpoint = %self.endpoint, "sessions closed");
    }

    /// Tear down and rebuild both sessions against the stored endpoint.
    pub async fn reconnect(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        let attempt = self.reconnect_attempts.fetch_add(1, Ordering::Relaxed) + 1;
        info!(endpoint = %self.endpoint, attempt, "reconnecting");
        self.rebuild_locked().await
    }

    /// Number of [`reconnect`](Self::reconnect) calls made so far.
    pub fn reconnect_attempts(&self) -> u64 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    /// Current state of one session.
    pub fn state(&self, channel: Channel) -> ConnectionState {
        self.session(channel).state()
    }

    /// Whether `channel` currently has an open socket.
    pub fn is_connected(&self, channel: Channel) -> bool {
        self.state(channel) == ConnectionState::Connected
    }

    /// Write a heartbeat frame on the status session.
    pub async fn send_status(&self, bytes: &[u8]) -> Result<()> {
        self.status.send(bytes).await
    }

    /// Write raw request bytes on the service session.
    pub async fn send_service(&self, bytes: &[u8]) -> Result<()> {
        self.service.send(bytes).await
    }

    /// Perform one read of at most `max_bytes` on the service session.
    ///
    /// The protocol has no length prefix, so whatever a single read returns
    /// is the whole response.
    pub async fn recv_service(&self, max_bytes: usize) -> Result<Bytes> {
        let mut guard = self.service.stream.lock().await;
        let abort = self.service.abort_token();
        let stream = guard
            .as_mut()
            .ok_or(TransportError::NotConnected(Channel::Service))?;
        self.service
            .interruptible(&abort, self.service.read_once(stream, max_bytes))
            .await
    }

    /// Write a request and read its response while holding the service
    /// session, so concurrent callers cannot interleave on the wire.
    ///
    /// When `timeout` elapses the session is marked lost, since a late
    /// response would otherwise be read as the answer to the next request.
    /// A close or reconnect while the call is pending ends it with
    /// [`TransportError::Aborted`].
    pub async fn round_trip(
        &self,
        request: &[u8],
        max_bytes: usize,
        timeout: Option<Duration>,
    ) -> Result<Bytes> {
        self.round_trip_observed(request, max_bytes, timeout, || {})
            .await
    }

    /// [`round_trip`](Self::round_trip), calling `on_written` once the
    /// request is fully on the wire and before the response is awaited.
    pub async fn round_trip_observed(
        &self,
        request: &[u8],
        max_bytes: usize,
        timeout: Option<Duration>,
        on_written: impl FnOnce(),
    ) -> Result<Bytes> {
        let mut guard = self.service.stream.lock().await;
        let abort = self.service.abort_token();
        let stream = guard
            .as_mut()
            .ok_or(TransportError::NotConnected(Channel::Service))?;
        self.service
            .interruptible(&abort, self.service.write_once(stream, request))
            .await?;
        on_written();

        let read = self
            .service
            .interruptible(&abort, self.service.read_once(stream, max_bytes));
        match timeout {
            Some(timeout) => match tokio::time::timeout(timeout, read).await {
                Ok(result) => result,
                Err(_) => {
                    self.service.mark_lost();
                    Err(TransportError::Timeout {
                        channel: Channel::Service,
                        timeout,
                    })
                }
            },
            None => read.await,
        }
    }

    fn session(&self, channel: Channel) -> &Session {
        match channel {
            Channel::Status => &self.status,
            Channel::Service => &self.service,
        }
    }

    async fn rebuild_locked(&self) -> Result<()> {
        self.close_locked().await;

        // On the error path the already-open status stream is dropped here,
        // which closes it.
        let status = self.open(Channel::Status).await?;
        let service = self.open(Channel::Service).await?;

        self.status.install(status).await;
        self.service.install(service).await;
        info!(endpoint = %self.endpoint, "connected");
        Ok(())
    }

    async fn close_locked(&self) {
        for session in [&self.status, &self.service] {
            if let Err(err) = session.teardown().await {
                warn!(error = %err, "ignoring session close failure");
            }
        }
    }

    async fn open(&self, channel: Channel) -> Result<TcpStream> {
        let host = self.endpoint.host.as_str();
        let port = self.endpoint.port(channel);
        let connect_error = |source: std::io::Error| TransportError::Connect {
            channel,
            host: host.to_string(),
            port,
            source,
        };

        let attempt = TcpStream::connect((host, port));
        let stream = match self.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, attempt).await.map_err(|_| {
                TransportError::ConnectTimeout {
                    channel,
                    host: host.to_string(),
                    port,
                    timeout,
                }
            })?,
            None => attempt.await,
        }
        .map_err(&connect_error)?;

        // Heartbeat frames are 4 bytes; Nagle must not hold them back.
        stream.set_nodelay(true).map_err(&connect_error)?;

        debug!(%channel, host, port, "session opened");
        Ok(stream)
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.endpoint)
            .field("status", &self.status.state())
            .field("service", &self.service.state())
            .field("reconnect_attempts", &self.reconnect_attempts())
            .finish()
    }
}

struct Session {
    channel: Channel,
    stream: Mutex<Option<TcpStream>>,
    connected: AtomicBool,
    /// Cancelled by teardown; replaced with a fresh token on install.
    abort: parking_lot::Mutex<CancellationToken>,
}

impl Session {
    fn new(channel: Channel) -> Self {
        Self {
            channel,
            stream: Mutex::new(None),
            connected: AtomicBool::new(false),
            abort: parking_lot::Mutex::new(CancellationToken::new()),
        }
    }

    /// Token of the installed stream. Take it while holding the stream lock.
    fn abort_token(&self) -> CancellationToken {
        self.abort.lock().clone()
    }

    async fn interruptible<T>(
        &self,
        abort: &CancellationToken,
        op: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::select! {
            biased;
            _ = abort.cancelled() => {
                self.mark_lost();
                Err(TransportError::Aborted(self.channel))
            }
            result = op => result,
        }
    }

    fn state(&self) -> ConnectionState {
        if self.connected.load(Ordering::SeqCst) {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    fn mark_lost(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    async fn install(&self, stream: TcpStream) {
        let mut guard = self.stream.lock().await;
        *self.abort.lock() = CancellationToken::new();
        *guard = Some(stream);
        self.connected.store(true, Ordering::SeqCst);
    }

    async fn teardown(&self) -> Result<()> {
        self.abort.lock().cancel();
        let mut guard = self.stream.lock().await;
        self.mark_lost();
        let Some(mut stream) = guard.take() else {
            return Ok(());
        };
        stream
            .shutdown()
            .await
            .map_err(|source| TransportError::Disconnect {
                channel: self.channel,
                source,
            })
    }

    async fn send(&self, bytes: &[u8]) -> Result<()> {
        let mut guard = self.stream.lock().await;
        let abort = self.abort_token();
        let stream = guard
            .as_mut()
            .ok_or(TransportError::NotConnected(self.channel))?;
        self.interruptible(&abort, self.write_once(stream, bytes)).await
    }

    async fn write_once(&self, stream: &mut TcpStream, bytes: &[u8]) -> Result<()> {
        let written = async {
            stream.write_all(bytes).await?;
            stream.flush().await
        }
        .await;

        written.map_err(|source| {
            self.mark_lost();
            TransportError::Io {
                channel: self.channel,
                source,
            }
        })
    }

    async fn read_once(&self, stream: &mut TcpStream, max_bytes: usize) -> Result<Bytes> {
        let mut buf = BytesMut::zeroed(max_bytes.max(1));
        let read = stream.read(&mut buf[..]).await.map_err(|source| {
            self.mark_lost();
            TransportError::Io {
                channel: self.channel,
                source,
            }
        })?;

        if read == 0 {
            self.mark_lost();
            return Err(TransportError::Closed(self.channel));
        }

        buf.truncate(read);
        Ok(buf.freeze())
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;

    use super::*;

    struct FakeHost {
        endpoint: Endpoint,
        status: mpsc::UnboundedReceiver<TcpStream>,
        service: mpsc::UnboundedReceiver<TcpStream>,
    }

    impl FakeHost {
        async fn next_status(&mut self) -> TcpStream {
            self.status.recv().await.expect("status peer should accept")
        }

        async fn next_service(&mut self) -> TcpStream {
            self.service.recv().await.expect("service peer should accept")
        }
    }

    async fn fake_host() -> FakeHost {
        let (status_port, status) = accept_loop().await;
        let (service_port, service) = accept_loop().await;
        FakeHost {
            endpoint: Endpoint::new("127.0.0.1").with_ports(status_port, service_port),
            status,
            service,
        }
    }

    async fn accept_loop() -> (u16, mpsc::UnboundedReceiver<TcpStream>) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let port = listener
            .local_addr()
            .expect("listener should have an address")
            .port();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                if tx.send(stream).is_err() {
                    break;
                }
            }
        });
        (port, rx)
    }

    fn unused_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .expect("spare port should bind")
            .local_addr()
            .expect("spare port should have an address")
            .port()
    }

    async fn assert_peer_closed(stream: &mut TcpStream) {
        let mut buf = [0u8; 8];
        let read = stream.read(&mut buf).await.unwrap_or(0);
        assert_eq!(read, 0, "peer should observe the session closing");
    }

    #[tokio::test]
    async fn connect_opens_both_sessions() {
        let mut host = fake_host().await;
        let manager = ConnectionManager::new(host.endpoint.clone());

        manager.connect().await.expect("connect should succeed");
        let _status = host.next_status().await;
        let _service = host.next_service().await;

        assert!(manager.is_connected(Channel::Status));
        assert!(manager.is_connected(Channel::Service));
        assert_eq!(manager.reconnect_attempts(), 0);
    }

    #[tokio::test]
    async fn failed_connect_leaves_nothing_half_open() {
        let (status_port, mut status) = accept_loop().await;
        let endpoint = Endpoint::new("127.0.0.1").with_ports(status_port, unused_port());
        let manager = ConnectionManager::new(endpoint);

        let err = manager.connect().await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::Connect {
                channel: Channel::Service,
                ..
            }
        ));
        assert_eq!(manager.state(Channel::Status), ConnectionState::Disconnected);
        assert_eq!(manager.state(Channel::Service), ConnectionState::Disconnected);

        let mut orphan = status.recv().await.expect("status peer should accept");
        assert_peer_closed(&mut orphan).await;
    }

    #[tokio::test]
    async fn send_without_connection_fails() {
        let manager = ConnectionManager::new(Endpoint::new("127.0.0.1"));

        let err = manager.send_status(&[0, 1, 1, 0]).await.unwrap_err();
        assert!(matches!(err, TransportError::NotConnected(Channel::Status)));

        let err = manager.send_service(b"444;*").await.unwrap_err();
        assert!(matches!(err, TransportError::NotConnected(Channel::Service)));

        let err = manager.recv_service(64).await.unwrap_err();
        assert!(matches!(err, TransportError::NotConnected(Channel::Service)));
    }

    #[tokio::test]
    async fn status_bytes_reach_peer() {
        let mut host = fake_host().await;
        let manager = ConnectionManager::new(host.endpoint.clone());
        manager.connect().await.expect("connect should succeed");
        let mut status = host.next_status().await;

        manager
            .send_status(&[0x00, 0x32, 0x01, 0x95])
            .await
            .expect("status send should succeed");

        let mut frame = [0u8; 4];
        status
            .read_exact(&mut frame)
            .await
            .expect("peer should read frame");
        assert_eq!(frame, [0x00, 0x32, 0x01, 0x95]);
    }

    #[tokio::test]
    async fn round_trip_returns_single_read() {
        let mut host = fake_host().await;
        let manager = ConnectionManager::new(host.endpoint.clone());
        manager.connect().await.expect("connect should succeed");
        let mut service = host.next_service().await;

        let peer = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let n = service.read(&mut buf).await.expect("peer should read");
            assert_eq!(&buf[..n], b"444;MClass=1;MNo=1;ErrorState=0*");
            service
                .write_all(b"444;MClass=1;MNo=1;ErrorState=0;")
                .await
                .expect("peer should write");
            service
        });

        let response = manager
            .round_trip(b"444;MClass=1;MNo=1;ErrorState=0*", 1024, None)
            .await
            .expect("round trip should succeed");
        assert_eq!(response.as_ref(), b"444;MClass=1;MNo=1;ErrorState=0;");
        let _service = peer.await.expect("peer task should finish");
    }

    #[tokio::test]
    async fn send_then_recv_on_service_session() {
        let mut host = fake_host().await;
        let manager = ConnectionManager::new(host.endpoint.clone());
        manager.connect().await.expect("connect should succeed");
        let mut service = host.next_service().await;

        manager
            .send_service(b"ping")
            .await
            .expect("service send should succeed");
        let mut buf = [0u8; 4];
        service
            .read_exact(&mut buf)
            .await
            .expect("peer should read");
        service.write_all(b"pong").await.expect("peer should write");

        let response = manager
            .recv_service(16)
            .await
            .expect("recv should succeed");
        assert_eq!(response.as_ref(), b"pong");
    }

    #[tokio::test]
    async fn peer_close_is_reported_and_marks_session_lost() {
        let mut host = fake_host().await;
        let manager = ConnectionManager::new(host.endpoint.clone());
        manager.connect().await.expect("connect should succeed");
        drop(host.next_service().await);

        let err = manager.recv_service(64).await.unwrap_err();
        assert!(matches!(err, TransportError::Closed(Channel::Service)));
        assert!(!manager.is_connected(Channel::Service));
    }

    #[tokio::test]
    async fn round_trip_timeout_marks_session_lost() {
        let mut host = fake_host().await;
        let manager = ConnectionManager::new(host.endpoint.clone());
        manager.connect().await.expect("connect should succeed");
        let _silent = host.next_service().await;

        let written = AtomicBool::new(false);
        let err = manager
            .round_trip_observed(b"444;*", 64, Some(Duration::from_millis(50)), || {
                written.store(true, Ordering::SeqCst)
            })
            .await
            .unwrap_err();
        assert!(written.load(Ordering::SeqCst), "request reached the wire");
        assert!(matches!(
            err,
            TransportError::Timeout {
                channel: Channel::Service,
                ..
            }
        ));
        assert!(!manager.is_connected(Channel::Service));
    }

    #[tokio::test]
    async fn close_aborts_a_pending_round_trip() {
        let mut host = fake_host().await;
        let manager = std::sync::Arc::new(ConnectionManager::new(host.endpoint.clone()));
        manager.connect().await.expect("connect should succeed");
        let _silent = host.next_service().await;

        let pending = tokio::spawn({
            let manager = std::sync::Arc::clone(&manager);
            async move { manager.round_trip(b"444;*", 64, None).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        tokio::time::timeout(Duration::from_secs(2), manager.close())
            .await
            .expect("close should not wait for the silent peer");
        let err = pending
            .await
            .expect("round trip task should finish")
            .unwrap_err();
        assert!(matches!(err, TransportError::Aborted(Channel::Service)));
        assert!(!manager.is_connected(Channel::Service));
    }

    #[tokio::test]
    async fn reconnect_aborts_a_pending_round_trip_and_rebuilds() {
        let mut host = fake_host().await;
        let manager = std::sync::Arc::new(ConnectionManager::new(host.endpoint.clone()));
        manager.connect().await.expect("connect should succeed");
        let _silent = host.next_service().await;

        let pending = tokio::spawn({
            let manager = std::sync::Arc::clone(&manager);
            async move { manager.round_trip(b"444;*", 64, None).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        tokio::time::timeout(Duration::from_secs(2), manager.reconnect())
            .await
            .expect("reconnect should not wait for the silent peer")
            .expect("reconnect should succeed");
        let err = pending
            .await
            .expect("round trip task should finish")
            .unwrap_err();
        assert!(matches!(err, TransportError::Aborted(Channel::Service)));
        assert!(manager.is_connected(Channel::Service));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let mut host = fake_host().await;
        let manager = ConnectionManager::new(host.endpoint.clone());
        manager.connect().await.expect("connect should succeed");
        let mut status = host.next_status().await;
        let mut service = host.next_service().await;

        manager.close().await;
        manager.close().await;

        assert!(!manager.is_connected(Channel::Status));
        assert!(!manager.is_connected(Channel::Service));
        assert_peer_closed(&mut status).await;
        assert_peer_closed(&mut service).await;
    }

    #[tokio::test]
    async fn reconnect_rebuilds_both_sessions() {
        let mut host = fake_host().await;
        let manager = ConnectionManager::new(host.endpoint.clone());
        manager.connect().await.expect("connect should succeed");
        let mut old_status = host.next_status().await;
        let mut old_service = host.next_service().await;

        manager.reconnect().await.expect("reconnect should succeed");

        assert_peer_closed(&mut old_status).await;
        assert_peer_closed(&mut old_service).await;
        let _status = host.next_status().await;
        let _service = host.next_service().await;
        assert!(manager.is_connected(Channel::Status));
        assert!(manager.is_connected(Channel::Service));
        assert_eq!(manager.reconnect_attempts(), 1);
    }

    #[tokio::test]
    async fn concurrent_reconnects_are_serialized() {
        let host = fake_host().await;
        let manager = ConnectionManager::new(host.endpoint.clone());

        let (first, second) = tokio::join!(manager.reconnect(), manager.reconnect());
        first.expect("first reconnect should succeed");
        second.expect("second reconnect should succeed");

        assert_eq!(manager.reconnect_attempts(), 2);
        assert!(manager.is_connected(Channel::Status));
        assert!(manager.is_connected(Channel::Service));
    }

    #[tokio::test]
    async fn reconnect_against_dead_host_fails_cleanly() {
        let endpoint = Endpoint::new("127.0.0.1").with_ports(unused_port(), unused_port());
        let manager = ConnectionManager::new(endpoint);

        let err = manager.reconnect().await.unwrap_err();
        assert_eq!(err.channel(), Channel::Status);
        assert_eq!(manager.reconnect_attempts(), 1);
        assert!(!manager.is_connected(Channel::Status));
    }
}
