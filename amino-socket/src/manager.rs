//! Socket connection manager.
//!
//! Owns the persistent connection lifecycle: the signed upgrade handshake,
//! subscription replay, heartbeat and liveness monitoring, and automatic
//! reconnection with exponential backoff and jitter. Exactly one connect
//! attempt is ever in flight; the ready signal is emitted only after every
//! registered subscription has been replayed onto the new connection.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use amino_core::config::SocketConfig;
use amino_core::error::{AminoError, AminoResult};

use crate::frame::{InboundFrame, OutboundFrame};
use crate::subscriptions::SubscriptionRegistry;
use crate::transport::{ConnectRequest, FrameSink, FrameSource, Transport};

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected and not trying to connect.
    Disconnected,
    /// Building the signed connect request.
    Connecting,
    /// Awaiting the authenticated upgrade.
    Authenticating,
    /// Connected; replaying subscriptions.
    Subscribing,
    /// Fully connected and receiving frames.
    Ready,
    /// Connection lost; retrying with backoff.
    Reconnecting,
    /// Shut down; terminal.
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Authenticating => write!(f, "authenticating"),
            Self::Subscribing => write!(f, "subscribing"),
            Self::Ready => write!(f, "ready"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Signals delivered to the frame consumer.
#[derive(Debug)]
pub enum SocketSignal {
    /// Connection is ready; subscriptions have been replayed.
    Ready {
        /// True when this follows a reconnect rather than the first connect.
        resumed: bool,
    },
    /// One inbound frame, in receive order.
    Frame(InboundFrame),
    /// Reconnect retries were exhausted under the configured cap.
    Lost {
        /// Number of failed attempts before giving up.
        attempts: u32,
    },
}

/// Builds the signed connect request for each attempt. A fresh request is
/// needed per attempt because the handshake signature carries a timestamp.
pub trait HandshakeProvider: Send + Sync {
    /// Build the connect request for one attempt.
    fn connect_request(&self) -> AminoResult<ConnectRequest>;
}

/// Reconnection behavior.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Base delay between attempts.
    pub base_delay: Duration,
    /// Maximum delay cap for exponential backoff.
    pub max_delay: Duration,
    /// Maximum attempts before surfacing `Lost` (0 = unlimited).
    pub max_attempts: u32,
    /// Jitter factor (0.0 to 1.0) applied to each delay.
    pub jitter_factor: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 0,
            jitter_factor: 0.3,
        }
    }
}

impl From<&SocketConfig> for ReconnectConfig {
    fn from(config: &SocketConfig) -> Self {
        Self {
            base_delay: Duration::from_secs(config.reconnect_base_delay_secs),
            max_delay: Duration::from_secs(config.reconnect_max_delay_secs),
            max_attempts: config.reconnect_max_attempts,
            jitter_factor: config.reconnect_jitter.clamp(0.0, 1.0),
        }
    }
}

/// Heartbeat behavior.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Interval between keep-alive pings.
    pub interval: Duration,
    /// Maximum silence on the inbound side before the connection is
    /// declared dead.
    pub liveness_timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(amino_core::constants::HEARTBEAT_INTERVAL_SECS),
            liveness_timeout: Duration::from_secs(amino_core::constants::LIVENESS_TIMEOUT_SECS),
        }
    }
}

impl From<&SocketConfig> for HeartbeatConfig {
    fn from(config: &SocketConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.heartbeat_interval_secs),
            liveness_timeout: Duration::from_secs(config.liveness_timeout_secs),
        }
    }
}

/// One live connection: the split halves plus the per-connection plumbing.
struct Link {
    sink: Box<dyn FrameSink>,
    source: Box<dyn FrameSource>,
    outbound_rx: mpsc::Receiver<String>,
    fault_rx: mpsc::Receiver<AminoError>,
    heartbeat: JoinHandle<()>,
}

enum DriveEnd {
    Closed,
    Failed(AminoError),
}

struct Inner {
    transport: Arc<dyn Transport>,
    handshake: Arc<dyn HandshakeProvider>,
    registry: Arc<SubscriptionRegistry>,
    reconnect_config: ReconnectConfig,
    heartbeat_config: HeartbeatConfig,
    state: Mutex<ConnectionState>,
    state_tx: watch::Sender<ConnectionState>,
    signal_tx: mpsc::Sender<SocketSignal>,
    outbound: Mutex<Option<mpsc::Sender<String>>>,
    last_inbound: Arc<Mutex<Instant>>,
    retry_count: Mutex<u32>,
    close_notify: Notify,
    connect_lock: Mutex<()>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

/// Persistent socket connection manager.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Create a manager and the signal receiver its consumer will drain.
    pub fn new(
        transport: Arc<dyn Transport>,
        handshake: Arc<dyn HandshakeProvider>,
        registry: Arc<SubscriptionRegistry>,
        reconnect_config: ReconnectConfig,
        heartbeat_config: HeartbeatConfig,
    ) -> (Self, mpsc::Receiver<SocketSignal>) {
        let (signal_tx, signal_rx) = mpsc::channel(256);
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        let manager = Self {
            inner: Arc::new(Inner {
                transport,
                handshake,
                registry,
                reconnect_config,
                heartbeat_config,
                state: Mutex::new(ConnectionState::Disconnected),
                state_tx,
                signal_tx,
                outbound: Mutex::new(None),
                last_inbound: Arc::new(Mutex::new(Instant::now())),
                retry_count: Mutex::new(0),
                close_notify: Notify::new(),
                connect_lock: Mutex::new(()),
                supervisor: Mutex::new(None),
            }),
        };
        (manager, signal_rx)
    }

    /// Subscribe to connection state changes.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Get the current connection state.
    pub async fn state(&self) -> ConnectionState {
        *self.inner.state.lock().await
    }

    /// The subscription registry backing this connection.
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.inner.registry
    }

    async fn set_state(&self, new_state: ConnectionState) {
        let mut state = self.inner.state.lock().await;
        if *state != new_state {
            info!("socket state: {} -> {}", *state, new_state);
            *state = new_state;
            let _ = self.inner.state_tx.send(new_state);
        }
    }

    /// Establish the connection and keep it alive.
    ///
    /// The first attempt runs inline so startup failures (bad handshake
    /// signature, rejected credentials) propagate to the caller without
    /// retry. After that a background task owns the connection and repairs
    /// transient failures via the backoff policy.
    pub async fn connect(&self) -> AminoResult<()> {
        let current = self.state().await;
        if current == ConnectionState::Closed {
            return Err(AminoError::Socket("connection manager is closed".into()));
        }
        if current != ConnectionState::Disconnected {
            debug!("already connected or connecting, skipping");
            return Ok(());
        }

        let link = match self.establish(false).await {
            Ok(link) => link,
            Err(e) => {
                self.set_state(ConnectionState::Disconnected).await;
                return Err(e);
            }
        };

        let manager = self.clone();
        let handle = tokio::spawn(async move { manager.run(link).await });
        *self.inner.supervisor.lock().await = Some(handle);
        Ok(())
    }

    /// Queue an outbound frame. Fails with `NotConnected` unless the
    /// connection is Ready or Subscribing.
    pub async fn send(&self, frame: OutboundFrame) -> AminoResult<()> {
        let state = self.state().await;
        if !matches!(
            state,
            ConnectionState::Ready | ConnectionState::Subscribing
        ) {
            return Err(AminoError::NotConnected);
        }
        let tx = self
            .inner
            .outbound
            .lock()
            .await
            .clone()
            .ok_or(AminoError::NotConnected)?;
        tx.send(frame.encode()?)
            .await
            .map_err(|_| AminoError::NotConnected)
    }

    /// Subscribe to a live-layer topic. Idempotent; when the connection is
    /// Ready the subscribe frame is sent immediately, otherwise it is
    /// replayed on the next (re)connect.
    pub async fn subscribe(&self, community_id: u64, topic: &str) -> AminoResult<()> {
        let added = self.inner.registry.subscribe(community_id, topic).await;
        if added && self.state().await == ConnectionState::Ready {
            match self.send(OutboundFrame::subscribe(community_id, topic)).await {
                // Lost the race with a drop; the registry entry will be
                // replayed by the reconnect.
                Err(AminoError::NotConnected) => {}
                other => other?,
            }
        }
        Ok(())
    }

    /// Unsubscribe from a live-layer topic. Mirrors `subscribe`.
    pub async fn unsubscribe(&self, community_id: u64, topic: &str) -> AminoResult<()> {
        let removed = self.inner.registry.unsubscribe(community_id, topic).await;
        if removed && self.state().await == ConnectionState::Ready {
            match self
                .send(OutboundFrame::unsubscribe(community_id, topic))
                .await
            {
                Err(AminoError::NotConnected) => {}
                other => other?,
            }
        }
        Ok(())
    }

    /// Shut the connection down. Cancels the receive loop, heartbeat, and
    /// any pending reconnect backoff; transitions to Closed on every path.
    pub async fn close(&self) {
        self.set_state(ConnectionState::Closed).await;
        self.inner.close_notify.notify_waiters();
        self.inner.outbound.lock().await.take();

        let handle = self.inner.supervisor.lock().await.take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(Duration::from_secs(2), &mut handle)
                .await
                .is_err()
            {
                handle.abort();
            }
        }
        info!("socket closed");
    }

    /// One connect attempt: Connecting -> Authenticating -> Subscribing ->
    /// Ready. Holds the connect lock so attempts never interleave. Replay
    /// failures fail the whole attempt.
    async fn establish(&self, resumed: bool) -> AminoResult<Link> {
        let _guard = self.inner.connect_lock.lock().await;
        if self.state().await == ConnectionState::Closed {
            return Err(AminoError::Socket("connection manager is closed".into()));
        }

        self.set_state(ConnectionState::Connecting).await;
        let request = self.inner.handshake.connect_request()?;

        self.set_state(ConnectionState::Authenticating).await;
        let (mut sink, source) = self.inner.transport.connect(&request).await?;

        self.set_state(ConnectionState::Subscribing).await;
        let snapshot = self.inner.registry.snapshot().await;
        for sub in &snapshot {
            let frame = OutboundFrame::subscribe(sub.community_id, &sub.topic);
            sink.send(frame.encode()?).await?;
        }
        if !snapshot.is_empty() {
            info!("replayed {} subscription(s)", snapshot.len());
        }

        // A close() may have raced the handshake; do not resurrect.
        if self.state().await == ConnectionState::Closed {
            let _ = sink.close().await;
            return Err(AminoError::Socket("connection manager is closed".into()));
        }

        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        let (fault_tx, fault_rx) = mpsc::channel(1);
        *self.inner.last_inbound.lock().await = Instant::now();

        let heartbeat = tokio::spawn(heartbeat_loop(
            outbound_tx.clone(),
            fault_tx,
            self.inner.last_inbound.clone(),
            self.inner.heartbeat_config.clone(),
        ));

        *self.inner.outbound.lock().await = Some(outbound_tx);
        *self.inner.retry_count.lock().await = 0;
        self.set_state(ConnectionState::Ready).await;
        let _ = self
            .inner
            .signal_tx
            .send(SocketSignal::Ready { resumed })
            .await;

        Ok(Link {
            sink,
            source,
            outbound_rx,
            fault_rx,
            heartbeat,
        })
    }

    /// Supervisor loop: drive the live connection, repair failures.
    async fn run(self, mut link: Link) {
        loop {
            match self.drive(link).await {
                DriveEnd::Closed => break,
                DriveEnd::Failed(e) => {
                    warn!("connection failed: {e}");
                    match self.reconnect_loop().await {
                        Some(new_link) => link = new_link,
                        None => break,
                    }
                }
            }
        }
    }

    /// Pump one live connection until it fails or the client closes.
    /// Owns the split halves; releases everything on every exit path.
    async fn drive(&self, link: Link) -> DriveEnd {
        let Link {
            mut sink,
            mut source,
            mut outbound_rx,
            mut fault_rx,
            heartbeat,
        } = link;

        let end = loop {
            if self.state().await == ConnectionState::Closed {
                break DriveEnd::Closed;
            }
            tokio::select! {
                _ = self.inner.close_notify.notified() => break DriveEnd::Closed,
                fault = fault_rx.recv() => {
                    match fault {
                        Some(e) => break DriveEnd::Failed(e),
                        // Heartbeat ended without a fault; only happens
                        // during teardown.
                        None => break DriveEnd::Closed,
                    }
                }
                inbound = source.next() => match inbound {
                    Some(Ok(text)) => {
                        *self.inner.last_inbound.lock().await = Instant::now();
                        match InboundFrame::decode(&text) {
                            Ok(frame) => {
                                if self
                                    .inner
                                    .signal_tx
                                    .send(SocketSignal::Frame(frame))
                                    .await
                                    .is_err()
                                {
                                    debug!("signal consumer dropped");
                                }
                            }
                            Err(e) => debug!("dropping undecodable frame: {e}"),
                        }
                    }
                    Some(Err(e)) => break DriveEnd::Failed(e),
                    None => break DriveEnd::Failed(AminoError::Socket(
                        "server closed the connection".into(),
                    )),
                },
                outbound = outbound_rx.recv() => match outbound {
                    Some(text) => {
                        if let Err(e) = sink.send(text).await {
                            break DriveEnd::Failed(e);
                        }
                    }
                    None => break DriveEnd::Closed,
                },
            }
        };

        heartbeat.abort();
        self.inner.outbound.lock().await.take();
        if matches!(end, DriveEnd::Closed) {
            let _ = sink.close().await;
        }
        end
    }

    /// Retry with exponential backoff until a connection is established,
    /// the client closes, or the attempt cap is exhausted.
    async fn reconnect_loop(&self) -> Option<Link> {
        self.set_state(ConnectionState::Reconnecting).await;

        loop {
            if self.state().await == ConnectionState::Closed {
                return None;
            }

            let attempt = {
                let mut count = self.inner.retry_count.lock().await;
                *count += 1;
                *count
            };

            let cap = self.inner.reconnect_config.max_attempts;
            if cap > 0 && attempt > cap {
                error!("max reconnection attempts ({cap}) reached");
                let _ = self
                    .inner
                    .signal_tx
                    .send(SocketSignal::Lost { attempts: cap })
                    .await;
                self.set_state(ConnectionState::Closed).await;
                return None;
            }

            let delay = self.reconnect_delay(attempt - 1);
            warn!(
                "reconnection attempt {} in {:.1}s",
                attempt,
                delay.as_secs_f64()
            );

            tokio::select! {
                _ = sleep(delay) => {}
                _ = self.inner.close_notify.notified() => {
                    info!("reconnection cancelled by close");
                    return None;
                }
            }

            if self.state().await == ConnectionState::Closed {
                return None;
            }

            match self.establish(true).await {
                Ok(link) => {
                    info!("reconnected after {attempt} attempt(s)");
                    return Some(link);
                }
                Err(e) => {
                    error!("reconnection attempt {attempt} failed: {e}");
                    self.set_state(ConnectionState::Reconnecting).await;
                }
            }
        }
    }

    /// Backoff delay for an attempt, with jitter to avoid thundering herd.
    fn reconnect_delay(&self, attempt: u32) -> Duration {
        let base = self.inner.reconnect_config.base_delay.as_secs_f64();
        let max = self.inner.reconnect_config.max_delay.as_secs_f64();

        let exponential = (base * 2.0_f64.powi(attempt.min(16) as i32)).min(max);
        let jitter_range = exponential * self.inner.reconnect_config.jitter_factor;
        let jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter_range;
        let delay = (exponential + jitter).max(base / 2.0);

        Duration::from_secs_f64(delay)
    }
}

/// Heartbeat task: pings on a fixed interval and watches the inbound
/// liveness clock. Reports a fault when the window is exceeded.
async fn heartbeat_loop(
    outbound: mpsc::Sender<String>,
    fault: mpsc::Sender<AminoError>,
    last_inbound: Arc<Mutex<Instant>>,
    config: HeartbeatConfig,
) {
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let silent_for = last_inbound.lock().await.elapsed();
        if silent_for > config.liveness_timeout {
            warn!(
                "no inbound traffic for {:.1}s, declaring connection dead",
                silent_for.as_secs_f64()
            );
            let _ = fault
                .send(AminoError::Timeout("liveness window exceeded".into()))
                .await;
            return;
        }

        let frame = match OutboundFrame::ping().encode() {
            Ok(text) => text,
            Err(_) => continue,
        };
        if outbound.send(frame).await.is_err() {
            // Connection torn down under us.
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::codes::code;

    struct TestHandshake;

    impl HandshakeProvider for TestHandshake {
        fn connect_request(&self) -> AminoResult<ConnectRequest> {
            Ok(ConnectRequest {
                url: "ws://test".into(),
                headers: Vec::new(),
            })
        }
    }

    /// In-memory transport: each scripted connection is an unbounded
    /// channel the test writes server frames into; everything the manager
    /// sends is captured per connection.
    #[derive(Default)]
    struct MemoryTransport {
        scripts: std::sync::Mutex<VecDeque<mpsc::UnboundedReceiver<String>>>,
        sent: std::sync::Mutex<Vec<Vec<String>>>,
        connects: AtomicUsize,
        reject_auth: AtomicBool,
    }

    impl MemoryTransport {
        fn script(self: &Arc<Self>) -> mpsc::UnboundedSender<String> {
            let (tx, rx) = mpsc::unbounded_channel();
            self.scripts.lock().unwrap().push_back(rx);
            tx
        }

        fn sent_on(&self, index: usize) -> Vec<String> {
            self.sent.lock().unwrap()[index].clone()
        }

        fn connect_count(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }
    }

    struct MemorySink {
        transport: Arc<MemoryTransport>,
        index: usize,
    }

    #[async_trait]
    impl FrameSink for MemorySink {
        async fn send(&mut self, text: String) -> AminoResult<()> {
            self.transport.sent.lock().unwrap()[self.index].push(text);
            Ok(())
        }

        async fn close(&mut self) -> AminoResult<()> {
            Ok(())
        }
    }

    struct MemorySource {
        rx: mpsc::UnboundedReceiver<String>,
    }

    #[async_trait]
    impl FrameSource for MemorySource {
        async fn next(&mut self) -> Option<AminoResult<String>> {
            self.rx.recv().await.map(Ok)
        }
    }

    #[async_trait]
    impl Transport for Arc<MemoryTransport> {
        async fn connect(
            &self,
            _request: &ConnectRequest,
        ) -> AminoResult<(Box<dyn FrameSink>, Box<dyn FrameSource>)> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.reject_auth.load(Ordering::SeqCst) {
                return Err(AminoError::AuthenticationFailed(
                    "socket handshake rejected: 403".into(),
                ));
            }
            let rx = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AminoError::Socket("connection refused".into()))?;
            let index = {
                let mut sent = self.sent.lock().unwrap();
                sent.push(Vec::new());
                sent.len() - 1
            };
            Ok((
                Box::new(MemorySink {
                    transport: self.clone(),
                    index,
                }),
                Box::new(MemorySource { rx }),
            ))
        }
    }

    fn fast_reconnect() -> ReconnectConfig {
        ReconnectConfig {
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            max_attempts: 0,
            jitter_factor: 0.0,
        }
    }

    fn quiet_heartbeat() -> HeartbeatConfig {
        HeartbeatConfig {
            interval: Duration::from_secs(60),
            liveness_timeout: Duration::from_secs(300),
        }
    }

    fn build_manager(
        transport: Arc<MemoryTransport>,
        registry: Arc<SubscriptionRegistry>,
        reconnect: ReconnectConfig,
        heartbeat: HeartbeatConfig,
    ) -> (ConnectionManager, mpsc::Receiver<SocketSignal>) {
        ConnectionManager::new(
            Arc::new(transport),
            Arc::new(TestHandshake),
            registry,
            reconnect,
            heartbeat,
        )
    }

    fn frame_codes(sent: &[String]) -> Vec<i64> {
        sent.iter()
            .map(|text| {
                let wire: serde_json::Value = serde_json::from_str(text).unwrap();
                wire["t"].as_i64().unwrap()
            })
            .collect()
    }

    async fn next_ready(signals: &mut mpsc::Receiver<SocketSignal>) -> bool {
        loop {
            match tokio::time::timeout(Duration::from_secs(5), signals.recv())
                .await
                .expect("timed out waiting for ready signal")
                .expect("signal channel closed")
            {
                SocketSignal::Ready { resumed } => return resumed,
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_connect_replays_subscriptions_before_ready() {
        let transport = Arc::new(MemoryTransport::default());
        let _server = transport.script();
        let registry = Arc::new(SubscriptionRegistry::new());
        registry.subscribe(1, "online-members").await;
        registry.subscribe(2, "users-start-typing-at").await;

        let (manager, mut signals) = build_manager(
            transport.clone(),
            registry,
            fast_reconnect(),
            quiet_heartbeat(),
        );
        manager.connect().await.unwrap();

        assert_eq!(manager.state().await, ConnectionState::Ready);
        assert!(!next_ready(&mut signals).await);

        // Both subscribe frames were already on the wire when ready fired.
        let codes = frame_codes(&transport.sent_on(0));
        assert_eq!(
            codes
                .iter()
                .filter(|c| **c == code::SUBSCRIBE as i64)
                .count(),
            2
        );

        manager.close().await;
        assert_eq!(manager.state().await, ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_send_requires_ready() {
        let transport = Arc::new(MemoryTransport::default());
        let registry = Arc::new(SubscriptionRegistry::new());
        let (manager, _signals) = build_manager(
            transport,
            registry,
            fast_reconnect(),
            quiet_heartbeat(),
        );

        let result = manager.send(OutboundFrame::ping()).await;
        assert!(matches!(result, Err(AminoError::NotConnected)));
    }

    #[tokio::test]
    async fn test_frames_forwarded_in_receive_order() {
        let transport = Arc::new(MemoryTransport::default());
        let server = transport.script();
        let registry = Arc::new(SubscriptionRegistry::new());
        let (manager, mut signals) = build_manager(
            transport,
            registry,
            fast_reconnect(),
            quiet_heartbeat(),
        );
        manager.connect().await.unwrap();
        assert!(!next_ready(&mut signals).await);

        server.send(r#"{"t":1000,"o":{"n":1}}"#.into()).unwrap();
        server.send(r#"{"t":10,"o":{"n":2}}"#.into()).unwrap();

        let first = signals.recv().await.unwrap();
        let second = signals.recv().await.unwrap();
        match (first, second) {
            (SocketSignal::Frame(a), SocketSignal::Frame(b)) => {
                assert_eq!(a.code, 1000);
                assert_eq!(b.code, 10);
            }
            other => panic!("unexpected signals: {other:?}"),
        }

        manager.close().await;
    }

    #[tokio::test]
    async fn test_reconnect_replays_subscriptions() {
        let transport = Arc::new(MemoryTransport::default());
        let first_server = transport.script();
        let _second_server = transport.script();
        let registry = Arc::new(SubscriptionRegistry::new());
        registry.subscribe(1, "online-members").await;

        let (manager, mut signals) = build_manager(
            transport.clone(),
            registry,
            fast_reconnect(),
            quiet_heartbeat(),
        );
        manager.connect().await.unwrap();
        assert!(!next_ready(&mut signals).await);

        // Subscribe while live; then the server drops the connection.
        manager.subscribe(2, "users-start-typing-at").await.unwrap();
        drop(first_server);

        assert!(next_ready(&mut signals).await);
        assert_eq!(manager.state().await, ConnectionState::Ready);

        // The new connection saw every subscription from before the drop.
        let codes = frame_codes(&transport.sent_on(1));
        assert_eq!(
            codes
                .iter()
                .filter(|c| **c == code::SUBSCRIBE as i64)
                .count(),
            2
        );
        assert_eq!(transport.connect_count(), 2);

        manager.close().await;
    }

    #[tokio::test]
    async fn test_auth_failure_is_fatal_and_not_retried() {
        let transport = Arc::new(MemoryTransport::default());
        transport.reject_auth.store(true, Ordering::SeqCst);
        let registry = Arc::new(SubscriptionRegistry::new());
        let (manager, _signals) = build_manager(
            transport.clone(),
            registry,
            fast_reconnect(),
            quiet_heartbeat(),
        );

        let result = manager.connect().await;
        assert!(matches!(result, Err(AminoError::AuthenticationFailed(_))));
        assert_eq!(transport.connect_count(), 1);
        assert_eq!(manager.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_close_cancels_pending_reconnect() {
        let transport = Arc::new(MemoryTransport::default());
        let server = transport.script();
        let registry = Arc::new(SubscriptionRegistry::new());
        let (manager, mut signals) = build_manager(
            transport.clone(),
            registry,
            ReconnectConfig {
                base_delay: Duration::from_secs(60),
                max_delay: Duration::from_secs(60),
                max_attempts: 0,
                jitter_factor: 0.0,
            },
            quiet_heartbeat(),
        );
        manager.connect().await.unwrap();
        assert!(!next_ready(&mut signals).await);

        let mut states = manager.state_receiver();
        drop(server);
        // Wait until the manager notices the drop and enters backoff.
        while *states.borrow() != ConnectionState::Reconnecting {
            states.changed().await.unwrap();
        }

        manager.close().await;
        assert_eq!(manager.state().await, ConnectionState::Closed);
        assert_eq!(transport.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_connection_lost_after_retry_cap() {
        let transport = Arc::new(MemoryTransport::default());
        let server = transport.script();
        let registry = Arc::new(SubscriptionRegistry::new());
        let (manager, mut signals) = build_manager(
            transport.clone(),
            registry,
            ReconnectConfig {
                base_delay: Duration::from_millis(5),
                max_delay: Duration::from_millis(10),
                max_attempts: 2,
                jitter_factor: 0.0,
            },
            quiet_heartbeat(),
        );
        manager.connect().await.unwrap();
        assert!(!next_ready(&mut signals).await);

        // No further scripted connections: every reconnect attempt fails.
        drop(server);

        loop {
            match tokio::time::timeout(Duration::from_secs(5), signals.recv())
                .await
                .expect("timed out waiting for lost signal")
                .expect("signal channel closed")
            {
                SocketSignal::Lost { attempts } => {
                    assert_eq!(attempts, 2);
                    break;
                }
                _ => continue,
            }
        }
        assert_eq!(manager.state().await, ConnectionState::Closed);
        assert_eq!(transport.connect_count(), 3);
    }

    #[tokio::test]
    async fn test_heartbeat_pings_and_liveness_recovery() {
        let transport = Arc::new(MemoryTransport::default());
        let _first_server = transport.script();
        let second_server = transport.script();
        let registry = Arc::new(SubscriptionRegistry::new());
        let (manager, mut signals) = build_manager(
            transport.clone(),
            registry,
            fast_reconnect(),
            HeartbeatConfig {
                interval: Duration::from_millis(20),
                liveness_timeout: Duration::from_millis(100),
            },
        );
        manager.connect().await.unwrap();
        assert!(!next_ready(&mut signals).await);

        // The silent first connection gets pinged, then declared dead;
        // the manager reconnects on its own.
        assert!(next_ready(&mut signals).await);
        let codes = frame_codes(&transport.sent_on(0));
        assert!(codes.iter().any(|c| *c == code::PING as i64));

        // Traffic on the new connection keeps it alive.
        second_server.send(r#"{"t":117,"o":{}}"#.into()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(manager.state().await, ConnectionState::Ready);

        manager.close().await;
    }

    #[test]
    fn test_reconnect_delay_sequence() {
        let transport = Arc::new(MemoryTransport::default());
        let registry = Arc::new(SubscriptionRegistry::new());
        let (manager, _signals) = build_manager(
            transport,
            registry,
            ReconnectConfig {
                base_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(30),
                max_attempts: 0,
                jitter_factor: 0.3,
            },
            quiet_heartbeat(),
        );

        let d0 = manager.reconnect_delay(0);
        let d1 = manager.reconnect_delay(1);
        let d10 = manager.reconnect_delay(10);

        assert!(d0 >= Duration::from_millis(500));
        assert!(d0 <= Duration::from_millis(1500));
        assert!(d1 >= Duration::from_millis(1000));
        // Capped at max_delay plus jitter.
        assert!(d10 <= Duration::from_secs(40));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Ready.to_string(), "ready");
        assert_eq!(ConnectionState::Authenticating.to_string(), "authenticating");
    }
}
