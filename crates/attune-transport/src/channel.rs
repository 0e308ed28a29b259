use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use attune_core::errors::TransportError;
use attune_core::events::{EventKind, WireFrame};
use attune_core::model::AnalysisResult;
use attune_telemetry::MetricsRecorder;

use crate::connector::{Connector, Link};

/// Lifecycle of the logical connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Everything the channel surfaces to the orchestrator.
#[derive(Debug)]
pub enum ChannelEvent {
    Connected,
    Disconnected,
    ReconnectExhausted { attempts: u32 },
    Inbound(EventKind, AnalysisResult),
    BackendError(String),
}

/// Reconnection and dispatch tuning.
#[derive(Clone, Debug)]
pub struct ChannelConfig {
    /// Linear backoff unit: attempt N waits `base_delay * N`.
    pub base_delay: Duration,
    /// Consecutive failed attempts before giving up.
    pub max_attempts: u32,
    /// In-flight outbound queue depth between handle and link task.
    pub send_queue: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1_000),
            max_attempts: 5,
            send_queue: 64,
        }
    }
}

/// Delay before reconnect attempt `attempt` (1-based). Linear, not
/// exponential: the backend sits on the same LAN or a managed host, and
/// the upstream protocol expects quick re-establishment.
fn reconnect_delay(base: Duration, attempt: u32) -> Duration {
    base * attempt
}

enum Command {
    Connect,
}

/// A reconnecting publish/subscribe connection to the analysis backend.
///
/// The channel never buffers application sends: while disconnected,
/// `send` fails with `NotConnected` and queuing is the orchestrator's
/// responsibility. Reconnection is the only retry mechanism.
pub struct AnalysisChannel {
    inner: Arc<Inner>,
    cmd_tx: mpsc::Sender<Command>,
}

struct Inner {
    connector: Box<dyn Connector>,
    config: ChannelConfig,
    state: RwLock<ConnectionState>,
    outbound: Mutex<Option<mpsc::Sender<WireFrame>>>,
    events_tx: mpsc::Sender<ChannelEvent>,
    attempt: AtomicU32,
    shutdown: CancellationToken,
    metrics: Arc<MetricsRecorder>,
}

impl AnalysisChannel {
    /// Create the channel and its event stream. The receiver must be
    /// drained (the orchestrator's event loop does) or the channel will
    /// eventually stall on inbound delivery.
    pub fn new(
        connector: Box<dyn Connector>,
        config: ChannelConfig,
        metrics: Arc<MetricsRecorder>,
    ) -> (Self, mpsc::Receiver<ChannelEvent>) {
        let (events_tx, events_rx) = mpsc::channel(256);
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let inner = Arc::new(Inner {
            connector,
            config,
            state: RwLock::new(ConnectionState::Disconnected),
            outbound: Mutex::new(None),
            events_tx,
            attempt: AtomicU32::new(0),
            shutdown: CancellationToken::new(),
            metrics,
        });
        tokio::spawn(drive(Arc::clone(&inner), cmd_rx));
        (Self { inner, cmd_tx }, events_rx)
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.read()
    }

    /// Idempotent: a no-op while Connected or Connecting.
    pub async fn connect(&self) {
        if self.state() != ConnectionState::Disconnected {
            return;
        }
        let _ = self.cmd_tx.send(Command::Connect).await;
    }

    /// Dispatch immediately if Connected; never buffers otherwise.
    pub fn send(&self, frame: WireFrame) -> Result<(), TransportError> {
        let guard = self.inner.outbound.lock();
        match guard.as_ref() {
            Some(tx) => tx.try_send(frame).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    TransportError::SendFailed("send queue full".into())
                }
                mpsc::error::TrySendError::Closed(_) => TransportError::NotConnected,
            }),
            None => Err(TransportError::NotConnected),
        }
    }

    /// Synchronously tear down: cancels the reconnect timer and the link
    /// task. No further events are emitted after this returns.
    pub fn close(&self) {
        self.inner.shutdown.cancel();
        *self.inner.outbound.lock() = None;
        *self.inner.state.write() = ConnectionState::Disconnected;
    }
}

async fn drive(inner: Arc<Inner>, mut cmd_rx: mpsc::Receiver<Command>) {
    loop {
        tokio::select! {
            _ = inner.shutdown.cancelled() => break,
            cmd = cmd_rx.recv() => {
                let Some(Command::Connect) = cmd else { break };
                inner.connection_cycle().await;
            }
        }
    }
}

impl Inner {
    /// Connect, run the link until it drops, back off, repeat. Returns
    /// when shut down or when reconnection is exhausted.
    async fn connection_cycle(self: &Arc<Self>) {
        if *self.state.read() == ConnectionState::Connected {
            return;
        }
        loop {
            if self.shutdown.is_cancelled() {
                return;
            }
            *self.state.write() = ConnectionState::Connecting;
            match self.connector.connect().await {
                Ok(link) => {
                    let (tx, rx) = mpsc::channel(self.config.send_queue);
                    *self.outbound.lock() = Some(tx);
                    *self.state.write() = ConnectionState::Connected;
                    self.attempt.store(0, Ordering::Relaxed);
                    info!("channel connected");
                    let _ = self.events_tx.send(ChannelEvent::Connected).await;

                    let shutting_down = self.link_loop(link, rx).await;
                    *self.outbound.lock() = None;
                    *self.state.write() = ConnectionState::Disconnected;
                    if shutting_down {
                        return;
                    }
                    let _ = self.events_tx.send(ChannelEvent::Disconnected).await;
                }
                Err(e) => {
                    warn!(error = %e, kind = e.kind(), "connect attempt failed");
                    *self.state.write() = ConnectionState::Disconnected;
                }
            }

            let attempt = self.attempt.fetch_add(1, Ordering::Relaxed) + 1;
            if attempt > self.config.max_attempts {
                tracing::error!(
                    attempts = self.config.max_attempts,
                    "reconnect exhausted, giving up"
                );
                self.metrics.incr_reconnects_exhausted();
                let _ = self
                    .events_tx
                    .send(ChannelEvent::ReconnectExhausted {
                        attempts: self.config.max_attempts,
                    })
                    .await;
                return;
            }
            self.metrics.incr_reconnect_attempts();
            let delay = reconnect_delay(self.config.base_delay, attempt);
            info!(attempt, delay_ms = delay.as_millis() as u64, "scheduling reconnect");
            tokio::select! {
                _ = self.shutdown.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Pump one link until it closes. Returns true when the exit was a
    /// requested shutdown rather than a connection loss.
    async fn link_loop(
        self: &Arc<Self>,
        mut link: Box<dyn Link>,
        mut rx: mpsc::Receiver<WireFrame>,
    ) -> bool {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    link.close().await;
                    return true;
                }
                frame = rx.recv() => {
                    let Some(frame) = frame else {
                        link.close().await;
                        return true;
                    };
                    match link.send(frame).await {
                        Ok(()) => self.metrics.incr_sent(),
                        Err(e) if e.is_transient() => {
                            warn!(error = %e, "send failed, connection lost");
                            return false;
                        }
                        // Individual failed sends are not retried here.
                        Err(e) => warn!(error = %e, kind = e.kind(), "send failed, frame dropped"),
                    }
                }
                inbound = link.recv() => {
                    match inbound {
                        None => {
                            info!("channel closed by peer");
                            return false;
                        }
                        Some(Err(e)) if e.is_transient() => {
                            warn!(error = %e, "channel error");
                            return false;
                        }
                        Some(Err(e)) => {
                            self.metrics.incr_malformed_frames();
                            warn!(error = %e, kind = e.kind(), "bad inbound frame, skipping");
                        }
                        Some(Ok(frame)) => self.handle_inbound(frame).await,
                    }
                }
            }
        }
    }

    /// Validate an inbound frame and forward it verbatim to the
    /// orchestrator's dispatch routine.
    async fn handle_inbound(&self, frame: WireFrame) {
        let Some(kind) = EventKind::from_wire(&frame.event) else {
            self.metrics.incr_malformed_frames();
            warn!(event = %frame.event, "unknown inbound event, skipping");
            return;
        };
        if kind == EventKind::Error {
            let message = frame
                .data
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("unspecified")
                .to_string();
            warn!(message = %message, "backend reported error");
            let _ = self.events_tx.send(ChannelEvent::BackendError(message)).await;
            return;
        }
        match AnalysisResult::decode(kind, frame.data) {
            Ok(result) => {
                let _ = self.events_tx.send(ChannelEvent::Inbound(kind, result)).await;
            }
            Err(e) => {
                self.metrics.incr_malformed_frames();
                warn!(event = %kind, error = %e, "undecodable payload, skipping");
            }
        }
    }
}
