use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use attune_cache::ResultCache;
use attune_core::config::SessionConfig;
use attune_core::errors::TransportError;
use attune_core::events::{EventKind, OutboundKind, WireFrame};
use attune_core::ids::SessionId;
use attune_core::model::{
    dominant_emotion, AnalysisRequest, AnalysisResult, Microexpression, Modality, RequestPayload,
    TextOptions, VideoOptions,
};
use attune_core::time::epoch_ms;
use attune_telemetry::MetricsRecorder;
use attune_transport::{AnalysisChannel, ChannelEvent, ConnectionState};

use crate::biometric::BiometricAdapter;
use crate::capture::CaptureAdapter;
use crate::queue::{PendingQueue, DEFAULT_QUEUE_CAPACITY};
use crate::subscribers::{SubscriberRegistry, SubscriptionId};
use crate::trend::{compute_trend, Trend};
use crate::window::{RollingWindow, HISTORY_WINDOW_MS, MICROEXPRESSION_WINDOW_MS};

/// Point-in-time read over one modality's rolling windows.
#[derive(Clone, Debug, Serialize)]
pub struct ModalitySummary {
    pub modality: Modality,
    pub samples: usize,
    pub latest: Option<f64>,
    pub mean: Option<f64>,
    pub trend: Option<Trend>,
    /// Video only: highest-scoring emotion in the latest result.
    pub dominant_emotion: Option<String>,
    /// Video only: latest engagement level.
    pub engagement: Option<f64>,
}

struct ActiveSession {
    session_id: SessionId,
    config: SessionConfig,
    cancel: CancellationToken,
}

struct Windows {
    stress: RollingWindow<f64>,
    engagement: RollingWindow<f64>,
    emotions: RollingWindow<BTreeMap<String, f64>>,
    microexpressions: RollingWindow<Microexpression>,
    heart_rate: RollingWindow<f64>,
    sentiment: RollingWindow<f64>,
}

impl Windows {
    fn new() -> Self {
        Self {
            stress: RollingWindow::new(HISTORY_WINDOW_MS),
            engagement: RollingWindow::new(HISTORY_WINDOW_MS),
            emotions: RollingWindow::new(HISTORY_WINDOW_MS),
            microexpressions: RollingWindow::new(MICROEXPRESSION_WINDOW_MS),
            heart_rate: RollingWindow::new(HISTORY_WINDOW_MS),
            sentiment: RollingWindow::new(HISTORY_WINDOW_MS),
        }
    }

    fn absorb(&mut self, now_ms: u64, result: &AnalysisResult) {
        match result {
            AnalysisResult::Video(v) => {
                if let Some(s) = v.stress_level {
                    self.stress.insert_at(now_ms, s);
                }
                if let Some(e) = v.engagement_level {
                    self.engagement.insert_at(now_ms, e);
                }
                if !v.emotions.is_empty() {
                    self.emotions.insert_at(now_ms, v.emotions.clone());
                }
                for m in &v.microexpressions {
                    self.microexpressions.insert_at(now_ms, m.clone());
                }
            }
            AnalysisResult::Biometric(b) => {
                if let Some(hr) = b.current_state.heart_rate {
                    self.heart_rate.insert_at(now_ms, hr);
                }
            }
            AnalysisResult::Text(t) => {
                if let Some(s) = t.sentiment {
                    self.sentiment.insert_at(now_ms, s);
                }
            }
            AnalysisResult::Comprehensive(_) => {}
        }
    }

    /// The scalar series trend/summary reads for a modality: stress for
    /// video, heart rate for biometric, sentiment for text.
    fn primary_series(&mut self, modality: Modality, now_ms: u64) -> Vec<f64> {
        match modality {
            Modality::Video => self.stress.values_at(now_ms),
            Modality::Biometric => self.heart_rate.values_at(now_ms),
            Modality::Text => self.sentiment.values_at(now_ms),
        }
    }
}

struct Inner {
    queue: PendingQueue,
    subscribers: SubscriberRegistry,
    windows: Windows,
    active: Option<ActiveSession>,
}

/// Session-scoped coordinator: owns the queuing policy, the rolling
/// windows, the subscriber registry, and the capture/biometric cadence.
///
/// One instance per embedding session; construct at session start and
/// drop at session end. There is no ambient global.
pub struct SessionOrchestrator {
    channel: Arc<AnalysisChannel>,
    metrics: Arc<MetricsRecorder>,
    cache: Option<ResultCache>,
    capture: Option<Arc<CaptureAdapter>>,
    biometric: Option<Arc<BiometricAdapter>>,
    inner: Mutex<Inner>,
}

impl SessionOrchestrator {
    pub fn new(channel: Arc<AnalysisChannel>, metrics: Arc<MetricsRecorder>) -> Self {
        Self {
            channel,
            metrics,
            cache: None,
            capture: None,
            biometric: None,
            inner: Mutex::new(Inner {
                queue: PendingQueue::new(DEFAULT_QUEUE_CAPACITY),
                subscribers: SubscriberRegistry::new(),
                windows: Windows::new(),
                active: None,
            }),
        }
    }

    pub fn with_cache(mut self, cache: ResultCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_capture(mut self, capture: Arc<CaptureAdapter>) -> Self {
        self.capture = Some(capture);
        self
    }

    pub fn with_biometric(mut self, biometric: Arc<BiometricAdapter>) -> Self {
        self.biometric = Some(biometric);
        self
    }

    pub fn with_queue_capacity(self, capacity: usize) -> Self {
        self.inner.lock().queue = PendingQueue::new(capacity);
        self
    }

    /// Start the event loop consuming the channel's event stream. Runs
    /// until the channel closes.
    pub fn run(
        self: &Arc<Self>,
        mut events: mpsc::Receiver<ChannelEvent>,
    ) -> tokio::task::JoinHandle<()> {
        let orch = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    ChannelEvent::Connected => orch.flush_pending(),
                    ChannelEvent::Disconnected => {
                        info!("channel disconnected, submissions will queue");
                    }
                    ChannelEvent::ReconnectExhausted { attempts } => {
                        error!(attempts, "analysis channel gave up reconnecting");
                    }
                    ChannelEvent::Inbound(kind, result) => orch.dispatch(kind, result),
                    ChannelEvent::BackendError(message) => {
                        warn!(message = %message, "analysis backend reported an error");
                    }
                }
            }
        })
    }

    // ─── Submission ──────────────────────────────────────────────────────

    /// Stamp and submit an analysis request. Fire-and-forget: sends
    /// immediately when connected, otherwise queues (evicting the oldest
    /// entry on overflow). Never blocks.
    pub fn submit(&self, payload: RequestPayload) {
        let session_id = self.session_id();
        self.submit_with_session(payload, session_id);
    }

    /// `submit` with an explicit session override.
    pub fn submit_with_session(&self, payload: RequestPayload, session_id: Option<SessionId>) {
        let request = AnalysisRequest {
            payload,
            session_id,
            captured_at_ms: epoch_ms(),
        };
        self.submit_request(request);
    }

    /// Convenience for the text modality: options come from the active
    /// session config when one exists.
    pub fn submit_text(&self, text: impl Into<String>) {
        let options = {
            let inner = self.inner.lock();
            inner
                .active
                .as_ref()
                .map(|a| TextOptions {
                    sentiment_tracking: a.config.text.sentiment_tracking,
                })
                .unwrap_or_default()
        };
        self.submit(RequestPayload::TextSnippet {
            text: text.into(),
            options,
        });
    }

    fn submit_request(&self, request: AnalysisRequest) {
        if self.channel.state() == ConnectionState::Connected {
            match request.to_wire() {
                Ok(frame) => match self.channel.send(frame) {
                    Ok(()) => return,
                    // Raced a disconnect: fall through to the queue.
                    Err(TransportError::NotConnected) => {}
                    Err(e) => {
                        warn!(error = %e, kind = e.kind(), "send failed, request dropped");
                        return;
                    }
                },
                Err(e) => {
                    warn!(error = %e, "unencodable request dropped");
                    return;
                }
            }
        }
        let mut inner = self.inner.lock();
        if let Some(evicted) = inner.queue.push(request) {
            self.metrics.incr_dropped();
            debug!(modality = %evicted.modality(), "pending queue full, dropped oldest");
        }
        self.metrics.incr_queued();
    }

    /// Drain the pending queue to the channel in FIFO order. Called on
    /// every transition to Connected. A mid-drain disconnect requeues the
    /// undispatched tail for the next reconnect.
    fn flush_pending(&self) {
        let mut drained = self.inner.lock().queue.drain();
        if drained.is_empty() {
            return;
        }
        info!(count = drained.len(), "draining pending queue");
        let mut i = 0;
        while i < drained.len() {
            let frame = match drained[i].to_wire() {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "unencodable queued request dropped");
                    i += 1;
                    continue;
                }
            };
            if let Err(e) = self.channel.send(frame) {
                if matches!(e, TransportError::NotConnected) {
                    let rest = drained.split_off(i);
                    let count = rest.len();
                    self.inner.lock().queue.requeue_front(rest);
                    warn!(requeued = count, "connection lost mid-drain");
                    return;
                }
                warn!(error = %e, kind = e.kind(), "queued request dropped");
            }
            i += 1;
        }
    }

    // ─── Session lifecycle ───────────────────────────────────────────────

    /// Resolve config defaults, activate the capture/biometric cadence,
    /// and return the session identifier (generated as
    /// `session_<epoch_ms>` when none is supplied).
    ///
    /// The start event is only emitted while Connected; it is
    /// deliberately *not* queued offline — sessions are not meaningfully
    /// startable without a live channel.
    pub fn start_session(self: &Arc<Self>, config: SessionConfig) -> SessionId {
        let session_id = config
            .session
            .session_id
            .clone()
            .unwrap_or_else(SessionId::generate);
        let cancel = CancellationToken::new();
        {
            let mut inner = self.inner.lock();
            if let Some(previous) = inner.active.take() {
                warn!(session_id = %previous.session_id, "replacing active session");
                previous.cancel.cancel();
            }
            inner.active = Some(ActiveSession {
                session_id: session_id.clone(),
                config: config.clone(),
                cancel: cancel.clone(),
            });
        }

        if self.channel.state() == ConnectionState::Connected {
            let frame = WireFrame::new(
                OutboundKind::StartSession.as_str(),
                json!({
                    "session_id": session_id,
                    "session_type": config.session.session_type,
                    "patient_id": config.session.patient_id,
                    "config": config,
                }),
            );
            if let Err(e) = self.channel.send(frame) {
                warn!(error = %e, "failed to emit session start");
            }
        } else {
            warn!(session_id = %session_id, "channel not connected, start event not sent");
        }

        self.start_video_cadence(&config, &cancel);
        self.start_biometric_cadence(&config, &cancel);

        info!(session_id = %session_id, session_type = %config.session.session_type, "session started");
        session_id
    }

    /// Stop the active session: synchronously cancels cadence tasks and
    /// releases devices. The stop event is emitted only while Connected,
    /// otherwise this is a local no-op on the wire.
    pub fn stop_session(&self) -> Option<SessionId> {
        let active = self.inner.lock().active.take()?;
        active.cancel.cancel();
        if let Some(capture) = &self.capture {
            capture.stop();
        }
        if let Some(biometric) = &self.biometric {
            biometric.disconnect();
        }

        if self.channel.state() == ConnectionState::Connected {
            let frame = WireFrame::new(
                OutboundKind::StopSession.as_str(),
                json!({"session_id": active.session_id}),
            );
            if let Err(e) = self.channel.send(frame) {
                warn!(error = %e, "failed to emit session stop");
            }
        }
        info!(session_id = %active.session_id, "session stopped");
        Some(active.session_id)
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.inner.lock().active.as_ref().map(|a| a.session_id.clone())
    }

    fn start_video_cadence(self: &Arc<Self>, config: &SessionConfig, cancel: &CancellationToken) {
        if !config.video.enabled {
            return;
        }
        let Some(capture) = self.capture.clone() else {
            debug!("video enabled but no capture adapter attached");
            return;
        };
        // Permission denial is fatal to this modality only.
        if let Err(e) = capture.start() {
            error!(error = %e, "video capture unavailable for this session");
            return;
        }
        let period = Duration::from_millis(1_000 / u64::from(config.video.frame_rate.max(1)));
        let options = VideoOptions::from(&config.video);
        let orch = Arc::clone(self);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Some(frame) = capture.current_frame() {
                            orch.submit(RequestPayload::video_frame(&frame, options.clone()));
                        }
                    }
                }
            }
        });
    }

    fn start_biometric_cadence(self: &Arc<Self>, config: &SessionConfig, cancel: &CancellationToken) {
        if !config.biometric.enabled {
            return;
        }
        let Some(biometric) = self.biometric.clone() else {
            debug!("biometric enabled but no adapter attached");
            return;
        };
        for kind in &config.biometric.devices {
            match biometric.connect(*kind) {
                Ok(features) => {
                    info!(device = %kind, features = features.len(), "biometric device connected")
                }
                Err(e) => error!(device = %kind, error = %e, "biometric device unavailable"),
            }
        }
        if biometric.connected_devices().is_empty() {
            return;
        }
        let period = Duration::from_millis(config.biometric.update_interval_ms.max(1));
        let orch = Arc::clone(self);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        for reading in biometric.read_all() {
                            orch.submit(RequestPayload::BiometricSample { reading });
                        }
                    }
                }
            }
        });
    }

    // ─── Dispatch & fan-out ──────────────────────────────────────────────

    /// Invoked by the channel on inbound delivery. Updates the relevant
    /// rolling windows, notifies subscribers in registration order (a
    /// panicking subscriber is logged and skipped, never aborting the
    /// loop), then appends to the local cache.
    pub fn dispatch(&self, kind: EventKind, result: AnalysisResult) {
        let now = epoch_ms();
        let callbacks = {
            let mut inner = self.inner.lock();
            inner.windows.absorb(now, &result);
            inner.subscribers.snapshot(kind)
        };
        for (id, callback) in callbacks {
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| callback(&result)));
            if outcome.is_err() {
                self.metrics.incr_subscriber_panics();
                error!(kind = %kind, subscription = id.raw(), "subscriber panicked, continuing");
            }
        }
        self.metrics.incr_dispatched();

        if let Some(cache) = &self.cache {
            if let Some(modality) = result.modality() {
                match cache.append(modality, result.session_id(), &result) {
                    Ok(()) => self.metrics.incr_cache_writes(),
                    Err(e) => warn!(error = %e, "result cache write failed"),
                }
            }
        }
    }

    pub fn subscribe(
        &self,
        kind: EventKind,
        callback: impl Fn(&AnalysisResult) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.inner.lock().subscribers.subscribe(kind, Arc::new(callback))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.lock().subscribers.unsubscribe(id)
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    /// Directionality of the modality's primary series. `None` with fewer
    /// than two samples in the window.
    pub fn trend(&self, modality: Modality) -> Option<Trend> {
        let now = epoch_ms();
        let series = self.inner.lock().windows.primary_series(modality, now);
        compute_trend(&series)
    }

    /// Rolling summary for a modality. `None` when the windows hold
    /// nothing for it.
    pub fn summary(&self, modality: Modality) -> Option<ModalitySummary> {
        let now = epoch_ms();
        let mut inner = self.inner.lock();
        let series = inner.windows.primary_series(modality, now);

        let (dominant, engagement) = if modality == Modality::Video {
            let dominant = inner
                .windows
                .emotions
                .latest_at(now)
                .and_then(|m| dominant_emotion(m))
                .map(|(name, _)| name.to_string());
            let engagement = inner.windows.engagement.latest_at(now).copied();
            (dominant, engagement)
        } else {
            (None, None)
        };

        if series.is_empty() && dominant.is_none() {
            return None;
        }
        let mean = if series.is_empty() {
            None
        } else {
            Some(series.iter().sum::<f64>() / series.len() as f64)
        };
        Some(ModalitySummary {
            modality,
            samples: series.len(),
            latest: series.last().copied(),
            mean,
            trend: compute_trend(&series),
            dominant_emotion: dominant,
            engagement,
        })
    }

    /// Microexpressions still inside the 10-second buffer.
    pub fn recent_microexpressions(&self) -> Vec<Microexpression> {
        let now = epoch_ms();
        self.inner.lock().windows.microexpressions.values_at(now)
    }

    /// Requests currently queued for the next reconnect.
    pub fn pending_len(&self) -> usize {
        self.inner.lock().queue.len()
    }
}
