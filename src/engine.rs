use crate::alert::emitter::{critical_pattern_alert, new_pattern_alert, AlertEmitter};
use crate::capture::{build_event, CaptureRequest};
use crate::config::AppConfig;
use crate::pattern::detect::detect_emerging;
use crate::pattern::store::PatternStore;
use crate::pipeline::buffer::EventBuffer;
use crate::rootcause;
use crate::storage::gateway::SqliteGateway;
use crate::trend;
use crate::types::{
    ErrorEvent, ErrorKind, ErrorPattern, Resolution, RootCauseAnalysis, Severity, SourceLocation,
    TrendAnalysis,
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Coordinates the capture -> buffer -> pattern -> alert pipeline.
///
/// Capture entry points are synchronous and cheap: normalize, persist
/// fire-and-forget, append to the buffer, and nudge the drain task when the
/// buffer crosses its threshold. All heavy work happens in the drain.
pub struct AnalyticsEngine {
    store: PatternStore,
    buffer: EventBuffer,
    gateway: SqliteGateway,
    emitter: Arc<AlertEmitter>,
    drain_tx: mpsc::UnboundedSender<()>,
    config: AppConfig,
}

impl AnalyticsEngine {
    /// Returns the engine plus the receiver the drain loop listens on.
    pub fn new(
        config: AppConfig,
        gateway: SqliteGateway,
        emitter: Arc<AlertEmitter>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<()>) {
        let (drain_tx, drain_rx) = mpsc::unbounded_channel();
        let engine = Arc::new(Self {
            store: PatternStore::new(config.pipeline.max_sample_stacks),
            buffer: EventBuffer::new(config.capture.buffer_threshold),
            gateway,
            emitter,
            drain_tx,
            config,
        });
        (engine, drain_rx)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Capture a thrown exception.
    pub fn capture_exception(
        &self,
        message: impl Into<String>,
        stack: Option<String>,
        source_location: Option<SourceLocation>,
    ) -> String {
        self.capture_event(CaptureRequest {
            kind: Some(ErrorKind::Runtime),
            message: Some(message.into()),
            stack,
            source_location,
            ..Default::default()
        })
    }

    /// Capture a rejected async operation.
    pub fn capture_rejection(&self, message: impl Into<String>, stack: Option<String>) -> String {
        self.capture_event(CaptureRequest {
            kind: Some(ErrorKind::RejectedOperation),
            message: Some(message.into()),
            stack,
            ..Default::default()
        })
    }

    /// Capture a failed outbound request.
    pub fn capture_network_failure(
        &self,
        message: impl Into<String>,
        request_url: Option<String>,
        http_status: Option<u16>,
    ) -> String {
        self.capture_event(CaptureRequest {
            kind: Some(ErrorKind::Network),
            message: Some(message.into()),
            request_url,
            http_status,
            ..Default::default()
        })
    }

    /// Capture an alert from an external monitoring channel as a system event.
    pub fn capture_system_alert(
        &self,
        message: impl Into<String>,
        metadata: Option<serde_json::Value>,
    ) -> String {
        self.capture_event(CaptureRequest {
            kind: Some(ErrorKind::System),
            message: Some(message.into()),
            metadata,
            ..Default::default()
        })
    }

    /// Capture an arbitrary pre-shaped event. The other capture entry points
    /// funnel through here. Returns the assigned event id.
    pub fn capture_event(&self, req: CaptureRequest) -> String {
        let event = build_event(
            req,
            &self.config.capture,
            chrono::Utc::now().timestamp_millis(),
        );
        let id = event.id.clone();
        self.ingest(event);
        id
    }

    fn ingest(&self, event: ErrorEvent) {
        let gateway = self.gateway.clone();
        let persisted = event.clone();
        tokio::spawn(async move {
            if let Err(e) = gateway.insert_event(&persisted).await {
                tracing::warn!(event_id = %persisted.id, error = %e, "event persistence failed");
            }
        });

        if self.buffer.push(event) {
            // drain task may be gone during shutdown; nothing to do then
            let _ = self.drain_tx.send(());
        }
    }

    /// Process everything buffered so far: fold events into patterns, decay
    /// severities, surface critical patterns and emerging clusters as alerts.
    /// A drain already in progress makes this a no-op; an empty buffer is an
    /// idempotent success.
    pub async fn drain(&self, now_ms: i64) {
        let Some(guard) = self.buffer.begin_drain() else {
            return;
        };
        let batch = guard.take_batch();
        if batch.is_empty() {
            return;
        }

        // snapshot before the batch mutates the store, so clusters that only
        // became known through this batch still count as emerging
        let known_before = self.store.fingerprints();

        for event in &batch {
            self.store.apply(event, now_ms);
        }
        self.store.rescan(now_ms);

        // Every currently-critical pattern is a candidate alert, including
        // ones that went critical inside apply; the emitter's cooldown
        // suppresses repeats across drains.
        let critical: Vec<ErrorPattern> = self
            .store
            .snapshot()
            .into_iter()
            .filter(|p| p.severity == Severity::Critical)
            .collect();

        let clusters = detect_emerging(&batch, &known_before);

        tracing::info!(
            batch = batch.len(),
            patterns = self.store.len(),
            critical = critical.len(),
            emerging = clusters.len(),
            "drained event buffer"
        );

        // alert delivery must not block the next drain
        for pattern in critical {
            let emitter = Arc::clone(&self.emitter);
            tokio::spawn(async move {
                emitter.emit(critical_pattern_alert(&pattern)).await;
            });
        }
        for cluster in clusters {
            let emitter = Arc::clone(&self.emitter);
            tokio::spawn(async move {
                emitter.emit(new_pattern_alert(&cluster)).await;
            });
        }
    }

    /// All currently tracked patterns, unordered.
    pub fn patterns(&self) -> Vec<ErrorPattern> {
        self.store.snapshot()
    }

    pub fn pattern(&self, fingerprint: &str) -> Option<ErrorPattern> {
        self.store.get(fingerprint)
    }

    pub fn buffered_events(&self) -> usize {
        self.buffer.len()
    }

    pub fn tracked_patterns(&self) -> usize {
        self.store.len()
    }

    /// Produce a fresh trend analysis over the last hour of pattern activity.
    pub fn analyze(&self, now_ms: i64) -> TrendAnalysis {
        trend::analyze(&self.store.snapshot(), now_ms)
    }

    /// Best-effort root-cause attribution for a stored error.
    pub async fn root_cause(&self, error_id: &str) -> Option<RootCauseAnalysis> {
        rootcause::analyze(&self.gateway, error_id).await
    }

    /// Attach a manual resolution to a pattern and record it in the audit
    /// trail. `None` when the pattern is unknown.
    pub fn resolve_pattern(
        &self,
        fingerprint: &str,
        resolution: Resolution,
    ) -> Option<ErrorPattern> {
        let pattern = self.store.resolve(fingerprint, resolution.clone())?;

        let gateway = self.gateway.clone();
        let pattern_id = pattern.id.clone();
        tokio::spawn(async move {
            if let Err(e) = gateway.insert_resolution(&pattern_id, &resolution).await {
                tracing::warn!(pattern_id = %pattern_id, error = %e, "resolution audit write failed");
            }
        });

        Some(pattern)
    }

    /// Evict idle patterns from memory. Returns the number removed.
    pub fn evict_idle_patterns(&self, now_ms: i64) -> usize {
        let idle_ms = self.config.retention.pattern_idle_days as i64 * 86_400_000;
        self.store.evict_idle(idle_ms, now_ms)
    }

    pub fn gateway(&self) -> &SqliteGateway {
        &self.gateway
    }
}
