use crate::engine::AnalyticsEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Drain the buffer on a fixed cadence, plus whenever the capture path
/// signals that the buffer crossed its threshold. Both triggers funnel into
/// the same drain call; the buffer's guard makes overlap a no-op.
pub async fn run_drain_loop(
    engine: Arc<AnalyticsEngine>,
    mut drain_rx: mpsc::UnboundedReceiver<()>,
) {
    let period = Duration::from_secs(engine.config().pipeline.drain_interval_secs.max(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            signal = drain_rx.recv() => {
                if signal.is_none() {
                    // all senders dropped; the engine is shutting down
                    return;
                }
            }
        }
        engine.drain(chrono::Utc::now().timestamp_millis()).await;
    }
}

/// Periodically snapshot trend analysis into durable storage. Persistence
/// failures are logged and skipped; the next cycle tries again.
pub async fn run_analysis_loop(engine: Arc<AnalyticsEngine>) {
    let period = Duration::from_secs(engine.config().pipeline.analysis_interval_secs.max(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // skip the immediate first tick; there is nothing to analyze at startup
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let analysis = engine.analyze(chrono::Utc::now().timestamp_millis());
        if let Err(e) = engine.gateway().insert_insight(&analysis).await {
            tracing::warn!(error = %e, "analysis snapshot persistence failed");
        } else {
            tracing::debug!(
                total_errors = analysis.total_errors,
                increasing = analysis.increasing.len(),
                "analysis snapshot persisted"
            );
        }
    }
}

/// Enforce retention: prune raw events past their window and evict patterns
/// idle past theirs.
pub async fn run_retention_loop(engine: Arc<AnalyticsEngine>) {
    let retention = engine.config().retention.clone();
    let period = Duration::from_secs(retention.prune_interval_secs.max(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let now_ms = chrono::Utc::now().timestamp_millis();

        let cutoff = now_ms - retention.raw_events_days as i64 * 86_400_000;
        match engine.gateway().prune_events(cutoff).await {
            Ok(0) => {}
            Ok(pruned) => tracing::info!(pruned, "pruned expired raw events"),
            Err(e) => tracing::warn!(error = %e, "raw event pruning failed"),
        }

        let evicted = engine.evict_idle_patterns(now_ms);
        if evicted > 0 {
            tracing::info!(evicted, "evicted idle patterns");
        }
    }
}
