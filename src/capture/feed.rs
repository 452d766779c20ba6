use crate::config::FeedConfig;
use crate::engine::AnalyticsEngine;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

/// Subscribe to the external SSE alert feed and translate qualifying alerts
/// into system events. Reconnects with a fixed backoff; runs until the
/// process exits.
pub async fn run_feed_loop(engine: Arc<AnalyticsEngine>, cfg: FeedConfig) {
    if !cfg.enabled {
        return;
    }

    let client = reqwest::Client::new();
    let backoff = Duration::from_secs(cfg.reconnect_backoff_secs.max(1));

    loop {
        match client.get(&cfg.url).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(url = %cfg.url, "alert feed connected");
                let mut stream = resp.bytes_stream().eventsource();
                while let Some(item) = stream.next().await {
                    match item {
                        Ok(event) => handle_feed_message(&engine, &event.data),
                        Err(e) => {
                            tracing::warn!(error = %e, "alert feed stream error");
                            break;
                        }
                    }
                }
                tracing::info!("alert feed disconnected, reconnecting");
            }
            Ok(resp) => {
                tracing::warn!(status = %resp.status(), "alert feed returned error status");
            }
            Err(e) => {
                tracing::warn!(error = %e, "alert feed connection failed");
            }
        }
        tokio::time::sleep(backoff).await;
    }
}

/// Only anomalies and critical alerts become events; everything else on the
/// feed is noise for our purposes.
fn handle_feed_message(engine: &AnalyticsEngine, data: &str) {
    let value: serde_json::Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring unparseable feed message");
            return;
        }
    };

    if !qualifies(&value) {
        return;
    }

    let message = value
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("external alert")
        .to_string();

    engine.capture_system_alert(message, Some(value));
}

fn qualifies(alert: &serde_json::Value) -> bool {
    let kind = alert.get("type").and_then(|t| t.as_str()).unwrap_or("");
    let severity = alert
        .get("severity")
        .and_then(|s| s.as_str())
        .unwrap_or("");
    kind == "anomaly" || severity == "critical"
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_anomaly_qualifies() {
        assert!(qualifies(&json!({"type": "anomaly", "severity": "low"})));
    }

    #[test]
    fn test_critical_qualifies() {
        assert!(qualifies(
            &json!({"type": "threshold", "severity": "critical"})
        ));
    }

    #[test]
    fn test_routine_alert_ignored() {
        assert!(!qualifies(
            &json!({"type": "threshold", "severity": "warning"})
        ));
        assert!(!qualifies(&json!({"message": "no type or severity"})));
    }
}
