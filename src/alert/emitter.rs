use crate::types::{EmergingCluster, ErrorPattern};
use moka::sync::Cache;
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertType {
    CriticalPattern,
    NewPattern,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::CriticalPattern => "critical_pattern",
            AlertType::NewPattern => "new_pattern",
        }
    }
}

/// Outbound alert: human-readable message plus structured metadata.
#[derive(Debug, Clone)]
pub struct AlertRecord {
    pub alert_type: AlertType,
    /// Cooldown key; the same pattern or cluster will not re-alert within
    /// the cooldown window.
    pub key: String,
    pub message: String,
    pub metadata: serde_json::Value,
}

/// Build an alert for a pattern that just crossed into critical.
pub fn critical_pattern_alert(pattern: &ErrorPattern) -> AlertRecord {
    AlertRecord {
        alert_type: AlertType::CriticalPattern,
        key: pattern.id.clone(),
        message: format!(
            "Critical error pattern {}: {} ({} occurrences, {} users affected)",
            pattern.id,
            pattern.description,
            pattern.frequency,
            pattern.affected_users.len()
        ),
        metadata: json!({
            "pattern_id": pattern.id,
            "frequency": pattern.frequency,
            "affected_users": pattern.affected_users.len(),
            "category": pattern.category.as_str(),
            "first_seen": pattern.first_seen,
            "last_seen": pattern.last_seen,
        }),
    }
}

/// Build an alert for an emerging cluster flagged by new-pattern detection.
pub fn new_pattern_alert(cluster: &EmergingCluster) -> AlertRecord {
    AlertRecord {
        alert_type: AlertType::NewPattern,
        key: cluster.fingerprint.clone(),
        message: format!(
            "New error pattern emerging: {} similar {} errors in one batch: \"{}\"",
            cluster.size, cluster.kind, cluster.sample_message
        ),
        metadata: json!({
            "fingerprint": cluster.fingerprint,
            "similarity_key": cluster.similarity_key,
            "cluster_size": cluster.size,
            "category": cluster.category.as_str(),
        }),
    }
}

/// Validate that a webhook URL is safe to call. Private and loopback hosts
/// are rejected; plain HTTP is accepted with a warning.
pub fn validate_webhook_url(url: &str) -> Result<(), String> {
    let parsed = url::Url::parse(url).map_err(|e| format!("invalid URL: {e}"))?;
    match parsed.scheme() {
        "https" => {}
        "http" => {
            tracing::warn!(url = url, "webhook URL uses HTTP; HTTPS is recommended");
        }
        scheme => return Err(format!("unsupported scheme: {scheme}")),
    }
    if let Some(host) = parsed.host_str() {
        if host == "localhost"
            || host == "127.0.0.1"
            || host == "::1"
            || host.starts_with("10.")
            || host.starts_with("192.168.")
            || host.starts_with("169.254.")
            || (host.starts_with("172.")
                && host
                    .split('.')
                    .nth(1)
                    .and_then(|s| s.parse::<u8>().ok())
                    .is_some_and(|n| (16..=31).contains(&n)))
        {
            return Err(format!(
                "webhook URL must not point to private/loopback address: {host}"
            ));
        }
    }
    Ok(())
}

/// Delivers alerts to Slack-style and generic webhooks. Delivery is
/// best-effort: failures are logged and swallowed, and a per-key cooldown
/// suppresses repeat alerts for the same pattern or cluster.
pub struct AlertEmitter {
    client: reqwest::Client,
    slack_webhook_url: Option<String>,
    generic_webhook_url: Option<String>,
    cooldowns: Cache<String, ()>,
}

impl AlertEmitter {
    pub fn new(
        slack_webhook_url: Option<String>,
        generic_webhook_url: Option<String>,
        cooldown_secs: u64,
    ) -> Self {
        if let Some(ref url) = slack_webhook_url {
            if let Err(e) = validate_webhook_url(url) {
                tracing::warn!(error = %e, "slack webhook URL validation warning");
            }
        }
        if let Some(ref url) = generic_webhook_url {
            if let Err(e) = validate_webhook_url(url) {
                tracing::warn!(error = %e, "generic webhook URL validation warning");
            }
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("failed to build HTTP client");

        let cooldowns = Cache::builder()
            .max_capacity(100_000)
            .time_to_live(Duration::from_secs(cooldown_secs.max(1)))
            .build();

        Self {
            client,
            slack_webhook_url,
            generic_webhook_url,
            cooldowns,
        }
    }

    /// Returns false when the key alerted within the cooldown window;
    /// otherwise marks it and returns true.
    fn claim(&self, alert_type: AlertType, key: &str) -> bool {
        let cooldown_key = format!("{}:{key}", alert_type.as_str());
        if self.cooldowns.contains_key(&cooldown_key) {
            return false;
        }
        self.cooldowns.insert(cooldown_key, ());
        true
    }

    pub async fn emit(&self, record: AlertRecord) {
        if !self.claim(record.alert_type, &record.key) {
            tracing::debug!(
                alert_type = record.alert_type.as_str(),
                key = %record.key,
                "alert suppressed by cooldown"
            );
            return;
        }

        if let Some(ref url) = self.slack_webhook_url {
            self.send_slack(url, &record).await;
        }
        if let Some(ref url) = self.generic_webhook_url {
            self.send_generic(url, &record).await;
        }
    }

    async fn send_slack(&self, url: &str, record: &AlertRecord) {
        let payload = json!({
            "text": format!("*[faultline: {}]*\n{}", record.alert_type.as_str(), record.message),
        });

        match self.client.post(url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(alert_type = record.alert_type.as_str(), "slack alert sent");
            }
            Ok(resp) => {
                tracing::warn!(
                    alert_type = record.alert_type.as_str(),
                    status = %resp.status(),
                    "slack alert failed"
                );
            }
            Err(e) => {
                tracing::error!(alert_type = record.alert_type.as_str(), error = %e, "slack alert error");
            }
        }
    }

    async fn send_generic(&self, url: &str, record: &AlertRecord) {
        let payload = json!({
            "type": record.alert_type.as_str(),
            "message": record.message,
            "metadata": record.metadata,
            "timestamp": chrono::Utc::now().timestamp_millis(),
            "source": "faultline",
        });

        match self.client.post(url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(alert_type = record.alert_type.as_str(), "webhook alert sent");
            }
            Ok(resp) => {
                tracing::warn!(
                    alert_type = record.alert_type.as_str(),
                    status = %resp.status(),
                    "webhook alert failed"
                );
            }
            Err(e) => {
                tracing::error!(alert_type = record.alert_type.as_str(), error = %e, "webhook alert error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ErrorCategory, ErrorKind, Severity};
    use std::collections::HashSet;

    #[test]
    fn test_validate_webhook_url() {
        assert!(validate_webhook_url("https://hooks.example.com/T000/B000").is_ok());
        // http is tolerated (warned about at startup), other schemes are not
        assert!(validate_webhook_url("http://hooks.example.com/T000/B000").is_ok());
        assert!(validate_webhook_url("ftp://hooks.example.com").is_err());
        assert!(validate_webhook_url("http://192.168.1.5/hook").is_err());
        assert!(validate_webhook_url("https://127.0.0.1/hook").is_err());
        assert!(validate_webhook_url("https://192.168.1.5/hook").is_err());
        assert!(validate_webhook_url("https://172.20.0.1/hook").is_err());
        assert!(validate_webhook_url("not a url").is_err());
    }

    #[test]
    fn test_critical_pattern_alert_contents() {
        let pattern = ErrorPattern {
            id: "abc123".into(),
            description: "runtime: boom".into(),
            frequency: 55,
            first_seen: 0,
            last_seen: 1,
            affected_users: HashSet::from(["u1".to_string(), "u2".to_string()]),
            sample_stacks: Vec::new(),
            category: ErrorCategory::Frontend,
            severity: Severity::Critical,
            resolution: None,
        };
        let record = critical_pattern_alert(&pattern);
        assert_eq!(record.alert_type, AlertType::CriticalPattern);
        assert_eq!(record.key, "abc123");
        assert!(record.message.contains("55 occurrences"));
        assert_eq!(record.metadata["affected_users"], 2);
    }

    #[test]
    fn test_new_pattern_alert_contents() {
        let cluster = EmergingCluster {
            similarity_key: "network|upstream timeout calling payments api|".into(),
            fingerprint: "feedface00000000".into(),
            kind: ErrorKind::Network,
            category: ErrorCategory::Network,
            size: 4,
            sample_message: "upstream timeout calling payments api".into(),
        };
        let record = new_pattern_alert(&cluster);
        assert_eq!(record.alert_type, AlertType::NewPattern);
        assert!(record.message.contains("4 similar network errors"));
        assert_eq!(record.metadata["cluster_size"], 4);
    }

    #[test]
    fn test_cooldown_suppresses_repeat_keys() {
        let emitter = AlertEmitter::new(None, None, 900);
        assert!(emitter.claim(AlertType::CriticalPattern, "fp1"));
        assert!(!emitter.claim(AlertType::CriticalPattern, "fp1"));
        // a different alert type for the same key is tracked separately
        assert!(emitter.claim(AlertType::NewPattern, "fp1"));
        assert!(emitter.claim(AlertType::CriticalPattern, "fp2"));
    }
}
