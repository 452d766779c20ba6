use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub alerting: AlertingConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CaptureConfig {
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
    #[serde(default = "default_max_stack_bytes")]
    pub max_stack_bytes: usize,
    #[serde(default = "default_max_metadata_bytes")]
    pub max_metadata_bytes: usize,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Buffer length that triggers an opportunistic drain.
    #[serde(default = "default_buffer_threshold")]
    pub buffer_threshold: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_message_bytes: default_max_message_bytes(),
            max_stack_bytes: default_max_stack_bytes(),
            max_metadata_bytes: default_max_metadata_bytes(),
            max_batch_size: default_max_batch_size(),
            buffer_threshold: default_buffer_threshold(),
        }
    }
}

fn default_max_message_bytes() -> usize {
    2048
}
fn default_max_stack_bytes() -> usize {
    8192
}
fn default_max_metadata_bytes() -> usize {
    4096
}
fn default_max_batch_size() -> usize {
    50
}
fn default_buffer_threshold() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Fixed drain cadence.
    #[serde(default = "default_drain_interval")]
    pub drain_interval_secs: u64,
    /// Slower cadence for trend analysis + insight persistence.
    #[serde(default = "default_analysis_interval")]
    pub analysis_interval_secs: u64,
    /// Distinct stack traces retained per pattern.
    #[serde(default = "default_sample_stacks")]
    pub max_sample_stacks: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            drain_interval_secs: default_drain_interval(),
            analysis_interval_secs: default_analysis_interval(),
            max_sample_stacks: default_sample_stacks(),
        }
    }
}

fn default_drain_interval() -> u64 {
    30
}
fn default_analysis_interval() -> u64 {
    300
}
fn default_sample_stacks() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetentionConfig {
    #[serde(default = "default_raw_events_days")]
    pub raw_events_days: u64,
    /// Patterns idle longer than this are evicted from the in-memory store.
    #[serde(default = "default_pattern_idle_days")]
    pub pattern_idle_days: u64,
    #[serde(default = "default_prune_interval")]
    pub prune_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            raw_events_days: default_raw_events_days(),
            pattern_idle_days: default_pattern_idle_days(),
            prune_interval_secs: default_prune_interval(),
        }
    }
}

fn default_raw_events_days() -> u64 {
    30
}
fn default_pattern_idle_days() -> u64 {
    7
}
fn default_prune_interval() -> u64 {
    3600
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertingConfig {
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown(),
        }
    }
}

fn default_cooldown() -> u64 {
    900
}

/// External real-time alert feed (SSE). Received alerts filtered to
/// anomalies/criticals become system events.
#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_feed_backoff")]
    pub reconnect_backoff_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            reconnect_backoff_secs: default_feed_backoff(),
        }
    }
}

fn default_feed_backoff() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    #[serde(default = "default_per_second")]
    pub per_second: u64,
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_second: default_per_second(),
            burst_size: default_burst_size(),
        }
    }
}

fn default_per_second() -> u64 {
    50
}
fn default_burst_size() -> u32 {
    100
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();

        // Load from config file
        let path = config_path.unwrap_or("config.toml");
        builder = builder.add_source(File::with_name(path).required(false));

        // Overlay with environment variables (FAULTLINE__SERVER__PORT=3001, etc.)
        builder = builder.add_source(
            Environment::with_prefix("FAULTLINE")
                .separator("__")
                .try_parsing(true),
        );

        builder = builder
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 5460)?
            .set_default("database.path", "faultline.db")?;

        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.feed.enabled && self.feed.url.is_empty() {
            return Err("feed.url must be set when feed.enabled is true. \
                 Set it in config.toml or via FAULTLINE__FEED__URL."
                .to_string());
        }
        if self.capture.buffer_threshold == 0 {
            return Err("capture.buffer_threshold must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let capture = CaptureConfig::default();
        assert_eq!(capture.buffer_threshold, 10);
        let pipeline = PipelineConfig::default();
        assert_eq!(pipeline.drain_interval_secs, 30);
        assert_eq!(pipeline.analysis_interval_secs, 300);
    }

    #[test]
    fn test_feed_validation() {
        let mut cfg = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 0,
            },
            database: DatabaseConfig {
                path: PathBuf::from(":memory:"),
            },
            capture: CaptureConfig::default(),
            pipeline: PipelineConfig::default(),
            retention: RetentionConfig::default(),
            alerting: AlertingConfig::default(),
            feed: FeedConfig::default(),
            rate_limit: RateLimitConfig::default(),
        };
        assert!(cfg.validate().is_ok());
        cfg.feed.enabled = true;
        assert!(cfg.validate().is_err());
        cfg.feed.url = "https://alerts.internal/stream".into();
        assert!(cfg.validate().is_ok());
    }
}
