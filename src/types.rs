use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Origin of a captured error occurrence.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Runtime,
    RejectedOperation,
    Network,
    System,
    Security,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Runtime => "runtime",
            ErrorKind::RejectedOperation => "rejected_operation",
            ErrorKind::Network => "network",
            ErrorKind::System => "system",
            ErrorKind::Security => "security",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "runtime" => Some(ErrorKind::Runtime),
            "rejected_operation" => Some(ErrorKind::RejectedOperation),
            "network" => Some(ErrorKind::Network),
            "system" => Some(ErrorKind::System),
            "security" => Some(ErrorKind::Security),
            _ => None,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layer a pattern is attributed to, derived from its first event.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Frontend,
    Backend,
    Database,
    Network,
    Security,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Frontend => "frontend",
            ErrorCategory::Backend => "backend",
            ErrorCategory::Database => "database",
            ErrorCategory::Network => "network",
            ErrorCategory::Security => "security",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

/// Normalized error occurrence. Created at capture, consumed by the drain
/// and by the fire-and-forget persistence write, then discarded.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorEvent {
    pub id: String,
    pub kind: ErrorKind,
    pub message: String,
    pub stack: Option<String>,
    pub source_location: Option<SourceLocation>,
    pub severity_hint: Severity,
    /// Unix milliseconds.
    pub timestamp: i64,
    pub user_id: Option<String>,
    pub request_url: Option<String>,
    pub http_status: Option<u16>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStatus {
    Investigating,
    Identified,
    Resolved,
}

impl ResolutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStatus::Investigating => "investigating",
            ResolutionStatus::Identified => "identified",
            ResolutionStatus::Resolved => "resolved",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Resolution {
    pub status: ResolutionStatus,
    pub action: String,
    pub resolved_at: i64,
    pub resolved_by: Option<String>,
}

/// Long-lived aggregate keyed by fingerprint. Owned by the pattern store and
/// mutated only through its update operation.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPattern {
    pub id: String,
    pub description: String,
    pub frequency: u64,
    pub first_seen: i64,
    pub last_seen: i64,
    pub affected_users: HashSet<String>,
    pub sample_stacks: Vec<String>,
    pub category: ErrorCategory,
    pub severity: Severity,
    pub resolution: Option<Resolution>,
}

/// One pattern's contribution to a trend bucket.
#[derive(Debug, Clone, Serialize)]
pub struct TrendEntry {
    pub fingerprint: String,
    pub category: ErrorCategory,
    pub frequency: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Forecast {
    pub next_hour: u64,
    pub next_day: u64,
    pub confidence: f64,
}

/// Immutable windowed snapshot; a fresh one is produced per invocation.
#[derive(Debug, Clone, Serialize)]
pub struct TrendAnalysis {
    pub generated_at: i64,
    pub window_secs: u64,
    pub total_errors: u64,
    pub error_rate: f64,
    pub increasing: Vec<TrendEntry>,
    pub decreasing: Vec<TrendEntry>,
    pub stable: Vec<TrendEntry>,
    pub forecast: Forecast,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RootCauseType {
    Code,
    Infrastructure,
    External,
    User,
    Configuration,
}

impl RootCauseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RootCauseType::Code => "code",
            RootCauseType::Infrastructure => "infrastructure",
            RootCauseType::External => "external",
            RootCauseType::User => "user",
            RootCauseType::Configuration => "configuration",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RootCause {
    pub kind: RootCauseType,
    pub description: String,
    pub location: Option<String>,
    pub suggested_fix: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    pub timestamp: i64,
    pub summary: String,
    pub impact: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RootCauseAnalysis {
    pub error_id: String,
    pub confidence: f64,
    pub root_cause: RootCause,
    pub related_errors: Vec<String>,
    pub timeline: Vec<TimelineEntry>,
}

/// Batch-local cluster of similar events not yet tracked as a pattern.
#[derive(Debug, Clone, Serialize)]
pub struct EmergingCluster {
    pub similarity_key: String,
    pub fingerprint: String,
    pub kind: ErrorKind,
    pub category: ErrorCategory,
    pub size: usize,
    pub sample_message: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub db_ok: bool,
    pub buffered_events: usize,
    pub tracked_patterns: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_error_kind_round_trip() {
        for kind in [
            ErrorKind::Runtime,
            ErrorKind::RejectedOperation,
            ErrorKind::Network,
            ErrorKind::System,
            ErrorKind::Security,
        ] {
            assert_eq!(ErrorKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ErrorKind::parse("bogus"), None);
    }

    #[test]
    fn test_error_kind_serde_tag() {
        let json = serde_json::to_string(&ErrorKind::RejectedOperation).unwrap();
        assert_eq!(json, "\"rejected_operation\"");
        let parsed: ErrorKind = serde_json::from_str("\"network\"").unwrap();
        assert_eq!(parsed, ErrorKind::Network);
    }
}
