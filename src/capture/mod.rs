pub mod feed;
pub mod handler;

use crate::config::CaptureConfig;
use crate::types::{ErrorEvent, ErrorKind, Severity, SourceLocation};
use serde::Deserialize;

/// Ingress shape for captured errors. Everything except the message is
/// optional; missing or unusable fields degrade rather than reject.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaptureRequest {
    pub kind: Option<ErrorKind>,
    pub message: Option<String>,
    pub stack: Option<String>,
    pub source_location: Option<SourceLocation>,
    /// Caller-supplied severity hint; defaults per kind when absent.
    pub severity: Option<Severity>,
    /// Unix milliseconds; defaults to arrival time.
    pub timestamp: Option<i64>,
    pub user_id: Option<String>,
    pub request_url: Option<String>,
    pub http_status: Option<u16>,
    pub metadata: Option<serde_json::Value>,
}

/// Default severity hint per kind. Network failures carrying a 5xx status
/// rank above plain client-side failures.
pub fn default_hint(kind: ErrorKind, http_status: Option<u16>) -> Severity {
    match kind {
        ErrorKind::Runtime => Severity::High,
        ErrorKind::RejectedOperation => Severity::Medium,
        ErrorKind::Network => {
            if http_status.is_some_and(|s| s >= 500) {
                Severity::High
            } else {
                Severity::Medium
            }
        }
        ErrorKind::System => Severity::Critical,
        ErrorKind::Security => Severity::Medium,
    }
}

/// Normalize a capture request into an `ErrorEvent`, enforcing size limits.
///
/// Malformed input (no kind, or an empty message) is never rejected: it is
/// downgraded to a low-severity `system` event so the occurrence still
/// counts somewhere.
pub fn build_event(req: CaptureRequest, limits: &CaptureConfig, now_ms: i64) -> ErrorEvent {
    let message = req.message.unwrap_or_default();
    let message = message.trim();
    let malformed = req.kind.is_none() || message.is_empty();

    let (kind, message) = if malformed {
        (
            ErrorKind::System,
            if message.is_empty() {
                "unparseable error event".to_string()
            } else {
                truncate_utf8(message, limits.max_message_bytes)
            },
        )
    } else {
        (
            req.kind.unwrap_or(ErrorKind::System),
            truncate_utf8(message, limits.max_message_bytes),
        )
    };

    let severity_hint = if malformed {
        Severity::Low
    } else {
        req.severity
            .unwrap_or_else(|| default_hint(kind, req.http_status))
    };

    let stack = req
        .stack
        .filter(|s| !s.is_empty())
        .map(|s| truncate_utf8(&s, limits.max_stack_bytes));

    // oversized metadata is dropped wholesale rather than truncated, since a
    // truncated JSON document is worse than none
    let metadata = req
        .metadata
        .filter(|v| !v.is_null() && v.to_string().len() <= limits.max_metadata_bytes);

    ErrorEvent {
        id: uuid::Uuid::new_v4().to_string(),
        kind,
        message,
        stack,
        source_location: req.source_location,
        severity_hint,
        timestamp: req.timestamp.unwrap_or(now_ms),
        user_id: req.user_id,
        request_url: req.request_url,
        http_status: req.http_status,
        metadata,
    }
}

/// Truncate to at most `max_bytes`, backing off to a char boundary.
fn truncate_utf8(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
