use crate::pattern::DATABASE_KEYWORDS;
use crate::storage::gateway::SqliteGateway;
use crate::types::{
    ErrorEvent, ErrorKind, RootCause, RootCauseAnalysis, RootCauseType, Severity, TimelineEntry,
};
use std::time::Duration;

/// Hard ceiling on analysis latency; a slow database yields `None` rather
/// than a stalled request.
const ANALYSIS_TIMEOUT: Duration = Duration::from_secs(5);

/// Related-error count at which a network failure is treated as an
/// infrastructure-wide incident rather than a one-off.
const INFRA_RELATED_THRESHOLD: usize = 5;

/// Characters of each message shown in timeline summaries.
const SUMMARY_CHARS: usize = 80;

/// Attribute a probable root cause to a stored error.
///
/// Looks up the error and its 24-hour neighborhood, then walks a fixed list
/// of heuristics in priority order. Returns `None` when the error is
/// unknown, the lookup fails, or the analysis times out.
pub async fn analyze(gateway: &SqliteGateway, error_id: &str) -> Option<RootCauseAnalysis> {
    let result = tokio::time::timeout(ANALYSIS_TIMEOUT, lookup(gateway, error_id)).await;
    let (event, related) = match result {
        Ok(Some(found)) => found,
        Ok(None) => return None,
        Err(_) => {
            tracing::warn!(error_id = error_id, "root-cause analysis timed out");
            return None;
        }
    };

    let (root_cause, confidence) = attribute(&event, &related);
    let timeline = build_timeline(&event, &related);

    Some(RootCauseAnalysis {
        error_id: event.id,
        confidence,
        root_cause,
        related_errors: related.into_iter().map(|e| e.id).collect(),
        timeline,
    })
}

async fn lookup(gateway: &SqliteGateway, error_id: &str) -> Option<(ErrorEvent, Vec<ErrorEvent>)> {
    let event = match gateway.fetch_event(error_id).await {
        Ok(Some(event)) => event,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(error_id = error_id, error = %e, "root-cause lookup failed");
            return None;
        }
    };

    let related = match gateway.fetch_related(&event).await {
        Ok(related) => related,
        Err(e) => {
            tracing::warn!(error_id = error_id, error = %e, "related-error lookup failed");
            Vec::new()
        }
    };

    Some((event, related))
}

/// Heuristics in priority order; the first match wins.
fn attribute(event: &ErrorEvent, related: &[ErrorEvent]) -> (RootCause, f64) {
    let message_lower = event.message.to_lowercase();
    let location = event
        .source_location
        .as_ref()
        .map(|loc| match loc.line {
            Some(line) => format!("{}:{line}", loc.file),
            None => loc.file.clone(),
        });

    if event.kind == ErrorKind::Network && related.len() >= INFRA_RELATED_THRESHOLD {
        return (
            RootCause {
                kind: RootCauseType::Infrastructure,
                description: format!(
                    "Network failures clustered across {} related errors in the last 24h; \
                     likely a degraded upstream or network path",
                    related.len()
                ),
                location,
                suggested_fix: suggested_fix(RootCauseType::Infrastructure),
            },
            0.8,
        );
    }

    if DATABASE_KEYWORDS.iter().any(|kw| message_lower.contains(kw)) {
        return (
            RootCause {
                kind: RootCauseType::Infrastructure,
                description: "Error message references the database layer; likely connection \
                              pool exhaustion, lock contention, or a failing query"
                    .to_string(),
                location,
                suggested_fix: suggested_fix(RootCauseType::Infrastructure),
            },
            0.7,
        );
    }

    if event.kind == ErrorKind::Runtime && event.stack.as_deref().is_some_and(|s| !s.is_empty()) {
        return (
            RootCause {
                kind: RootCauseType::Code,
                description: "Runtime exception with a captured stack trace; the fault is in \
                              application code at the top frame"
                    .to_string(),
                location,
                suggested_fix: suggested_fix(RootCauseType::Code),
            },
            0.9,
        );
    }

    if event.kind == ErrorKind::Security {
        return (
            RootCause {
                kind: RootCauseType::Configuration,
                description: "Security violation reported; likely a policy or credential \
                              misconfiguration rather than a code defect"
                    .to_string(),
                location,
                suggested_fix: suggested_fix(RootCauseType::Configuration),
            },
            0.6,
        );
    }

    (
        RootCause {
            kind: RootCauseType::Code,
            description: "No heuristic matched with confidence; defaulting to an application \
                          code defect"
                .to_string(),
            location,
            suggested_fix: suggested_fix(RootCauseType::Code),
        },
        0.5,
    )
}

fn suggested_fix(kind: RootCauseType) -> String {
    match kind {
        RootCauseType::Code => {
            "Inspect the top stack frame and recent deploys touching that module; add a \
             regression test before fixing"
        }
        RootCauseType::Infrastructure => {
            "Check upstream service health, connection pool saturation, and recent \
             infrastructure changes"
        }
        RootCauseType::External => {
            "Verify third-party service status pages and API contract changes"
        }
        RootCauseType::User => "Review input validation on the affected path",
        RootCauseType::Configuration => {
            "Audit recent configuration and credential changes for the affected component"
        }
    }
    .to_string()
}

/// Chronological merge of the error and its related errors.
fn build_timeline(event: &ErrorEvent, related: &[ErrorEvent]) -> Vec<TimelineEntry> {
    let mut entries: Vec<TimelineEntry> = related
        .iter()
        .chain(std::iter::once(event))
        .map(|e| TimelineEntry {
            timestamp: e.timestamp,
            summary: summarize(e),
            impact: impact_label(e.severity_hint).to_string(),
        })
        .collect();
    entries.sort_by_key(|entry| entry.timestamp);
    entries
}

fn summarize(event: &ErrorEvent) -> String {
    let prefix: String = event.message.chars().take(SUMMARY_CHARS).collect();
    format!("[{}] {prefix}", event.kind)
}

fn impact_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "service degraded",
        Severity::High => "user-facing failure",
        Severity::Medium => "degraded experience",
        Severity::Low => "minimal",
    }
}
