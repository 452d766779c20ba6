pub mod detect;
pub mod severity;
pub mod store;

use crate::types::{ErrorCategory, ErrorEvent, ErrorKind};

/// Message substrings that attribute an error to the database layer.
pub(crate) const DATABASE_KEYWORDS: &[&str] = &[
    "database",
    "sql",
    "query",
    "deadlock",
    "connection pool",
    "transaction",
];

/// Attribute an event to a layer. Keyword check runs before the kind
/// fallbacks so database failures surfacing as runtime errors still land
/// in the database bucket.
pub fn categorize(event: &ErrorEvent) -> ErrorCategory {
    match event.kind {
        ErrorKind::Security => return ErrorCategory::Security,
        ErrorKind::Network => return ErrorCategory::Network,
        _ => {}
    }

    let lower = event.message.to_lowercase();
    if DATABASE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return ErrorCategory::Database;
    }

    match event.kind {
        ErrorKind::Runtime => ErrorCategory::Frontend,
        ErrorKind::RejectedOperation | ErrorKind::System => ErrorCategory::Backend,
        ErrorKind::Network | ErrorKind::Security => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;

    fn event(kind: ErrorKind, message: &str) -> ErrorEvent {
        ErrorEvent {
            id: "e1".into(),
            kind,
            message: message.into(),
            stack: None,
            source_location: None,
            severity_hint: Severity::Medium,
            timestamp: 0,
            user_id: None,
            request_url: None,
            http_status: None,
            metadata: None,
        }
    }

    #[test]
    fn test_categorize_by_kind() {
        assert_eq!(
            categorize(&event(ErrorKind::Security, "token replay detected")),
            ErrorCategory::Security
        );
        assert_eq!(
            categorize(&event(ErrorKind::Network, "fetch failed")),
            ErrorCategory::Network
        );
        assert_eq!(
            categorize(&event(ErrorKind::Runtime, "null deref")),
            ErrorCategory::Frontend
        );
        assert_eq!(
            categorize(&event(ErrorKind::System, "disk pressure")),
            ErrorCategory::Backend
        );
    }

    #[test]
    fn test_categorize_database_keywords_win() {
        assert_eq!(
            categorize(&event(ErrorKind::Runtime, "SQL syntax error near SELECT")),
            ErrorCategory::Database
        );
        assert_eq!(
            categorize(&event(
                ErrorKind::RejectedOperation,
                "deadlock detected on orders table"
            )),
            ErrorCategory::Database
        );
    }
}
