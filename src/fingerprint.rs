use crate::types::ErrorKind;
use once_cell::sync::Lazy;
use regex::Regex;
use xxhash_rust::xxh3::xxh3_64;

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

static IP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}").unwrap());

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// Length of the normalized-message prefix that feeds the fingerprint.
const FINGERPRINT_PREFIX_CHARS: usize = 100;

/// Tokens of the message that feed the coarse similarity key.
const SIMILARITY_TOKENS: usize = 5;

/// Normalize an error message: scrub volatile substrings, lowercase, trim.
pub fn normalize_message(message: &str) -> String {
    let s = UUID_RE.replace_all(message, "<uuid>");
    let s = IP_RE.replace_all(&s, "<ip>");
    let s = NUMBER_RE.replace_all(&s, "<n>");
    s.to_lowercase().trim().to_string()
}

fn char_prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Stable pattern identifier. Pure function of the event kind, a normalized
/// prefix of the message, and the source file (when present): two events with
/// identical inputs always land in the same pattern, regardless of order.
pub fn pattern_fingerprint(kind: ErrorKind, message: &str, source_file: Option<&str>) -> String {
    let normalized = normalize_message(message);
    let prefix = char_prefix(&normalized, FINGERPRINT_PREFIX_CHARS);
    let file = source_file.unwrap_or("").to_lowercase();

    let input = format!("{}:{prefix}:{file}", kind.as_str());
    let hash = xxh3_64(input.as_bytes());
    format!("{hash:016x}")
}

/// Coarser batch-local grouping key: kind plus the first few whitespace
/// tokens of the message plus the source file, case-insensitive. Wider than
/// the fingerprint so bursts of superficially-different messages still group.
pub fn similarity_key(kind: ErrorKind, message: &str, source_file: Option<&str>) -> String {
    let head = message
        .split_whitespace()
        .take(SIMILARITY_TOKENS)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let file = source_file.unwrap_or("").to_lowercase();
    format!("{}|{head}|{file}", kind.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_message() {
        assert_eq!(
            normalize_message("Error at 192.168.1.1 for user abc123"),
            "error at <ip> for user abc<n>"
        );
        assert_eq!(
            normalize_message("Failed for 550e8400-e29b-41d4-a716-446655440000"),
            "failed for <uuid>"
        );
        assert_eq!(
            normalize_message("  Timeout after 5000ms  "),
            "timeout after <n>ms"
        );
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let fp1 = pattern_fingerprint(
            ErrorKind::Runtime,
            "Cannot read property 'id' of undefined",
            Some("src/checkout.ts"),
        );
        let fp2 = pattern_fingerprint(
            ErrorKind::Runtime,
            "Cannot read property 'id' of undefined",
            Some("src/checkout.ts"),
        );
        assert_eq!(fp1, fp2);
        assert_eq!(fp1.len(), 16);
    }

    #[test]
    fn test_fingerprint_normalizes_numbers() {
        let fp1 = pattern_fingerprint(ErrorKind::Network, "Timeout after 5000ms", None);
        let fp2 = pattern_fingerprint(ErrorKind::Network, "Timeout after 3000ms", None);
        assert_eq!(
            fp1, fp2,
            "different numbers should produce same fingerprint"
        );
    }

    #[test]
    fn test_fingerprint_distinguishes_kind_and_file() {
        let base = pattern_fingerprint(ErrorKind::Runtime, "boom", Some("a.ts"));
        assert_ne!(
            base,
            pattern_fingerprint(ErrorKind::Network, "boom", Some("a.ts"))
        );
        assert_ne!(
            base,
            pattern_fingerprint(ErrorKind::Runtime, "boom", Some("b.ts"))
        );
        assert_ne!(base, pattern_fingerprint(ErrorKind::Runtime, "boom", None));
    }

    #[test]
    fn test_fingerprint_uses_message_prefix_only() {
        let long_a = format!("database connection lost {}", "x".repeat(300));
        let long_b = format!("database connection lost {}", "x".repeat(400));
        // Same first 100 normalized chars, different tails.
        assert_eq!(
            pattern_fingerprint(ErrorKind::System, &long_a, None),
            pattern_fingerprint(ErrorKind::System, &long_b, None)
        );
    }

    #[test]
    fn test_similarity_key_case_insensitive() {
        let k1 = similarity_key(
            ErrorKind::Runtime,
            "Null Reference At Checkout Step two",
            Some("SRC/Checkout.ts"),
        );
        let k2 = similarity_key(
            ErrorKind::Runtime,
            "null reference at checkout step THREE",
            Some("src/checkout.ts"),
        );
        // Only the first five tokens participate.
        assert_eq!(k1, k2);
    }

    #[test]
    fn test_similarity_key_coarser_than_fingerprint() {
        let m1 = "payment failed for order id 1121 on gateway alpha";
        let m2 = "payment failed for order id mismatch during reconciliation";
        assert_eq!(
            similarity_key(ErrorKind::Network, m1, None),
            similarity_key(ErrorKind::Network, m2, None)
        );
        assert_ne!(
            pattern_fingerprint(ErrorKind::Network, m1, None),
            pattern_fingerprint(ErrorKind::Network, m2, None)
        );
    }
}
