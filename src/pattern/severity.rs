use crate::types::Severity;

const HOUR_MS: i64 = 3_600_000;
const HALF_HOUR_MS: i64 = 1_800_000;

/// Severity decision table, evaluated top to bottom, first match wins.
///
/// Pure in the pattern counters and the supplied clock: the result depends
/// only on `(frequency, first_seen, affected_users, now_ms)`, never on the
/// order of updates that produced them. Because `first_seen` is fixed while
/// time advances, a pattern can drop out of the burst rules and fall from
/// critical on a later evaluation without any corrective event.
pub fn classify(frequency: u64, first_seen: i64, affected_users: usize, now_ms: i64) -> Severity {
    let age_ms = now_ms - first_seen;

    if frequency > 50 && age_ms < HOUR_MS {
        return Severity::Critical;
    }
    if frequency > 20 && age_ms < HALF_HOUR_MS {
        return Severity::Critical;
    }
    if affected_users > 10 {
        return Severity::Critical;
    }
    if affected_users > 5 {
        return Severity::High;
    }
    if frequency > 10 {
        return Severity::High;
    }
    if frequency > 5 {
        return Severity::Medium;
    }
    Severity::Low
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000_000;

    #[test]
    fn test_fast_burst_is_critical() {
        // 51 occurrences within the first hour
        assert_eq!(classify(51, T0, 0, T0 + 10 * 60_000), Severity::Critical);
        // same count but the pattern is old: falls through to frequency rules
        assert_eq!(classify(51, T0, 0, T0 + 2 * HOUR_MS), Severity::High);
    }

    #[test]
    fn test_short_burst_is_critical() {
        assert_eq!(classify(21, T0, 0, T0 + 20 * 60_000), Severity::Critical);
        assert_eq!(classify(21, T0, 0, T0 + 40 * 60_000), Severity::High);
    }

    #[test]
    fn test_user_spread_rules() {
        assert_eq!(classify(3, T0, 11, T0 + HOUR_MS * 5), Severity::Critical);
        assert_eq!(classify(3, T0, 6, T0 + HOUR_MS * 5), Severity::High);
    }

    #[test]
    fn test_frequency_fallbacks() {
        let now = T0 + HOUR_MS * 5;
        assert_eq!(classify(11, T0, 0, now), Severity::High);
        assert_eq!(classify(6, T0, 0, now), Severity::Medium);
        assert_eq!(classify(5, T0, 0, now), Severity::Low);
        assert_eq!(classify(1, T0, 0, now), Severity::Low);
    }

    #[test]
    fn test_severity_can_decay_with_time_alone() {
        // Accepted characteristic: no new events, severity still falls as the
        // burst windows close behind a fixed first_seen.
        let at_20m = classify(21, T0, 0, T0 + 20 * 60_000);
        let at_2h = classify(21, T0, 0, T0 + 2 * HOUR_MS);
        assert_eq!(at_20m, Severity::Critical);
        assert_eq!(at_2h, Severity::High);
    }

    #[test]
    fn test_purity_under_input_equality() {
        // Same counters, same clock: same answer, however they were reached.
        let a = classify(23, T0, 4, T0 + 25 * 60_000);
        let b = classify(23, T0, 4, T0 + 25 * 60_000);
        assert_eq!(a, b);
    }
}
