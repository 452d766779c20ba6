pub mod recommend;

use crate::types::{ErrorPattern, Forecast, TrendAnalysis, TrendEntry};

/// Trailing lookback for trend statistics.
pub const WINDOW_SECS: u64 = 3600;

const WINDOW_MS: i64 = 3_600_000;
const HALF_HOUR_MS: i64 = 1_800_000;

/// Windowed aggregation over the pattern store. Selects patterns active in
/// the trailing hour, sums their all-time frequency (an accepted
/// approximation), buckets them by trajectory, and derives a short-horizon
/// forecast from the total alone.
pub fn analyze(patterns: &[ErrorPattern], now_ms: i64) -> TrendAnalysis {
    let in_window: Vec<&ErrorPattern> = patterns
        .iter()
        .filter(|p| now_ms - p.last_seen < WINDOW_MS)
        .collect();

    let total_errors: u64 = in_window.iter().map(|p| p.frequency).sum();
    let error_rate = total_errors as f64 / WINDOW_SECS as f64;

    let mut increasing = Vec::new();
    let mut decreasing = Vec::new();
    let mut stable = Vec::new();

    for p in &in_window {
        let entry = TrendEntry {
            fingerprint: p.id.clone(),
            category: p.category,
            frequency: p.frequency,
        };
        if p.last_seen - p.first_seen < WINDOW_MS && p.frequency > 5 {
            increasing.push(entry);
        } else if now_ms - p.last_seen > HALF_HOUR_MS {
            decreasing.push(entry);
        } else {
            stable.push(entry);
        }
    }

    // Flat linear projection with a 20% day-scale decay; not a fitted model.
    let per_minute = total_errors as f64 / 60.0;
    let forecast = Forecast {
        next_hour: (per_minute * 60.0).round() as u64,
        next_day: (per_minute * 60.0 * 24.0 * 0.8).round() as u64,
        confidence: (in_window.len() as f64 / 10.0).min(0.9),
    };

    let mut analysis = TrendAnalysis {
        generated_at: now_ms,
        window_secs: WINDOW_SECS,
        total_errors,
        error_rate,
        increasing,
        decreasing,
        stable,
        forecast,
        recommendations: Vec::new(),
    };
    analysis.recommendations = recommend::generate(&analysis);
    analysis
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ErrorCategory, Severity};
    use std::collections::HashSet;

    const T0: i64 = 1_700_000_000_000;
    const MINUTE_MS: i64 = 60_000;

    fn pattern(
        id: &str,
        frequency: u64,
        first_seen: i64,
        last_seen: i64,
        category: ErrorCategory,
    ) -> ErrorPattern {
        ErrorPattern {
            id: id.into(),
            description: format!("runtime: {id}"),
            frequency,
            first_seen,
            last_seen,
            affected_users: HashSet::new(),
            sample_stacks: Vec::new(),
            category,
            severity: Severity::Low,
            resolution: None,
        }
    }

    #[test]
    fn test_scenario_e_window_sum_and_buckets() {
        let now = T0 + 3 * 60 * MINUTE_MS;
        let patterns = vec![
            // last seen 10 minutes ago, first seen 20 minutes before that
            pattern(
                "hot",
                8,
                now - 30 * MINUTE_MS,
                now - 10 * MINUTE_MS,
                ErrorCategory::Frontend,
            ),
            // last seen two hours ago: outside the window entirely
            pattern(
                "cold",
                100,
                T0,
                now - 120 * MINUTE_MS,
                ErrorCategory::Backend,
            ),
        ];
        let analysis = analyze(&patterns, now);
        assert_eq!(analysis.total_errors, 8);
        assert_eq!(analysis.increasing.len(), 1);
        assert_eq!(analysis.increasing[0].fingerprint, "hot");
        assert!(analysis.decreasing.is_empty());
        assert!(analysis.stable.is_empty());
    }

    #[test]
    fn test_only_in_window_patterns_contribute() {
        let now = T0;
        let patterns = vec![
            pattern("a", 3, now - 50 * MINUTE_MS, now - 5 * MINUTE_MS, ErrorCategory::Backend),
            pattern("b", 4, now - 50 * MINUTE_MS, now - 59 * MINUTE_MS, ErrorCategory::Backend),
            pattern("c", 9, now - 300 * MINUTE_MS, now - 61 * MINUTE_MS, ErrorCategory::Backend),
        ];
        let analysis = analyze(&patterns, now);
        assert_eq!(analysis.total_errors, 7);
    }

    #[test]
    fn test_bucket_classification() {
        let now = T0;
        let patterns = vec![
            // young and busy: increasing
            pattern("inc", 6, now - 20 * MINUTE_MS, now - MINUTE_MS, ErrorCategory::Network),
            // in window but quiet for over half an hour: decreasing
            pattern("dec", 2, now - 300 * MINUTE_MS, now - 40 * MINUTE_MS, ErrorCategory::Backend),
            // neither: stable
            pattern("sta", 2, now - 300 * MINUTE_MS, now - 5 * MINUTE_MS, ErrorCategory::Backend),
        ];
        let analysis = analyze(&patterns, now);
        assert_eq!(analysis.increasing.len(), 1);
        assert_eq!(analysis.increasing[0].fingerprint, "inc");
        assert_eq!(analysis.decreasing.len(), 1);
        assert_eq!(analysis.decreasing[0].fingerprint, "dec");
        assert_eq!(analysis.stable.len(), 1);
        assert_eq!(analysis.stable[0].fingerprint, "sta");
    }

    #[test]
    fn test_forecast_formulas() {
        let now = T0;
        let patterns: Vec<ErrorPattern> = (0..4)
            .map(|i| {
                pattern(
                    &format!("p{i}"),
                    30,
                    now - 50 * MINUTE_MS,
                    now - MINUTE_MS,
                    ErrorCategory::Backend,
                )
            })
            .collect();
        let analysis = analyze(&patterns, now);
        assert_eq!(analysis.total_errors, 120);
        assert_eq!(analysis.forecast.next_hour, 120);
        // 120 * 24 * 0.8
        assert_eq!(analysis.forecast.next_day, 2304);
        assert!((analysis.forecast.confidence - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_caps_at_point_nine() {
        let now = T0;
        let patterns: Vec<ErrorPattern> = (0..25)
            .map(|i| {
                pattern(
                    &format!("p{i}"),
                    1,
                    now - 50 * MINUTE_MS,
                    now - MINUTE_MS,
                    ErrorCategory::Backend,
                )
            })
            .collect();
        let analysis = analyze(&patterns, now);
        assert!((analysis.forecast.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_empty_store_yields_zeroes() {
        let analysis = analyze(&[], T0);
        assert_eq!(analysis.total_errors, 0);
        assert_eq!(analysis.error_rate, 0.0);
        assert_eq!(analysis.forecast.next_hour, 0);
        assert!(analysis.recommendations.is_empty());
    }
}
