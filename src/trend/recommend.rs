use crate::types::{ErrorCategory, TrendAnalysis};

/// Error rate above this (errors per second) warrants a warning.
const ELEVATED_RATE: f64 = 0.1;

/// More increasing patterns than this suggests a systemic change.
const SYSTEMIC_INCREASING: usize = 3;

/// Rule list evaluated in order against a trend snapshot; each rule appends
/// zero or more strings. Per-pattern category warnings are intentionally not
/// deduplicated: one line per matching pattern.
pub fn generate(analysis: &TrendAnalysis) -> Vec<String> {
    let mut recommendations = Vec::new();

    if analysis.error_rate > ELEVATED_RATE {
        recommendations.push(format!(
            "Error rate is elevated ({:.3}/sec over the last hour); review recent deploys and infrastructure changes",
            analysis.error_rate
        ));
    }

    if analysis.increasing.len() > SYSTEMIC_INCREASING {
        recommendations.push(format!(
            "{} error patterns are growing at once; this usually indicates a systemic change rather than isolated bugs",
            analysis.increasing.len()
        ));
    }

    for entry in &analysis.increasing {
        if entry.category == ErrorCategory::Network {
            recommendations.push(format!(
                "Network errors are increasing (pattern {}); check upstream service health, DNS, and timeouts",
                entry.fingerprint
            ));
        }
    }

    for entry in &analysis.increasing {
        if entry.category == ErrorCategory::Database {
            recommendations.push(format!(
                "Database errors are increasing (pattern {}); check connection pool saturation, slow queries, and locks",
                entry.fingerprint
            ));
        }
    }

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Forecast, TrendEntry};

    fn entry(fingerprint: &str, category: ErrorCategory) -> TrendEntry {
        TrendEntry {
            fingerprint: fingerprint.into(),
            category,
            frequency: 10,
        }
    }

    fn analysis(error_rate: f64, increasing: Vec<TrendEntry>) -> TrendAnalysis {
        TrendAnalysis {
            generated_at: 0,
            window_secs: 3600,
            total_errors: 0,
            error_rate,
            increasing,
            decreasing: Vec::new(),
            stable: Vec::new(),
            forecast: Forecast {
                next_hour: 0,
                next_day: 0,
                confidence: 0.0,
            },
            recommendations: Vec::new(),
        }
    }

    #[test]
    fn test_quiet_system_no_recommendations() {
        let recs = generate(&analysis(0.01, vec![]));
        assert!(recs.is_empty());
    }

    #[test]
    fn test_elevated_rate_fires_first() {
        let recs = generate(&analysis(
            0.5,
            vec![entry("net1", ErrorCategory::Network)],
        ));
        assert_eq!(recs.len(), 2);
        assert!(recs[0].contains("Error rate is elevated"));
        assert!(recs[1].contains("Network errors are increasing"));
    }

    #[test]
    fn test_systemic_warning_above_three_increasing() {
        let inc = vec![
            entry("a", ErrorCategory::Frontend),
            entry("b", ErrorCategory::Frontend),
            entry("c", ErrorCategory::Frontend),
            entry("d", ErrorCategory::Frontend),
        ];
        let recs = generate(&analysis(0.0, inc));
        assert_eq!(recs.len(), 1);
        assert!(recs[0].contains("systemic change"));
    }

    #[test]
    fn test_category_warnings_one_per_pattern_in_rule_order() {
        let inc = vec![
            entry("db1", ErrorCategory::Database),
            entry("net1", ErrorCategory::Network),
            entry("net2", ErrorCategory::Network),
        ];
        let recs = generate(&analysis(0.0, inc));
        // network rule runs before the database rule, one line per pattern
        assert_eq!(recs.len(), 3);
        assert!(recs[0].contains("net1"));
        assert!(recs[1].contains("net2"));
        assert!(recs[2].contains("db1"));
    }
}
