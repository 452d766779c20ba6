use crate::fingerprint::pattern_fingerprint;
use crate::pattern::{categorize, severity};
use crate::types::{ErrorEvent, ErrorPattern, Resolution, Severity};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Characters of the message kept in the canonical description.
const DESCRIPTION_CHARS: usize = 120;

/// Outcome of folding one event into the store.
#[derive(Debug, Clone)]
pub struct PatternUpdate {
    pub fingerprint: String,
    pub created: bool,
    pub severity: Severity,
}

/// Mapping from fingerprint to mutable pattern aggregate.
///
/// All producers and the drain share the store through a single whole-store
/// mutex; contention is low (one drain task plus occasional resolve calls),
/// so per-key locking is not worth the bookkeeping.
pub struct PatternStore {
    inner: Mutex<HashMap<String, ErrorPattern>>,
    max_sample_stacks: usize,
}

impl PatternStore {
    pub fn new(max_sample_stacks: usize) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            max_sample_stacks,
        }
    }

    /// Fold one event into its pattern: create on first sight, bump the
    /// counters, dedupe users and stacks, recompute severity. One critical
    /// section per call.
    pub fn apply(&self, event: &ErrorEvent, now_ms: i64) -> PatternUpdate {
        let fingerprint = pattern_fingerprint(
            event.kind,
            &event.message,
            event.source_location.as_ref().map(|l| l.file.as_str()),
        );

        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());

        let created = !inner.contains_key(&fingerprint);
        let pattern = inner
            .entry(fingerprint.clone())
            .or_insert_with(|| ErrorPattern {
                id: fingerprint.clone(),
                description: describe(event),
                frequency: 0,
                first_seen: event.timestamp,
                last_seen: event.timestamp,
                affected_users: HashSet::new(),
                sample_stacks: Vec::new(),
                category: categorize(event),
                severity: Severity::Low,
                resolution: None,
            });

        pattern.frequency += 1;
        pattern.last_seen = pattern.last_seen.max(event.timestamp);

        if let Some(ref user) = event.user_id {
            pattern.affected_users.insert(user.clone());
        }

        if let Some(ref stack) = event.stack {
            if !stack.is_empty()
                && pattern.sample_stacks.len() < self.max_sample_stacks
                && !pattern.sample_stacks.iter().any(|s| s == stack)
            {
                pattern.sample_stacks.push(stack.clone());
            }
        }

        pattern.severity = severity::classify(
            pattern.frequency,
            pattern.first_seen,
            pattern.affected_users.len(),
            now_ms,
        );

        PatternUpdate {
            fingerprint,
            created,
            severity: pattern.severity,
        }
    }

    /// Recompute severity for every tracked pattern against the supplied
    /// clock. Run after each drain so patterns untouched by the batch still
    /// decay; the drain then scans the store for criticals itself.
    pub fn rescan(&self, now_ms: i64) {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        for pattern in inner.values_mut() {
            pattern.severity = severity::classify(
                pattern.frequency,
                pattern.first_seen,
                pattern.affected_users.len(),
                now_ms,
            );
        }
    }

    pub fn fingerprints(&self) -> HashSet<String> {
        let inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        inner.keys().cloned().collect()
    }

    pub fn get(&self, fingerprint: &str) -> Option<ErrorPattern> {
        let inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        inner.get(fingerprint).cloned()
    }

    pub fn snapshot(&self) -> Vec<ErrorPattern> {
        let inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        inner.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attach a manual resolution. Returns the updated pattern, or `None`
    /// when the fingerprint is unknown.
    pub fn resolve(&self, fingerprint: &str, resolution: Resolution) -> Option<ErrorPattern> {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let pattern = inner.get_mut(fingerprint)?;
        pattern.resolution = Some(resolution);
        Some(pattern.clone())
    }

    /// Drop patterns whose `last_seen` is older than `idle_ms`. Returns the
    /// number evicted.
    pub fn evict_idle(&self, idle_ms: i64, now_ms: i64) -> usize {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let before = inner.len();
        inner.retain(|_, p| now_ms - p.last_seen <= idle_ms);
        before - inner.len()
    }
}

fn describe(event: &ErrorEvent) -> String {
    let prefix: String = event.message.chars().take(DESCRIPTION_CHARS).collect();
    format!("{}: {}", event.kind, prefix)
}
