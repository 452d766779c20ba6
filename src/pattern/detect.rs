use crate::fingerprint::{pattern_fingerprint, similarity_key};
use crate::pattern::categorize;
use crate::types::{EmergingCluster, ErrorEvent};
use std::collections::{HashMap, HashSet};

/// Clusters of at least this many events in one batch count as emerging.
const MIN_CLUSTER_SIZE: usize = 3;

/// Scan a single drained batch for clusters of similar events that were not
/// tracked as a pattern before the drain began. `known_before` is the set of
/// fingerprints the store held when the batch was swapped out; comparing
/// against it keeps the check meaningful even though the batch itself has
/// already been folded into the store by the time detection runs.
pub fn detect_emerging(
    batch: &[ErrorEvent],
    known_before: &HashSet<String>,
) -> Vec<EmergingCluster> {
    let mut groups: HashMap<String, Vec<&ErrorEvent>> = HashMap::new();
    for event in batch {
        let key = similarity_key(
            event.kind,
            &event.message,
            event.source_location.as_ref().map(|l| l.file.as_str()),
        );
        groups.entry(key).or_default().push(event);
    }

    let mut clusters: Vec<EmergingCluster> = groups
        .into_iter()
        .filter(|(_, members)| members.len() >= MIN_CLUSTER_SIZE)
        .filter_map(|(key, members)| {
            let first = members[0];
            let fingerprint = pattern_fingerprint(
                first.kind,
                &first.message,
                first.source_location.as_ref().map(|l| l.file.as_str()),
            );
            if known_before.contains(&fingerprint) {
                return None;
            }
            Some(EmergingCluster {
                similarity_key: key,
                fingerprint,
                kind: first.kind,
                category: categorize(first),
                size: members.len(),
                sample_message: first.message.clone(),
            })
        })
        .collect();

    // Deterministic output order for alerting and tests.
    clusters.sort_by(|a, b| b.size.cmp(&a.size).then(a.similarity_key.cmp(&b.similarity_key)));
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ErrorKind, Severity};

    fn event(message: &str) -> ErrorEvent {
        ErrorEvent {
            id: uuid::Uuid::new_v4().to_string(),
            kind: ErrorKind::Network,
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
    fn test_scenario_c_one_cluster_from_related_messages() {
        // Four events, same first five tokens, distinct exact fingerprints.
        let batch = vec![
            event("upstream timeout calling payments api region eu-1"),
            event("upstream timeout calling payments api region us-2"),
            event("upstream timeout calling payments api shard primary"),
            event("upstream timeout calling payments api shard replica"),
        ];
        let clusters = detect_emerging(&batch, &HashSet::new());
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].size, 4);
        assert_eq!(clusters[0].kind, ErrorKind::Network);
    }

    #[test]
    fn test_small_groups_ignored() {
        let batch = vec![
            event("upstream timeout calling payments api"),
            event("upstream timeout calling payments api"),
        ];
        assert!(detect_emerging(&batch, &HashSet::new()).is_empty());
    }

    #[test]
    fn test_known_fingerprints_not_reported() {
        let batch = vec![
            event("cache miss storm on sessions"),
            event("cache miss storm on sessions"),
            event("cache miss storm on sessions"),
        ];
        let fp = pattern_fingerprint(ErrorKind::Network, "cache miss storm on sessions", None);
        let known: HashSet<String> = [fp].into_iter().collect();
        assert!(detect_emerging(&batch, &known).is_empty());
    }

    #[test]
    fn test_clusters_sorted_by_size() {
        let mut batch = Vec::new();
        for _ in 0..3 {
            batch.push(event("dns lookup failed for assets host"));
        }
        for _ in 0..5 {
            batch.push(event("tls handshake aborted by upstream proxy"));
        }
        let clusters = detect_emerging(&batch, &HashSet::new());
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].size, 5);
        assert_eq!(clusters[1].size, 3);
    }
}
