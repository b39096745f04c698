use std::collections::BTreeMap;

use analysis::behavior::{self, BehaviorProfile, BehaviorWeights, SessionPattern, HOUR_BUCKETS};

use pretty_assertions::assert_eq;

fn hours(active: &[usize]) -> [u64; HOUR_BUCKETS] {
    let mut buckets = [0u64; HOUR_BUCKETS];
    for hour in active {
        buckets[*hour] = 10;
    }
    buckets
}

fn pings(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries
        .iter()
        .map(|(guid, ping)| (guid.to_string(), *ping))
        .collect()
}

fn profile(
    active_hours: &[usize],
    server_pings: &[(&str, f64)],
    sessions: u64,
    avg_minutes: f64,
) -> BehaviorProfile {
    BehaviorProfile {
        hours: hours(active_hours),
        server_pings: pings(server_pings),
        pattern: SessionPattern {
            sessions,
            avg_minutes,
        },
    }
}

#[test]
fn matching_rhythm_scores_one() {
    let servers = [
        ("srv-1", 48.0),
        ("srv-2", 31.0),
        ("srv-3", 62.0),
        ("srv-4", 55.0),
        ("srv-5", 40.0),
    ];
    let night = profile(&[22, 23, 0, 1], &servers, 40, 85.0);

    let result = behavior::compare(&BehaviorWeights::default(), &night, &night);

    assert_eq!(
        result,
        common::BehaviorSimilarity {
            score: 1.0,
            hour_overlap: 1.0,
            server_affinity: 1.0,
            ping_consistency: 1.0,
            session_pattern: 1.0,
            sessions1: 40,
            sessions2: 40,
            common_servers: 5,
            insufficient_data: false,
        }
    );
}

#[test]
fn zero_sessions_is_insufficient() {
    let veteran = profile(&[20], &[("srv-1", 40.0), ("srv-2", 50.0)], 12, 60.0);
    let ghost = BehaviorProfile::default();

    let result = behavior::compare(&BehaviorWeights::default(), &veteran, &ghost);

    assert!(result.insufficient_data);
    assert_eq!(result.score, 0.0);
    assert_eq!(result.sessions1, 12);
    assert_eq!(result.sessions2, 0);
}

#[test]
fn night_owl_vs_morning_player() {
    // Fully disjoint active hours max out the divergence.
    let result = behavior::hour_histogram_similarity(&hours(&[0, 1, 2, 3]), &hours(&[9, 10, 11, 12]));

    assert_eq!(result, 0.0);
}

#[test]
fn partially_shifted_hours() {
    let result =
        behavior::hour_histogram_similarity(&hours(&[17, 18, 19, 20]), &hours(&[19, 20, 21, 22]));

    assert_eq!(result, 0.5);
}

#[test]
fn empty_histogram_has_no_overlap() {
    let result = behavior::hour_histogram_similarity(&[0; HOUR_BUCKETS], &hours(&[12]));

    assert_eq!(result, 0.0);
}

#[test]
fn ping_agreement_is_averaged_over_common_servers() {
    let a = profile(&[20], &[("srv-1", 50.0), ("srv-2", 30.0)], 20, 70.0);
    let b = profile(&[20], &[("srv-1", 50.0), ("srv-2", 60.0)], 20, 70.0);

    let result = behavior::compare(&BehaviorWeights::default(), &a, &b);

    // (1.0 + 0.5) / 2
    assert_eq!(result.ping_consistency, 0.75);
    assert_eq!(result.common_servers, 2);
}

#[test]
fn no_common_server_means_no_ping_evidence() {
    let a = profile(
        &[20],
        &[("eu-1", 40.0), ("eu-2", 45.0), ("eu-3", 50.0), ("eu-4", 42.0)],
        15,
        45.0,
    );
    let b = profile(
        &[20],
        &[("us-1", 120.0), ("us-2", 110.0), ("us-3", 130.0)],
        18,
        50.0,
    );

    let result = behavior::compare(&BehaviorWeights::default(), &a, &b);

    assert_eq!(result.ping_consistency, 0.0);
    assert_eq!(result.server_affinity, 0.0);
    assert_eq!(result.common_servers, 0);
}
