use std::collections::BTreeMap;

use common::BehaviorSimilarity;

use crate::{clamp01, jaccard_from_counts, jensen_shannon, ratio_similarity, to_distribution};

pub const HOUR_BUCKETS: usize = 24;

/// Grouped session shape for one player over the lookback window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPattern {
    pub sessions: u64,
    pub avg_minutes: f64,
}

/// Aggregate behaviour of one player, as produced by grouped queries over
/// the session store. `server_pings` maps server GUID to the player's
/// average ping there and doubles as the distinct-server set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BehaviorProfile {
    pub hours: [u64; HOUR_BUCKETS],
    pub server_pings: BTreeMap<String, f64>,
    pub pattern: SessionPattern,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BehaviorWeights {
    pub hour_overlap: f64,
    pub server_affinity: f64,
    pub ping_consistency: f64,
    pub session_pattern: f64,
}

impl Default for BehaviorWeights {
    fn default() -> Self {
        Self {
            hour_overlap: 0.30,
            server_affinity: 0.30,
            ping_consistency: 0.20,
            session_pattern: 0.20,
        }
    }
}

pub fn compare(
    weights: &BehaviorWeights,
    a: &BehaviorProfile,
    b: &BehaviorProfile,
) -> BehaviorSimilarity {
    let sessions1 = a.pattern.sessions;
    let sessions2 = b.pattern.sessions;
    let common: Vec<(f64, f64)> = a
        .server_pings
        .iter()
        .filter_map(|(guid, ping1)| b.server_pings.get(guid).map(|ping2| (*ping1, *ping2)))
        .collect();
    let common_servers = common.len() as u64;

    if sessions1 == 0 || sessions2 == 0 {
        return BehaviorSimilarity {
            score: 0.0,
            hour_overlap: 0.0,
            server_affinity: 0.0,
            ping_consistency: 0.0,
            session_pattern: 0.0,
            sessions1,
            sessions2,
            common_servers,
            insufficient_data: true,
        };
    }

    let hour_overlap = hour_histogram_similarity(&a.hours, &b.hours);
    let server_affinity = jaccard_from_counts(
        a.server_pings.len() as u64,
        b.server_pings.len() as u64,
        common_servers,
    );
    let ping_consistency = ping_similarity(&common);
    let session_pattern = session_pattern_similarity(&a.pattern, &b.pattern);

    let score = weights.hour_overlap * hour_overlap
        + weights.server_affinity * server_affinity
        + weights.ping_consistency * ping_consistency
        + weights.session_pattern * session_pattern;
    let weight_total = weights.hour_overlap
        + weights.server_affinity
        + weights.ping_consistency
        + weights.session_pattern;

    BehaviorSimilarity {
        score: clamp01(score / weight_total.max(crate::EPSILON)),
        hour_overlap,
        server_affinity,
        ping_consistency,
        session_pattern,
        sessions1,
        sessions2,
        common_servers,
        insufficient_data: false,
    }
}

/// Jensen-Shannon similarity between the two hour-of-day distributions.
pub fn hour_histogram_similarity(a: &[u64; HOUR_BUCKETS], b: &[u64; HOUR_BUCKETS]) -> f64 {
    let (dist_a, dist_b) = match (to_distribution(a), to_distribution(b)) {
        (Some(da), Some(db)) => (da, db),
        _ => return 0.0,
    };

    1.0 - jensen_shannon(&dist_a, &dist_b)
}

/// Mean per-server ping agreement. No common server means no locality
/// evidence at all, which scores 0 rather than neutral.
fn ping_similarity(common: &[(f64, f64)]) -> f64 {
    if common.is_empty() {
        return 0.0;
    }

    let agreement: f64 = common
        .iter()
        .map(|(avg1, avg2)| ratio_similarity(*avg1, *avg2))
        .sum::<f64>();

    agreement / common.len() as f64
}

fn session_pattern_similarity(a: &SessionPattern, b: &SessionPattern) -> f64 {
    let count_similarity = ratio_similarity(a.sessions as f64, b.sessions as f64);
    let duration_similarity = ratio_similarity(a.avg_minutes, b.avg_minutes);

    (count_similarity + duration_similarity) / 2.0
}
