use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::{NetworkSimilarity, TemporalSimilarity};

use crate::{clamp01, ratio_similarity};

/// Teammate circles of the two players, with the compared pair itself
/// already removed from both sets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkInputs {
    pub teammates1: BTreeSet<String>,
    pub teammates2: BTreeSet<String>,
}

/// Direct co-play history between the pair, straight off the PLAYED_WITH
/// edge (absent when the players never shared a timestamp bucket).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectEdge {
    pub sessions: u64,
    pub minutes: f64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// First/last activity of one player as recorded on its Player node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveWindow {
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemporalInputs {
    pub edge: Option<DirectEdge>,
    pub window1: Option<ActiveWindow>,
    pub window2: Option<ActiveWindow>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct NetworkWeights {
    pub teammate_jaccard: f64,
    pub degree_shape: f64,
    pub temporal_direct: f64,
    pub temporal_window: f64,
    /// Two disjoint active windows separated by less than this many days are
    /// treated as an account handoff.
    pub handoff_gap_days: i64,
}

impl Default for NetworkWeights {
    fn default() -> Self {
        Self {
            teammate_jaccard: 0.60,
            degree_shape: 0.40,
            temporal_direct: 0.60,
            temporal_window: 0.40,
            handoff_gap_days: 45,
        }
    }
}

pub fn compare(weights: &NetworkWeights, inputs: &NetworkInputs) -> NetworkSimilarity {
    let shared = inputs
        .teammates1
        .intersection(&inputs.teammates2)
        .count() as u64;
    let teammates1 = inputs.teammates1.len() as u64;
    let teammates2 = inputs.teammates2.len() as u64;

    let teammate_jaccard = crate::jaccard_from_counts(teammates1, teammates2, shared);
    let degree_similarity = if teammates1 == 0 && teammates2 == 0 {
        0.0
    } else {
        ratio_similarity(teammates1 as f64, teammates2 as f64)
    };

    let weight_total = weights.teammate_jaccard + weights.degree_shape;
    let score = weights.teammate_jaccard * teammate_jaccard
        + weights.degree_shape * degree_similarity;

    NetworkSimilarity {
        score: clamp01(score / weight_total.max(crate::EPSILON)),
        teammate_jaccard,
        degree_similarity,
        teammates1,
        teammates2,
        shared_teammates: shared,
    }
}

pub fn temporal(weights: &NetworkWeights, inputs: &TemporalInputs) -> TemporalSimilarity {
    let (direct_sessions, minutes_together) = match &inputs.edge {
        Some(edge) => (edge.sessions, edge.minutes),
        None => (0, 0.0),
    };

    // Never having shared a single timestamp bucket is the strong aliasing
    // signal; repeated direct co-play decays this towards zero.
    let direct_component = 1.0 / (1.0 + direct_sessions as f64);

    let (window_component, active_overlap, windows_inverted) =
        window_relation(weights.handoff_gap_days, &inputs.window1, &inputs.window2);

    let weight_total = weights.temporal_direct + weights.temporal_window;
    let score = weights.temporal_direct * direct_component
        + weights.temporal_window * window_component;

    TemporalSimilarity {
        score: clamp01(score / weight_total.max(crate::EPSILON)),
        direct_sessions,
        minutes_together,
        active_overlap,
        windows_inverted,
    }
}

/// Relation of the two active windows: (component score, overlap fraction,
/// inverted). Overlap fraction is measured against the shorter window.
fn window_relation(
    handoff_gap_days: i64,
    window1: &Option<ActiveWindow>,
    window2: &Option<ActiveWindow>,
) -> (f64, f64, bool) {
    let (a, b) = match (window1, window2) {
        (Some(a), Some(b)) => (a, b),
        // One side has no graph presence at all, no temporal evidence either way.
        _ => return (0.5, 0.0, false),
    };

    let overlap_start = a.first_seen.max(b.first_seen);
    let overlap_end = a.last_seen.min(b.last_seen);

    if overlap_end < overlap_start {
        // Disjoint activity. A short gap means one account went quiet right
        // as the other appeared.
        let gap = overlap_start - overlap_end;
        let inverted = gap <= chrono::Duration::days(handoff_gap_days);
        let component = if inverted { 1.0 } else { 0.6 };
        return (component, 0.0, inverted);
    }

    let overlap = (overlap_end - overlap_start).num_seconds() as f64;
    let span1 = (a.last_seen - a.first_seen).num_seconds() as f64;
    let span2 = (b.last_seen - b.first_seen).num_seconds() as f64;
    let shorter = span1.min(span2).max(86_400.0);

    let active_overlap = clamp01(overlap / shorter);

    (1.0 - active_overlap, active_overlap, false)
}
