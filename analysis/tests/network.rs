use analysis::network::{self, ActiveWindow, DirectEdge, NetworkInputs, NetworkWeights, TemporalInputs};

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;

fn names(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn window(from: (i32, u32, u32), to: (i32, u32, u32)) -> ActiveWindow {
    ActiveWindow {
        first_seen: Utc
            .with_ymd_and_hms(from.0, from.1, from.2, 12, 0, 0)
            .unwrap(),
        last_seen: Utc.with_ymd_and_hms(to.0, to.1, to.2, 12, 0, 0).unwrap(),
    }
}

#[test]
fn overlapping_circles() {
    let inputs = NetworkInputs {
        teammates1: names(&["ana", "ben", "cleo", "dan", "eve"]),
        teammates2: names(&["ana", "ben", "cleo", "dan", "finn"]),
    };

    let result = network::compare(&NetworkWeights::default(), &inputs);

    assert_eq!(result.teammates1, 5);
    assert_eq!(result.teammates2, 5);
    assert_eq!(result.shared_teammates, 4);
    assert_eq!(result.teammate_jaccard, 4.0 / 6.0);
    assert_eq!(result.degree_similarity, 1.0);
    assert!((result.score - (0.6 * (4.0 / 6.0) + 0.4)).abs() < 1e-9);
}

#[test]
fn empty_circles_score_zero() {
    let result = network::compare(&NetworkWeights::default(), &NetworkInputs::default());

    assert_eq!(
        result,
        common::NetworkSimilarity {
            score: 0.0,
            teammate_jaccard: 0.0,
            degree_similarity: 0.0,
            teammates1: 0,
            teammates2: 0,
            shared_teammates: 0,
        }
    );
}

#[test]
fn handoff_windows_score_max() {
    // Account two starts less than the handoff gap after account one stops.
    let inputs = TemporalInputs {
        edge: None,
        window1: Some(window((2025, 1, 5), (2025, 3, 1))),
        window2: Some(window((2025, 3, 20), (2025, 6, 10))),
    };

    let result = network::temporal(&NetworkWeights::default(), &inputs);

    assert_eq!(
        result,
        common::TemporalSimilarity {
            score: 1.0,
            direct_sessions: 0,
            minutes_together: 0.0,
            active_overlap: 0.0,
            windows_inverted: true,
        }
    );
}

#[test]
fn distant_windows_are_not_a_handoff() {
    let inputs = TemporalInputs {
        edge: None,
        window1: Some(window((2024, 1, 1), (2024, 3, 1))),
        window2: Some(window((2025, 2, 1), (2025, 6, 1))),
    };

    let result = network::temporal(&NetworkWeights::default(), &inputs);

    assert!(!result.windows_inverted);
    // direct 1.0 weighted 0.6, window 0.6 weighted 0.4
    assert!((result.score - 0.84).abs() < 1e-9);
}

#[test]
fn regular_teammates_decay_the_signal() {
    let edge = DirectEdge {
        sessions: 9,
        minutes: 420.0,
        first_seen: Utc.with_ymd_and_hms(2025, 1, 10, 19, 0, 0).unwrap(),
        last_seen: Utc.with_ymd_and_hms(2025, 5, 20, 22, 0, 0).unwrap(),
    };
    let inputs = TemporalInputs {
        edge: Some(edge),
        window1: Some(window((2025, 1, 1), (2025, 6, 1))),
        window2: Some(window((2025, 1, 1), (2025, 6, 1))),
    };

    let result = network::temporal(&NetworkWeights::default(), &inputs);

    assert_eq!(result.direct_sessions, 9);
    assert_eq!(result.minutes_together, 420.0);
    assert_eq!(result.active_overlap, 1.0);
    // 0.6 * (1 / 10) + 0.4 * 0.0
    assert!((result.score - 0.06).abs() < 1e-9);
}

#[test]
fn missing_window_is_neutral() {
    let inputs = TemporalInputs {
        edge: None,
        window1: Some(window((2025, 1, 1), (2025, 2, 1))),
        window2: None,
    };

    let result = network::temporal(&NetworkWeights::default(), &inputs);

    assert!(!result.windows_inverted);
    assert_eq!(result.active_overlap, 0.0);
    // 0.6 * 1.0 + 0.4 * 0.5
    assert!((result.score - 0.8).abs() < 1e-9);
}
