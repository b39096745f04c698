use analysis::flags::{self, FlagPolicy};

use common::{BehaviorSimilarity, NetworkSimilarity, StatSimilarity, SubAnalyses, TemporalSimilarity};
use pretty_assertions::assert_eq;

fn network(jaccard: f64, shared: u64) -> NetworkSimilarity {
    NetworkSimilarity {
        score: jaccard,
        teammate_jaccard: jaccard,
        degree_similarity: 1.0,
        teammates1: 8,
        teammates2: 8,
        shared_teammates: shared,
    }
}

fn temporal(sessions: u64, inverted: bool) -> TemporalSimilarity {
    TemporalSimilarity {
        score: 0.5,
        direct_sessions: sessions,
        minutes_together: sessions as f64 * 45.0,
        active_overlap: 0.2,
        windows_inverted: inverted,
    }
}

fn stat(score: f64) -> StatSimilarity {
    StatSimilarity {
        score,
        kd_similarity: score,
        kill_rate_similarity: score,
        score_per_round_similarity: score,
        map_vector_similarity: score,
        server_vector_similarity: score,
        rounds1: 100,
        rounds2: 100,
        insufficient_data: false,
    }
}

fn behavior(hour: f64, affinity: f64, ping: f64, common_servers: u64) -> BehaviorSimilarity {
    BehaviorSimilarity {
        score: hour,
        hour_overlap: hour,
        server_affinity: affinity,
        ping_consistency: ping,
        session_pattern: 0.5,
        sessions1: 30,
        sessions2: 30,
        common_servers,
        insufficient_data: false,
    }
}

#[test]
fn shared_circle_without_coplay_is_red() {
    let subs = SubAnalyses {
        network: Some(network(0.62, 5)),
        temporal: Some(temporal(0, false)),
        ..SubAnalyses::default()
    };

    let (red, green) = flags::evaluate(&FlagPolicy::default(), &subs);

    assert_eq!(red.len(), 1);
    assert!(red[0].contains("teammate overlap"));
    assert!(red[0].contains("no direct co-session"));
    assert_eq!(green, Vec::<String>::new());
}

#[test]
fn coplay_clears_the_circle_flag() {
    let subs = SubAnalyses {
        network: Some(network(0.62, 5)),
        temporal: Some(temporal(6, false)),
        ..SubAnalyses::default()
    };

    let (red, green) = flags::evaluate(&FlagPolicy::default(), &subs);

    assert_eq!(red, Vec::<String>::new());
    assert_eq!(green.len(), 1);
    assert!(green[0].contains("played together"));
}

#[test]
fn mirrored_stats_and_hours_are_red() {
    let subs = SubAnalyses {
        stat: Some(stat(0.91)),
        behavior: Some(behavior(0.88, 0.3, 0.4, 1)),
        ..SubAnalyses::default()
    };

    let (red, _) = flags::evaluate(&FlagPolicy::default(), &subs);

    assert_eq!(red.len(), 2);
    assert!(red[0].contains("near mirror"));
    assert!(red[1].contains("active-hour"));
}

#[test]
fn window_inversion_is_red() {
    let subs = SubAnalyses {
        temporal: Some(temporal(0, true)),
        ..SubAnalyses::default()
    };

    let (red, _) = flags::evaluate(&FlagPolicy::default(), &subs);

    assert_eq!(
        red,
        vec!["one account went quiet right as the other appeared".to_string()]
    );
}

#[test]
fn matching_ping_on_shared_servers_is_red() {
    let subs = SubAnalyses {
        behavior: Some(behavior(0.4, 0.3, 0.93, 3)),
        ..SubAnalyses::default()
    };

    let (red, _) = flags::evaluate(&FlagPolicy::default(), &subs);

    assert_eq!(red.len(), 1);
    assert!(red[0].contains("3 shared servers"));
}

#[test]
fn skill_gap_and_disjoint_servers_are_green() {
    let subs = SubAnalyses {
        stat: Some(stat(0.12)),
        behavior: Some(behavior(0.4, 0.0, 0.0, 0)),
        ..SubAnalyses::default()
    };

    let (red, green) = flags::evaluate(&FlagPolicy::default(), &subs);

    assert_eq!(red, Vec::<String>::new());
    assert_eq!(green.len(), 2);
    assert!(green[0].contains("far apart"));
    assert!(green[1].contains("no shared servers"));
}

#[test]
fn degraded_signals_stay_silent() {
    let (red, green) = flags::evaluate(&FlagPolicy::default(), &SubAnalyses::default());

    assert_eq!(red, Vec::<String>::new());
    assert_eq!(green, Vec::<String>::new());
}
