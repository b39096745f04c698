use analysis::behavior::{self, BehaviorProfile, SessionPattern, HOUR_BUCKETS};
use analysis::network::{self, ActiveWindow, DirectEdge, NetworkInputs, TemporalInputs};
use analysis::score::{self, ScoringConfig};
use analysis::stats::{self, PlayerStatLine};

use chrono::{TimeZone, Utc};
use common::{SubAnalyses, SuspicionLevel};
use pretty_assertions::assert_eq;
use std::collections::{BTreeMap, BTreeSet};

fn stat_line(
    rounds: u64,
    kd: f64,
    kills_per_minute: f64,
    score_per_round: f64,
    maps: &[(&str, f64)],
    servers: &[(&str, f64)],
) -> PlayerStatLine {
    PlayerStatLine {
        rounds,
        kd,
        kills_per_minute,
        score_per_round,
        per_map_kd: maps.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        per_server_kd: servers.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
    }
}

fn hours(active: &[usize]) -> [u64; HOUR_BUCKETS] {
    let mut buckets = [0u64; HOUR_BUCKETS];
    for hour in active {
        buckets[*hour] = 10;
    }
    buckets
}

fn behavior_profile(
    active_hours: &[usize],
    server_pings: &[(&str, f64)],
    sessions: u64,
    avg_minutes: f64,
) -> BehaviorProfile {
    BehaviorProfile {
        hours: hours(active_hours),
        server_pings: server_pings
            .iter()
            .map(|(guid, ping)| (guid.to_string(), *ping))
            .collect::<BTreeMap<String, f64>>(),
        pattern: SessionPattern {
            sessions,
            avg_minutes,
        },
    }
}

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

/// Two accounts with mirrored stats and rhythm, a shared circle they never
/// play in at the same time, and back to back activity windows.
#[test]
fn obvious_alias_pair() {
    let config = ScoringConfig::default();

    let stat = stats::compare(
        &config.stat,
        &stat_line(
            200,
            2.05,
            1.11,
            410.0,
            &[("sharqi", 2.1), ("karkand", 1.9)],
            &[("srv-1", 2.0), ("srv-2", 2.2)],
        ),
        &stat_line(
            180,
            2.0,
            1.08,
            400.0,
            &[("sharqi", 2.0), ("karkand", 1.85)],
            &[("srv-1", 1.95), ("srv-2", 2.1)],
        ),
    );
    let behavior = behavior::compare(
        &config.behavior,
        &behavior_profile(
            &[21, 22, 23, 0],
            &[("srv-1", 48.0), ("srv-2", 33.0), ("srv-3", 52.0), ("srv-4", 27.0)],
            60,
            95.0,
        ),
        &behavior_profile(
            &[21, 22, 23, 0],
            &[("srv-1", 50.0), ("srv-2", 31.0), ("srv-3", 54.0), ("srv-4", 26.0)],
            55,
            90.0,
        ),
    );
    let network = network::compare(
        &config.network,
        &NetworkInputs {
            teammates1: names(&[
                "ana", "ben", "cleo", "dan", "eve", "finn", "hana", "ivo", "jill", "kim",
            ]),
            teammates2: names(&[
                "ana", "ben", "cleo", "dan", "eve", "finn", "hana", "ivo", "jill", "gus",
            ]),
        },
    );
    let temporal = network::temporal(
        &config.network,
        &TemporalInputs {
            edge: None,
            window1: Some(window((2025, 1, 5), (2025, 3, 1))),
            window2: Some(window((2025, 3, 20), (2025, 6, 10))),
        },
    );

    let report = score::build_report(
        &config,
        "Smoove_B".to_string(),
        "B_Smoove".to_string(),
        90,
        SubAnalyses {
            stat: Some(stat),
            behavior: Some(behavior),
            network: Some(network),
            temporal: Some(temporal),
        },
        Vec::new(),
        Utc::now(),
    );

    assert!(report.overall_score > 0.8, "got {}", report.overall_score);
    assert_eq!(report.suspicion, SuspicionLevel::VeryLikely);
    assert!(report.confidence > 0.99, "got {}", report.confidence);
    assert!(report
        .red_flags
        .iter()
        .any(|f| f.contains("teammate overlap")));
    assert!(report
        .red_flags
        .iter()
        .any(|f| f.contains("no direct co-session")));
    assert_eq!(report.green_flags, Vec::<String>::new());
    assert_eq!(report.degraded_signals, Vec::<String>::new());
    assert_eq!(report.player1, "Smoove_B");
    assert_eq!(report.lookback_days, 90);
}

/// Two accounts that regularly play together, with a wide skill gap and
/// concurrent activity. Friends, not aliases.
#[test]
fn regular_teammates_pair() {
    let config = ScoringConfig::default();

    let stat = stats::compare(
        &config.stat,
        &stat_line(150, 2.4, 1.3, 450.0, &[("sharqi", 2.5)], &[("srv-a", 2.4)]),
        &stat_line(140, 0.6, 0.35, 150.0, &[("karkand", 0.6)], &[("srv-b", 0.55)]),
    );
    let behavior = behavior::compare(
        &config.behavior,
        &behavior_profile(
            &[17, 18, 19, 20],
            &[("alpha", 25.0), ("eu-a", 30.0), ("eu-b", 35.0)],
            90,
            45.0,
        ),
        &behavior_profile(
            &[19, 20, 21, 22],
            &[("alpha", 80.0), ("us-a", 120.0), ("us-b", 110.0), ("us-c", 115.0)],
            30,
            120.0,
        ),
    );
    let network = network::compare(
        &config.network,
        &NetworkInputs {
            teammates1: names(&["ana", "ben", "cleo", "dan", "eve", "finn", "gus", "hana"]),
            teammates2: names(&["ana", "ivo", "jill", "kim", "lev"]),
        },
    );
    let temporal = network::temporal(
        &config.network,
        &TemporalInputs {
            edge: Some(DirectEdge {
                sessions: 12,
                minutes: 540.0,
                first_seen: Utc.with_ymd_and_hms(2025, 1, 12, 18, 0, 0).unwrap(),
                last_seen: Utc.with_ymd_and_hms(2025, 6, 20, 21, 0, 0).unwrap(),
            }),
            window1: Some(window((2025, 1, 1), (2025, 6, 30))),
            window2: Some(window((2025, 1, 1), (2025, 6, 30))),
        },
    );

    let report = score::build_report(
        &config,
        "VeteranSniper".to_string(),
        "FreshRecruit".to_string(),
        180,
        SubAnalyses {
            stat: Some(stat),
            behavior: Some(behavior),
            network: Some(network),
            temporal: Some(temporal),
        },
        Vec::new(),
        Utc::now(),
    );

    assert!(report.overall_score < 0.4, "got {}", report.overall_score);
    assert_eq!(report.suspicion, SuspicionLevel::Unrelated);
    assert!(report
        .green_flags
        .iter()
        .any(|f| f.contains("played together")));
    assert_eq!(report.red_flags, Vec::<String>::new());
}

/// A brand new account with a single round on record. Whatever the scores
/// say, the verdict must not come with confidence.
#[test]
fn fresh_account_caps_confidence() {
    let config = ScoringConfig::default();

    let stat = stats::compare(
        &config.stat,
        &stat_line(85, 1.1, 0.8, 260.0, &[("sharqi", 1.1)], &[]),
        &stat_line(1, 3.0, 2.0, 500.0, &[("sharqi", 3.0)], &[]),
    );
    let behavior = behavior::compare(
        &config.behavior,
        &behavior_profile(
            &[20, 21],
            &[("home", 40.0), ("srv-x", 50.0), ("srv-y", 60.0)],
            25,
            75.0,
        ),
        &behavior_profile(&[20], &[("home", 44.0)], 1, 30.0),
    );
    let network = network::compare(
        &config.network,
        &NetworkInputs {
            teammates1: names(&["ana", "ben", "cleo", "dan", "eve", "finn", "gus"]),
            teammates2: names(&["ana", "ben", "cleo", "dan", "eve", "finn"]),
        },
    );
    let temporal = network::temporal(
        &config.network,
        &TemporalInputs {
            edge: Some(DirectEdge {
                sessions: 2,
                minutes: 60.0,
                first_seen: Utc.with_ymd_and_hms(2025, 6, 1, 20, 0, 0).unwrap(),
                last_seen: Utc.with_ymd_and_hms(2025, 6, 2, 20, 0, 0).unwrap(),
            }),
            window1: Some(window((2025, 1, 1), (2025, 6, 10))),
            window2: Some(window((2025, 6, 1), (2025, 6, 10))),
        },
    );

    let report = score::build_report(
        &config,
        "OldHand".to_string(),
        "NewFace".to_string(),
        90,
        SubAnalyses {
            stat: Some(stat),
            behavior: Some(behavior),
            network: Some(network),
            temporal: Some(temporal),
        },
        Vec::new(),
        Utc::now(),
    );

    // Six shared teammates would normally earn a bonus, the one-round sample
    // caps it away.
    assert_eq!(report.confidence, 0.55);
    assert!(report.confidence <= 0.55);
}

#[test]
fn degraded_signals_renormalize() {
    let config = ScoringConfig::default();

    let behavior = common::BehaviorSimilarity {
        score: 0.8,
        hour_overlap: 0.8,
        server_affinity: 0.7,
        ping_consistency: 0.6,
        session_pattern: 0.9,
        sessions1: 30,
        sessions2: 28,
        common_servers: 3,
        insufficient_data: false,
    };
    let temporal = common::TemporalSimilarity {
        score: 0.9,
        direct_sessions: 0,
        minutes_together: 0.0,
        active_overlap: 0.1,
        windows_inverted: false,
    };

    let report = score::build_report(
        &config,
        "a".to_string(),
        "b".to_string(),
        90,
        SubAnalyses {
            stat: None,
            behavior: Some(behavior),
            network: None,
            temporal: Some(temporal),
        },
        vec!["stats".to_string(), "network".to_string()],
        Utc::now(),
    );

    // (0.20 * 0.8 + 0.15 * 0.9) / 0.35
    assert!((report.overall_score - 0.842857142857).abs() < 1e-9);
    assert_eq!(
        report.degraded_signals,
        vec!["stats".to_string(), "network".to_string()]
    );
}

#[test]
fn no_signals_at_all() {
    let config = ScoringConfig::default();

    let report = score::build_report(
        &config,
        "a".to_string(),
        "b".to_string(),
        30,
        SubAnalyses::default(),
        vec![
            "stats".to_string(),
            "behavior".to_string(),
            "network".to_string(),
            "temporal".to_string(),
        ],
        Utc::now(),
    );

    assert_eq!(report.overall_score, 0.0);
    assert_eq!(report.suspicion, SuspicionLevel::Unrelated);
    assert_eq!(report.confidence, 0.5);
}

#[test]
fn suspicion_tiers() {
    let thresholds = score::SuspicionThresholds::default();

    assert_eq!(
        score::suspicion_for(&thresholds, 0.49),
        SuspicionLevel::Unrelated
    );
    assert_eq!(
        score::suspicion_for(&thresholds, 0.50),
        SuspicionLevel::Potential
    );
    assert_eq!(
        score::suspicion_for(&thresholds, 0.69),
        SuspicionLevel::Potential
    );
    assert_eq!(
        score::suspicion_for(&thresholds, 0.70),
        SuspicionLevel::Likely
    );
    assert_eq!(
        score::suspicion_for(&thresholds, 0.84),
        SuspicionLevel::Likely
    );
    assert_eq!(
        score::suspicion_for(&thresholds, 0.85),
        SuspicionLevel::VeryLikely
    );
}
