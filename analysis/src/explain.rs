use std::fmt::Write as _;

use common::{SimilarityReport, SuspicionLevel};

/// Renders a report as the plain-text explanation served by the explain
/// endpoint. Writing into a String cannot fail, so the write results are
/// dropped.
pub fn render(report: &SimilarityReport) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{} vs {} over the last {} days",
        report.player1, report.player2, report.lookback_days
    );
    let _ = writeln!(
        out,
        "overall similarity {:.2}, verdict: {} (confidence {:.2})",
        report.overall_score, report.suspicion, report.confidence
    );

    if let Some(stat) = &report.sub_analyses.stat {
        if stat.insufficient_data {
            let _ = writeln!(
                out,
                "- stats: too few rounds on record ({} / {}) to compare",
                stat.rounds1, stat.rounds2
            );
        } else {
            let _ = writeln!(
                out,
                "- stats {:.2}: k/d {:.2}, kill rate {:.2}, score per round {:.2}, map picks {:.2}",
                stat.score,
                stat.kd_similarity,
                stat.kill_rate_similarity,
                stat.score_per_round_similarity,
                stat.map_vector_similarity
            );
        }
    }
    if let Some(behavior) = &report.sub_analyses.behavior {
        if behavior.insufficient_data {
            let _ = writeln!(out, "- behavior: not enough sessions to compare");
        } else {
            let _ = writeln!(
                out,
                "- behavior {:.2}: active hours {:.2}, server affinity {:.2} ({} shared), ping {:.2}",
                behavior.score,
                behavior.hour_overlap,
                behavior.server_affinity,
                behavior.common_servers,
                behavior.ping_consistency
            );
        }
    }
    if let Some(network) = &report.sub_analyses.network {
        let _ = writeln!(
            out,
            "- network {:.2}: {} shared teammates out of {} / {} (jaccard {:.2})",
            network.score,
            network.shared_teammates,
            network.teammates1,
            network.teammates2,
            network.teammate_jaccard
        );
    }
    if let Some(temporal) = &report.sub_analyses.temporal {
        let _ = writeln!(
            out,
            "- temporal {:.2}: {} direct sessions, {:.0} minutes together, activity overlap {:.2}",
            temporal.score,
            temporal.direct_sessions,
            temporal.minutes_together,
            temporal.active_overlap
        );
    }

    if !report.degraded_signals.is_empty() {
        let _ = writeln!(
            out,
            "unavailable signals: {}",
            report.degraded_signals.join(", ")
        );
    }

    for flag in &report.red_flags {
        let _ = writeln!(out, "[!] {flag}");
    }
    for flag in &report.green_flags {
        let _ = writeln!(out, "[ok] {flag}");
    }

    let _ = writeln!(out, "{}", recommendation(report.suspicion));

    out
}

fn recommendation(level: SuspicionLevel) -> &'static str {
    match level {
        SuspicionLevel::VeryLikely => {
            "strong alias candidate, review both accounts side by side before acting"
        }
        SuspicionLevel::Likely => "worth a manual review of recent rounds from both accounts",
        SuspicionLevel::Potential => {
            "evidence is suggestive but not conclusive, keep the pair on watch"
        }
        SuspicionLevel::Unrelated => {
            "nothing here suggests the accounts are operated by the same person"
        }
    }
}
