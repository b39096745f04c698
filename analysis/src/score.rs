use chrono::{DateTime, Utc};
use common::{SimilarityReport, SubAnalyses, SuspicionLevel};

use crate::behavior::BehaviorWeights;
use crate::flags::FlagPolicy;
use crate::network::NetworkWeights;
use crate::stats::StatWeights;
use crate::{clamp01, EPSILON};

/// Contribution of each signal to the composite score.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub stat: f64,
    pub behavior: f64,
    pub network: f64,
    pub temporal: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            stat: 0.30,
            behavior: 0.20,
            network: 0.25,
            temporal: 0.15,
        }
    }
}

/// Composite score cutoffs for the suspicion tiers.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SuspicionThresholds {
    pub potential: f64,
    pub likely: f64,
    pub very_likely: f64,
}

impl Default for SuspicionThresholds {
    fn default() -> Self {
        Self {
            potential: 0.50,
            likely: 0.70,
            very_likely: 0.85,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ConfidencePolicy {
    pub base: f64,
    pub stat_bonus: f64,
    pub behavior_bonus: f64,
    pub teammate_bonus: f64,
    pub min_stat_rounds: u64,
    pub min_behavior_sessions: u64,
    pub min_shared_teammates: u64,
    /// Upper bound on confidence when either player has fewer rounds on
    /// record than `min_stat_rounds`.
    pub small_sample_cap: f64,
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self {
            base: 0.50,
            stat_bonus: 0.25,
            behavior_bonus: 0.15,
            teammate_bonus: 0.10,
            min_stat_rounds: 10,
            min_behavior_sessions: 10,
            min_shared_teammates: 5,
            small_sample_cap: 0.55,
        }
    }
}

/// Everything the scoring pipeline can be tuned with, one block per stage.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: SignalWeights,
    pub thresholds: SuspicionThresholds,
    pub confidence: ConfidencePolicy,
    pub stat: StatWeights,
    pub behavior: BehaviorWeights,
    pub network: NetworkWeights,
    pub flags: FlagPolicy,
}

/// Fuses the per-signal sub-analyses into the final report. Signals that are
/// missing (degraded or skipped) drop out of the weighted average instead of
/// dragging the score down.
pub fn build_report(
    config: &ScoringConfig,
    player1: String,
    player2: String,
    lookback_days: u32,
    sub_analyses: SubAnalyses,
    degraded_signals: Vec<String>,
    generated_at: DateTime<Utc>,
) -> SimilarityReport {
    let overall_score = composite(&config.weights, &sub_analyses);
    let suspicion = suspicion_for(&config.thresholds, overall_score);
    let confidence = confidence_for(&config.confidence, &sub_analyses);
    let (red_flags, green_flags) = crate::flags::evaluate(&config.flags, &sub_analyses);

    tracing::debug!(
        overall_score,
        ?suspicion,
        confidence,
        red_flags = red_flags.len(),
        green_flags = green_flags.len(),
        "Scored account pair"
    );

    SimilarityReport {
        player1,
        player2,
        lookback_days,
        overall_score,
        suspicion,
        confidence,
        sub_analyses,
        red_flags,
        green_flags,
        degraded_signals,
        generated_at,
    }
}

fn composite(weights: &SignalWeights, subs: &SubAnalyses) -> f64 {
    let mut score = 0.0;
    let mut weight_total = 0.0;

    if let Some(stat) = &subs.stat {
        score += weights.stat * stat.score;
        weight_total += weights.stat;
    }
    if let Some(behavior) = &subs.behavior {
        score += weights.behavior * behavior.score;
        weight_total += weights.behavior;
    }
    if let Some(network) = &subs.network {
        score += weights.network * network.score;
        weight_total += weights.network;
    }
    if let Some(temporal) = &subs.temporal {
        score += weights.temporal * temporal.score;
        weight_total += weights.temporal;
    }

    if weight_total <= EPSILON {
        return 0.0;
    }
    clamp01(score / weight_total)
}

pub fn suspicion_for(thresholds: &SuspicionThresholds, score: f64) -> SuspicionLevel {
    if score >= thresholds.very_likely {
        SuspicionLevel::VeryLikely
    } else if score >= thresholds.likely {
        SuspicionLevel::Likely
    } else if score >= thresholds.potential {
        SuspicionLevel::Potential
    } else {
        SuspicionLevel::Unrelated
    }
}

fn confidence_for(policy: &ConfidencePolicy, subs: &SubAnalyses) -> f64 {
    let mut confidence = policy.base;
    let mut thin_sample = false;

    if let Some(stat) = &subs.stat {
        if stat.rounds1 >= policy.min_stat_rounds && stat.rounds2 >= policy.min_stat_rounds {
            confidence += policy.stat_bonus;
        } else {
            thin_sample = true;
        }
    }
    if let Some(behavior) = &subs.behavior {
        if behavior.sessions1 >= policy.min_behavior_sessions
            && behavior.sessions2 >= policy.min_behavior_sessions
        {
            confidence += policy.behavior_bonus;
        }
    }
    if let Some(network) = &subs.network {
        if network.shared_teammates >= policy.min_shared_teammates {
            confidence += policy.teammate_bonus;
        }
    }

    if thin_sample {
        confidence = confidence.min(policy.small_sample_cap);
    }
    confidence.min(1.0)
}
