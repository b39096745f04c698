use std::collections::HashMap;

use common::StatSimilarity;

use crate::{cosine_similarity, ratio_similarity};

/// Windowed aggregate performance line for one player, as produced by the
/// stat store. `per_map_kd` / `per_server_kd` are keyed by map name and
/// server GUID respectively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerStatLine {
    pub rounds: u64,
    pub kd: f64,
    pub kills_per_minute: f64,
    pub score_per_round: f64,
    pub per_map_kd: HashMap<String, f64>,
    pub per_server_kd: HashMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StatWeights {
    pub kd: f64,
    pub kill_rate: f64,
    pub score_per_round: f64,
    pub map_vector: f64,
    pub server_vector: f64,
}

impl Default for StatWeights {
    fn default() -> Self {
        Self {
            kd: 0.40,
            kill_rate: 0.25,
            score_per_round: 0.15,
            map_vector: 0.15,
            server_vector: 0.05,
        }
    }
}

pub fn compare(weights: &StatWeights, a: &PlayerStatLine, b: &PlayerStatLine) -> StatSimilarity {
    // A player with no qualifying rounds has nothing to compare against, any
    // ratio would just measure noise.
    if a.rounds == 0 || b.rounds == 0 {
        return StatSimilarity {
            score: 0.0,
            kd_similarity: 0.0,
            kill_rate_similarity: 0.0,
            score_per_round_similarity: 0.0,
            map_vector_similarity: 0.0,
            server_vector_similarity: 0.0,
            rounds1: a.rounds,
            rounds2: b.rounds,
            insufficient_data: true,
        };
    }

    let kd_similarity = ratio_similarity(a.kd, b.kd);
    let kill_rate_similarity = ratio_similarity(a.kills_per_minute, b.kills_per_minute);
    let score_per_round_similarity = ratio_similarity(a.score_per_round, b.score_per_round);
    let map_vector_similarity = shared_key_cosine(&a.per_map_kd, &b.per_map_kd);
    let server_vector_similarity = shared_key_cosine(&a.per_server_kd, &b.per_server_kd);

    let score = weights.kd * kd_similarity
        + weights.kill_rate * kill_rate_similarity
        + weights.score_per_round * score_per_round_similarity
        + weights.map_vector * map_vector_similarity
        + weights.server_vector * server_vector_similarity;
    let weight_total = weights.kd
        + weights.kill_rate
        + weights.score_per_round
        + weights.map_vector
        + weights.server_vector;

    StatSimilarity {
        score: crate::clamp01(score / weight_total.max(crate::EPSILON)),
        kd_similarity,
        kill_rate_similarity,
        score_per_round_similarity,
        map_vector_similarity,
        server_vector_similarity,
        rounds1: a.rounds,
        rounds2: b.rounds,
        insufficient_data: false,
    }
}

/// Cosine similarity restricted to the keys both players have played.
/// Keys are sorted before alignment so the result does not depend on hash
/// iteration order.
fn shared_key_cosine(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    let mut shared: Vec<&String> = a.keys().filter(|k| b.contains_key(*k)).collect();
    if shared.is_empty() {
        return 0.0;
    }
    shared.sort();

    let left: Vec<f64> = shared.iter().map(|k| a[*k]).collect();
    let right: Vec<f64> = shared.iter().map(|k| b[*k]).collect();

    cosine_similarity(&left, &right)
}
