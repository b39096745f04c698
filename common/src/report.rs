use crate::SuspicionLevel;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SimilarityReport {
    pub player1: String,
    pub player2: String,
    pub lookback_days: u32,
    pub overall_score: f64,
    pub suspicion: SuspicionLevel,
    pub confidence: f64,
    pub sub_analyses: SubAnalyses,
    pub red_flags: Vec<String>,
    pub green_flags: Vec<String>,
    pub degraded_signals: Vec<String>,
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct SubAnalyses {
    pub stat: Option<StatSimilarity>,
    pub behavior: Option<BehaviorSimilarity>,
    pub network: Option<NetworkSimilarity>,
    pub temporal: Option<TemporalSimilarity>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StatSimilarity {
    pub score: f64,
    pub kd_similarity: f64,
    pub kill_rate_similarity: f64,
    pub score_per_round_similarity: f64,
    pub map_vector_similarity: f64,
    pub server_vector_similarity: f64,
    pub rounds1: u64,
    pub rounds2: u64,
    pub insufficient_data: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BehaviorSimilarity {
    pub score: f64,
    pub hour_overlap: f64,
    pub server_affinity: f64,
    pub ping_consistency: f64,
    pub session_pattern: f64,
    pub sessions1: u64,
    pub sessions2: u64,
    pub common_servers: u64,
    pub insufficient_data: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NetworkSimilarity {
    pub score: f64,
    pub teammate_jaccard: f64,
    pub degree_similarity: f64,
    pub teammates1: u64,
    pub teammates2: u64,
    pub shared_teammates: u64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TemporalSimilarity {
    pub score: f64,
    pub direct_sessions: u64,
    pub minutes_together: f64,
    pub active_overlap: f64,
    pub windows_inverted: bool,
}
