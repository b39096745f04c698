pub mod report;

pub use report::{
    BehaviorSimilarity, NetworkSimilarity, SimilarityReport, StatSimilarity, SubAnalyses,
    TemporalSimilarity,
};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub enum SuspicionLevel {
    Unrelated,
    Potential,
    Likely,
    VeryLikely,
}

impl std::fmt::Display for SuspicionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unrelated => write!(f, "unrelated"),
            Self::Potential => write!(f, "potential alias"),
            Self::Likely => write!(f, "likely alias"),
            Self::VeryLikely => write!(f, "very likely alias"),
        }
    }
}

/// Answer of `/api/sync/status`: how far the graph is caught up and what
/// the most recent run did.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SyncStatus {
    /// End of the last completed window, `None` before the first run.
    pub watermark: Option<chrono::DateTime<chrono::Utc>>,
    pub latest_run: Option<SyncRunSummary>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SyncRunSummary {
    pub run_id: String,
    pub window_start: chrono::DateTime<chrono::Utc>,
    pub window_end: chrono::DateTime<chrono::Utc>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    pub rounds_processed: i64,
    pub rounds_failed: i64,
    pub pairs_flushed: i64,
    pub players_seen: i64,
    pub status: String,
}
