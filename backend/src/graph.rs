use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::error::BackendError;

pub mod memory;
pub mod neo4j;

/// One accumulated PLAYED_WITH update, already in canonical direction
/// (`player1 < player2`). Counters are deltas, the store adds them onto
/// whatever the edge already carries.
#[derive(Debug, Clone, PartialEq)]
pub struct CoplayUpdate {
    pub player1: String,
    pub player2: String,
    /// Rounds in which the pair shared at least one observation bucket.
    pub sessions: i64,
    /// Observation buckets the pair shared, the weight behind
    /// `score_diff_sum` and the minutes counter.
    pub observations: i64,
    pub minutes: f64,
    /// Summed absolute score differential over all shared buckets.
    pub score_diff_sum: i64,
    /// Distinct servers the co-play happened on, sorted and deduplicated.
    pub servers: Vec<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// One accumulated PLAYS_ON update for a player on a server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerActivityUpdate {
    pub player: String,
    pub server_guid: String,
    pub sessions: i64,
    pub minutes: f64,
    pub last_seen: DateTime<Utc>,
}

/// Accumulated state of one PLAYED_WITH edge as stored in the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeStats {
    pub sessions: i64,
    pub observations: i64,
    pub minutes: f64,
    /// Running average of the absolute score differential, weighted by
    /// the observation count.
    pub avg_score_diff: f64,
    pub servers: Vec<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerActivity {
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Number of distinct PLAYED_WITH partners.
    pub degree: i64,
}

/// Results of a graph consistency sweep, see `verify_graph`.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct GraphInventory {
    pub players: i64,
    pub edges: i64,
    pub reversed_edges: i64,
    /// Edges with `last_seen < first_seen` or a negative counter.
    pub timeline_violations: i64,
    pub inconsistent_pairs: Vec<(String, String)>,
}

impl GraphInventory {
    pub fn is_consistent(&self) -> bool {
        self.reversed_edges == 0
            && self.timeline_violations == 0
            && self.inconsistent_pairs.is_empty()
    }
}

/// Store holding the player relationship graph. The real implementation
/// talks to Neo4j, tests swap in the in-memory one.
#[async_trait::async_trait]
pub trait GraphStore: Send + Sync {
    /// Creates the player node if it is missing, widens its seen window and
    /// adds `minutes` onto its play time.
    async fn upsert_player(
        &self,
        name: &str,
        first_seen: DateTime<Utc>,
        last_seen: DateTime<Utc>,
        minutes: f64,
    ) -> Result<(), BackendError>;

    /// Creates the server node if it is missing, refreshing its display
    /// name and game where known.
    async fn upsert_server(&self, guid: &str, name: &str, game: &str)
        -> Result<(), BackendError>;

    /// Applies one batch of canonical pair updates as a single atomic unit:
    /// either every delta lands or none does, so a failed flush can be
    /// re-synced without double counting. Player nodes are upserted as a
    /// side effect so an edge never dangles.
    async fn apply_coplay_batch(&self, updates: &[CoplayUpdate]) -> Result<(), BackendError>;

    /// Applies one batch of player→server activity updates.
    async fn apply_server_activity(
        &self,
        updates: &[ServerActivityUpdate],
    ) -> Result<(), BackendError>;

    /// All PLAYED_WITH partners of a player, regardless of edge direction.
    async fn teammates_of(&self, player: &str) -> Result<BTreeSet<String>, BackendError>;

    /// Edge counters between two players, `None` when they never co-played.
    /// Callers may pass the pair in either order.
    async fn edge_stats(&self, player1: &str, player2: &str)
        -> Result<Option<EdgeStats>, BackendError>;

    async fn has_direct_edge(&self, player1: &str, player2: &str) -> Result<bool, BackendError> {
        Ok(self.edge_stats(player1, player2).await?.is_some())
    }

    /// First/last activity and partner degree, `None` for unknown players.
    async fn player_activity(&self, player: &str)
        -> Result<Option<PlayerActivity>, BackendError>;

    async fn count_players(&self) -> Result<i64, BackendError>;

    async fn count_edges(&self) -> Result<i64, BackendError>;

    /// Edges stored against the canonical direction. Anything non-zero here
    /// means a writer bypassed the ordering rule.
    async fn count_reversed_edges(&self) -> Result<i64, BackendError>;

    /// Edges whose timeline ran backwards or whose counters went negative.
    async fn count_timeline_violations(&self) -> Result<i64, BackendError>;

    /// Pairs connected by edges in both directions, up to `limit`.
    async fn find_inconsistent_edges(
        &self,
        limit: i64,
    ) -> Result<Vec<(String, String)>, BackendError>;

    /// Removes player nodes with an empty name together with their edges,
    /// returning how many were dropped.
    async fn purge_unnamed_players(&self) -> Result<i64, BackendError>;
}

/// Orders a pair into the canonical direction used for PLAYED_WITH edges.
pub fn canonical_pair<'p>(player1: &'p str, player2: &'p str) -> (&'p str, &'p str) {
    if player1 <= player2 {
        (player1, player2)
    } else {
        (player2, player1)
    }
}

/// Runs the full consistency sweep used by the verify command. The sweep
/// only reports, a broken edge is never repaired in place.
pub async fn verify_graph(
    store: &dyn GraphStore,
    limit: i64,
) -> Result<GraphInventory, BackendError> {
    let players = store.count_players().await?;
    let edges = store.count_edges().await?;
    let reversed_edges = store.count_reversed_edges().await?;
    let timeline_violations = store.count_timeline_violations().await?;
    let inconsistent_pairs = store.find_inconsistent_edges(limit).await?;

    Ok(GraphInventory {
        players,
        edges,
        reversed_edges,
        timeline_violations,
        inconsistent_pairs,
    })
}
