use diesel::prelude::*;

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::rounds)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Round {
    pub round_id: i64,
    pub server_guid: String,
    pub map_name: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::round_observations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RoundObservation {
    pub id: i64,
    pub round_id: i64,
    pub player_name: String,
    pub team: i16,
    pub ping: i16,
    pub score: i32,
    pub observed_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::player_sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PlayerSession {
    pub session_id: i64,
    pub player_name: String,
    pub server_guid: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub ended_at: chrono::DateTime<chrono::Utc>,
    pub avg_ping: i16,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::player_round_stats)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PlayerRoundStat {
    pub round_id: i64,
    pub player_name: String,
    pub kills: i16,
    pub deaths: i16,
    pub score: i32,
    pub minutes_played: f64,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::servers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Server {
    pub server_guid: String,
    pub server_name: String,
    pub game: String,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::graph_sync_runs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct GraphSyncRun {
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

impl GraphSyncRun {
    pub fn to_summary(&self) -> common::SyncRunSummary {
        common::SyncRunSummary {
            run_id: self.run_id.clone(),
            window_start: self.window_start,
            window_end: self.window_end,
            started_at: self.started_at,
            finished_at: self.finished_at,
            rounds_processed: self.rounds_processed,
            rounds_failed: self.rounds_failed,
            pairs_flushed: self.pairs_flushed,
            players_seen: self.players_seen,
            status: self.status.clone(),
        }
    }
}
