//! Relational-store access behind traits so the sync driver and the
//! detection orchestrator can run against a test double.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::coplay::ObservationRow;
use crate::error::BackendError;
use crate::graph::ServerActivityUpdate;
use crate::models::{GraphSyncRun, Round, Server};

/// Everything the incremental sync driver needs from Postgres.
#[async_trait::async_trait]
pub trait SyncStorage: Send + Sync {
    /// Max `window_end` over completed runs, the resume point.
    async fn latest_watermark(&self) -> Result<Option<DateTime<Utc>>, BackendError>;

    /// Run id of a completed run overlapping the half-open `[from, to)`.
    async fn find_overlapping_run(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<String>, BackendError>;

    async fn create_run(&self, run: &GraphSyncRun) -> Result<(), BackendError>;

    /// Overwrites the progress counters of a running run.
    async fn update_run_progress(
        &self,
        run_id: &str,
        rounds_processed: i64,
        rounds_failed: i64,
        pairs_flushed: i64,
        players_seen: i64,
    ) -> Result<(), BackendError>;

    async fn finish_run(
        &self,
        run_id: &str,
        status: &str,
        finished_at: DateTime<Utc>,
    ) -> Result<(), BackendError>;

    /// Most recently started run, whatever its state.
    async fn latest_run(&self) -> Result<Option<GraphSyncRun>, BackendError>;

    /// One page of completed rounds inside `[from, to)`, ordered by
    /// `(started_at, round_id)` and resuming after `cursor`.
    async fn round_page(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        cursor: Option<(DateTime<Utc>, i64)>,
        page_size: i64,
    ) -> Result<Vec<Round>, BackendError>;

    async fn round_observations(&self, round_id: i64)
        -> Result<Vec<ObservationRow>, BackendError>;

    /// Grouped player→server activity for sessions starting in `[from, to)`.
    async fn session_aggregates(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ServerActivityUpdate>, BackendError>;

    /// All known servers, for the metadata upsert pass.
    async fn known_servers(&self) -> Result<Vec<Server>, BackendError>;
}

/// Windowed per-player aggregates feeding the detection engine.
#[async_trait::async_trait]
pub trait DetectStorage: Send + Sync {
    /// Aggregate performance line since `since`. Zero rounds on record
    /// comes back as the default line, not an error.
    async fn stat_line(
        &self,
        player: &str,
        since: DateTime<Utc>,
    ) -> Result<analysis::stats::PlayerStatLine, BackendError>;

    /// Grouped session behaviour since `since`.
    async fn behavior_profile(
        &self,
        player: &str,
        since: DateTime<Utc>,
    ) -> Result<analysis::behavior::BehaviorProfile, BackendError>;
}

/// Production implementation. Opens a fresh connection per operation, the
/// drivers hold no pool.
pub struct PgStorage {
    database_url: String,
}

impl PgStorage {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }

    async fn connection(&self) -> Result<diesel_async::AsyncPgConnection, BackendError> {
        crate::db_connection(&self.database_url).await
    }
}

#[derive(QueryableByName)]
struct SessionAggregateRow {
    #[diesel(sql_type = diesel::sql_types::Text)]
    player_name: String,
    #[diesel(sql_type = diesel::sql_types::Text)]
    server_guid: String,
    #[diesel(sql_type = diesel::sql_types::Int8)]
    sessions: i64,
    #[diesel(sql_type = diesel::sql_types::Float8)]
    minutes: f64,
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    last_seen: DateTime<Utc>,
}

#[derive(QueryableByName)]
struct HourBucketRow {
    #[diesel(sql_type = diesel::sql_types::Int4)]
    hour: i32,
    #[diesel(sql_type = diesel::sql_types::Int8)]
    sessions: i64,
}

#[derive(QueryableByName)]
struct SessionPatternRow {
    #[diesel(sql_type = diesel::sql_types::Int8)]
    sessions: i64,
    #[diesel(sql_type = diesel::sql_types::Float8)]
    avg_minutes: f64,
}

#[derive(QueryableByName)]
struct ServerPingRow {
    #[diesel(sql_type = diesel::sql_types::Text)]
    server_guid: String,
    #[diesel(sql_type = diesel::sql_types::Float8)]
    avg_ping: f64,
}

#[async_trait::async_trait]
impl SyncStorage for PgStorage {
    async fn latest_watermark(&self) -> Result<Option<DateTime<Utc>>, BackendError> {
        let mut conn = self.connection().await?;

        let watermark = crate::schema::graph_sync_runs::dsl::graph_sync_runs
            .filter(crate::schema::graph_sync_runs::dsl::status.eq("completed"))
            .select(diesel::dsl::max(
                crate::schema::graph_sync_runs::dsl::window_end,
            ))
            .first::<Option<DateTime<Utc>>>(&mut conn)
            .await?;

        Ok(watermark)
    }

    async fn find_overlapping_run(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<String>, BackendError> {
        let mut conn = self.connection().await?;

        let run_id = crate::schema::graph_sync_runs::dsl::graph_sync_runs
            .filter(crate::schema::graph_sync_runs::dsl::status.eq("completed"))
            .filter(crate::schema::graph_sync_runs::dsl::window_start.lt(to))
            .filter(crate::schema::graph_sync_runs::dsl::window_end.gt(from))
            .select(crate::schema::graph_sync_runs::dsl::run_id)
            .first::<String>(&mut conn)
            .await
            .optional()?;

        Ok(run_id)
    }

    async fn create_run(&self, run: &GraphSyncRun) -> Result<(), BackendError> {
        let mut conn = self.connection().await?;

        diesel::insert_into(crate::schema::graph_sync_runs::dsl::graph_sync_runs)
            .values(run)
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    async fn update_run_progress(
        &self,
        run_id: &str,
        rounds_processed: i64,
        rounds_failed: i64,
        pairs_flushed: i64,
        players_seen: i64,
    ) -> Result<(), BackendError> {
        let mut conn = self.connection().await?;

        diesel::update(
            crate::schema::graph_sync_runs::dsl::graph_sync_runs
                .filter(crate::schema::graph_sync_runs::dsl::run_id.eq(run_id)),
        )
        .set((
            crate::schema::graph_sync_runs::dsl::rounds_processed.eq(rounds_processed),
            crate::schema::graph_sync_runs::dsl::rounds_failed.eq(rounds_failed),
            crate::schema::graph_sync_runs::dsl::pairs_flushed.eq(pairs_flushed),
            crate::schema::graph_sync_runs::dsl::players_seen.eq(players_seen),
        ))
        .execute(&mut conn)
        .await?;

        Ok(())
    }

    async fn finish_run(
        &self,
        run_id: &str,
        status: &str,
        finished_at: DateTime<Utc>,
    ) -> Result<(), BackendError> {
        let mut conn = self.connection().await?;

        diesel::update(
            crate::schema::graph_sync_runs::dsl::graph_sync_runs
                .filter(crate::schema::graph_sync_runs::dsl::run_id.eq(run_id)),
        )
        .set((
            crate::schema::graph_sync_runs::dsl::status.eq(status),
            crate::schema::graph_sync_runs::dsl::finished_at.eq(Some(finished_at)),
        ))
        .execute(&mut conn)
        .await?;

        Ok(())
    }

    async fn latest_run(&self) -> Result<Option<GraphSyncRun>, BackendError> {
        let mut conn = self.connection().await?;

        let run = crate::schema::graph_sync_runs::dsl::graph_sync_runs
            .order_by(crate::schema::graph_sync_runs::dsl::started_at.desc())
            .select(GraphSyncRun::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        Ok(run)
    }

    async fn round_page(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        cursor: Option<(DateTime<Utc>, i64)>,
        page_size: i64,
    ) -> Result<Vec<Round>, BackendError> {
        let mut conn = self.connection().await?;

        let mut query = crate::schema::rounds::dsl::rounds
            .filter(crate::schema::rounds::dsl::started_at.ge(from))
            .filter(crate::schema::rounds::dsl::started_at.lt(to))
            .filter(crate::schema::rounds::dsl::ended_at.is_not_null())
            .select(Round::as_select())
            .into_boxed();

        if let Some((cursor_started, cursor_round)) = cursor {
            query = query.filter(
                crate::schema::rounds::dsl::started_at.gt(cursor_started).or(
                    crate::schema::rounds::dsl::started_at
                        .eq(cursor_started)
                        .and(crate::schema::rounds::dsl::round_id.gt(cursor_round)),
                ),
            );
        }

        let page = query
            .order_by((
                crate::schema::rounds::dsl::started_at.asc(),
                crate::schema::rounds::dsl::round_id.asc(),
            ))
            .limit(page_size)
            .load(&mut conn)
            .await?;

        Ok(page)
    }

    async fn round_observations(
        &self,
        round_id: i64,
    ) -> Result<Vec<ObservationRow>, BackendError> {
        let mut conn = self.connection().await?;

        crate::coplay::load_round_pairs(&mut conn, round_id).await
    }

    async fn session_aggregates(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ServerActivityUpdate>, BackendError> {
        let mut conn = self.connection().await?;

        let rows: Vec<SessionAggregateRow> = diesel::sql_query(
            "SELECT TRIM(player_name) AS player_name, server_guid, \
                    COUNT(*) AS sessions, \
                    COALESCE(SUM(EXTRACT(EPOCH FROM (ended_at - started_at)) / 60.0), 0)::float8 AS minutes, \
                    MAX(ended_at) AS last_seen \
             FROM player_sessions \
             WHERE started_at >= $1 AND started_at < $2 AND TRIM(player_name) <> '' \
             GROUP BY TRIM(player_name), server_guid",
        )
        .bind::<diesel::sql_types::Timestamptz, _>(from)
        .bind::<diesel::sql_types::Timestamptz, _>(to)
        .load(&mut conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ServerActivityUpdate {
                player: row.player_name,
                server_guid: row.server_guid,
                sessions: row.sessions,
                minutes: row.minutes,
                last_seen: row.last_seen,
            })
            .collect())
    }

    async fn known_servers(&self) -> Result<Vec<Server>, BackendError> {
        let mut conn = self.connection().await?;

        let servers = crate::schema::servers::dsl::servers
            .select(Server::as_select())
            .load(&mut conn)
            .await?;

        Ok(servers)
    }
}

#[async_trait::async_trait]
impl DetectStorage for PgStorage {
    #[tracing::instrument(skip(self))]
    async fn stat_line(
        &self,
        player: &str,
        since: DateTime<Utc>,
    ) -> Result<analysis::stats::PlayerStatLine, BackendError> {
        let mut conn = self.connection().await?;

        let (rounds, kills, deaths, score, minutes) =
            crate::schema::player_round_stats::dsl::player_round_stats
                .inner_join(crate::schema::rounds::dsl::rounds)
                .filter(crate::schema::player_round_stats::dsl::player_name.eq(player))
                .filter(crate::schema::rounds::dsl::started_at.ge(since))
                .select((
                    diesel::dsl::count_star(),
                    diesel::dsl::sum(crate::schema::player_round_stats::dsl::kills),
                    diesel::dsl::sum(crate::schema::player_round_stats::dsl::deaths),
                    diesel::dsl::sum(crate::schema::player_round_stats::dsl::score),
                    diesel::dsl::sum(crate::schema::player_round_stats::dsl::minutes_played),
                ))
                .first::<(i64, Option<i64>, Option<i64>, Option<i64>, Option<f64>)>(&mut conn)
                .await?;

        if rounds == 0 {
            return Ok(analysis::stats::PlayerStatLine::default());
        }

        let kills = kills.unwrap_or(0) as f64;
        let deaths = deaths.unwrap_or(0) as f64;
        let score = score.unwrap_or(0) as f64;
        let minutes = minutes.unwrap_or(0.0);

        let per_map: Vec<(String, Option<i64>, Option<i64>)> =
            crate::schema::player_round_stats::dsl::player_round_stats
                .inner_join(crate::schema::rounds::dsl::rounds)
                .filter(crate::schema::player_round_stats::dsl::player_name.eq(player))
                .filter(crate::schema::rounds::dsl::started_at.ge(since))
                .group_by(crate::schema::rounds::dsl::map_name)
                .select((
                    crate::schema::rounds::dsl::map_name,
                    diesel::dsl::sum(crate::schema::player_round_stats::dsl::kills),
                    diesel::dsl::sum(crate::schema::player_round_stats::dsl::deaths),
                ))
                .load(&mut conn)
                .await?;

        let per_server: Vec<(String, Option<i64>, Option<i64>)> =
            crate::schema::player_round_stats::dsl::player_round_stats
                .inner_join(crate::schema::rounds::dsl::rounds)
                .filter(crate::schema::player_round_stats::dsl::player_name.eq(player))
                .filter(crate::schema::rounds::dsl::started_at.ge(since))
                .group_by(crate::schema::rounds::dsl::server_guid)
                .select((
                    crate::schema::rounds::dsl::server_guid,
                    diesel::dsl::sum(crate::schema::player_round_stats::dsl::kills),
                    diesel::dsl::sum(crate::schema::player_round_stats::dsl::deaths),
                ))
                .load(&mut conn)
                .await?;

        Ok(analysis::stats::PlayerStatLine {
            rounds: rounds as u64,
            kd: kills / deaths.max(1.0),
            kills_per_minute: kills / minutes.max(1.0),
            score_per_round: score / rounds as f64,
            per_map_kd: per_map.into_iter().map(grouped_kd).collect(),
            per_server_kd: per_server.into_iter().map(grouped_kd).collect(),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn behavior_profile(
        &self,
        player: &str,
        since: DateTime<Utc>,
    ) -> Result<analysis::behavior::BehaviorProfile, BackendError> {
        let mut conn = self.connection().await?;

        let hour_rows: Vec<HourBucketRow> = diesel::sql_query(
            "SELECT CAST(EXTRACT(HOUR FROM (started_at AT TIME ZONE 'UTC')) AS int4) AS hour, \
                    COUNT(*) AS sessions \
             FROM player_sessions \
             WHERE player_name = $1 AND started_at >= $2 \
             GROUP BY 1",
        )
        .bind::<diesel::sql_types::Text, _>(player)
        .bind::<diesel::sql_types::Timestamptz, _>(since)
        .load(&mut conn)
        .await?;

        let mut hours = [0u64; analysis::behavior::HOUR_BUCKETS];
        for row in hour_rows {
            if let Some(bucket) = hours.get_mut(row.hour.rem_euclid(24) as usize) {
                *bucket += row.sessions.max(0) as u64;
            }
        }

        let pattern_row: SessionPatternRow = diesel::sql_query(
            "SELECT COUNT(*) AS sessions, \
                    COALESCE(AVG(EXTRACT(EPOCH FROM (ended_at - started_at)) / 60.0), 0)::float8 AS avg_minutes \
             FROM player_sessions \
             WHERE player_name = $1 AND started_at >= $2",
        )
        .bind::<diesel::sql_types::Text, _>(player)
        .bind::<diesel::sql_types::Timestamptz, _>(since)
        .get_result(&mut conn)
        .await?;

        let ping_rows: Vec<ServerPingRow> = diesel::sql_query(
            "SELECT server_guid, AVG(avg_ping)::float8 AS avg_ping \
             FROM player_sessions \
             WHERE player_name = $1 AND started_at >= $2 \
             GROUP BY server_guid",
        )
        .bind::<diesel::sql_types::Text, _>(player)
        .bind::<diesel::sql_types::Timestamptz, _>(since)
        .load(&mut conn)
        .await?;

        Ok(analysis::behavior::BehaviorProfile {
            hours,
            server_pings: ping_rows
                .into_iter()
                .map(|row| (row.server_guid, row.avg_ping))
                .collect(),
            pattern: analysis::behavior::SessionPattern {
                sessions: pattern_row.sessions.max(0) as u64,
                avg_minutes: pattern_row.avg_minutes,
            },
        })
    }
}

fn grouped_kd(row: (String, Option<i64>, Option<i64>)) -> (String, f64) {
    let (key, kills, deaths) = row;
    let kills = kills.unwrap_or(0) as f64;
    let deaths = deaths.unwrap_or(0) as f64;

    (key, kills / deaths.max(1.0))
}
