//! Turns raw per-round observations into co-play pairs and tallies.
//!
//! The poller stamps every observation of one poll tick with the same
//! timestamp, so two players on the same server with the same bucketed
//! timestamp were verifiably in the round together at that instant.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::error::BackendError;
use crate::graph::CoplayUpdate;

/// One observation row as loaded for pair extraction, already joined
/// with its round for the server guid.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRow {
    pub player_name: String,
    pub server_guid: String,
    pub observed_at: DateTime<Utc>,
    pub score: i32,
}

/// One co-occurrence of a pair in a single observation bucket. Names are
/// in canonical order, `player1 < player2`.
#[derive(Debug, Clone, PartialEq)]
pub struct PairObservation {
    pub player1: String,
    pub player2: String,
    pub server_guid: String,
    pub observed_at: DateTime<Utc>,
    /// Absolute score differential at that instant.
    pub score_diff: i64,
}

/// Loads the observation rows of one round, ordered by poll time.
#[tracing::instrument(skip(conn))]
pub async fn load_round_pairs(
    conn: &mut diesel_async::AsyncPgConnection,
    round_id: i64,
) -> Result<Vec<ObservationRow>, BackendError> {
    let rows: Vec<(String, String, DateTime<Utc>, i32)> =
        crate::schema::round_observations::dsl::round_observations
            .inner_join(crate::schema::rounds::dsl::rounds)
            .filter(crate::schema::round_observations::dsl::round_id.eq(round_id))
            .select((
                crate::schema::round_observations::dsl::player_name,
                crate::schema::rounds::dsl::server_guid,
                crate::schema::round_observations::dsl::observed_at,
                crate::schema::round_observations::dsl::score,
            ))
            .order_by(crate::schema::round_observations::dsl::observed_at.asc())
            .load(conn)
            .await?;

    Ok(rows
        .into_iter()
        .map(|(player_name, server_guid, observed_at, score)| ObservationRow {
            player_name,
            server_guid,
            observed_at,
            score,
        })
        .collect())
}

fn bucket_timestamp(at: DateTime<Utc>, bucket_seconds: u32) -> DateTime<Utc> {
    let step = i64::from(bucket_seconds.max(1));
    let truncated = at.timestamp().div_euclid(step) * step;

    DateTime::from_timestamp(truncated, 0).unwrap_or(at)
}

/// Groups rows into (server, poll bucket) cells. Names are trimmed and
/// empty ones dropped, a player observed twice in one cell keeps the
/// first score.
fn bucket_rows(
    rows: &[ObservationRow],
    bucket_seconds: u32,
) -> BTreeMap<(String, DateTime<Utc>), BTreeMap<String, i32>> {
    let mut buckets: BTreeMap<(String, DateTime<Utc>), BTreeMap<String, i32>> = BTreeMap::new();

    for row in rows {
        let name = row.player_name.trim();
        if name.is_empty() {
            continue;
        }

        let key = (
            row.server_guid.clone(),
            bucket_timestamp(row.observed_at, bucket_seconds),
        );
        buckets
            .entry(key)
            .or_default()
            .entry(name.to_string())
            .or_insert(row.score);
    }

    buckets
}

/// Emits every unordered pair that shares an observation bucket, once per
/// bucket. A cell holding players {a, b, c} yields (a,b), (a,c) and (b,c).
pub fn extract_pairs(rows: &[ObservationRow], bucket_seconds: u32) -> Vec<PairObservation> {
    let mut pairs = Vec::new();

    for ((server_guid, observed_at), players) in bucket_rows(rows, bucket_seconds) {
        let entries: Vec<(&String, &i32)> = players.iter().collect();
        for (i, (player1, score1)) in entries.iter().enumerate() {
            for (player2, score2) in entries.iter().skip(i + 1) {
                pairs.push(PairObservation {
                    player1: (*player1).clone(),
                    player2: (*player2).clone(),
                    server_guid: server_guid.clone(),
                    observed_at,
                    score_diff: (i64::from(**score1) - i64::from(**score2)).abs(),
                });
            }
        }
    }

    pairs
}

#[derive(Debug, Clone, PartialEq)]
struct PairTally {
    rounds: i64,
    observations: i64,
    score_diff_sum: i64,
    servers: BTreeSet<String>,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
struct PlayerTally {
    observations: i64,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

/// Per-player presence over the tallied rounds, drained alongside the
/// pair updates so players without any co-play still reach the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerPresence {
    pub player: String,
    pub observations: i64,
    pub minutes: f64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Accumulated pair and player counters. `tally_round` produces one per
/// round, the sync loop merges them into a window accumulator and drains
/// it at flush points. Merging is associative, so partial flushes plus a
/// final one add up to the same graph state as one big flush.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RoundTally {
    rounds: i64,
    pairs: BTreeMap<(String, String), PairTally>,
    players: BTreeMap<String, PlayerTally>,
}

impl RoundTally {
    /// Rounds folded into this tally so far.
    pub fn rounds(&self) -> i64 {
        self.rounds
    }

    /// Distinct pairs currently buffered.
    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty() && self.players.is_empty()
    }

    pub fn merge(&mut self, other: RoundTally) {
        self.rounds += other.rounds;

        for (key, incoming) in other.pairs {
            self.pairs
                .entry(key)
                .and_modify(|tally| {
                    tally.rounds += incoming.rounds;
                    tally.observations += incoming.observations;
                    tally.score_diff_sum += incoming.score_diff_sum;
                    tally.servers.extend(incoming.servers.iter().cloned());
                    tally.first_seen = tally.first_seen.min(incoming.first_seen);
                    tally.last_seen = tally.last_seen.max(incoming.last_seen);
                })
                .or_insert(incoming);
        }

        for (name, incoming) in other.players {
            self.players
                .entry(name)
                .and_modify(|tally| {
                    tally.observations += incoming.observations;
                    tally.first_seen = tally.first_seen.min(incoming.first_seen);
                    tally.last_seen = tally.last_seen.max(incoming.last_seen);
                })
                .or_insert(incoming);
        }
    }

    /// Empties the tally into graph updates. Minutes are derived from the
    /// bucket count, one bucket stands for one poll interval of presence.
    pub fn drain(&mut self, bucket_seconds: u32) -> (Vec<CoplayUpdate>, Vec<PlayerPresence>) {
        let bucket_minutes = f64::from(bucket_seconds) / 60.0;

        let coplay = std::mem::take(&mut self.pairs)
            .into_iter()
            .map(|((player1, player2), tally)| CoplayUpdate {
                player1,
                player2,
                sessions: tally.rounds,
                observations: tally.observations,
                minutes: tally.observations as f64 * bucket_minutes,
                score_diff_sum: tally.score_diff_sum,
                servers: tally.servers.into_iter().collect(),
                first_seen: tally.first_seen,
                last_seen: tally.last_seen,
            })
            .collect();

        let presence = std::mem::take(&mut self.players)
            .into_iter()
            .map(|(player, tally)| PlayerPresence {
                player,
                observations: tally.observations,
                minutes: tally.observations as f64 * bucket_minutes,
                first_seen: tally.first_seen,
                last_seen: tally.last_seen,
            })
            .collect();

        self.rounds = 0;

        (coplay, presence)
    }
}

/// Tallies one round worth of observations. Every pair present in the
/// round counts one session, regardless of how many buckets it shared.
pub fn tally_round(rows: &[ObservationRow], bucket_seconds: u32) -> RoundTally {
    let mut tally = RoundTally {
        rounds: 1,
        ..RoundTally::default()
    };

    for pair in extract_pairs(rows, bucket_seconds) {
        tally
            .pairs
            .entry((pair.player1, pair.player2))
            .and_modify(|entry| {
                entry.observations += 1;
                entry.score_diff_sum += pair.score_diff;
                entry.servers.insert(pair.server_guid.clone());
                entry.first_seen = entry.first_seen.min(pair.observed_at);
                entry.last_seen = entry.last_seen.max(pair.observed_at);
            })
            .or_insert_with(|| PairTally {
                rounds: 1,
                observations: 1,
                score_diff_sum: pair.score_diff,
                servers: BTreeSet::from([pair.server_guid]),
                first_seen: pair.observed_at,
                last_seen: pair.observed_at,
            });
    }

    for ((_, observed_at), players) in bucket_rows(rows, bucket_seconds) {
        for name in players.keys() {
            tally
                .players
                .entry(name.clone())
                .and_modify(|entry| {
                    entry.observations += 1;
                    entry.first_seen = entry.first_seen.min(observed_at);
                    entry.last_seen = entry.last_seen.max(observed_at);
                })
                .or_insert(PlayerTally {
                    observations: 1,
                    first_seen: observed_at,
                    last_seen: observed_at,
                });
        }
    }

    tally
}
