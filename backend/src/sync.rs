//! Incremental sync run. Pages completed rounds out of the relational
//! store, folds them into co-play tallies and flushes the result into the
//! relationship graph, advancing a durable watermark on success.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use futures::StreamExt;

use crate::config::SyncConfig;
use crate::coplay;
use crate::error::BackendError;
use crate::graph::GraphStore;
use crate::models::GraphSyncRun;
use crate::storage::SyncStorage;

/// Window selection for one run.
#[derive(Debug, Clone, Copy)]
pub enum SyncWindow {
    /// Continue from the latest completed watermark up to now.
    Resume,
    /// The last `days` days up to now.
    Days(u32),
    /// Explicit half-open window `[from, to)`.
    Explicit {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct SyncRequest {
    pub window: SyncWindow,
    /// Run even when a completed run already covered part of the window.
    pub force: bool,
    /// Drop empty-name player nodes after the window is applied.
    pub purge: bool,
}

/// What one run did. Failed rounds leave gaps in the window, the counters
/// make those visible instead of silently shrinking the data.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub run_id: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub rounds_processed: i64,
    pub rounds_failed: i64,
    pub pairs_flushed: i64,
    pub players_seen: i64,
    pub purged_players: i64,
}

/// Runs one sync over the resolved window. The run row is created up
/// front with status `running` and finished as `completed` or `failed`,
/// only completed runs advance the watermark.
#[tracing::instrument(skip(storage, graph, config))]
pub async fn run(
    storage: &dyn SyncStorage,
    graph: &dyn GraphStore,
    config: &SyncConfig,
    request: SyncRequest,
) -> Result<SyncOutcome, BackendError> {
    let (from, to) = resolve_window(storage, request.window).await?;

    if let Some(previous) = storage.find_overlapping_run(from, to).await? {
        if request.force {
            tracing::warn!(
                run_id = previous,
                "Window overlaps an already completed run, resyncing anyway"
            );
        } else {
            return Err(BackendError::SyncOverlap(previous));
        }
    }

    let run_id = uuid::Uuid::now_v7().to_string();
    storage
        .create_run(&GraphSyncRun {
            run_id: run_id.clone(),
            window_start: from,
            window_end: to,
            started_at: Utc::now(),
            finished_at: None,
            rounds_processed: 0,
            rounds_failed: 0,
            pairs_flushed: 0,
            players_seen: 0,
            status: "running".to_string(),
        })
        .await?;

    tracing::info!(run_id, %from, %to, "Starting graph sync run");

    match execute(storage, graph, config, &run_id, from, to, request.purge).await {
        Ok(outcome) => {
            storage.finish_run(&run_id, "completed", Utc::now()).await?;
            tracing::info!(
                run_id,
                rounds_processed = outcome.rounds_processed,
                rounds_failed = outcome.rounds_failed,
                pairs_flushed = outcome.pairs_flushed,
                players_seen = outcome.players_seen,
                "Sync run completed"
            );
            Ok(outcome)
        }
        Err(error) => {
            tracing::error!(run_id, ?error, "Sync run failed");
            if let Err(finish_error) = storage.finish_run(&run_id, "failed", Utc::now()).await {
                tracing::error!(run_id, ?finish_error, "Marking the run as failed did not stick");
            }
            Err(error)
        }
    }
}

async fn resolve_window(
    storage: &dyn SyncStorage,
    window: SyncWindow,
) -> Result<(DateTime<Utc>, DateTime<Utc>), BackendError> {
    let now = Utc::now();

    match window {
        SyncWindow::Explicit { from, to } => {
            if from >= to {
                return Err(BackendError::InvalidInput(
                    "sync window is empty, --from must lie before --to".to_string(),
                ));
            }
            Ok((from, to))
        }
        SyncWindow::Days(days) => {
            if days == 0 {
                return Err(BackendError::InvalidInput(
                    "--window-days must be at least 1".to_string(),
                ));
            }
            Ok((now - chrono::Duration::days(i64::from(days)), now))
        }
        SyncWindow::Resume => {
            let watermark = storage.latest_watermark().await?.ok_or_else(|| {
                BackendError::InvalidInput(
                    "no completed run to resume from, pass --from/--to or --window-days"
                        .to_string(),
                )
            })?;
            Ok((watermark, now))
        }
    }
}

async fn execute(
    storage: &dyn SyncStorage,
    graph: &dyn GraphStore,
    config: &SyncConfig,
    run_id: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    purge: bool,
) -> Result<SyncOutcome, BackendError> {
    let mut state = FlushState {
        graph,
        bucket_seconds: config.bucket_seconds,
        accumulator: coplay::RoundTally::default(),
        rounds_processed: 0,
        rounds_failed: 0,
        pairs_flushed: 0,
        players: BTreeSet::new(),
        rounds_since_flush: 0,
    };
    let mut cursor = None;

    loop {
        let page = storage
            .round_page(from, to, cursor, config.page_size)
            .await?;
        let Some(last) = page.last() else { break };
        cursor = Some((last.started_at, last.round_id));

        let mut loaded_rounds = futures::stream::iter(page.iter().map(|round| {
            let round_id = round.round_id;
            async move { (round_id, storage.round_observations(round_id).await) }
        }))
        .buffer_unordered(config.round_concurrency.max(1));

        while let Some((round_id, loaded)) = loaded_rounds.next().await {
            match loaded {
                Ok(rows) => {
                    state
                        .accumulator
                        .merge(coplay::tally_round(&rows, config.bucket_seconds));
                    state.rounds_processed += 1;
                    state.rounds_since_flush += 1;
                }
                Err(error) => {
                    tracing::error!(round_id, ?error, "Loading round observations failed, skipping the round");
                    state.rounds_failed += 1;
                }
            }

            if state.flush_due(config) {
                state.flush().await;
                persist_progress(storage, run_id, &state).await;
            }
        }
    }

    state.flush().await;

    for server in storage.known_servers().await? {
        graph
            .upsert_server(&server.server_guid, &server.server_name, &server.game)
            .await?;
    }

    let activity = storage.session_aggregates(from, to).await?;
    if !activity.is_empty() {
        tracing::debug!(rows = activity.len(), "Applying player to server activity");
        graph.apply_server_activity(&activity).await?;
    }

    let purged_players = if purge {
        graph.purge_unnamed_players().await?
    } else {
        0
    };

    persist_progress(storage, run_id, &state).await;

    Ok(SyncOutcome {
        run_id: run_id.to_string(),
        window_start: from,
        window_end: to,
        rounds_processed: state.rounds_processed,
        rounds_failed: state.rounds_failed,
        pairs_flushed: state.pairs_flushed,
        players_seen: state.players.len() as i64,
        purged_players,
    })
}

/// Run-local accumulator. Rounds feed it concurrently but every flush is
/// serialized, the graph only ever sees one batch at a time.
struct FlushState<'r> {
    graph: &'r dyn GraphStore,
    bucket_seconds: u32,
    accumulator: coplay::RoundTally,
    rounds_processed: i64,
    rounds_failed: i64,
    pairs_flushed: i64,
    players: BTreeSet<String>,
    rounds_since_flush: usize,
}

impl FlushState<'_> {
    fn flush_due(&self, config: &SyncConfig) -> bool {
        self.rounds_since_flush >= config.flush_rounds
            || self.accumulator.pair_count() >= config.flush_relationships
    }

    /// Drains the accumulator into the graph. A failed batch is dropped
    /// and its rounds are booked as failed so the gap shows up in the
    /// outcome, the run itself keeps going.
    async fn flush(&mut self) {
        if self.accumulator.rounds() == 0 && self.accumulator.is_empty() {
            self.rounds_since_flush = 0;
            return;
        }

        let batch_rounds = self.accumulator.rounds();
        let (updates, presences) = self.accumulator.drain(self.bucket_seconds);
        self.rounds_since_flush = 0;

        if let Err(error) = self.graph.apply_coplay_batch(&updates).await {
            tracing::error!(
                batch_rounds,
                pairs = updates.len(),
                ?error,
                "Flushing co-play batch failed, the window keeps a gap"
            );
            self.rounds_processed -= batch_rounds;
            self.rounds_failed += batch_rounds;
            return;
        }
        self.pairs_flushed += updates.len() as i64;

        // Only players whose batch actually landed count towards the run.
        for presence in presences {
            self.players.insert(presence.player.clone());
            if let Err(error) = self
                .graph
                .upsert_player(
                    &presence.player,
                    presence.first_seen,
                    presence.last_seen,
                    presence.minutes,
                )
                .await
            {
                tracing::error!(player = presence.player, ?error, "Updating player presence failed");
            }
        }
    }
}

async fn persist_progress(storage: &dyn SyncStorage, run_id: &str, state: &FlushState<'_>) {
    if let Err(error) = storage
        .update_run_progress(
            run_id,
            state.rounds_processed,
            state.rounds_failed,
            state.pairs_flushed,
            state.players.len() as i64,
        )
        .await
    {
        tracing::warn!(run_id, ?error, "Persisting sync progress failed");
    }
}
