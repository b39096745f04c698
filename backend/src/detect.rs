//! Comparison orchestrator. Fans out to the stat, session and graph
//! stores concurrently, degrades per signal when a store misbehaves and
//! fuses whatever survived into one report.

use std::sync::Arc;

use chrono::Utc;
use common::{SimilarityReport, SubAnalyses};

use analysis::network::{ActiveWindow, DirectEdge, NetworkInputs, TemporalInputs};

use crate::config::DetectConfig;
use crate::error::BackendError;
use crate::graph::GraphStore;
use crate::storage::DetectStorage;

/// Shared handles of the detection engine, cloned into every request.
#[derive(Clone)]
pub struct DetectDeps {
    pub storage: Arc<dyn DetectStorage>,
    pub graph: Arc<dyn GraphStore>,
    pub detect: DetectConfig,
    pub scoring: analysis::score::ScoringConfig,
}

/// Compares two accounts over the lookback window. Store failures and
/// timeouts drop the affected signals and are reported in
/// `degraded_signals`, only invalid input is an error.
#[tracing::instrument(skip(deps))]
pub async fn compare(
    deps: &DetectDeps,
    player1: &str,
    player2: &str,
    lookback_days: Option<u32>,
) -> Result<SimilarityReport, BackendError> {
    let player1 = player1.trim();
    let player2 = player2.trim();
    if player1.is_empty() || player2.is_empty() {
        return Err(BackendError::InvalidInput(
            "player names must not be empty".to_string(),
        ));
    }
    if player1 == player2 {
        return Err(BackendError::InvalidInput(
            "cannot compare a player with itself".to_string(),
        ));
    }

    let lookback_days = lookback_days
        .unwrap_or(deps.detect.lookback_days_default)
        .clamp(1, deps.detect.lookback_days_max);
    let generated_at = Utc::now();
    let since = generated_at - chrono::Duration::days(i64::from(lookback_days));
    let limit = std::time::Duration::from_millis(deps.detect.store_timeout_ms);

    let (stat_result, behavior_result, graph_result) = tokio::join!(
        stat_signal(deps, player1, player2, since, limit),
        behavior_signal(deps, player1, player2, since, limit),
        graph_signals(deps, player1, player2, limit),
    );

    let mut sub_analyses = SubAnalyses::default();
    let mut degraded_signals = Vec::new();

    match stat_result {
        Ok(stat) => sub_analyses.stat = Some(stat),
        Err(error) => {
            tracing::warn!(player1, player2, ?error, "Stat signal degraded");
            degraded_signals.push("stats".to_string());
        }
    }
    match behavior_result {
        Ok(behavior) => sub_analyses.behavior = Some(behavior),
        Err(error) => {
            tracing::warn!(player1, player2, ?error, "Behavior signal degraded");
            degraded_signals.push("behavior".to_string());
        }
    }
    match graph_result {
        Ok((network, temporal)) => {
            sub_analyses.network = Some(network);
            sub_analyses.temporal = Some(temporal);
        }
        Err(error) => {
            tracing::warn!(player1, player2, ?error, "Graph signals degraded");
            degraded_signals.push("network".to_string());
            degraded_signals.push("temporal".to_string());
        }
    }

    Ok(analysis::score::build_report(
        &deps.scoring,
        player1.to_string(),
        player2.to_string(),
        lookback_days,
        sub_analyses,
        degraded_signals,
        generated_at,
    ))
}

async fn stat_signal(
    deps: &DetectDeps,
    player1: &str,
    player2: &str,
    since: chrono::DateTime<Utc>,
    limit: std::time::Duration,
) -> Result<common::StatSimilarity, BackendError> {
    let (line1, line2) = tokio::time::timeout(limit, async {
        let line1 = deps.storage.stat_line(player1, since).await?;
        let line2 = deps.storage.stat_line(player2, since).await?;
        Ok::<_, BackendError>((line1, line2))
    })
    .await
    .map_err(|_| BackendError::StoreTimeout {
        store: "stat store",
        limit,
    })??;

    Ok(analysis::stats::compare(&deps.scoring.stat, &line1, &line2))
}

async fn behavior_signal(
    deps: &DetectDeps,
    player1: &str,
    player2: &str,
    since: chrono::DateTime<Utc>,
    limit: std::time::Duration,
) -> Result<common::BehaviorSimilarity, BackendError> {
    let (profile1, profile2) = tokio::time::timeout(limit, async {
        let profile1 = deps.storage.behavior_profile(player1, since).await?;
        let profile2 = deps.storage.behavior_profile(player2, since).await?;
        Ok::<_, BackendError>((profile1, profile2))
    })
    .await
    .map_err(|_| BackendError::StoreTimeout {
        store: "session store",
        limit,
    })??;

    Ok(analysis::behavior::compare(
        &deps.scoring.behavior,
        &profile1,
        &profile2,
    ))
}

async fn graph_signals(
    deps: &DetectDeps,
    player1: &str,
    player2: &str,
    limit: std::time::Duration,
) -> Result<(common::NetworkSimilarity, common::TemporalSimilarity), BackendError> {
    let (mut teammates1, mut teammates2, edge, activity1, activity2) =
        tokio::time::timeout(limit, async {
            let teammates1 = deps.graph.teammates_of(player1).await?;
            let teammates2 = deps.graph.teammates_of(player2).await?;
            let edge = deps.graph.edge_stats(player1, player2).await?;
            let activity1 = deps.graph.player_activity(player1).await?;
            let activity2 = deps.graph.player_activity(player2).await?;
            Ok::<_, BackendError>((teammates1, teammates2, edge, activity1, activity2))
        })
        .await
        .map_err(|_| BackendError::StoreTimeout {
            store: "graph store",
            limit,
        })??;

    // The pair itself never counts towards its own teammate overlap.
    teammates1.remove(player2);
    teammates2.remove(player1);

    let network = analysis::network::compare(
        &deps.scoring.network,
        &NetworkInputs {
            teammates1,
            teammates2,
        },
    );
    let temporal = analysis::network::temporal(
        &deps.scoring.network,
        &TemporalInputs {
            edge: edge.map(|edge| DirectEdge {
                sessions: edge.sessions.max(0) as u64,
                minutes: edge.minutes,
                first_seen: edge.first_seen,
                last_seen: edge.last_seen,
            }),
            window1: activity1.map(|activity| ActiveWindow {
                first_seen: activity.first_seen,
                last_seen: activity.last_seen,
            }),
            window2: activity2.map(|activity| ActiveWindow {
                first_seen: activity.first_seen,
                last_seen: activity.last_seen,
            }),
        },
    );

    Ok((network, temporal))
}
