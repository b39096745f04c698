use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};

use crate::error::BackendError;
use crate::graph::{
    CoplayUpdate, EdgeStats, GraphStore, PlayerActivity, ServerActivityUpdate,
};

#[derive(Debug, Clone, Copy)]
struct PlayerNode {
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    total_minutes: f64,
}

#[derive(Debug, Clone, Copy)]
struct ServerEdge {
    sessions: i64,
    minutes: f64,
    last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct ServerNode {
    name: String,
    game: String,
}

#[derive(Default)]
struct MemoryState {
    players: HashMap<String, PlayerNode>,
    servers: HashMap<String, ServerNode>,
    coplay: BTreeMap<(String, String), EdgeStats>,
    plays_on: BTreeMap<(String, String), ServerEdge>,
}

/// In-memory stand-in for the Neo4j store. Edges are keyed exactly as
/// written, so a writer violating the canonical direction shows up in
/// `count_reversed_edges` just like it would in the real graph.
#[derive(Default)]
pub struct MemoryGraph {
    state: tokio::sync::Mutex<MemoryState>,
    offline: AtomicBool,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following call fail like an unreachable store.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), BackendError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(BackendError::GraphUnavailable(
                "memory store marked offline".to_string(),
            ));
        }
        Ok(())
    }

    /// Every stored PLAYED_WITH edge with its key, for test assertions.
    pub async fn coplay_edges(&self) -> Vec<((String, String), EdgeStats)> {
        let state = self.state.lock().await;
        state
            .coplay
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Every stored PLAYS_ON accumulation as (player, server, sessions, minutes).
    pub async fn server_activity(&self) -> Vec<(String, String, i64, f64)> {
        let state = self.state.lock().await;
        state
            .plays_on
            .iter()
            .map(|((player, guid), edge)| {
                (player.clone(), guid.clone(), edge.sessions, edge.minutes)
            })
            .collect()
    }

    /// Accumulated play minutes of one player node, for test assertions.
    pub async fn player_minutes(&self, player: &str) -> Option<f64> {
        let state = self.state.lock().await;
        state.players.get(player).map(|node| node.total_minutes)
    }
}

fn widen_player(
    players: &mut HashMap<String, PlayerNode>,
    name: &str,
    first: DateTime<Utc>,
    last: DateTime<Utc>,
    minutes: f64,
) {
    players
        .entry(name.to_string())
        .and_modify(|node| {
            node.first_seen = node.first_seen.min(first);
            node.last_seen = node.last_seen.max(last);
            node.total_minutes += minutes;
        })
        .or_insert(PlayerNode {
            first_seen: first,
            last_seen: last,
            total_minutes: minutes,
        });
}

#[async_trait::async_trait]
impl GraphStore for MemoryGraph {
    async fn upsert_player(
        &self,
        name: &str,
        first_seen: DateTime<Utc>,
        last_seen: DateTime<Utc>,
        minutes: f64,
    ) -> Result<(), BackendError> {
        self.check_online()?;
        if name.is_empty() {
            return Err(BackendError::InvalidInput(
                "player name must not be empty".to_string(),
            ));
        }

        let mut state = self.state.lock().await;
        widen_player(&mut state.players, name, first_seen, last_seen, minutes);

        Ok(())
    }

    async fn upsert_server(&self, guid: &str, name: &str, game: &str) -> Result<(), BackendError> {
        self.check_online()?;
        if guid.is_empty() {
            return Err(BackendError::InvalidInput(
                "server guid must not be empty".to_string(),
            ));
        }

        let mut state = self.state.lock().await;
        let entry = state.servers.entry(guid.to_string()).or_default();
        if !name.is_empty() {
            entry.name = name.to_string();
        }
        if !game.is_empty() {
            entry.game = game.to_string();
        }

        Ok(())
    }

    async fn apply_coplay_batch(&self, updates: &[CoplayUpdate]) -> Result<(), BackendError> {
        self.check_online()?;
        let mut state = self.state.lock().await;

        for update in updates {
            if update.observations <= 0 {
                continue;
            }

            widen_player(
                &mut state.players,
                &update.player1,
                update.first_seen,
                update.last_seen,
                0.0,
            );
            widen_player(
                &mut state.players,
                &update.player2,
                update.first_seen,
                update.last_seen,
                0.0,
            );

            state
                .coplay
                .entry((update.player1.clone(), update.player2.clone()))
                .and_modify(|edge| {
                    edge.avg_score_diff = (edge.avg_score_diff * edge.observations as f64
                        + update.score_diff_sum as f64)
                        / (edge.observations + update.observations) as f64;
                    edge.sessions += update.sessions;
                    edge.observations += update.observations;
                    edge.minutes += update.minutes;
                    for server in &update.servers {
                        if !edge.servers.contains(server) {
                            edge.servers.push(server.clone());
                        }
                    }
                    edge.first_seen = edge.first_seen.min(update.first_seen);
                    edge.last_seen = edge.last_seen.max(update.last_seen);
                })
                .or_insert(EdgeStats {
                    sessions: update.sessions,
                    observations: update.observations,
                    minutes: update.minutes,
                    avg_score_diff: update.score_diff_sum as f64 / update.observations as f64,
                    servers: update.servers.clone(),
                    first_seen: update.first_seen,
                    last_seen: update.last_seen,
                });
        }

        Ok(())
    }

    async fn apply_server_activity(
        &self,
        updates: &[ServerActivityUpdate],
    ) -> Result<(), BackendError> {
        self.check_online()?;
        let mut state = self.state.lock().await;

        for update in updates {
            widen_player(
                &mut state.players,
                &update.player,
                update.last_seen,
                update.last_seen,
                0.0,
            );
            state.servers.entry(update.server_guid.clone()).or_default();

            state
                .plays_on
                .entry((update.player.clone(), update.server_guid.clone()))
                .and_modify(|edge| {
                    edge.sessions += update.sessions;
                    edge.minutes += update.minutes;
                    edge.last_seen = edge.last_seen.max(update.last_seen);
                })
                .or_insert(ServerEdge {
                    sessions: update.sessions,
                    minutes: update.minutes,
                    last_seen: update.last_seen,
                });
        }

        Ok(())
    }

    async fn teammates_of(&self, player: &str) -> Result<BTreeSet<String>, BackendError> {
        self.check_online()?;
        let state = self.state.lock().await;

        let mut teammates = BTreeSet::new();
        for (p1, p2) in state.coplay.keys() {
            if p1 == player {
                teammates.insert(p2.clone());
            } else if p2 == player {
                teammates.insert(p1.clone());
            }
        }

        Ok(teammates)
    }

    async fn edge_stats(
        &self,
        player1: &str,
        player2: &str,
    ) -> Result<Option<EdgeStats>, BackendError> {
        self.check_online()?;
        let state = self.state.lock().await;

        let forward = (player1.to_string(), player2.to_string());
        let backward = (player2.to_string(), player1.to_string());

        Ok(state
            .coplay
            .get(&forward)
            .or_else(|| state.coplay.get(&backward))
            .cloned())
    }

    async fn player_activity(
        &self,
        player: &str,
    ) -> Result<Option<PlayerActivity>, BackendError> {
        self.check_online()?;
        let state = self.state.lock().await;

        let node = match state.players.get(player) {
            Some(node) => *node,
            None => return Ok(None),
        };
        let degree = state
            .coplay
            .keys()
            .filter(|(p1, p2)| p1 == player || p2 == player)
            .count() as i64;

        Ok(Some(PlayerActivity {
            first_seen: node.first_seen,
            last_seen: node.last_seen,
            degree,
        }))
    }

    async fn count_players(&self) -> Result<i64, BackendError> {
        self.check_online()?;
        let state = self.state.lock().await;
        Ok(state.players.len() as i64)
    }

    async fn count_edges(&self) -> Result<i64, BackendError> {
        self.check_online()?;
        let state = self.state.lock().await;
        Ok(state.coplay.len() as i64)
    }

    async fn count_reversed_edges(&self) -> Result<i64, BackendError> {
        self.check_online()?;
        let state = self.state.lock().await;
        Ok(state.coplay.keys().filter(|(p1, p2)| p1 > p2).count() as i64)
    }

    async fn count_timeline_violations(&self) -> Result<i64, BackendError> {
        self.check_online()?;
        let state = self.state.lock().await;

        let coplay = state
            .coplay
            .values()
            .filter(|edge| {
                edge.last_seen < edge.first_seen
                    || edge.sessions < 0
                    || edge.observations < 0
                    || edge.minutes < 0.0
            })
            .count();
        let server = state
            .plays_on
            .values()
            .filter(|edge| edge.sessions < 0 || edge.minutes < 0.0)
            .count();

        Ok((coplay + server) as i64)
    }

    async fn find_inconsistent_edges(
        &self,
        limit: i64,
    ) -> Result<Vec<(String, String)>, BackendError> {
        self.check_online()?;
        let state = self.state.lock().await;

        let mut pairs = Vec::new();
        for (p1, p2) in state.coplay.keys() {
            if p1 < p2 && state.coplay.contains_key(&(p2.clone(), p1.clone())) {
                pairs.push((p1.clone(), p2.clone()));
                if pairs.len() as i64 >= limit {
                    break;
                }
            }
        }

        Ok(pairs)
    }

    async fn purge_unnamed_players(&self) -> Result<i64, BackendError> {
        self.check_online()?;
        let mut state = self.state.lock().await;

        if state.players.remove("").is_none() {
            return Ok(0);
        }

        state
            .coplay
            .retain(|(p1, p2), _| !p1.is_empty() && !p2.is_empty());
        state.plays_on.retain(|(player, _), _| !player.is_empty());

        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
    }

    fn update(p1: &str, p2: &str, sessions: i64, minutes: f64, day: u32) -> CoplayUpdate {
        CoplayUpdate {
            player1: p1.to_string(),
            player2: p2.to_string(),
            sessions,
            observations: sessions,
            minutes,
            score_diff_sum: 0,
            servers: vec!["srv-1".to_string()],
            first_seen: at(day, 18),
            last_seen: at(day, 19),
        }
    }

    #[tokio::test]
    async fn repeated_batches_accumulate() {
        let graph = MemoryGraph::new();

        graph
            .apply_coplay_batch(&[CoplayUpdate {
                observations: 2,
                score_diff_sum: 12,
                ..update("ana", "ben", 1, 30.0, 1)
            }])
            .await
            .unwrap();
        graph
            .apply_coplay_batch(&[CoplayUpdate {
                observations: 6,
                score_diff_sum: 4,
                servers: vec!["srv-2".to_string()],
                ..update("ana", "ben", 2, 45.0, 5)
            }])
            .await
            .unwrap();

        let edge = graph.edge_stats("ana", "ben").await.unwrap().unwrap();
        assert_eq!(edge.sessions, 3);
        assert_eq!(edge.observations, 8);
        assert_eq!(edge.minutes, 75.0);
        // (12/2 * 2 + 4) / 8, the second batch drags the average down.
        assert_eq!(edge.avg_score_diff, 2.0);
        assert_eq!(
            edge.servers,
            vec!["srv-1".to_string(), "srv-2".to_string()]
        );
        assert_eq!(edge.first_seen, at(1, 18));
        assert_eq!(edge.last_seen, at(5, 19));
    }

    #[tokio::test]
    async fn edge_reads_ignore_direction() {
        let graph = MemoryGraph::new();
        graph
            .apply_coplay_batch(&[update("ana", "ben", 1, 20.0, 2)])
            .await
            .unwrap();

        let forward = graph.edge_stats("ana", "ben").await.unwrap();
        let backward = graph.edge_stats("ben", "ana").await.unwrap();

        assert_eq!(forward, backward);
        assert!(forward.is_some());
    }

    #[tokio::test]
    async fn teammates_are_direction_agnostic() {
        let graph = MemoryGraph::new();
        graph
            .apply_coplay_batch(&[
                update("ana", "ben", 1, 20.0, 2),
                update("ana", "cleo", 1, 20.0, 2),
            ])
            .await
            .unwrap();

        let of_ben = graph.teammates_of("ben").await.unwrap();
        let of_ana = graph.teammates_of("ana").await.unwrap();

        assert_eq!(of_ben, ["ana".to_string()].into_iter().collect());
        assert_eq!(
            of_ana,
            ["ben".to_string(), "cleo".to_string()].into_iter().collect()
        );
    }

    #[tokio::test]
    async fn reversed_edges_are_detected() {
        let graph = MemoryGraph::new();
        graph
            .apply_coplay_batch(&[update("ben", "ana", 1, 20.0, 2)])
            .await
            .unwrap();

        assert_eq!(graph.count_reversed_edges().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn negative_counters_count_as_timeline_violations() {
        let graph = MemoryGraph::new();
        graph
            .apply_coplay_batch(&[
                update("ana", "ben", 1, 20.0, 2),
                CoplayUpdate {
                    sessions: -1,
                    ..update("cleo", "dan", 1, 20.0, 2)
                },
            ])
            .await
            .unwrap();

        assert_eq!(graph.count_timeline_violations().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn purge_drops_unnamed_and_their_edges() {
        let graph = MemoryGraph::new();
        graph
            .upsert_player("ana", at(1, 10), at(1, 10), 0.0)
            .await
            .unwrap();
        graph
            .apply_coplay_batch(&[update("", "ana", 1, 10.0, 1)])
            .await
            .unwrap();

        let purged = graph.purge_unnamed_players().await.unwrap();

        assert_eq!(purged, 1);
        assert_eq!(graph.count_edges().await.unwrap(), 0);
        assert_eq!(graph.count_players().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn offline_store_refuses_reads() {
        let graph = MemoryGraph::new();
        graph.set_offline(true);

        let result = graph.teammates_of("ana").await;

        assert!(matches!(result, Err(BackendError::GraphUnavailable(_))));
    }
}
