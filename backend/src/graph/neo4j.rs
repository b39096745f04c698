use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use neo4rs::query;

use crate::error::BackendError;
use crate::graph::{
    CoplayUpdate, EdgeStats, GraphStore, PlayerActivity, ServerActivityUpdate,
};

/// Graph store backed by Neo4j over bolt.
pub struct Neo4jGraph {
    graph: neo4rs::Graph,
}

impl Neo4jGraph {
    pub async fn connect(config: &crate::config::GraphConfig) -> Result<Self, BackendError> {
        let mut builder = neo4rs::ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password);
        if let Some(db) = &config.database {
            builder = builder.db(db.as_str());
        }

        let graph = neo4rs::Graph::connect(builder.build()?).await?;

        Ok(Self { graph })
    }

    /// Uniqueness constraints double as the lookup indexes for all reads.
    pub async fn ensure_schema(&self) -> Result<(), BackendError> {
        self.graph
            .run(query(
                "CREATE CONSTRAINT player_name IF NOT EXISTS FOR (p:Player) REQUIRE p.name IS UNIQUE",
            ))
            .await?;
        self.graph
            .run(query(
                "CREATE CONSTRAINT server_guid IF NOT EXISTS FOR (s:Server) REQUIRE s.guid IS UNIQUE",
            ))
            .await?;

        Ok(())
    }

    async fn single_row(&self, q: neo4rs::Query) -> Result<Option<neo4rs::Row>, BackendError> {
        let mut stream = self.graph.execute(q).await?;
        let row = stream.next().await?;
        while stream.next().await?.is_some() {}

        Ok(row)
    }

    async fn single_count(&self, q: neo4rs::Query) -> Result<i64, BackendError> {
        let row = self
            .single_row(q)
            .await?
            .ok_or_else(|| BackendError::GraphShape("count query returned no row".to_string()))?;

        row.get::<i64>("c")
            .map_err(|e| BackendError::GraphShape(e.to_string()))
    }
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>, BackendError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| BackendError::GraphShape(format!("datetime {:?}: {}", value, e)))
}

fn get_datetime(row: &neo4rs::Row, column: &str) -> Result<DateTime<Utc>, BackendError> {
    let raw: String = row
        .get(column)
        .map_err(|e| BackendError::GraphShape(format!("column {}: {}", column, e)))?;

    parse_datetime(&raw)
}

/// Accumulating merge for one canonical pair. ON CREATE only seeds the zero
/// state, the unconditional SET afterwards folds the delta in for both
/// branches. The running average is updated before the observation counter
/// it is weighted by, SET items apply left to right.
fn coplay_query(update: &CoplayUpdate) -> neo4rs::Query {
    query(
        "MERGE (a:Player {name: $p1}) \
         ON CREATE SET a.first_seen = datetime($first), a.last_seen = datetime($last), a.total_minutes = 0.0 \
         ON MATCH SET \
            a.first_seen = CASE WHEN datetime($first) < a.first_seen THEN datetime($first) ELSE a.first_seen END, \
            a.last_seen = CASE WHEN datetime($last) > a.last_seen THEN datetime($last) ELSE a.last_seen END \
         MERGE (b:Player {name: $p2}) \
         ON CREATE SET b.first_seen = datetime($first), b.last_seen = datetime($last), b.total_minutes = 0.0 \
         ON MATCH SET \
            b.first_seen = CASE WHEN datetime($first) < b.first_seen THEN datetime($first) ELSE b.first_seen END, \
            b.last_seen = CASE WHEN datetime($last) > b.last_seen THEN datetime($last) ELSE b.last_seen END \
         MERGE (a)-[r:PLAYED_WITH]->(b) \
         ON CREATE SET \
            r.sessions = 0, r.observations = 0, r.minutes = 0.0, \
            r.avg_score_diff = 0.0, r.servers = [], \
            r.first_seen = datetime($first), r.last_seen = datetime($last) \
         SET \
            r.avg_score_diff = (r.avg_score_diff * r.observations + $diff_sum) / (r.observations + $observations), \
            r.sessions = r.sessions + $sessions, \
            r.observations = r.observations + $observations, \
            r.minutes = r.minutes + $minutes, \
            r.servers = reduce(acc = r.servers, s IN $servers | CASE WHEN s IN acc THEN acc ELSE acc + s END), \
            r.first_seen = CASE WHEN datetime($first) < r.first_seen THEN datetime($first) ELSE r.first_seen END, \
            r.last_seen = CASE WHEN datetime($last) > r.last_seen THEN datetime($last) ELSE r.last_seen END",
    )
    .param("p1", update.player1.as_str())
    .param("p2", update.player2.as_str())
    .param("sessions", update.sessions)
    .param("observations", update.observations)
    .param("minutes", update.minutes)
    .param("diff_sum", update.score_diff_sum)
    .param("servers", update.servers.clone())
    .param("first", format_datetime(&update.first_seen))
    .param("last", format_datetime(&update.last_seen))
}

fn server_activity_query(update: &ServerActivityUpdate) -> neo4rs::Query {
    query(
        "MERGE (p:Player {name: $player}) \
         ON CREATE SET p.first_seen = datetime($last), p.last_seen = datetime($last), p.total_minutes = 0.0 \
         ON MATCH SET \
            p.first_seen = CASE WHEN datetime($last) < p.first_seen THEN datetime($last) ELSE p.first_seen END, \
            p.last_seen = CASE WHEN datetime($last) > p.last_seen THEN datetime($last) ELSE p.last_seen END \
         MERGE (s:Server {guid: $guid}) \
         MERGE (p)-[r:PLAYS_ON]->(s) \
         ON CREATE SET r.sessions = $sessions, r.minutes = $minutes, r.last_seen = datetime($last) \
         ON MATCH SET \
            r.sessions = r.sessions + $sessions, r.minutes = r.minutes + $minutes, \
            r.last_seen = CASE WHEN datetime($last) > r.last_seen THEN datetime($last) ELSE r.last_seen END",
    )
    .param("player", update.player.as_str())
    .param("guid", update.server_guid.as_str())
    .param("sessions", update.sessions)
    .param("minutes", update.minutes)
    .param("last", format_datetime(&update.last_seen))
}

#[async_trait::async_trait]
impl GraphStore for Neo4jGraph {
    async fn upsert_player(
        &self,
        name: &str,
        first_seen: DateTime<Utc>,
        last_seen: DateTime<Utc>,
        minutes: f64,
    ) -> Result<(), BackendError> {
        if name.is_empty() {
            return Err(BackendError::InvalidInput(
                "player name must not be empty".to_string(),
            ));
        }

        let q = query(
            "MERGE (p:Player {name: $name}) \
             ON CREATE SET p.first_seen = datetime($first), p.last_seen = datetime($last) \
             ON MATCH SET \
                p.first_seen = CASE WHEN datetime($first) < p.first_seen THEN datetime($first) ELSE p.first_seen END, \
                p.last_seen = CASE WHEN datetime($last) > p.last_seen THEN datetime($last) ELSE p.last_seen END \
             SET p.total_minutes = coalesce(p.total_minutes, 0.0) + $minutes",
        )
        .param("name", name)
        .param("first", format_datetime(&first_seen))
        .param("last", format_datetime(&last_seen))
        .param("minutes", minutes);

        self.graph.run(q).await?;

        Ok(())
    }

    async fn upsert_server(&self, guid: &str, name: &str, game: &str) -> Result<(), BackendError> {
        if guid.is_empty() {
            return Err(BackendError::InvalidInput(
                "server guid must not be empty".to_string(),
            ));
        }

        let q = query(
            "MERGE (s:Server {guid: $guid}) \
             ON CREATE SET s.name = $name, s.game = $game \
             ON MATCH SET \
                s.name = CASE WHEN $name <> '' THEN $name ELSE s.name END, \
                s.game = CASE WHEN $game <> '' THEN $game ELSE s.game END",
        )
        .param("guid", guid)
        .param("name", name)
        .param("game", game);

        self.graph.run(q).await?;

        Ok(())
    }

    #[tracing::instrument(skip(self, updates), fields(updates = updates.len()))]
    async fn apply_coplay_batch(&self, updates: &[CoplayUpdate]) -> Result<(), BackendError> {
        let queries: Vec<neo4rs::Query> = updates
            .iter()
            .filter(|update| {
                if update.observations <= 0 {
                    tracing::debug!(?update, "Skipping empty coplay update");
                    return false;
                }
                true
            })
            .map(coplay_query)
            .collect();
        if queries.is_empty() {
            return Ok(());
        }

        // The whole batch commits or none of it does, a failed flush leaves
        // no partial edge deltas and the window can be re-synced without
        // double counting.
        let mut txn = self.graph.start_txn().await?;
        txn.run_queries(queries).await?;
        txn.commit().await?;

        Ok(())
    }

    #[tracing::instrument(skip(self, updates), fields(updates = updates.len()))]
    async fn apply_server_activity(
        &self,
        updates: &[ServerActivityUpdate],
    ) -> Result<(), BackendError> {
        if updates.is_empty() {
            return Ok(());
        }

        let mut txn = self.graph.start_txn().await?;
        txn.run_queries(updates.iter().map(server_activity_query).collect::<Vec<_>>())
            .await?;
        txn.commit().await?;

        Ok(())
    }

    async fn teammates_of(&self, player: &str) -> Result<BTreeSet<String>, BackendError> {
        let q = query(
            "MATCH (p:Player {name: $name})-[:PLAYED_WITH]-(t:Player) RETURN t.name AS name",
        )
        .param("name", player);

        let mut stream = self.graph.execute(q).await?;
        let mut teammates = BTreeSet::new();
        while let Some(row) = stream.next().await? {
            let name: String = row
                .get("name")
                .map_err(|e| BackendError::GraphShape(e.to_string()))?;
            teammates.insert(name);
        }

        Ok(teammates)
    }

    async fn edge_stats(
        &self,
        player1: &str,
        player2: &str,
    ) -> Result<Option<EdgeStats>, BackendError> {
        let q = query(
            "MATCH (a:Player {name: $p1})-[r:PLAYED_WITH]-(b:Player {name: $p2}) \
             RETURN r.sessions AS sessions, r.observations AS observations, \
                    r.minutes AS minutes, r.avg_score_diff AS avg_score_diff, \
                    r.servers AS servers, \
                    toString(r.first_seen) AS first_seen, toString(r.last_seen) AS last_seen \
             LIMIT 1",
        )
        .param("p1", player1)
        .param("p2", player2);

        let row = match self.single_row(q).await? {
            Some(row) => row,
            None => return Ok(None),
        };

        Ok(Some(EdgeStats {
            sessions: row
                .get("sessions")
                .map_err(|e| BackendError::GraphShape(e.to_string()))?,
            observations: row
                .get("observations")
                .map_err(|e| BackendError::GraphShape(e.to_string()))?,
            minutes: row
                .get("minutes")
                .map_err(|e| BackendError::GraphShape(e.to_string()))?,
            avg_score_diff: row
                .get("avg_score_diff")
                .map_err(|e| BackendError::GraphShape(e.to_string()))?,
            servers: row
                .get("servers")
                .map_err(|e| BackendError::GraphShape(e.to_string()))?,
            first_seen: get_datetime(&row, "first_seen")?,
            last_seen: get_datetime(&row, "last_seen")?,
        }))
    }

    async fn player_activity(
        &self,
        player: &str,
    ) -> Result<Option<PlayerActivity>, BackendError> {
        let q = query(
            "MATCH (p:Player {name: $name}) \
             OPTIONAL MATCH (p)-[r:PLAYED_WITH]-(:Player) \
             RETURN toString(p.first_seen) AS first_seen, toString(p.last_seen) AS last_seen, \
                    count(r) AS degree",
        )
        .param("name", player);

        let row = match self.single_row(q).await? {
            Some(row) => row,
            None => return Ok(None),
        };

        Ok(Some(PlayerActivity {
            first_seen: get_datetime(&row, "first_seen")?,
            last_seen: get_datetime(&row, "last_seen")?,
            degree: row
                .get("degree")
                .map_err(|e| BackendError::GraphShape(e.to_string()))?,
        }))
    }

    async fn count_players(&self) -> Result<i64, BackendError> {
        self.single_count(query("MATCH (p:Player) RETURN count(p) AS c"))
            .await
    }

    async fn count_edges(&self) -> Result<i64, BackendError> {
        self.single_count(query("MATCH (:Player)-[r:PLAYED_WITH]->(:Player) RETURN count(r) AS c"))
            .await
    }

    async fn count_reversed_edges(&self) -> Result<i64, BackendError> {
        self.single_count(query(
            "MATCH (a:Player)-[r:PLAYED_WITH]->(b:Player) WHERE a.name > b.name RETURN count(r) AS c",
        ))
        .await
    }

    async fn count_timeline_violations(&self) -> Result<i64, BackendError> {
        let coplay = self
            .single_count(query(
                "MATCH ()-[r:PLAYED_WITH]->() \
                 WHERE r.last_seen < r.first_seen \
                    OR r.sessions < 0 OR r.observations < 0 OR r.minutes < 0 \
                 RETURN count(r) AS c",
            ))
            .await?;
        let server = self
            .single_count(query(
                "MATCH ()-[r:PLAYS_ON]->() \
                 WHERE r.sessions < 0 OR r.minutes < 0 \
                 RETURN count(r) AS c",
            ))
            .await?;

        Ok(coplay + server)
    }

    async fn find_inconsistent_edges(
        &self,
        limit: i64,
    ) -> Result<Vec<(String, String)>, BackendError> {
        let q = query(
            "MATCH (a:Player)-[:PLAYED_WITH]->(b:Player) \
             WHERE (b)-[:PLAYED_WITH]->(a) AND a.name < b.name \
             RETURN a.name AS p1, b.name AS p2 LIMIT $limit",
        )
        .param("limit", limit);

        let mut stream = self.graph.execute(q).await?;
        let mut pairs = Vec::new();
        while let Some(row) = stream.next().await? {
            let p1: String = row
                .get("p1")
                .map_err(|e| BackendError::GraphShape(e.to_string()))?;
            let p2: String = row
                .get("p2")
                .map_err(|e| BackendError::GraphShape(e.to_string()))?;
            pairs.push((p1, p2));
        }

        Ok(pairs)
    }

    async fn purge_unnamed_players(&self) -> Result<i64, BackendError> {
        let unnamed = self
            .single_count(query("MATCH (p:Player) WHERE p.name = '' RETURN count(p) AS c"))
            .await?;

        if unnamed > 0 {
            self.graph
                .run(query("MATCH (p:Player) WHERE p.name = '' DETACH DELETE p"))
                .await?;
        }

        Ok(unnamed)
    }
}
