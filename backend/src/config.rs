use crate::error::BackendError;

/// Runtime configuration, loaded from an optional TOML file with every
/// section falling back to defaults. A handful of environment variables
/// override the file so deployments can keep credentials out of it.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub graph: GraphConfig,
    pub sync: SyncConfig,
    pub detect: DetectConfig,
    pub api: ApiConfig,
    pub scoring: analysis::score::ScoringConfig,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/gamestats".to_string(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: Option<String>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "neo4j".to_string(),
            database: None,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Rounds fetched per page from the relational store.
    pub page_size: i64,
    /// Rounds whose observations are loaded concurrently.
    pub round_concurrency: usize,
    /// Flush the accumulated tally after this many rounds...
    pub flush_rounds: usize,
    /// ...or once it holds this many distinct pair edges, whichever first.
    pub flush_relationships: usize,
    /// Width of the co-observation bucket. Matches the poll interval of the
    /// ingest pipeline.
    pub bucket_seconds: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            round_concurrency: 4,
            flush_rounds: 50,
            flush_relationships: 5000,
            bucket_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    pub lookback_days_default: u32,
    pub lookback_days_max: u32,
    /// Per-store budget for one signal fetch before it is written off as
    /// degraded.
    pub store_timeout_ms: u64,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            lookback_days_default: 90,
            lookback_days_max: 365,
            store_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub bind: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(path: Option<&std::path::Path>) -> Result<Self, BackendError> {
        let mut config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path).map_err(|e| {
                    BackendError::Config(format!("reading {}: {}", path.display(), e))
                })?;
                toml::from_str(&contents)
                    .map_err(|e| BackendError::Config(format!("parsing {}: {}", path.display(), e)))?
            }
            None => Self::default(),
        };

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = url;
        }
        if let Ok(uri) = std::env::var("NEO4J_URI") {
            config.graph.uri = uri;
        }
        if let Ok(user) = std::env::var("NEO4J_USER") {
            config.graph.user = user;
        }
        if let Ok(password) = std::env::var("NEO4J_PASSWORD") {
            config.graph.password = password;
        }
        if let Ok(bind) = std::env::var("BIND_ADDR") {
            config.api.bind = bind;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_without_file() {
        let config = AppConfig::default();

        assert_eq!(config.sync.page_size, 100);
        assert_eq!(config.sync.flush_rounds, 50);
        assert_eq!(config.sync.flush_relationships, 5000);
        assert_eq!(config.detect.lookback_days_default, 90);
        assert_eq!(config.scoring.weights.stat, 0.30);
        assert_eq!(config.scoring.weights.network, 0.25);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [sync]
            page_size = 25

            [scoring.thresholds]
            likely = 0.65
            "#,
        )
        .unwrap();

        assert_eq!(parsed.sync.page_size, 25);
        assert_eq!(parsed.sync.flush_rounds, 50);
        assert_eq!(parsed.scoring.thresholds.likely, 0.65);
        assert_eq!(parsed.scoring.thresholds.very_likely, 0.85);
    }
}
