use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;

const MIGRATIONS: diesel_async_migrations::EmbeddedMigrations =
    diesel_async_migrations::embed_migrations!("../migrations/");

#[derive(Debug, clap::Parser)]
#[command(about = "Player relationship graph sync and alias detection")]
struct Cli {
    /// Path to a TOML config file, environment variables override it.
    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Apply migrations and serve the comparison API.
    Serve {
        /// Address to bind, e.g. 0.0.0.0:3000.
        #[arg(long)]
        listen: Option<String>,
    },
    /// Run one incremental sync into the relationship graph.
    Sync {
        /// Window start (RFC 3339). Without it the run resumes at the
        /// watermark of the last completed run.
        #[arg(long, conflicts_with = "window_days")]
        from: Option<chrono::DateTime<chrono::Utc>>,
        /// Window end (RFC 3339), defaults to now.
        #[arg(long, requires = "from", conflicts_with = "window_days")]
        to: Option<chrono::DateTime<chrono::Utc>>,
        /// Sync the last N days instead of resuming.
        #[arg(long)]
        window_days: Option<u32>,
        /// Sync even when a completed run already covered the window.
        #[arg(long)]
        force: bool,
        /// Drop empty-name player nodes afterwards.
        #[arg(long)]
        purge: bool,
    },
    /// Sweep the graph for symmetry and timeline violations.
    Verify {
        /// How many broken pairs to list.
        #[arg(long, default_value_t = 25)]
        limit: i64,
    },
    /// Compare two accounts once and print the result.
    Compare {
        player1: String,
        player2: String,
        #[arg(long)]
        lookback_days: Option<u32>,
        /// Print the JSON report instead of prose.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let registry = tracing_subscriber::Registry::default()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::filter_fn(|meta| {
            meta.target().contains("backend") || meta.target().contains("analysis")
        }));
    tracing::subscriber::set_global_default(registry).unwrap();

    let config = backend::config::AppConfig::load(cli.config.as_deref()).unwrap();

    match cli.command {
        Command::Serve { listen } => serve(config, listen).await,
        Command::Sync {
            from,
            to,
            window_days,
            force,
            purge,
        } => sync_once(config, from, to, window_days, force, purge).await,
        Command::Verify { limit } => verify(config, limit).await,
        Command::Compare {
            player1,
            player2,
            lookback_days,
            json,
        } => compare_once(config, player1, player2, lookback_days, json).await,
    }
}

async fn connect_graph(config: &backend::config::GraphConfig) -> Arc<backend::graph::neo4j::Neo4jGraph> {
    let graph = backend::graph::neo4j::Neo4jGraph::connect(config).await.unwrap();
    graph.ensure_schema().await.unwrap();

    Arc::new(graph)
}

async fn serve(config: backend::config::AppConfig, listen: Option<String>) {
    tracing::info!("Applying Migrations");
    let mut connection = backend::db_connection(&config.database.url).await.unwrap();
    MIGRATIONS.run_pending_migrations(&mut connection).await.unwrap();
    drop(connection);
    tracing::info!("Completed Migrations");

    let graph = connect_graph(&config.graph).await;
    let storage = Arc::new(backend::storage::PgStorage::new(config.database.url.clone()));

    let deps = backend::detect::DetectDeps {
        storage: storage.clone(),
        graph: graph.clone(),
        detect: config.detect.clone(),
        scoring: config.scoring.clone(),
    };

    let router = axum::Router::new().nest("/api/", backend::api::router(deps, storage));

    let listen = listen.unwrap_or(config.api.bind);
    tracing::info!(%listen, "Serving comparison API");
    let listener = tokio::net::TcpListener::bind(&listen).await.unwrap();
    axum::serve(listener, router).await.unwrap();
}

async fn sync_once(
    config: backend::config::AppConfig,
    from: Option<chrono::DateTime<chrono::Utc>>,
    to: Option<chrono::DateTime<chrono::Utc>>,
    window_days: Option<u32>,
    force: bool,
    purge: bool,
) {
    let window = if let Some(days) = window_days {
        backend::sync::SyncWindow::Days(days)
    } else if let Some(from) = from {
        backend::sync::SyncWindow::Explicit {
            from,
            to: to.unwrap_or_else(chrono::Utc::now),
        }
    } else {
        backend::sync::SyncWindow::Resume
    };

    let storage = backend::storage::PgStorage::new(config.database.url.clone());
    let graph = connect_graph(&config.graph).await;

    let request = backend::sync::SyncRequest {
        window,
        force,
        purge,
    };
    if let Err(error) = backend::sync::run(&storage, graph.as_ref(), &config.sync, request).await {
        tracing::error!(%error, "Sync did not complete");
        std::process::exit(1);
    }
}

async fn verify(config: backend::config::AppConfig, limit: i64) {
    let graph = connect_graph(&config.graph).await;

    let inventory = backend::graph::verify_graph(graph.as_ref(), limit)
        .await
        .unwrap();

    tracing::info!(
        players = inventory.players,
        edges = inventory.edges,
        "Graph inventory"
    );
    for (player1, player2) in &inventory.inconsistent_pairs {
        tracing::warn!(player1, player2, "Broken edge pair");
    }

    if !inventory.is_consistent() {
        let error = backend::error::BackendError::SyncInconsistency(format!(
            "{} reversed edges, {} timeline violations",
            inventory.reversed_edges, inventory.timeline_violations
        ));
        tracing::error!(%error, "Graph verification failed");
        std::process::exit(1);
    }
    tracing::info!("Graph is consistent");
}

async fn compare_once(
    config: backend::config::AppConfig,
    player1: String,
    player2: String,
    lookback_days: Option<u32>,
    json: bool,
) {
    let graph = connect_graph(&config.graph).await;
    let storage = Arc::new(backend::storage::PgStorage::new(config.database.url.clone()));

    let deps = backend::detect::DetectDeps {
        storage,
        graph,
        detect: config.detect.clone(),
        scoring: config.scoring.clone(),
    };

    let report = backend::detect::compare(&deps, &player1, &player2, lookback_days)
        .await
        .unwrap();

    if json {
        println!("{}", serde_json::to_string_pretty(&report).unwrap());
    } else {
        println!("{}", analysis::explain::render(&report));
    }
}
