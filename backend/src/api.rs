pub mod alias {
    use axum::extract::{Path, Query, State};

    use crate::detect::DetectDeps;
    use crate::error::BackendError;

    pub fn router(deps: DetectDeps) -> axum::Router {
        axum::Router::new()
            .route(
                "/compare/:player1/:player2",
                axum::routing::get(compare),
            )
            .route(
                "/explain/:player1/:player2",
                axum::routing::get(explain),
            )
            .with_state(deps)
    }

    #[derive(Debug, serde::Deserialize)]
    struct LookbackQuery {
        lookback_days: Option<u32>,
    }

    async fn compare(
        State(deps): State<DetectDeps>,
        Path((player1, player2)): Path<(String, String)>,
        Query(query): Query<LookbackQuery>,
    ) -> Result<axum::response::Json<common::SimilarityReport>, BackendError> {
        let report =
            crate::detect::compare(&deps, &player1, &player2, query.lookback_days).await?;

        Ok(axum::response::Json(report))
    }

    async fn explain(
        State(deps): State<DetectDeps>,
        Path((player1, player2)): Path<(String, String)>,
        Query(query): Query<LookbackQuery>,
    ) -> Result<String, BackendError> {
        let report =
            crate::detect::compare(&deps, &player1, &player2, query.lookback_days).await?;

        Ok(analysis::explain::render(&report))
    }
}

pub mod sync {
    use std::sync::Arc;

    use axum::extract::State;

    use crate::error::BackendError;
    use crate::storage::SyncStorage;

    pub fn router(storage: Arc<dyn SyncStorage>) -> axum::Router {
        axum::Router::new()
            .route("/status", axum::routing::get(status))
            .with_state(storage)
    }

    async fn status(
        State(storage): State<Arc<dyn SyncStorage>>,
    ) -> Result<axum::response::Json<common::SyncStatus>, BackendError> {
        let watermark = storage.latest_watermark().await?;
        let latest_run = storage.latest_run().await?;

        Ok(axum::response::Json(common::SyncStatus {
            watermark,
            latest_run: latest_run.map(|run| run.to_summary()),
        }))
    }
}

pub fn router(
    deps: crate::detect::DetectDeps,
    storage: std::sync::Arc<dyn crate::storage::SyncStorage>,
) -> axum::Router {
    axum::Router::new()
        .nest("/alias/", alias::router(deps))
        .nest("/sync/", sync::router(storage))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
