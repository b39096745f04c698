/// Failure taxonomy for the whole backend. API handlers map these onto
/// status codes, the sync driver decides retry behaviour off them.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("relational store: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("relational store connection: {0}")]
    Connection(#[from] diesel::result::ConnectionError),

    #[error("graph store: {0}")]
    Graph(#[from] neo4rs::Error),

    #[error("graph store unavailable: {0}")]
    GraphUnavailable(String),

    #[error("graph store answered with {0}")]
    GraphShape(String),

    #[error("{store} did not answer within {limit:?}")]
    StoreTimeout {
        store: &'static str,
        limit: std::time::Duration,
    },

    #[error("sync window overlaps run {0}, pass --force to resync")]
    SyncOverlap(String),

    #[error("graph inconsistency: {0}")]
    SyncInconsistency(String),

    #[error("configuration: {0}")]
    Config(String),
}

impl axum::response::IntoResponse for BackendError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Self::InvalidInput(_) => axum::http::StatusCode::BAD_REQUEST,
            Self::SyncOverlap(_) => axum::http::StatusCode::CONFLICT,
            Self::StoreTimeout { .. } => axum::http::StatusCode::GATEWAY_TIMEOUT,
            Self::GraphUnavailable(_) => axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_)
            | Self::Connection(_)
            | Self::Graph(_)
            | Self::GraphShape(_)
            | Self::SyncInconsistency(_)
            | Self::Config(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {:?}", self);
        }

        (status, self.to_string()).into_response()
    }
}
