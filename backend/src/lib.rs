pub mod api;
pub mod config;
pub mod coplay;
pub mod detect;
pub mod error;
pub mod graph;
pub mod models;
pub mod schema;
pub mod storage;
pub mod sync;

/// Opens one fresh connection to the relational store. Callers hold it for
/// a single operation, there is no pooling.
pub async fn db_connection(
    database_url: &str,
) -> Result<diesel_async::AsyncPgConnection, error::BackendError> {
    use diesel_async::AsyncConnection;

    let connection = diesel_async::AsyncPgConnection::establish(database_url).await?;

    Ok(connection)
}
