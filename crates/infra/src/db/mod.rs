//! Connection pool and schema bootstrap.

pub mod schema;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::instrument;

pub use schema::{bootstrap_schema, SCHEMA};

use crate::error::{map_sqlx_error, StoreError};

/// Open a Postgres pool.
#[instrument(skip(database_url), err)]
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, StoreError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|e| map_sqlx_error("connect", e))
}
