//! Postgres wiring shared by the persistent stores.

use std::future::Future;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::runtime::{Handle, RuntimeFlavor};

const SCHEMA: &str = include_str!("../migrations/0001_init.sql");

/// Open a pool against `database_url`.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Create the event and counter tables if they do not exist yet.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    tracing::info!("database schema ensured");
    Ok(())
}

/// Run an async store operation from the synchronous store traits.
///
/// Needs a multi-threaded tokio runtime: the current worker is handed over to
/// blocking mode while the future runs.
pub(crate) fn block_on<F, T>(fut: F) -> Result<T, String>
where
    F: Future<Output = T>,
{
    let handle = Handle::try_current()
        .map_err(|_| "postgres stores must be called from within a tokio runtime".to_string())?;

    if handle.runtime_flavor() == RuntimeFlavor::CurrentThread {
        return Err("postgres stores require the multi-threaded tokio runtime".to_string());
    }

    Ok(tokio::task::block_in_place(|| handle.block_on(fut)))
}
