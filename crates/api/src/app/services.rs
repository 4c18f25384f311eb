use std::sync::Arc;

use clearway_infra::services::{ClearwayServices, ServiceError, ServiceResult};

pub type SharedServices = Arc<ClearwayServices>;

/// Run a synchronous service call on the blocking pool.
///
/// Stores may block on IO (Postgres bridge) and take short-lived locks, so
/// handlers never call services directly on an async worker.
pub async fn run<T, F>(services: &SharedServices, call: F) -> ServiceResult<T>
where
    T: Send + 'static,
    F: FnOnce(&ClearwayServices) -> ServiceResult<T> + Send + 'static,
{
    let services = services.clone();
    tokio::task::spawn_blocking(move || call(&services))
        .await
        .map_err(|e| ServiceError::Infrastructure(format!("service task failed: {e}")))?
}
