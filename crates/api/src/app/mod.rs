//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: bridge from async handlers to the synchronous services
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `dto.rs`: request bodies and JSON views of the aggregates
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use clearway_infra::services::ClearwayServices;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
pub fn build_app(services: Arc<ClearwayServices>) -> Router {
    // Everything except the health probe needs the gateway identity headers.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn(middleware::identity_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
