//! HTTP API: routing, identity headers and request/response mapping over the
//! clearway application services.

pub mod app;
pub mod context;
pub mod middleware;
