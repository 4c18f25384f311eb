//! Infrastructure layer: event and counter stores (in-memory and Postgres),
//! command dispatch, read models, configuration and the application services.

pub mod command_dispatcher;
pub mod config;
pub mod db;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod sequence;
pub mod services;

#[cfg(test)]
mod integration_tests;
