//! Append-only event store boundary.
//!
//! One stream per aggregate instance. Both backends enforce optimistic
//! concurrency on the stream version.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
