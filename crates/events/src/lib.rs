//! Event mechanics shared by every domain crate.
//!
//! Nothing here knows about shipments or invoices: events, envelopes, the
//! pub/sub bus and projection replay only.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;
pub mod projection;
pub mod runner;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use projection::Projection;
pub use runner::{ProjectionError, ProjectionRunner};
