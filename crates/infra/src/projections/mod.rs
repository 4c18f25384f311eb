//! Read-model projections over committed envelopes.
//!
//! Both are fed with `EventEnvelope<JsonValue>` through a
//! `clearway_events::ProjectionRunner`, which skips redelivered envelopes
//! and refuses gaps. Each projection ignores aggregate types it does not own.

pub mod documents;
pub mod payment_requests;

pub use documents::DocumentIndexProjection;
pub use payment_requests::{PaymentRequestSummary, PaymentRequestsProjection};
