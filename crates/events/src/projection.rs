use crate::EventEnvelope;

/// A projection builds a disposable read model from committed events.
///
/// Read models can be dropped and rebuilt by replaying the store at any time.
/// `apply` must be idempotent; [`crate::ProjectionRunner`] filters duplicate
/// deliveries by per-stream sequence number before they reach it.
pub trait Projection {
    type Ev;

    /// Apply one event. Events irrelevant to the projection are ignored.
    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>);
}
