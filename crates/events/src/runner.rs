//! Projection runner: deterministic replay with per-stream cursors.

use std::collections::HashMap;

use clearway_core::AggregateId;
use thiserror::Error;

use crate::{EventEnvelope, Projection};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    #[error("gap in stream {aggregate_id} (last applied {last}, received {found})")]
    SequenceGap {
        aggregate_id: AggregateId,
        last: u64,
        found: u64,
    },
}

/// Runs envelopes through a projection, remembering the last applied sequence
/// number of every stream it has seen.
///
/// Redelivered envelopes are skipped; an envelope that jumps ahead of its
/// stream is rejected so the read model never silently misses an event.
#[derive(Debug)]
pub struct ProjectionRunner<P>
where
    P: Projection,
{
    projection: P,
    cursors: HashMap<AggregateId, u64>,
}

impl<P> ProjectionRunner<P>
where
    P: Projection,
{
    pub fn new(projection: P) -> Self {
        Self {
            projection,
            cursors: HashMap::new(),
        }
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    pub fn into_projection(self) -> P {
        self.projection
    }

    /// Last applied sequence number for a stream (0 if never seen).
    pub fn cursor(&self, aggregate_id: AggregateId) -> u64 {
        self.cursors.get(&aggregate_id).copied().unwrap_or(0)
    }

    /// Apply one envelope. Returns `Ok(false)` when it was a duplicate.
    pub fn apply(&mut self, envelope: &EventEnvelope<P::Ev>) -> Result<bool, ProjectionError> {
        let aggregate_id = envelope.aggregate_id();
        let found = envelope.sequence_number();
        let last = self.cursor(aggregate_id);

        if found <= last {
            tracing::trace!(
                aggregate_id = %aggregate_id,
                sequence = found,
                "duplicate envelope skipped"
            );
            return Ok(false);
        }
        if found != last + 1 {
            tracing::debug!(aggregate_id = %aggregate_id, last, found, "sequence gap");
            return Err(ProjectionError::SequenceGap {
                aggregate_id,
                last,
                found,
            });
        }

        self.projection.apply(envelope);
        self.cursors.insert(aggregate_id, found);
        Ok(true)
    }

    pub fn run<'a>(
        &mut self,
        envelopes: impl IntoIterator<Item = &'a EventEnvelope<P::Ev>>,
    ) -> Result<(), ProjectionError>
    where
        P::Ev: 'a,
    {
        for env in envelopes {
            self.apply(env)?;
        }
        Ok(())
    }

    /// Rebuild a projection from scratch by replaying history.
    pub fn rebuild_from_scratch<'a>(
        factory: impl FnOnce() -> P,
        envelopes: impl IntoIterator<Item = &'a EventEnvelope<P::Ev>>,
    ) -> Result<Self, ProjectionError>
    where
        P::Ev: 'a,
    {
        let mut runner = ProjectionRunner::new(factory());
        runner.run(envelopes)?;
        Ok(runner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[derive(Default)]
    struct Counter(u32);

    impl Projection for Counter {
        type Ev = u32;

        fn apply(&mut self, envelope: &EventEnvelope<u32>) {
            self.0 += envelope.payload();
        }
    }

    fn env(aggregate_id: AggregateId, seq: u64, value: u32) -> EventEnvelope<u32> {
        EventEnvelope::new(Uuid::now_v7(), aggregate_id, "test", seq, "test.added", Utc::now(), value)
    }

    #[test]
    fn duplicates_are_skipped() {
        let id = AggregateId::new();
        let mut runner = ProjectionRunner::new(Counter::default());

        assert!(runner.apply(&env(id, 1, 5)).unwrap());
        assert!(!runner.apply(&env(id, 1, 5)).unwrap());
        assert!(runner.apply(&env(id, 2, 1)).unwrap());

        assert_eq!(runner.projection().0, 6);
        assert_eq!(runner.cursor(id), 2);
    }

    #[test]
    fn gaps_are_rejected() {
        let id = AggregateId::new();
        let mut runner = ProjectionRunner::new(Counter::default());
        runner.apply(&env(id, 1, 1)).unwrap();

        let err = runner.apply(&env(id, 3, 1)).unwrap_err();
        assert_eq!(err, ProjectionError::SequenceGap { aggregate_id: id, last: 1, found: 3 });
    }

    #[test]
    fn streams_are_tracked_independently() {
        let a = AggregateId::new();
        let b = AggregateId::new();
        let history = vec![env(a, 1, 1), env(b, 1, 10), env(a, 2, 1)];

        let runner = ProjectionRunner::rebuild_from_scratch(Counter::default, &history).unwrap();
        assert_eq!(runner.projection().0, 12);
    }
}
