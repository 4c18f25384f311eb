//! Command execution pipeline (application-level orchestration).
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the aggregate stream
//!   ↓
//! 2. Rehydrate (apply history in sequence order)
//!   ↓
//! 3. Handle command (pure decision, produces events)
//!   ↓
//! 4. Append with ExpectedVersion::Exact(loaded version)
//!   ↓
//! 5. Publish committed envelopes to the bus
//! ```
//!
//! A writer that loses the race at step 4 gets `DispatchError::Concurrency`
//! and nothing is published. Publication happens strictly after the append,
//! so a publish failure leaves the events durable (at-least-once delivery).
//!
//! This module contains no IO itself; it composes the store and bus traits.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use clearway_core::{Aggregate, AggregateId, AggregateRoot, DomainError, ExpectedVersion};
use clearway_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The command was rejected by the aggregate.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Optimistic concurrency failure: the stream moved since it was loaded.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    /// A historical payload no longer deserializes into the aggregate's event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),

    #[error("event store failure: {0}")]
    Store(EventStoreError),

    /// Publication failed after a successful append.
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl DispatchError {
    /// Safe to retry by reloading and re-running the command.
    pub fn is_retryable(&self) -> bool {
        match self {
            DispatchError::Concurrency(_) => true,
            DispatchError::Domain(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Outcome of a successful dispatch: the aggregate after the new events and
/// the events as committed.
#[derive(Debug, Clone)]
pub struct Committed<A> {
    pub aggregate: A,
    pub events: Vec<StoredEvent>,
}

impl<A> Committed<A> {
    pub fn envelopes(&self) -> impl Iterator<Item = EventEnvelope<JsonValue>> + '_ {
        self.events.iter().map(StoredEvent::to_envelope)
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// - `S`: event store backend
/// - `B`: bus receiving `EventEnvelope<JsonValue>` after each append
///
/// Aggregates must be deterministic: the same events always rebuild the same
/// state, and `apply` bumps the version by one per event.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Run `command` against the aggregate stored under `aggregate_id`.
    ///
    /// `make_aggregate` builds the empty instance that history is replayed
    /// onto. A command that decides no events commits nothing and publishes
    /// nothing.
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Committed<A>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: clearway_events::Event + Serialize + DeserializeOwned,
    {
        // 1) Load history
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        // 2) Rehydrate
        let mut aggregate = make_aggregate(aggregate_id);
        apply_history(&mut aggregate, &history)?;

        // 3) Decide
        let decided = match aggregate.handle(&command) {
            Ok(events) => events,
            Err(err) => {
                tracing::warn!(
                    aggregate_type,
                    aggregate_id = %aggregate_id,
                    error = %err,
                    "command rejected"
                );
                return Err(err.into());
            }
        };
        if decided.is_empty() {
            return Ok(Committed {
                aggregate,
                events: vec![],
            });
        }

        // 4) Persist
        let uncommitted = decided
            .iter()
            .map(|ev| UncommittedEvent::from_typed(aggregate_id, aggregate_type, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;

        let committed = match self.store.append(uncommitted, expected) {
            Ok(committed) => committed,
            Err(err) => {
                tracing::warn!(
                    aggregate_type,
                    aggregate_id = %aggregate_id,
                    error = %err,
                    "append failed"
                );
                return Err(err.into());
            }
        };

        for ev in &decided {
            aggregate.apply(ev);
        }

        // 5) Publish (after append)
        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        tracing::info!(
            aggregate_type,
            aggregate_id = %aggregate_id,
            version = aggregate.version(),
            events = committed.len(),
            "command committed"
        );

        Ok(Committed {
            aggregate,
            events: committed,
        })
    }

    /// Rehydrate one aggregate. Returns the empty instance when the stream
    /// does not exist; callers check their own `is_created`.
    pub fn load<A>(
        &self,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history(&mut aggregate, &history)?;
        Ok(aggregate)
    }

    /// Rehydrate every aggregate of one type, in store order.
    pub fn load_all<A>(
        &self,
        aggregate_type: &str,
        make_aggregate: impl Fn(AggregateId) -> A,
    ) -> Result<Vec<A>, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let events = self.store.load_by_type(aggregate_type)?;

        let mut out = Vec::new();
        for stream in events.chunk_by(|a, b| a.aggregate_id == b.aggregate_id) {
            let aggregate_id = stream[0].aggregate_id;
            validate_loaded_stream(aggregate_id, stream)?;
            let mut aggregate = make_aggregate(aggregate_id);
            apply_history(&mut aggregate, stream)?;
            out.push(aggregate);
        }
        Ok(out)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // Contiguous from 1, all from the requested stream.
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            ))));
        }
        let expected = idx as u64 + 1;
        if e.sequence_number != expected {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-contiguous stream (expected sequence {expected}, found {})",
                e.sequence_number
            ))));
        }
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}
