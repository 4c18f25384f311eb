//! Application services: one entry point per use case.
//!
//! Each method allocates numbers if needed, dispatches one command through
//! the `CommandDispatcher`, then feeds the committed events to the read-model
//! projections before returning, so a caller always reads its own writes.

mod billing;
mod clearance;
mod statement;

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value as JsonValue;
use thiserror::Error;

use clearway_clearance::{DocumentId, PaymentRequestId, ShipmentId};
use clearway_core::DomainError;
use clearway_events::{EventEnvelope, InMemoryEventBus, Projection, ProjectionError, ProjectionRunner};

pub use billing::{CreateCreditNoteInput, CreateInvoiceInput, RecordReceiptInput};
pub use clearance::{AttachDocumentInput, OpenShipmentInput, Readiness, RequestPaymentInput};
pub use statement::{RecordTransactionInput, Statement};

use crate::command_dispatcher::{CommandDispatcher, Committed, DispatchError};
use crate::config::{AppConfig, Policies};
use crate::db;
use crate::event_store::{
    EventStore, EventStoreError, InMemoryEventStore, PostgresEventStore, StoredEvent,
};
use crate::projections::{DocumentIndexProjection, PaymentRequestSummary, PaymentRequestsProjection};
use crate::read_model::InMemoryReadStore;
use crate::sequence::{
    CounterStore, InMemoryCounterStore, PostgresCounterStore, SequenceAllocator, SequenceError,
};

/// Stream type names stored with every event.
pub mod aggregate_types {
    pub const SHIPMENT: &str = "clearance.shipment";
    pub const PAYMENT_REQUEST: &str = "clearance.payment_request";
    pub const INVOICE: &str = "billing.invoice";
    pub const CREDIT_NOTE: &str = "billing.credit_note";
    pub const TRANSACTION: &str = "accounting.transaction";
}

pub type EnvelopeBus = InMemoryEventBus<EventEnvelope<JsonValue>>;
pub type Dispatcher = CommandDispatcher<Arc<dyn EventStore>, Arc<EnvelopeBus>>;

type DocumentIndex = DocumentIndexProjection<Arc<InMemoryReadStore<DocumentId, ShipmentId>>>;
type PaymentRequestIndex =
    PaymentRequestsProjection<Arc<InMemoryReadStore<PaymentRequestId, PaymentRequestSummary>>>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Lost an optimistic concurrency race; safe to retry.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error("infrastructure failure: {0}")]
    Infrastructure(String),
}

impl From<DispatchError> for ServiceError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::Domain(e) => ServiceError::Domain(e),
            DispatchError::Concurrency(msg) => ServiceError::Concurrency(msg),
            other => ServiceError::Infrastructure(other.to_string()),
        }
    }
}

impl From<EventStoreError> for ServiceError {
    fn from(value: EventStoreError) -> Self {
        DispatchError::from(value).into()
    }
}

impl From<ProjectionError> for ServiceError {
    fn from(value: ProjectionError) -> Self {
        ServiceError::Infrastructure(value.to_string())
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(value: sqlx::Error) -> Self {
        ServiceError::Infrastructure(format!("database: {value}"))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Everything the HTTP layer needs, behind one handle.
pub struct ClearwayServices {
    dispatcher: Dispatcher,
    numbers: SequenceAllocator<Arc<dyn CounterStore>>,
    documents: Mutex<ProjectionRunner<DocumentIndex>>,
    payment_requests: Mutex<ProjectionRunner<PaymentRequestIndex>>,
    /// Held from the pending count to the commit of `advance` and `request_payment`.
    phase_gate: Mutex<()>,
    /// Held from the credit limit read to the commit of credit note writes.
    credit_writes: Mutex<()>,
    policies: Policies,
}

impl std::fmt::Debug for ClearwayServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClearwayServices")
            .field("policies", &self.policies)
            .finish_non_exhaustive()
    }
}

impl ClearwayServices {
    /// Wire services over existing stores, rebuilding the read models from
    /// the event history.
    pub fn new(
        store: Arc<dyn EventStore>,
        counters: Arc<dyn CounterStore>,
        bus: Arc<EnvelopeBus>,
        policies: Policies,
        number_width: usize,
    ) -> ServiceResult<Self> {
        let shipments = envelopes(&store.load_by_type(aggregate_types::SHIPMENT)?);
        let requests = envelopes(&store.load_by_type(aggregate_types::PAYMENT_REQUEST)?);

        let documents = ProjectionRunner::rebuild_from_scratch(
            || DocumentIndexProjection::new(Arc::new(InMemoryReadStore::new())),
            &shipments,
        )?;
        let payment_requests = ProjectionRunner::rebuild_from_scratch(
            || PaymentRequestsProjection::new(Arc::new(InMemoryReadStore::new())),
            &requests,
        )?;

        tracing::info!(
            shipment_events = shipments.len(),
            payment_request_events = requests.len(),
            "read models rebuilt"
        );

        Ok(Self {
            dispatcher: CommandDispatcher::new(store, bus),
            numbers: SequenceAllocator::with_width(counters, number_width),
            documents: Mutex::new(documents),
            payment_requests: Mutex::new(payment_requests),
            phase_gate: Mutex::new(()),
            credit_writes: Mutex::new(()),
            policies,
        })
    }

    /// Fresh in-memory stores.
    pub fn in_memory(policies: Policies, number_width: usize) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(
                Arc::new(InMemoryEventStore::new()),
                Arc::new(EnvelopeBus::new()),
            ),
            numbers: SequenceAllocator::with_width(
                Arc::new(InMemoryCounterStore::new()),
                number_width,
            ),
            documents: Mutex::new(ProjectionRunner::new(DocumentIndexProjection::new(
                Arc::new(InMemoryReadStore::new()),
            ))),
            payment_requests: Mutex::new(ProjectionRunner::new(PaymentRequestsProjection::new(
                Arc::new(InMemoryReadStore::new()),
            ))),
            phase_gate: Mutex::new(()),
            credit_writes: Mutex::new(()),
            policies,
        }
    }

    /// Postgres when `DATABASE_URL` is configured, in-memory otherwise.
    pub async fn from_config(config: &AppConfig) -> ServiceResult<Self> {
        let Some(url) = config.database_url.as_deref() else {
            tracing::info!("DATABASE_URL not set; using in-memory stores");
            return Ok(Self::in_memory(config.policies, config.number_width));
        };

        let pool = db::connect(url, 10).await?;
        db::migrate(&pool).await?;

        let store: Arc<dyn EventStore> = Arc::new(PostgresEventStore::new(pool.clone()));
        let counters: Arc<dyn CounterStore> = Arc::new(PostgresCounterStore::new(pool));
        let policies = config.policies;
        let width = config.number_width;

        // Rebuilding reads through the synchronous store API.
        tokio::task::spawn_blocking(move || {
            Self::new(store, counters, Arc::new(EnvelopeBus::new()), policies, width)
        })
        .await
        .map_err(|e| ServiceError::Infrastructure(format!("startup task failed: {e}")))?
    }

    pub fn policies(&self) -> Policies {
        self.policies
    }

    /// Bus carrying every committed envelope (SSE feed).
    pub fn bus(&self) -> &Arc<EnvelopeBus> {
        self.dispatcher.bus()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    fn next_number(&self, series: crate::sequence::Series) -> ServiceResult<String> {
        self.numbers.next(series).map_err(|e| {
            tracing::error!(series = series.name, error = %e, "number allocation failed");
            ServiceError::from(e)
        })
    }

    /// Feed freshly committed events to the read models.
    fn project<A>(&self, committed: &Committed<A>) -> ServiceResult<()> {
        let envs: Vec<_> = committed.envelopes().collect();
        let Some(first) = envs.first() else {
            return Ok(());
        };

        match first.aggregate_type() {
            aggregate_types::SHIPMENT => self.feed(&self.documents, &envs),
            aggregate_types::PAYMENT_REQUEST => self.feed(&self.payment_requests, &envs),
            _ => Ok(()),
        }
    }

    fn feed<P>(
        &self,
        runner: &Mutex<ProjectionRunner<P>>,
        envs: &[EventEnvelope<JsonValue>],
    ) -> ServiceResult<()>
    where
        P: Projection<Ev = JsonValue>,
    {
        let mut runner = locked(runner)?;

        for env in envs {
            if let Err(ProjectionError::SequenceGap { aggregate_id, .. }) = runner.apply(env) {
                // A concurrent writer on the same stream committed first but
                // has not projected yet: catch up from the store.
                let history = envelopes(&self.dispatcher.store().load_stream(aggregate_id)?);
                runner.run(&history)?;
            }
        }
        Ok(())
    }
}

pub(super) fn locked<T>(mutex: &Mutex<T>) -> ServiceResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| ServiceError::Infrastructure("service lock poisoned".to_string()))
}

fn envelopes(events: &[StoredEvent]) -> Vec<EventEnvelope<JsonValue>> {
    events.iter().map(StoredEvent::to_envelope).collect()
}
