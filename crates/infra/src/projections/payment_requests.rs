use serde::Serialize;
use serde_json::Value as JsonValue;

use clearway_clearance::{
    Phase, PaymentRequestEvent, PaymentRequestId, PaymentRequestStatus, ShipmentId,
};
use clearway_events::{EventEnvelope, Projection};

use crate::read_model::ReadStore;
use crate::services::aggregate_types;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentRequestSummary {
    pub payment_request_id: PaymentRequestId,
    pub shipment_id: ShipmentId,
    pub phase: Phase,
    pub status: PaymentRequestStatus,
}

/// Payment request status per shipment and phase; feeds the settle gate on
/// phase advance and the readiness query.
#[derive(Debug)]
pub struct PaymentRequestsProjection<S> {
    store: S,
}

impl<S> PaymentRequestsProjection<S>
where
    S: ReadStore<PaymentRequestId, PaymentRequestSummary>,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn for_shipment(&self, shipment_id: ShipmentId) -> Vec<PaymentRequestSummary> {
        let mut out: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|s| s.shipment_id == shipment_id)
            .collect();
        out.sort_by_key(|s| (s.phase, s.payment_request_id));
        out
    }

    /// Requests of one phase still awaiting a decision.
    pub fn pending_count(&self, shipment_id: ShipmentId, phase: Phase) -> usize {
        self.store
            .list()
            .iter()
            .filter(|s| {
                s.shipment_id == shipment_id
                    && s.phase == phase
                    && s.status == PaymentRequestStatus::Pending
            })
            .count()
    }

    fn set_status(&self, id: PaymentRequestId, status: PaymentRequestStatus) {
        if let Some(mut summary) = self.store.get(&id) {
            summary.status = status;
            self.store.upsert(id, summary);
        }
    }
}

impl<S> Projection for PaymentRequestsProjection<S>
where
    S: ReadStore<PaymentRequestId, PaymentRequestSummary>,
{
    type Ev = JsonValue;

    fn apply(&mut self, envelope: &EventEnvelope<JsonValue>) {
        if envelope.aggregate_type() != aggregate_types::PAYMENT_REQUEST {
            return;
        }
        let event: PaymentRequestEvent = match serde_json::from_value(envelope.payload().clone()) {
            Ok(ev) => ev,
            Err(e) => {
                tracing::warn!(
                    event_type = envelope.event_type(),
                    error = %e,
                    "payment request projection skipped undecodable event"
                );
                return;
            }
        };

        match event {
            PaymentRequestEvent::PaymentRequested(e) => {
                self.store.upsert(
                    e.payment_request_id,
                    PaymentRequestSummary {
                        payment_request_id: e.payment_request_id,
                        shipment_id: e.shipment_id,
                        phase: e.phase,
                        status: PaymentRequestStatus::Pending,
                    },
                );
            }
            PaymentRequestEvent::PaymentRequestApproved(e) => {
                self.set_status(e.payment_request_id, PaymentRequestStatus::Approved);
            }
            PaymentRequestEvent::PaymentRequestRejected(e) => {
                self.set_status(e.payment_request_id, PaymentRequestStatus::Rejected);
            }
            PaymentRequestEvent::PaymentRequestPaid(e) => {
                self.set_status(e.payment_request_id, PaymentRequestStatus::Paid);
            }
        }
    }
}
