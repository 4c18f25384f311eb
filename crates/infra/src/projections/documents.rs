use serde_json::Value as JsonValue;

use clearway_clearance::{DocumentId, ShipmentEvent, ShipmentId};
use clearway_events::{EventEnvelope, Projection};

use crate::read_model::ReadStore;
use crate::services::aggregate_types;

/// Document id -> owning shipment. Lets `DELETE /documents/{id}` find the
/// stream to dispatch to.
#[derive(Debug)]
pub struct DocumentIndexProjection<S> {
    store: S,
}

impl<S> DocumentIndexProjection<S>
where
    S: ReadStore<DocumentId, ShipmentId>,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn shipment_of(&self, document_id: DocumentId) -> Option<ShipmentId> {
        self.store.get(&document_id)
    }

    pub fn len(&self) -> usize {
        self.store.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S> Projection for DocumentIndexProjection<S>
where
    S: ReadStore<DocumentId, ShipmentId>,
{
    type Ev = JsonValue;

    fn apply(&mut self, envelope: &EventEnvelope<JsonValue>) {
        if envelope.aggregate_type() != aggregate_types::SHIPMENT {
            return;
        }
        let event: ShipmentEvent = match serde_json::from_value(envelope.payload().clone()) {
            Ok(ev) => ev,
            Err(e) => {
                tracing::warn!(
                    event_type = envelope.event_type(),
                    error = %e,
                    "document index skipped undecodable event"
                );
                return;
            }
        };

        match event {
            ShipmentEvent::DocumentAttached(e) => {
                self.store.upsert(e.document.id, e.shipment_id);
            }
            ShipmentEvent::DocumentRemoved(e) => {
                self.store.remove(&e.document_id);
            }
            _ => {}
        }
    }
}
