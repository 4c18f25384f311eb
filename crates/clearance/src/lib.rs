//! Clearance workflow domain module (event-sourced).
//!
//! Shipments move through a fixed sequence of operational phases. Each phase
//! is gated on its required documents and, optionally, on settled payment
//! requests. Pure domain logic: no IO, no HTTP, no storage.

pub mod document;
pub mod payment_request;
pub mod phase;
pub mod shipment;

pub use document::{Document, DocumentGate, DocumentId, FileRef};
pub use payment_request::{
    ApprovePaymentRequest, MarkPaymentRequestPaid, PaymentRequest, PaymentRequestApproved,
    PaymentRequestCommand, PaymentRequestEvent, PaymentRequestId, PaymentRequestPaid,
    PaymentRequestRejected, PaymentRequestStatus, PaymentRequested, RejectPaymentRequest,
    RequestPayment,
};
pub use phase::{OTHER_DOCUMENT, Phase, PhaseRequirements};
pub use shipment::{
    AdvancePhase, AttachDocument, CancelShipment, CargoType, DocumentAttached, DocumentRemoved,
    OpenShipment, PhaseAdvanced, PhaseReadiness, PhaseReverted, PhaseTransition, RemoveDocument,
    RevertPhase, Shipment, ShipmentCancelled, ShipmentCommand, ShipmentCompleted, ShipmentEvent,
    ShipmentId, ShipmentOpened, ShipmentStatus, TransitionKind,
};
