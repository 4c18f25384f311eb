//! Shipment, document and payment request use cases.

use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use clearway_clearance::{
    AdvancePhase, ApprovePaymentRequest, AttachDocument, CancelShipment, CargoType, DocumentId,
    FileRef, MarkPaymentRequestPaid, OpenShipment, PaymentRequest, PaymentRequestCommand,
    PaymentRequestId, PaymentRequestStatus, Phase, PhaseReadiness, RejectPaymentRequest,
    RemoveDocument, RequestPayment, RevertPhase, Shipment, ShipmentCommand, ShipmentId,
    ShipmentStatus,
};
use clearway_core::{ClientId, ConsigneeId, Currency, DomainError, UserId};

use super::{ClearwayServices, ServiceResult, aggregate_types, locked};
use crate::projections::PaymentRequestSummary;
use crate::sequence::Series;

#[derive(Debug, Clone, Deserialize)]
pub struct OpenShipmentInput {
    pub client_id: ClientId,
    pub consignee_id: ConsigneeId,
    pub cargo_type: CargoType,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttachDocumentInput {
    pub phase: Phase,
    pub document_type: String,
    pub file: FileRef,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestPaymentInput {
    /// Defaults to the shipment's current phase.
    #[serde(default)]
    pub phase: Option<Phase>,
    pub description: String,
    pub amount: i64,
    pub currency: Currency,
    pub quotation: FileRef,
}

/// What still blocks the next `advance` of a shipment.
#[derive(Debug, Clone)]
pub struct Readiness {
    pub shipment: Shipment,
    /// `None` while the shipment is in draft.
    pub phase: Option<PhaseReadiness>,
    pub pending_payment_requests: usize,
    pub payment_requests: Vec<PaymentRequestSummary>,
}

impl Readiness {
    pub fn can_advance(&self) -> bool {
        match self.shipment.status() {
            ShipmentStatus::Draft => true,
            ShipmentStatus::Active => {
                self.phase.as_ref().is_some_and(|p| p.satisfied)
                    && self.pending_payment_requests == 0
            }
            ShipmentStatus::Completed | ShipmentStatus::Cancelled => false,
        }
    }
}

impl ClearwayServices {
    #[instrument(skip(self, input), fields(client_id = %input.client_id))]
    pub fn open_shipment(&self, input: OpenShipmentInput, user: UserId) -> ServiceResult<Shipment> {
        let reference = self.next_number(Series::SHIPMENT)?;
        let shipment_id = ShipmentId::generate();

        let cmd = ShipmentCommand::OpenShipment(OpenShipment {
            shipment_id,
            reference,
            client_id: input.client_id,
            consignee_id: input.consignee_id,
            cargo_type: input.cargo_type,
            description: input.description,
            opened_by: user,
            occurred_at: Utc::now(),
        });
        self.dispatch_shipment(shipment_id, cmd)
    }

    pub fn shipment(&self, shipment_id: ShipmentId) -> ServiceResult<Shipment> {
        let shipment = self
            .dispatcher
            .load(shipment_id.aggregate_id(), |id| Shipment::empty(ShipmentId::new(id)))?;
        if !shipment.is_created() {
            return Err(DomainError::not_found().into());
        }
        Ok(shipment)
    }

    #[instrument(skip(self), fields(shipment_id = %shipment_id))]
    pub fn advance_phase(&self, shipment_id: ShipmentId, user: UserId) -> ServiceResult<Shipment> {
        // No request may land between the count and the commit.
        let _gate = locked(&self.phase_gate)?;
        let shipment = self.shipment(shipment_id)?;
        let pending = self.pending_for_current_phase(&shipment)?;

        let cmd = ShipmentCommand::AdvancePhase(AdvancePhase {
            shipment_id,
            pending_payment_requests: pending,
            advanced_by: user,
            occurred_at: Utc::now(),
        });
        self.dispatch_shipment(shipment_id, cmd)
    }

    /// Caller must have checked the elevated role.
    #[instrument(skip(self, reason), fields(shipment_id = %shipment_id, to = %to_phase))]
    pub fn revert_phase(
        &self,
        shipment_id: ShipmentId,
        to_phase: Phase,
        reason: Option<String>,
        user: UserId,
    ) -> ServiceResult<Shipment> {
        let cmd = ShipmentCommand::RevertPhase(RevertPhase {
            shipment_id,
            to_phase,
            reason,
            reverted_by: user,
            occurred_at: Utc::now(),
        });
        self.dispatch_shipment(shipment_id, cmd)
    }

    #[instrument(skip(self, reason), fields(shipment_id = %shipment_id))]
    pub fn cancel_shipment(
        &self,
        shipment_id: ShipmentId,
        reason: String,
        user: UserId,
    ) -> ServiceResult<Shipment> {
        let cmd = ShipmentCommand::CancelShipment(CancelShipment {
            shipment_id,
            reason,
            cancelled_by: user,
            occurred_at: Utc::now(),
        });
        self.dispatch_shipment(shipment_id, cmd)
    }

    #[instrument(skip(self, input), fields(shipment_id = %shipment_id, document_type = %input.document_type))]
    pub fn attach_document(
        &self,
        shipment_id: ShipmentId,
        input: AttachDocumentInput,
        user: UserId,
    ) -> ServiceResult<(Shipment, DocumentId)> {
        let document_id = DocumentId::generate();
        let cmd = ShipmentCommand::AttachDocument(AttachDocument {
            shipment_id,
            document_id,
            phase: input.phase,
            document_type: input.document_type,
            file: input.file,
            note: input.note,
            uploaded_by: user,
            occurred_at: Utc::now(),
        });
        let shipment = self.dispatch_shipment(shipment_id, cmd)?;
        Ok((shipment, document_id))
    }

    #[instrument(skip(self), fields(document_id = %document_id))]
    pub fn remove_document(&self, document_id: DocumentId, user: UserId) -> ServiceResult<Shipment> {
        let shipment_id = locked(&self.documents)?
            .projection()
            .shipment_of(document_id)
            .ok_or(DomainError::NotFound)?;

        let cmd = ShipmentCommand::RemoveDocument(RemoveDocument {
            shipment_id,
            document_id,
            removed_by: user,
            occurred_at: Utc::now(),
        });
        self.dispatch_shipment(shipment_id, cmd)
    }

    pub fn readiness(&self, shipment_id: ShipmentId) -> ServiceResult<Readiness> {
        let shipment = self.shipment(shipment_id)?;
        let payment_requests = self.payment_requests_of(shipment_id)?;
        let pending_payment_requests = match shipment.current_phase() {
            Some(phase) if self.policies.settle_payment_requests => payment_requests
                .iter()
                .filter(|pr| pr.phase == phase && pr.status == PaymentRequestStatus::Pending)
                .count(),
            _ => 0,
        };

        Ok(Readiness {
            phase: shipment.readiness(),
            shipment,
            pending_payment_requests,
            payment_requests,
        })
    }

    #[instrument(skip(self, input), fields(shipment_id = %shipment_id))]
    pub fn request_payment(
        &self,
        shipment_id: ShipmentId,
        input: RequestPaymentInput,
        user: UserId,
    ) -> ServiceResult<PaymentRequest> {
        let _gate = locked(&self.phase_gate)?;
        let shipment = self.shipment(shipment_id)?;
        if shipment.status() == ShipmentStatus::Cancelled {
            return Err(
                DomainError::transition("shipment", ShipmentStatus::Cancelled, "payment request")
                    .into(),
            );
        }
        let Some(client_id) = shipment.client_id() else {
            return Err(DomainError::invariant("shipment has no client").into());
        };
        let Some(phase) = input.phase.or(shipment.current_phase()) else {
            return Err(DomainError::validation(
                "phase is required while the shipment is in draft",
            )
            .into());
        };

        let payment_request_id = PaymentRequestId::generate();
        let cmd = PaymentRequestCommand::RequestPayment(RequestPayment {
            payment_request_id,
            shipment_id,
            client_id,
            phase,
            description: input.description,
            amount: input.amount,
            currency: input.currency,
            quotation: input.quotation,
            requested_by: user,
            occurred_at: Utc::now(),
        });
        self.dispatch_payment_request(payment_request_id, cmd)
    }

    pub fn approve_payment_request(
        &self,
        payment_request_id: PaymentRequestId,
        note: Option<String>,
        user: UserId,
    ) -> ServiceResult<PaymentRequest> {
        let cmd = PaymentRequestCommand::ApprovePaymentRequest(ApprovePaymentRequest {
            payment_request_id,
            approved_by: user,
            note,
            occurred_at: Utc::now(),
        });
        self.dispatch_payment_request(payment_request_id, cmd)
    }

    pub fn reject_payment_request(
        &self,
        payment_request_id: PaymentRequestId,
        note: Option<String>,
        user: UserId,
    ) -> ServiceResult<PaymentRequest> {
        let cmd = PaymentRequestCommand::RejectPaymentRequest(RejectPaymentRequest {
            payment_request_id,
            rejected_by: user,
            note,
            occurred_at: Utc::now(),
        });
        self.dispatch_payment_request(payment_request_id, cmd)
    }

    /// `amount` defaults to the estimate.
    pub fn mark_payment_request_paid(
        &self,
        payment_request_id: PaymentRequestId,
        amount: Option<i64>,
        reference: Option<String>,
        user: UserId,
    ) -> ServiceResult<PaymentRequest> {
        let cmd = PaymentRequestCommand::MarkPaymentRequestPaid(MarkPaymentRequestPaid {
            payment_request_id,
            paid_by: user,
            amount,
            reference,
            occurred_at: Utc::now(),
        });
        self.dispatch_payment_request(payment_request_id, cmd)
    }

    pub fn payment_request(&self, payment_request_id: PaymentRequestId) -> ServiceResult<PaymentRequest> {
        let request = self.dispatcher.load(payment_request_id.aggregate_id(), |id| {
            PaymentRequest::empty(PaymentRequestId::new(id))
        })?;
        if !request.is_created() {
            return Err(DomainError::not_found().into());
        }
        Ok(request)
    }

    fn pending_for_current_phase(&self, shipment: &Shipment) -> ServiceResult<usize> {
        if !self.policies.settle_payment_requests || shipment.status() != ShipmentStatus::Active {
            return Ok(0);
        }
        let Some(phase) = shipment.current_phase() else {
            return Ok(0);
        };
        let runner = locked(&self.payment_requests)?;
        Ok(runner.projection().pending_count(shipment.id_typed(), phase))
    }

    fn payment_requests_of(&self, shipment_id: ShipmentId) -> ServiceResult<Vec<PaymentRequestSummary>> {
        let runner = locked(&self.payment_requests)?;
        Ok(runner.projection().for_shipment(shipment_id))
    }

    fn dispatch_shipment(
        &self,
        shipment_id: ShipmentId,
        cmd: ShipmentCommand,
    ) -> ServiceResult<Shipment> {
        let committed = self.dispatcher.dispatch(
            shipment_id.aggregate_id(),
            aggregate_types::SHIPMENT,
            cmd,
            |id| Shipment::empty(ShipmentId::new(id)),
        )?;
        self.project(&committed)?;
        Ok(committed.aggregate)
    }

    fn dispatch_payment_request(
        &self,
        payment_request_id: PaymentRequestId,
        cmd: PaymentRequestCommand,
    ) -> ServiceResult<PaymentRequest> {
        let committed = self.dispatcher.dispatch(
            payment_request_id.aggregate_id(),
            aggregate_types::PAYMENT_REQUEST,
            cmd,
            |id| PaymentRequest::empty(PaymentRequestId::new(id)),
        )?;
        self.project(&committed)?;
        Ok(committed.aggregate)
    }
}
