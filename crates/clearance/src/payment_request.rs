//! Payment requests: quoted expenses raised against a shipment phase and
//! approved before money leaves the company.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clearway_core::{
    Aggregate, AggregateRoot, ClientId, Currency, DomainError, Money, UserId, typed_id,
};
use clearway_events::Event;

use crate::document::FileRef;
use crate::phase::Phase;
use crate::shipment::ShipmentId;

typed_id!(PaymentRequestId);

/// pending -> approved | rejected; approved -> paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentRequestStatus {
    Pending,
    Approved,
    Rejected,
    Paid,
}

impl PaymentRequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentRequestStatus::Pending => "pending",
            PaymentRequestStatus::Approved => "approved",
            PaymentRequestStatus::Rejected => "rejected",
            PaymentRequestStatus::Paid => "paid",
        }
    }

    /// Requests still awaiting a decision or a payment.
    pub fn is_open(self) -> bool {
        matches!(
            self,
            PaymentRequestStatus::Pending | PaymentRequestStatus::Approved
        )
    }
}

impl core::fmt::Display for PaymentRequestStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: PaymentRequest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    id: PaymentRequestId,
    shipment_id: Option<ShipmentId>,
    client_id: Option<ClientId>,
    phase: Option<Phase>,
    description: String,
    estimated: Option<Money>,
    quotation: Option<FileRef>,
    status: PaymentRequestStatus,
    requested_by: Option<UserId>,
    requested_at: Option<DateTime<Utc>>,
    decided_by: Option<UserId>,
    decided_at: Option<DateTime<Utc>>,
    decision_note: Option<String>,
    paid_amount: Option<i64>,
    paid_at: Option<DateTime<Utc>>,
    payment_reference: Option<String>,
    version: u64,
    created: bool,
}

impl PaymentRequest {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PaymentRequestId) -> Self {
        Self {
            id,
            shipment_id: None,
            client_id: None,
            phase: None,
            description: String::new(),
            estimated: None,
            quotation: None,
            status: PaymentRequestStatus::Pending,
            requested_by: None,
            requested_at: None,
            decided_by: None,
            decided_at: None,
            decision_note: None,
            paid_amount: None,
            paid_at: None,
            payment_reference: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PaymentRequestId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn shipment_id(&self) -> Option<ShipmentId> {
        self.shipment_id
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn estimated(&self) -> Option<Money> {
        self.estimated
    }

    pub fn quotation(&self) -> Option<&FileRef> {
        self.quotation.as_ref()
    }

    pub fn status(&self) -> PaymentRequestStatus {
        self.status
    }

    pub fn requested_by(&self) -> Option<UserId> {
        self.requested_by
    }

    pub fn requested_at(&self) -> Option<DateTime<Utc>> {
        self.requested_at
    }

    pub fn decided_by(&self) -> Option<UserId> {
        self.decided_by
    }

    pub fn decided_at(&self) -> Option<DateTime<Utc>> {
        self.decided_at
    }

    pub fn decision_note(&self) -> Option<&str> {
        self.decision_note.as_deref()
    }

    /// Amount actually paid, once paid.
    pub fn paid(&self) -> Option<Money> {
        let currency = self.estimated?.currency;
        self.paid_amount.map(|amount| Money::new(amount, currency))
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn payment_reference(&self) -> Option<&str> {
        self.payment_reference.as_deref()
    }
}

impl AggregateRoot for PaymentRequest {
    type Id = PaymentRequestId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RequestPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestPayment {
    pub payment_request_id: PaymentRequestId,
    pub shipment_id: ShipmentId,
    pub client_id: ClientId,
    pub phase: Phase,
    pub description: String,
    /// Estimated amount in minor units.
    pub amount: i64,
    pub currency: Currency,
    pub quotation: FileRef,
    pub requested_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApprovePaymentRequest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovePaymentRequest {
    pub payment_request_id: PaymentRequestId,
    pub approved_by: UserId,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectPaymentRequest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectPaymentRequest {
    pub payment_request_id: PaymentRequestId,
    pub rejected_by: UserId,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkPaymentRequestPaid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkPaymentRequestPaid {
    pub payment_request_id: PaymentRequestId,
    pub paid_by: UserId,
    /// Actual amount paid; defaults to the estimate.
    pub amount: Option<i64>,
    pub reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentRequestCommand {
    RequestPayment(RequestPayment),
    ApprovePaymentRequest(ApprovePaymentRequest),
    RejectPaymentRequest(RejectPaymentRequest),
    MarkPaymentRequestPaid(MarkPaymentRequestPaid),
}

/// Event: PaymentRequested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequested {
    pub payment_request_id: PaymentRequestId,
    pub shipment_id: ShipmentId,
    pub client_id: ClientId,
    pub phase: Phase,
    pub description: String,
    pub amount: i64,
    pub currency: Currency,
    pub quotation: FileRef,
    pub requested_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentRequestApproved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequestApproved {
    pub payment_request_id: PaymentRequestId,
    pub approved_by: UserId,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentRequestRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequestRejected {
    pub payment_request_id: PaymentRequestId,
    pub rejected_by: UserId,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentRequestPaid. The expense the ledger picks up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequestPaid {
    pub payment_request_id: PaymentRequestId,
    pub shipment_id: ShipmentId,
    pub client_id: ClientId,
    pub amount: i64,
    pub currency: Currency,
    pub reference: Option<String>,
    pub paid_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentRequestEvent {
    PaymentRequested(PaymentRequested),
    PaymentRequestApproved(PaymentRequestApproved),
    PaymentRequestRejected(PaymentRequestRejected),
    PaymentRequestPaid(PaymentRequestPaid),
}

impl Event for PaymentRequestEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PaymentRequestEvent::PaymentRequested(_) => "clearance.payment_request.requested",
            PaymentRequestEvent::PaymentRequestApproved(_) => "clearance.payment_request.approved",
            PaymentRequestEvent::PaymentRequestRejected(_) => "clearance.payment_request.rejected",
            PaymentRequestEvent::PaymentRequestPaid(_) => "clearance.payment_request.paid",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PaymentRequestEvent::PaymentRequested(e) => e.occurred_at,
            PaymentRequestEvent::PaymentRequestApproved(e) => e.occurred_at,
            PaymentRequestEvent::PaymentRequestRejected(e) => e.occurred_at,
            PaymentRequestEvent::PaymentRequestPaid(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PaymentRequest {
    type Command = PaymentRequestCommand;
    type Event = PaymentRequestEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PaymentRequestEvent::PaymentRequested(e) => {
                self.id = e.payment_request_id;
                self.shipment_id = Some(e.shipment_id);
                self.client_id = Some(e.client_id);
                self.phase = Some(e.phase);
                self.description = e.description.clone();
                self.estimated = Some(Money::new(e.amount, e.currency));
                self.quotation = Some(e.quotation.clone());
                self.status = PaymentRequestStatus::Pending;
                self.requested_by = Some(e.requested_by);
                self.requested_at = Some(e.occurred_at);
                self.created = true;
            }
            PaymentRequestEvent::PaymentRequestApproved(e) => {
                self.status = PaymentRequestStatus::Approved;
                self.decided_by = Some(e.approved_by);
                self.decided_at = Some(e.occurred_at);
                self.decision_note = e.note.clone();
            }
            PaymentRequestEvent::PaymentRequestRejected(e) => {
                self.status = PaymentRequestStatus::Rejected;
                self.decided_by = Some(e.rejected_by);
                self.decided_at = Some(e.occurred_at);
                self.decision_note = e.note.clone();
            }
            PaymentRequestEvent::PaymentRequestPaid(e) => {
                self.status = PaymentRequestStatus::Paid;
                self.paid_amount = Some(e.amount);
                self.paid_at = Some(e.occurred_at);
                self.payment_reference = e.reference.clone();
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PaymentRequestCommand::RequestPayment(cmd) => self.handle_request(cmd),
            PaymentRequestCommand::ApprovePaymentRequest(cmd) => self.handle_approve(cmd),
            PaymentRequestCommand::RejectPaymentRequest(cmd) => self.handle_reject(cmd),
            PaymentRequestCommand::MarkPaymentRequestPaid(cmd) => self.handle_mark_paid(cmd),
        }
    }
}

impl PaymentRequest {
    fn ensure_created(&self, id: PaymentRequestId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != id {
            return Err(DomainError::invariant("payment_request_id mismatch"));
        }
        Ok(())
    }

    fn ensure_status(
        &self,
        expected: PaymentRequestStatus,
        attempted: PaymentRequestStatus,
    ) -> Result<(), DomainError> {
        if self.status != expected {
            return Err(DomainError::transition(
                "payment request",
                self.status,
                attempted,
            ));
        }
        Ok(())
    }

    fn handle_request(&self, cmd: &RequestPayment) -> Result<Vec<PaymentRequestEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("payment request already exists"));
        }
        if cmd.description.trim().is_empty() {
            return Err(DomainError::validation("description is required"));
        }
        Money::positive(cmd.amount, cmd.currency)?;
        cmd.quotation.validate()?;

        Ok(vec![PaymentRequestEvent::PaymentRequested(PaymentRequested {
            payment_request_id: cmd.payment_request_id,
            shipment_id: cmd.shipment_id,
            client_id: cmd.client_id,
            phase: cmd.phase,
            description: cmd.description.clone(),
            amount: cmd.amount,
            currency: cmd.currency,
            quotation: cmd.quotation.clone(),
            requested_by: cmd.requested_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(
        &self,
        cmd: &ApprovePaymentRequest,
    ) -> Result<Vec<PaymentRequestEvent>, DomainError> {
        self.ensure_created(cmd.payment_request_id)?;
        self.ensure_status(PaymentRequestStatus::Pending, PaymentRequestStatus::Approved)?;

        Ok(vec![PaymentRequestEvent::PaymentRequestApproved(
            PaymentRequestApproved {
                payment_request_id: cmd.payment_request_id,
                approved_by: cmd.approved_by,
                note: cmd.note.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_reject(
        &self,
        cmd: &RejectPaymentRequest,
    ) -> Result<Vec<PaymentRequestEvent>, DomainError> {
        self.ensure_created(cmd.payment_request_id)?;
        self.ensure_status(PaymentRequestStatus::Pending, PaymentRequestStatus::Rejected)?;

        Ok(vec![PaymentRequestEvent::PaymentRequestRejected(
            PaymentRequestRejected {
                payment_request_id: cmd.payment_request_id,
                rejected_by: cmd.rejected_by,
                note: cmd.note.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_mark_paid(
        &self,
        cmd: &MarkPaymentRequestPaid,
    ) -> Result<Vec<PaymentRequestEvent>, DomainError> {
        self.ensure_created(cmd.payment_request_id)?;
        self.ensure_status(PaymentRequestStatus::Approved, PaymentRequestStatus::Paid)?;

        let (Some(estimated), Some(shipment_id), Some(client_id)) =
            (self.estimated, self.shipment_id, self.client_id)
        else {
            return Err(DomainError::invariant("payment request is missing its origin"));
        };
        let paid = Money::positive(cmd.amount.unwrap_or(estimated.amount), estimated.currency)?;

        Ok(vec![PaymentRequestEvent::PaymentRequestPaid(PaymentRequestPaid {
            payment_request_id: cmd.payment_request_id,
            shipment_id,
            client_id,
            amount: paid.amount,
            currency: paid.currency,
            reference: cmd.reference.clone(),
            paid_by: cmd.paid_by,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clearway_core::AggregateId;
    use clearway_events::execute;

    fn test_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-05T14:30:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn mzn() -> Currency {
        Currency::parse("MZN").unwrap()
    }

    fn request_cmd(id: PaymentRequestId, amount: i64) -> PaymentRequestCommand {
        PaymentRequestCommand::RequestPayment(RequestPayment {
            payment_request_id: id,
            shipment_id: ShipmentId::new(AggregateId::new()),
            client_id: ClientId::new(),
            phase: Phase::Cornelder,
            description: "Port storage fees".into(),
            amount,
            currency: mzn(),
            quotation: FileRef {
                reference: "quotes/cornelder-0042.pdf".into(),
                size_bytes: 80_000,
                checksum: None,
            },
            requested_by: UserId::new(),
            occurred_at: test_time(),
        })
    }

    fn pending() -> PaymentRequest {
        let id = PaymentRequestId::new(AggregateId::new());
        let mut pr = PaymentRequest::empty(id);
        execute(&mut pr, &request_cmd(id, 45_000)).unwrap();
        pr
    }

    fn approve(pr: &mut PaymentRequest) -> Result<Vec<PaymentRequestEvent>, DomainError> {
        let cmd = PaymentRequestCommand::ApprovePaymentRequest(ApprovePaymentRequest {
            payment_request_id: pr.id_typed(),
            approved_by: UserId::new(),
            note: None,
            occurred_at: test_time(),
        });
        execute(pr, &cmd)
    }

    fn mark_paid(
        pr: &mut PaymentRequest,
        amount: Option<i64>,
    ) -> Result<Vec<PaymentRequestEvent>, DomainError> {
        let cmd = PaymentRequestCommand::MarkPaymentRequestPaid(MarkPaymentRequestPaid {
            payment_request_id: pr.id_typed(),
            paid_by: UserId::new(),
            amount,
            reference: Some("TRF-778".into()),
            occurred_at: test_time(),
        });
        execute(pr, &cmd)
    }

    #[test]
    fn request_starts_pending() {
        let pr = pending();
        assert_eq!(pr.status(), PaymentRequestStatus::Pending);
        assert_eq!(pr.estimated(), Some(Money::new(45_000, mzn())));
        assert!(pr.status().is_open());
    }

    #[test]
    fn zero_amount_is_rejected() {
        let id = PaymentRequestId::new(AggregateId::new());
        let pr = PaymentRequest::empty(id);
        let err = pr.handle(&request_cmd(id, 0)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn approved_request_can_be_paid_once() {
        let mut pr = pending();
        approve(&mut pr).unwrap();
        let events = mark_paid(&mut pr, None).unwrap();

        match &events[0] {
            PaymentRequestEvent::PaymentRequestPaid(e) => {
                assert_eq!(e.amount, 45_000);
                assert_eq!(e.currency, mzn());
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(pr.status(), PaymentRequestStatus::Paid);
        assert_eq!(pr.paid(), Some(Money::new(45_000, mzn())));

        let version = pr.version();
        match mark_paid(&mut pr, None).unwrap_err() {
            DomainError::InvalidTransition { from, to, .. } => {
                assert_eq!(from, "paid");
                assert_eq!(to, "paid");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(pr.version(), version);
    }

    #[test]
    fn pending_request_cannot_be_paid() {
        let mut pr = pending();
        let err = mark_paid(&mut pr, None).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }

    #[test]
    fn rejected_request_is_final() {
        let mut pr = pending();
        let cmd = PaymentRequestCommand::RejectPaymentRequest(RejectPaymentRequest {
            payment_request_id: pr.id_typed(),
            rejected_by: UserId::new(),
            note: Some("quotation expired".into()),
            occurred_at: test_time(),
        });
        execute(&mut pr, &cmd).unwrap();

        assert_eq!(pr.status(), PaymentRequestStatus::Rejected);
        assert_eq!(pr.decision_note(), Some("quotation expired"));
        assert!(!pr.status().is_open());
        assert!(approve(&mut pr).is_err());
        assert!(execute(&mut pr, &cmd).is_err());
    }

    #[test]
    fn actual_paid_amount_overrides_estimate() {
        let mut pr = pending();
        approve(&mut pr).unwrap();
        mark_paid(&mut pr, Some(47_250)).unwrap();
        assert_eq!(pr.paid(), Some(Money::new(47_250, mzn())));
        assert_eq!(pr.payment_reference(), Some("TRF-778"));
    }
}
