use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use clearway_accounting::{FinancialTransaction, StatementFilter};
use clearway_billing::{CreditNote, CreditNoteStatus, Invoice, LineItem};
use clearway_clearance::{DocumentId, PaymentRequest, Shipment};
use clearway_core::{ClientId, Currency};
use clearway_infra::services::Readiness;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------
//
// Create bodies deserialize straight into the service inputs
// (`OpenShipmentInput`, `CreateInvoiceInput`, ...); the ones below cover the
// state-change endpoints.

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct RevertRequest {
    pub to_phase: clearway_clearance::Phase,
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DecisionRequest {
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PayRequest {
    /// Actual amount paid; defaults to the estimate.
    pub amount: Option<i64>,
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ItemsRequest {
    pub items: Vec<LineItem>,
}

#[derive(Debug, Deserialize)]
pub struct CreditNoteStatusRequest {
    pub status: CreditNoteStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VoidRequest {
    pub reason: String,
}

/// Raw `/statement` query; every field optional.
#[derive(Debug, Default, Deserialize)]
pub struct StatementQuery {
    pub client_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub currency: Option<String>,
}

impl StatementQuery {
    pub fn into_filter(self) -> Result<StatementFilter, axum::response::Response> {
        let client_id = non_empty(self.client_id)
            .map(|raw| errors::parse_id::<ClientId>(&raw, "client_id"))
            .transpose()?;
        let from = non_empty(self.from).map(|raw| parse_date(&raw, "from")).transpose()?;
        let to = non_empty(self.to).map(|raw| parse_date(&raw, "to")).transpose()?;
        let currency = non_empty(self.currency)
            .map(|raw| Currency::parse(&raw).map_err(errors::domain_error_to_response))
            .transpose()?;

        Ok(StatementFilter {
            client_id,
            from,
            to,
            currency,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_date(raw: &str, field: &'static str) -> Result<NaiveDate, axum::response::Response> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        errors::json_error(
            axum::http::StatusCode::BAD_REQUEST,
            "validation_error",
            format!("{field} must be a date (YYYY-MM-DD)"),
        )
    })
}

// -------------------------
// Response mapping
// -------------------------

pub fn shipment_to_json(s: &Shipment) -> JsonValue {
    json!({
        "id": s.id_typed().to_string(),
        "reference": s.reference(),
        "client_id": s.client_id(),
        "consignee_id": s.consignee_id(),
        "cargo_type": s.cargo_type(),
        "description": s.description(),
        "status": s.status(),
        "current_phase": s.current_phase(),
        "documents": s.documents().documents(),
        "history": s.history(),
        "cancellation_reason": s.cancellation_reason(),
        "created_by": s.created_by(),
        "created_at": s.created_at().map(|t| t.to_rfc3339()),
        "version": clearway_core::AggregateRoot::version(s),
    })
}

pub fn document_attached_to_json(s: &Shipment, document_id: DocumentId) -> JsonValue {
    json!({
        "id": document_id.to_string(),
        "shipment_id": s.id_typed().to_string(),
        "document": s.documents().get(document_id),
        "readiness": s.readiness(),
    })
}

pub fn readiness_to_json(r: &Readiness) -> JsonValue {
    json!({
        "shipment_id": r.shipment.id_typed().to_string(),
        "status": r.shipment.status(),
        "phase": r.phase.as_ref().map(|p| p.phase),
        "missing_documents": r.phase.as_ref().map(|p| p.missing_documents.clone()).unwrap_or_default(),
        "pending_payment_requests": r.pending_payment_requests,
        "can_advance": r.can_advance(),
        "payment_requests": r.payment_requests,
    })
}

pub fn payment_request_to_json(pr: &PaymentRequest) -> JsonValue {
    json!({
        "id": pr.id_typed().to_string(),
        "shipment_id": pr.shipment_id(),
        "client_id": pr.client_id(),
        "phase": pr.phase(),
        "description": pr.description(),
        "estimated": pr.estimated(),
        "quotation": pr.quotation(),
        "status": pr.status(),
        "requested_by": pr.requested_by(),
        "requested_at": pr.requested_at().map(|t| t.to_rfc3339()),
        "decided_by": pr.decided_by(),
        "decided_at": pr.decided_at().map(|t| t.to_rfc3339()),
        "decision_note": pr.decision_note(),
        "paid": pr.paid(),
        "paid_at": pr.paid_at().map(|t| t.to_rfc3339()),
        "payment_reference": pr.payment_reference(),
    })
}

/// `today` decides whether an issued invoice reads as overdue.
pub fn invoice_to_json(inv: &Invoice, today: NaiveDate) -> JsonValue {
    let totals = inv.totals();
    json!({
        "id": inv.id_typed().to_string(),
        "number": inv.number(),
        "client_id": inv.client_id(),
        "shipment_ids": inv.shipment_ids(),
        "currency": inv.currency(),
        "issue_date": inv.issue_date(),
        "due_date": inv.due_date(),
        "status": inv.status_on(today),
        "items": inv.items(),
        "subtotal": totals.subtotal,
        "tax_amount": totals.tax_amount,
        "total": totals.total,
        "total_received": inv.total_received(),
        "outstanding": inv.outstanding(),
        "receipts": inv.receipts(),
        "notes": inv.notes(),
        "issued_at": inv.issued_at().map(|t| t.to_rfc3339()),
        "cancellation_reason": inv.cancellation_reason(),
    })
}

pub fn credit_note_to_json(cn: &CreditNote) -> JsonValue {
    let totals = cn.totals();
    json!({
        "id": cn.id_typed().to_string(),
        "number": cn.number(),
        "invoice_id": cn.invoice_id(),
        "invoice_number": cn.invoice_number(),
        "client_id": cn.client_id(),
        "currency": cn.currency(),
        "issue_date": cn.issue_date(),
        "reason": cn.reason(),
        "description": cn.description(),
        "items": cn.items(),
        "subtotal": totals.subtotal,
        "tax_amount": totals.tax_amount,
        "total": totals.total,
        "credit_limit": cn.credit_limit(),
        "status": cn.status(),
        "cancellation_reason": cn.cancellation_reason(),
    })
}

pub fn transaction_to_json(tx: &FinancialTransaction) -> JsonValue {
    json!({
        "id": tx.id_typed().to_string(),
        "kind": tx.kind(),
        "amount": tx.money(),
        "client_id": tx.client_id(),
        "shipment_id": tx.shipment_id(),
        "description": tx.description(),
        "category": tx.category(),
        "date": tx.date(),
        "voided": tx.is_voided(),
        "void_reason": tx.void_reason(),
        "recorded_by": tx.recorded_by(),
    })
}
