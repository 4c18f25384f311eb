//! Invoice, receipt and credit note use cases.

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::instrument;

use clearway_billing::{
    AddInvoiceItem, ApplyCreditNote, CancelCreditNote, CancelInvoice, CreateCreditNote,
    CreateInvoice, CreditNote, CreditNoteCommand, CreditNoteId, CreditNoteStatus, CreditPolicy,
    CreditReason, CreditSource, Invoice, InvoiceCommand, InvoiceId, IssueCreditNote, IssueInvoice,
    LineItem, PaymentMethod, ReceiptId, RecordReceipt, RemoveInvoiceItem, ReplaceInvoiceItems,
    ReviseCreditNoteItems,
};
use clearway_clearance::ShipmentId;
use clearway_core::{ClientId, Currency, DomainError, UserId};

use super::{ClearwayServices, ServiceResult, aggregate_types, locked};
use crate::sequence::Series;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateInvoiceInput {
    pub client_id: ClientId,
    #[serde(default)]
    pub shipment_ids: Vec<ShipmentId>,
    pub currency: Currency,
    /// Defaults to today.
    #[serde(default)]
    pub issue_date: Option<NaiveDate>,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordReceiptInput {
    pub invoice_id: InvoiceId,
    pub amount: i64,
    pub currency: Currency,
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    pub method: PaymentMethod,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCreditNoteInput {
    pub invoice_id: InvoiceId,
    pub reason: CreditReason,
    #[serde(default)]
    pub description: Option<String>,
    /// Copied from the invoice when absent.
    #[serde(default)]
    pub items: Option<Vec<LineItem>>,
    #[serde(default)]
    pub issue_date: Option<NaiveDate>,
}

impl ClearwayServices {
    #[instrument(skip(self, input), fields(client_id = %input.client_id))]
    pub fn create_invoice(&self, input: CreateInvoiceInput, user: UserId) -> ServiceResult<Invoice> {
        for shipment_id in &input.shipment_ids {
            let shipment = self.shipment(*shipment_id)?;
            if shipment.client_id() != Some(input.client_id) {
                return Err(DomainError::validation(format!(
                    "shipment {} belongs to another client",
                    shipment.reference()
                ))
                .into());
            }
        }

        let number = self.next_number(Series::INVOICE)?;
        let invoice_id = InvoiceId::generate();
        let cmd = InvoiceCommand::CreateInvoice(CreateInvoice {
            invoice_id,
            number,
            client_id: input.client_id,
            shipment_ids: input.shipment_ids,
            currency: input.currency,
            issue_date: input.issue_date.unwrap_or_else(|| Utc::now().date_naive()),
            payment_terms_days: self.policies.payment_terms_days,
            items: input.items,
            notes: input.notes,
            created_by: user,
            occurred_at: Utc::now(),
        });
        self.dispatch_invoice(invoice_id, cmd)
    }

    pub fn invoice(&self, invoice_id: InvoiceId) -> ServiceResult<Invoice> {
        let invoice = self
            .dispatcher
            .load(invoice_id.aggregate_id(), |id| Invoice::empty(InvoiceId::new(id)))?;
        if !invoice.is_created() {
            return Err(DomainError::not_found().into());
        }
        Ok(invoice)
    }

    pub fn add_invoice_item(&self, invoice_id: InvoiceId, item: LineItem) -> ServiceResult<Invoice> {
        let cmd = InvoiceCommand::AddInvoiceItem(AddInvoiceItem {
            invoice_id,
            item,
            occurred_at: Utc::now(),
        });
        self.dispatch_invoice(invoice_id, cmd)
    }

    pub fn remove_invoice_item(&self, invoice_id: InvoiceId, line_no: u32) -> ServiceResult<Invoice> {
        let cmd = InvoiceCommand::RemoveInvoiceItem(RemoveInvoiceItem {
            invoice_id,
            line_no,
            occurred_at: Utc::now(),
        });
        self.dispatch_invoice(invoice_id, cmd)
    }

    pub fn replace_invoice_items(
        &self,
        invoice_id: InvoiceId,
        items: Vec<LineItem>,
    ) -> ServiceResult<Invoice> {
        let cmd = InvoiceCommand::ReplaceInvoiceItems(ReplaceInvoiceItems {
            invoice_id,
            items,
            occurred_at: Utc::now(),
        });
        self.dispatch_invoice(invoice_id, cmd)
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub fn issue_invoice(&self, invoice_id: InvoiceId, user: UserId) -> ServiceResult<Invoice> {
        let cmd = InvoiceCommand::IssueInvoice(IssueInvoice {
            invoice_id,
            issued_by: user,
            occurred_at: Utc::now(),
        });
        self.dispatch_invoice(invoice_id, cmd)
    }

    #[instrument(skip(self, reason), fields(invoice_id = %invoice_id))]
    pub fn cancel_invoice(
        &self,
        invoice_id: InvoiceId,
        reason: String,
        user: UserId,
    ) -> ServiceResult<Invoice> {
        let cmd = InvoiceCommand::CancelInvoice(CancelInvoice {
            invoice_id,
            reason,
            cancelled_by: user,
            occurred_at: Utc::now(),
        });
        self.dispatch_invoice(invoice_id, cmd)
    }

    /// Returns the invoice with the new receipt last in `receipts()`.
    #[instrument(skip(self, input), fields(invoice_id = %input.invoice_id, amount = input.amount))]
    pub fn record_receipt(&self, input: RecordReceiptInput, user: UserId) -> ServiceResult<Invoice> {
        // Unknown invoices must not consume a receipt number.
        self.invoice(input.invoice_id)?;

        let number = self.next_number(Series::RECEIPT)?;
        let cmd = InvoiceCommand::RecordReceipt(RecordReceipt {
            invoice_id: input.invoice_id,
            receipt_id: ReceiptId::generate(),
            number,
            amount: input.amount,
            currency: input.currency,
            payment_date: input.payment_date.unwrap_or_else(|| Utc::now().date_naive()),
            method: input.method,
            reference: input.reference,
            policy: self.policies.overpayment,
            recorded_by: user,
            occurred_at: Utc::now(),
        });
        self.dispatch_invoice(input.invoice_id, cmd)
    }

    #[instrument(skip(self, input), fields(invoice_id = %input.invoice_id))]
    pub fn create_credit_note(
        &self,
        input: CreateCreditNoteInput,
        user: UserId,
    ) -> ServiceResult<CreditNote> {
        let _writes = locked(&self.credit_writes)?;
        let invoice = self.invoice(input.invoice_id)?;
        let already_credited = match self.policies.credit {
            CreditPolicy::Unbounded => 0,
            CreditPolicy::CapAtInvoiceBalance => self.credited_against(input.invoice_id, None)?,
        };
        let source = CreditSource::from_invoice(&invoice, self.policies.credit, already_credited)?;

        let number = self.next_number(Series::CREDIT_NOTE)?;
        let credit_note_id = CreditNoteId::generate();
        let cmd = CreditNoteCommand::CreateCreditNote(CreateCreditNote {
            credit_note_id,
            number,
            source,
            reason: input.reason,
            description: input.description,
            items: input.items,
            issue_date: input.issue_date.unwrap_or_else(|| Utc::now().date_naive()),
            created_by: user,
            occurred_at: Utc::now(),
        });
        self.dispatch_credit_note(credit_note_id, cmd)
    }

    pub fn credit_note(&self, credit_note_id: CreditNoteId) -> ServiceResult<CreditNote> {
        let note = self.dispatcher.load(credit_note_id.aggregate_id(), |id| {
            CreditNote::empty(CreditNoteId::new(id))
        })?;
        if !note.is_created() {
            return Err(DomainError::not_found().into());
        }
        Ok(note)
    }

    /// Under the cap policy the limit is recomputed from every other note on
    /// the invoice, not taken from the note's creation.
    #[instrument(skip(self, items), fields(credit_note_id = %credit_note_id))]
    pub fn revise_credit_note_items(
        &self,
        credit_note_id: CreditNoteId,
        items: Vec<LineItem>,
    ) -> ServiceResult<CreditNote> {
        let _writes = locked(&self.credit_writes)?;
        let credit_limit = match self.policies.credit {
            CreditPolicy::Unbounded => None,
            CreditPolicy::CapAtInvoiceBalance => {
                let note = self.credit_note(credit_note_id)?;
                let Some(invoice_id) = note.invoice_id() else {
                    return Err(DomainError::invariant("credit note has no invoice").into());
                };
                let invoice = self.invoice(invoice_id)?;
                let others = self.credited_against(invoice_id, Some(credit_note_id))?;
                Some(invoice.totals().total.saturating_sub(others).max(0))
            }
        };

        let cmd = CreditNoteCommand::ReviseCreditNoteItems(ReviseCreditNoteItems {
            credit_note_id,
            items,
            credit_limit,
            occurred_at: Utc::now(),
        });
        self.dispatch_credit_note(credit_note_id, cmd)
    }

    /// Move a credit note to `target` (issued, applied or cancelled).
    #[instrument(skip(self, reason), fields(credit_note_id = %credit_note_id, target = %target))]
    pub fn change_credit_note_status(
        &self,
        credit_note_id: CreditNoteId,
        target: CreditNoteStatus,
        reason: Option<String>,
        user: UserId,
    ) -> ServiceResult<CreditNote> {
        let occurred_at = Utc::now();
        let cmd = match target {
            CreditNoteStatus::Issued => CreditNoteCommand::IssueCreditNote(IssueCreditNote {
                credit_note_id,
                issued_by: user,
                occurred_at,
            }),
            CreditNoteStatus::Applied => CreditNoteCommand::ApplyCreditNote(ApplyCreditNote {
                credit_note_id,
                applied_by: user,
                occurred_at,
            }),
            CreditNoteStatus::Cancelled => CreditNoteCommand::CancelCreditNote(CancelCreditNote {
                credit_note_id,
                reason,
                cancelled_by: user,
                occurred_at,
            }),
            CreditNoteStatus::Draft => {
                let current = self.credit_note(credit_note_id)?.status();
                return Err(DomainError::transition("credit note", current, target).into());
            }
        };
        self.dispatch_credit_note(credit_note_id, cmd)
    }

    /// Sum of totals of non-cancelled credit notes raised against an invoice,
    /// leaving out `excluding`.
    fn credited_against(
        &self,
        invoice_id: InvoiceId,
        excluding: Option<CreditNoteId>,
    ) -> ServiceResult<i64> {
        let notes = self.dispatcher.load_all(aggregate_types::CREDIT_NOTE, |id| {
            CreditNote::empty(CreditNoteId::new(id))
        })?;

        let credited = notes
            .iter()
            .filter(|n| n.invoice_id() == Some(invoice_id))
            .filter(|n| Some(n.id_typed()) != excluding)
            .filter(|n| n.status() != CreditNoteStatus::Cancelled)
            .try_fold(0i64, |acc, n| acc.checked_add(n.totals().total))
            .ok_or_else(|| DomainError::validation("credited amount overflow"))?;
        Ok(credited)
    }

    fn dispatch_invoice(&self, invoice_id: InvoiceId, cmd: InvoiceCommand) -> ServiceResult<Invoice> {
        let committed = self.dispatcher.dispatch(
            invoice_id.aggregate_id(),
            aggregate_types::INVOICE,
            cmd,
            |id| Invoice::empty(InvoiceId::new(id)),
        )?;
        self.project(&committed)?;
        Ok(committed.aggregate)
    }

    fn dispatch_credit_note(
        &self,
        credit_note_id: CreditNoteId,
        cmd: CreditNoteCommand,
    ) -> ServiceResult<CreditNote> {
        let committed = self.dispatcher.dispatch(
            credit_note_id.aggregate_id(),
            aggregate_types::CREDIT_NOTE,
            cmd,
            |id| CreditNote::empty(CreditNoteId::new(id)),
        )?;
        self.project(&committed)?;
        Ok(committed.aggregate)
    }
}
