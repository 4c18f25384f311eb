use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use clearway_clearance::ShipmentId;
use clearway_core::{
    Aggregate, AggregateRoot, ClientId, Currency, DomainError, Entity, Money, UserId, typed_id,
};
use clearway_events::Event;

use crate::line::{LineItem, Totals, number_lines};
use crate::policy::OverpaymentPolicy;

typed_id!(InvoiceId);
typed_id!(ReceiptId);

/// Invoice status. `Overdue` is never stored; it is derived on read by
/// [`Invoice::status_on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Issued,
    Paid,
    Cancelled,
    Overdue,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Issued => "issued",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
            InvoiceStatus::Overdue => "overdue",
        }
    }
}

impl core::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Cheque,
    Card,
    MobileMoney,
    Other,
}

/// Money received against an invoice. Owned by the invoice stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: ReceiptId,
    pub number: String,
    pub invoice_id: InvoiceId,
    pub client_id: ClientId,
    pub amount: i64,
    pub currency: Currency,
    pub payment_date: NaiveDate,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub recorded_by: UserId,
    pub recorded_at: DateTime<Utc>,
}

impl Entity for Receipt {
    type Id = ReceiptId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Aggregate root: Invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    id: InvoiceId,
    number: String,
    client_id: Option<ClientId>,
    shipment_ids: Vec<ShipmentId>,
    currency: Option<Currency>,
    issue_date: Option<NaiveDate>,
    due_date: Option<NaiveDate>,
    items: Vec<LineItem>,
    totals: Totals,
    status: InvoiceStatus,
    receipts: Vec<Receipt>,
    notes: Option<String>,
    issued_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
    created_by: Option<UserId>,
    version: u64,
    created: bool,
}

impl Invoice {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: InvoiceId) -> Self {
        Self {
            id,
            number: String::new(),
            client_id: None,
            shipment_ids: Vec::new(),
            currency: None,
            issue_date: None,
            due_date: None,
            items: Vec::new(),
            totals: Totals::default(),
            status: InvoiceStatus::Draft,
            receipts: Vec::new(),
            notes: None,
            issued_at: None,
            cancellation_reason: None,
            created_by: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> InvoiceId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn shipment_ids(&self) -> &[ShipmentId] {
        &self.shipment_ids
    }

    pub fn currency(&self) -> Option<Currency> {
        self.currency
    }

    pub fn issue_date(&self) -> Option<NaiveDate> {
        self.issue_date
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn totals(&self) -> Totals {
        self.totals
    }

    /// Stored status (never `Overdue`).
    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    /// Status as seen on `today`: an issued invoice past its due date reads as overdue.
    pub fn status_on(&self, today: NaiveDate) -> InvoiceStatus {
        match (self.status, self.due_date) {
            (InvoiceStatus::Issued, Some(due)) if today > due => InvoiceStatus::Overdue,
            (status, _) => status,
        }
    }

    pub fn receipts(&self) -> &[Receipt] {
        &self.receipts
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.issued_at
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    /// Receipts are overflow-checked as they are recorded, so this fits.
    pub fn total_received(&self) -> i64 {
        self.receipts
            .iter()
            .fold(0i64, |acc, r| acc.saturating_add(r.amount))
    }

    /// Total minus receipts. Negative when overpaid.
    pub fn outstanding(&self) -> i64 {
        self.totals.total - self.total_received()
    }

    pub fn total_money(&self) -> Option<Money> {
        self.currency.map(|c| Money::new(self.totals.total, c))
    }

    /// Issued or paid: the invoice counts towards the client's ledger.
    pub fn is_billed(&self) -> bool {
        matches!(self.status, InvoiceStatus::Issued | InvoiceStatus::Paid)
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateInvoice (a numbered draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInvoice {
    pub invoice_id: InvoiceId,
    pub number: String,
    pub client_id: ClientId,
    pub shipment_ids: Vec<ShipmentId>,
    pub currency: Currency,
    pub issue_date: NaiveDate,
    pub payment_terms_days: u32,
    pub items: Vec<LineItem>,
    pub notes: Option<String>,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddInvoiceItem (draft only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddInvoiceItem {
    pub invoice_id: InvoiceId,
    pub item: LineItem,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveInvoiceItem (draft only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveInvoiceItem {
    pub invoice_id: InvoiceId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReplaceInvoiceItems (draft only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceInvoiceItems {
    pub invoice_id: InvoiceId,
    pub items: Vec<LineItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: IssueInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueInvoice {
    pub invoice_id: InvoiceId,
    pub issued_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordReceipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordReceipt {
    pub invoice_id: InvoiceId,
    pub receipt_id: ReceiptId,
    /// Receipt number allocated before the command is issued.
    pub number: String,
    pub amount: i64,
    pub currency: Currency,
    pub payment_date: NaiveDate,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub policy: OverpaymentPolicy,
    pub recorded_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelInvoice {
    pub invoice_id: InvoiceId,
    pub reason: String,
    pub cancelled_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceCommand {
    CreateInvoice(CreateInvoice),
    AddInvoiceItem(AddInvoiceItem),
    RemoveInvoiceItem(RemoveInvoiceItem),
    ReplaceInvoiceItems(ReplaceInvoiceItems),
    IssueInvoice(IssueInvoice),
    RecordReceipt(RecordReceipt),
    CancelInvoice(CancelInvoice),
}

/// Event: InvoiceCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceCreated {
    pub invoice_id: InvoiceId,
    pub number: String,
    pub client_id: ClientId,
    pub shipment_ids: Vec<ShipmentId>,
    pub currency: Currency,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub items: Vec<LineItem>,
    pub totals: Totals,
    pub notes: Option<String>,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceItemsRevised. Carries the full item list after the edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceItemsRevised {
    pub invoice_id: InvoiceId,
    pub items: Vec<LineItem>,
    pub totals: Totals,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceIssued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceIssued {
    pub invoice_id: InvoiceId,
    pub total: i64,
    pub due_date: NaiveDate,
    pub issued_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReceiptRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptRecorded {
    pub invoice_id: InvoiceId,
    pub receipt: Receipt,
    pub total_received: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoicePaid (cumulative receipts reached the total).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePaid {
    pub invoice_id: InvoiceId,
    pub total_received: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceCancelled {
    pub invoice_id: InvoiceId,
    pub reason: String,
    pub cancelled_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    InvoiceCreated(InvoiceCreated),
    InvoiceItemsRevised(InvoiceItemsRevised),
    InvoiceIssued(InvoiceIssued),
    ReceiptRecorded(ReceiptRecorded),
    InvoicePaid(InvoicePaid),
    InvoiceCancelled(InvoiceCancelled),
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::InvoiceCreated(_) => "billing.invoice.created",
            InvoiceEvent::InvoiceItemsRevised(_) => "billing.invoice.items_revised",
            InvoiceEvent::InvoiceIssued(_) => "billing.invoice.issued",
            InvoiceEvent::ReceiptRecorded(_) => "billing.invoice.receipt_recorded",
            InvoiceEvent::InvoicePaid(_) => "billing.invoice.paid",
            InvoiceEvent::InvoiceCancelled(_) => "billing.invoice.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::InvoiceCreated(e) => e.occurred_at,
            InvoiceEvent::InvoiceItemsRevised(e) => e.occurred_at,
            InvoiceEvent::InvoiceIssued(e) => e.occurred_at,
            InvoiceEvent::ReceiptRecorded(e) => e.occurred_at,
            InvoiceEvent::InvoicePaid(e) => e.occurred_at,
            InvoiceEvent::InvoiceCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::InvoiceCreated(e) => {
                self.id = e.invoice_id;
                self.number = e.number.clone();
                self.client_id = Some(e.client_id);
                self.shipment_ids = e.shipment_ids.clone();
                self.currency = Some(e.currency);
                self.issue_date = Some(e.issue_date);
                self.due_date = Some(e.due_date);
                self.items = e.items.clone();
                self.totals = e.totals;
                self.notes = e.notes.clone();
                self.status = InvoiceStatus::Draft;
                self.created_by = Some(e.created_by);
                self.created = true;
            }
            InvoiceEvent::InvoiceItemsRevised(e) => {
                self.items = e.items.clone();
                self.totals = e.totals;
            }
            InvoiceEvent::InvoiceIssued(e) => {
                self.status = InvoiceStatus::Issued;
                self.due_date = Some(e.due_date);
                self.issued_at = Some(e.occurred_at);
            }
            InvoiceEvent::ReceiptRecorded(e) => {
                self.receipts.push(e.receipt.clone());
            }
            InvoiceEvent::InvoicePaid(_) => {
                self.status = InvoiceStatus::Paid;
            }
            InvoiceEvent::InvoiceCancelled(e) => {
                self.status = InvoiceStatus::Cancelled;
                self.cancellation_reason = Some(e.reason.clone());
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceCommand::CreateInvoice(cmd) => self.handle_create(cmd),
            InvoiceCommand::AddInvoiceItem(cmd) => {
                self.ensure_draft(cmd.invoice_id)?;
                let mut items = self.items.clone();
                items.push(cmd.item.clone());
                self.revise(cmd.invoice_id, &items, cmd.occurred_at)
            }
            InvoiceCommand::RemoveInvoiceItem(cmd) => {
                self.ensure_draft(cmd.invoice_id)?;
                if !self.items.iter().any(|i| i.line_no == cmd.line_no) {
                    return Err(DomainError::not_found());
                }
                let items: Vec<LineItem> = self
                    .items
                    .iter()
                    .filter(|i| i.line_no != cmd.line_no)
                    .cloned()
                    .collect();
                self.revise(cmd.invoice_id, &items, cmd.occurred_at)
            }
            InvoiceCommand::ReplaceInvoiceItems(cmd) => {
                self.ensure_draft(cmd.invoice_id)?;
                self.revise(cmd.invoice_id, &cmd.items, cmd.occurred_at)
            }
            InvoiceCommand::IssueInvoice(cmd) => self.handle_issue(cmd),
            InvoiceCommand::RecordReceipt(cmd) => self.handle_record_receipt(cmd),
            InvoiceCommand::CancelInvoice(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Invoice {
    fn ensure_created(&self, invoice_id: InvoiceId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != invoice_id {
            return Err(DomainError::invariant("invoice_id mismatch"));
        }
        Ok(())
    }

    fn ensure_draft(&self, invoice_id: InvoiceId) -> Result<(), DomainError> {
        self.ensure_created(invoice_id)?;
        if self.status != InvoiceStatus::Draft {
            return Err(DomainError::transition("invoice", self.status, "item edit"));
        }
        Ok(())
    }

    fn revise(
        &self,
        invoice_id: InvoiceId,
        items: &[LineItem],
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<InvoiceEvent>, DomainError> {
        let items = number_lines(items)?;
        let totals = Totals::compute(&items)?;
        Ok(vec![InvoiceEvent::InvoiceItemsRevised(InvoiceItemsRevised {
            invoice_id,
            items,
            totals,
            occurred_at,
        })])
    }

    fn handle_create(&self, cmd: &CreateInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("invoice already exists"));
        }
        if cmd.number.trim().is_empty() {
            return Err(DomainError::validation("invoice number must not be empty"));
        }

        let items = number_lines(&cmd.items)?;
        let totals = Totals::compute(&items)?;
        let due_date = cmd
            .issue_date
            .checked_add_days(Days::new(u64::from(cmd.payment_terms_days)))
            .ok_or_else(|| DomainError::validation("due date out of range"))?;

        Ok(vec![InvoiceEvent::InvoiceCreated(InvoiceCreated {
            invoice_id: cmd.invoice_id,
            number: cmd.number.clone(),
            client_id: cmd.client_id,
            shipment_ids: cmd.shipment_ids.clone(),
            currency: cmd.currency,
            issue_date: cmd.issue_date,
            due_date,
            items,
            totals,
            notes: cmd.notes.clone(),
            created_by: cmd.created_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_issue(&self, cmd: &IssueInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_created(cmd.invoice_id)?;

        if self.status != InvoiceStatus::Draft {
            return Err(DomainError::transition(
                "invoice",
                self.status,
                InvoiceStatus::Issued,
            ));
        }
        if self.items.is_empty() {
            return Err(DomainError::validation("cannot issue invoice without items"));
        }
        let due_date = self
            .due_date
            .ok_or_else(|| DomainError::invariant("draft invoice without due date"))?;

        Ok(vec![InvoiceEvent::InvoiceIssued(InvoiceIssued {
            invoice_id: cmd.invoice_id,
            total: self.totals.total,
            due_date,
            issued_by: cmd.issued_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_receipt(&self, cmd: &RecordReceipt) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_created(cmd.invoice_id)?;

        if !self.is_billed() {
            return Err(DomainError::transition("invoice", self.status, "receipt"));
        }
        let (Some(currency), Some(client_id)) = (self.currency, self.client_id) else {
            return Err(DomainError::invariant("invoice is missing currency or client"));
        };
        if cmd.currency != currency {
            return Err(DomainError::currency_mismatch(currency, cmd.currency));
        }
        Money::positive(cmd.amount, cmd.currency)?;
        if cmd.number.trim().is_empty() {
            return Err(DomainError::validation("receipt number must not be empty"));
        }
        if self.receipts.iter().any(|r| r.id == cmd.receipt_id) {
            return Err(DomainError::conflict("receipt already recorded"));
        }

        let total_received = self
            .total_received()
            .checked_add(cmd.amount)
            .ok_or_else(|| DomainError::validation("receipt total overflow"))?;
        if cmd.policy == OverpaymentPolicy::Reject && total_received > self.totals.total {
            return Err(DomainError::validation(format!(
                "receipt of {} would exceed the outstanding balance of {}",
                Money::new(cmd.amount, currency),
                Money::new(self.outstanding(), currency)
            )));
        }

        let mut events = vec![InvoiceEvent::ReceiptRecorded(ReceiptRecorded {
            invoice_id: cmd.invoice_id,
            receipt: Receipt {
                id: cmd.receipt_id,
                number: cmd.number.clone(),
                invoice_id: cmd.invoice_id,
                client_id,
                amount: cmd.amount,
                currency,
                payment_date: cmd.payment_date,
                method: cmd.method,
                reference: cmd.reference.clone(),
                recorded_by: cmd.recorded_by,
                recorded_at: cmd.occurred_at,
            },
            total_received,
            occurred_at: cmd.occurred_at,
        })];

        if self.status == InvoiceStatus::Issued && total_received >= self.totals.total {
            events.push(InvoiceEvent::InvoicePaid(InvoicePaid {
                invoice_id: cmd.invoice_id,
                total_received,
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_cancel(&self, cmd: &CancelInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_created(cmd.invoice_id)?;

        if !matches!(self.status, InvoiceStatus::Draft | InvoiceStatus::Issued) {
            return Err(DomainError::transition(
                "invoice",
                self.status,
                InvoiceStatus::Cancelled,
            ));
        }
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("cancellation reason is required"));
        }

        Ok(vec![InvoiceEvent::InvoiceCancelled(InvoiceCancelled {
            invoice_id: cmd.invoice_id,
            reason: cmd.reason.clone(),
            cancelled_by: cmd.cancelled_by,
            occurred_at: cmd.occurred_at,
        })])
    }
}
