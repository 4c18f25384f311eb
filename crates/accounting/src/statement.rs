//! Client statement: a chronological, per-currency view over every invoice,
//! receipt, credit note, paid payment request and standalone transaction.
//!
//! Nothing here is cached. Callers rehydrate the aggregates and hand them in
//! as [`StatementSources`]; entries and summaries are recomputed each time.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use clearway_billing::{CreditNote, Invoice};
use clearway_clearance::{PaymentRequest, PaymentRequestStatus};
use clearway_core::{AggregateId, ClientId, Currency, DomainError, DomainResult};

use crate::transaction::{FinancialTransaction, TransactionKind};

/// Entry kind. Declaration order is the tie-break order for entries that
/// share a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Invoice,
    Receipt,
    CreditNote,
    PaymentRequest,
    Income,
    Expense,
}

impl EntryKind {
    pub fn badge(self) -> &'static str {
        match self {
            EntryKind::Invoice => "Invoice",
            EntryKind::Receipt => "Receipt",
            EntryKind::CreditNote => "Credit Note",
            EntryKind::PaymentRequest => "Payment Request",
            EntryKind::Income => "Income",
            EntryKind::Expense => "Expense",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub date: NaiveDate,
    pub kind: EntryKind,
    pub badge: String,
    pub description: String,
    pub client_id: Option<ClientId>,
    pub currency: Currency,
    pub debit: i64,
    pub credit: i64,
    pub reference: String,
    pub source_id: AggregateId,
}

/// Optional client, inclusive date range and currency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementFilter {
    pub client_id: Option<ClientId>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub currency: Option<Currency>,
}

impl StatementFilter {
    fn admits(&self, entry: &LedgerEntry) -> bool {
        if let Some(client_id) = self.client_id {
            if entry.client_id != Some(client_id) {
                return false;
            }
        }
        if self.from.is_some_and(|from| entry.date < from) {
            return false;
        }
        if self.to.is_some_and(|to| entry.date > to) {
            return false;
        }
        self.currency.is_none_or(|c| c == entry.currency)
    }
}

/// Borrowed, freshly rehydrated aggregates.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatementSources<'a> {
    pub invoices: &'a [Invoice],
    pub credit_notes: &'a [CreditNote],
    pub payment_requests: &'a [PaymentRequest],
    pub transactions: &'a [FinancialTransaction],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencySummary {
    pub currency: Currency,
    pub total_costs: i64,
    pub total_invoiced: i64,
    pub total_received: i64,
    pub outstanding: i64,
    pub total_credit_notes: i64,
    pub other_income: i64,
    pub profit_margin: f64,
}

impl CurrencySummary {
    fn empty(currency: Currency) -> Self {
        Self {
            currency,
            total_costs: 0,
            total_invoiced: 0,
            total_received: 0,
            outstanding: 0,
            total_credit_notes: 0,
            other_income: 0,
            profit_margin: 0.0,
        }
    }

    fn add(&mut self, entry: &LedgerEntry) -> DomainResult<()> {
        let currency = self.currency;
        let (bucket, amount) = match entry.kind {
            EntryKind::Invoice => (&mut self.total_invoiced, entry.credit),
            EntryKind::Receipt => (&mut self.total_received, entry.credit),
            EntryKind::CreditNote => (&mut self.total_credit_notes, entry.debit),
            EntryKind::PaymentRequest | EntryKind::Expense => (&mut self.total_costs, entry.debit),
            EntryKind::Income => (&mut self.other_income, entry.credit),
        };
        *bucket = bucket.checked_add(amount).ok_or_else(|| {
            DomainError::validation(format!(
                "{} totals in {} exceed the representable range",
                entry.kind.badge(),
                currency
            ))
        })?;
        Ok(())
    }

    fn finish(mut self) -> Self {
        self.outstanding = self.total_invoiced - self.total_received;
        self.profit_margin = if self.total_invoiced == 0 {
            0.0
        } else {
            (self.total_invoiced - self.total_costs) as f64 / self.total_invoiced as f64
        };
        self
    }
}

fn entry(
    date: NaiveDate,
    kind: EntryKind,
    description: String,
    client_id: Option<ClientId>,
    currency: Currency,
    (debit, credit): (i64, i64),
    reference: String,
    source_id: AggregateId,
) -> LedgerEntry {
    LedgerEntry {
        date,
        kind,
        badge: kind.badge().to_string(),
        description,
        client_id,
        currency,
        debit,
        credit,
        reference,
        source_id,
    }
}

fn invoice_entries(invoice: &Invoice, out: &mut Vec<LedgerEntry>) {
    let (Some(currency), Some(issue_date)) = (invoice.currency(), invoice.issue_date()) else {
        return;
    };
    let source_id = invoice.id_typed().aggregate_id();

    if invoice.is_billed() {
        let description = invoice
            .notes()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Invoice {}", invoice.number()));
        out.push(entry(
            issue_date,
            EntryKind::Invoice,
            description,
            invoice.client_id(),
            currency,
            (0, invoice.totals().total),
            invoice.number().to_string(),
            source_id,
        ));
    }

    for receipt in invoice.receipts() {
        out.push(entry(
            receipt.payment_date,
            EntryKind::Receipt,
            format!("Receipt for {}", invoice.number()),
            Some(receipt.client_id),
            receipt.currency,
            (0, receipt.amount),
            receipt.number.clone(),
            source_id,
        ));
    }
}

fn credit_note_entry(note: &CreditNote) -> Option<LedgerEntry> {
    if !note.is_effective() {
        return None;
    }
    let description = note
        .description()
        .map(str::to_string)
        .unwrap_or_else(|| format!("Credit against {}", note.invoice_number()));
    Some(entry(
        note.issue_date()?,
        EntryKind::CreditNote,
        description,
        note.client_id(),
        note.currency()?,
        (note.totals().total, 0),
        note.number().to_string(),
        note.id_typed().aggregate_id(),
    ))
}

fn payment_request_entry(request: &PaymentRequest) -> Option<LedgerEntry> {
    if request.status() != PaymentRequestStatus::Paid {
        return None;
    }
    let paid = request.paid()?;
    let reference = request
        .payment_reference()
        .map(str::to_string)
        .unwrap_or_else(|| request.id_typed().to_string());
    Some(entry(
        request.paid_at()?.date_naive(),
        EntryKind::PaymentRequest,
        request.description().to_string(),
        request.client_id(),
        paid.currency,
        (paid.amount, 0),
        reference,
        request.id_typed().aggregate_id(),
    ))
}

fn transaction_entry(tx: &FinancialTransaction) -> Option<LedgerEntry> {
    if tx.is_voided() {
        return None;
    }
    let money = tx.money()?;
    let (kind, sides) = match tx.kind()? {
        TransactionKind::Income => (EntryKind::Income, (0, money.amount)),
        TransactionKind::Expense => (EntryKind::Expense, (money.amount, 0)),
    };
    Some(entry(
        tx.date()?,
        kind,
        tx.description().to_string(),
        tx.client_id(),
        money.currency,
        sides,
        tx.category().map(str::to_string).unwrap_or_else(|| tx.id_typed().to_string()),
        tx.id_typed().aggregate_id(),
    ))
}

/// All ledger entries visible through `filter`, sorted by date, then kind,
/// then reference.
pub fn build_statement(filter: &StatementFilter, sources: StatementSources<'_>) -> Vec<LedgerEntry> {
    let mut entries = Vec::new();

    for invoice in sources.invoices {
        invoice_entries(invoice, &mut entries);
    }
    entries.extend(sources.credit_notes.iter().filter_map(credit_note_entry));
    entries.extend(sources.payment_requests.iter().filter_map(payment_request_entry));
    entries.extend(sources.transactions.iter().filter_map(transaction_entry));

    entries.retain(|e| filter.admits(e));
    entries.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then(a.kind.cmp(&b.kind))
            .then_with(|| a.reference.cmp(&b.reference))
    });
    entries
}

/// One summary per currency present in the filtered statement. Currencies
/// are never netted against each other.
pub fn summarize(
    filter: &StatementFilter,
    sources: StatementSources<'_>,
) -> DomainResult<Vec<CurrencySummary>> {
    summarize_entries(&build_statement(filter, sources))
}

/// Summaries for an already-built statement. Fails with a validation error
/// when a column no longer fits in `i64`.
pub fn summarize_entries(entries: &[LedgerEntry]) -> DomainResult<Vec<CurrencySummary>> {
    let mut by_currency: BTreeMap<Currency, CurrencySummary> = BTreeMap::new();
    for e in entries {
        by_currency
            .entry(e.currency)
            .or_insert_with(|| CurrencySummary::empty(e.currency))
            .add(e)?;
    }
    Ok(by_currency.into_values().map(CurrencySummary::finish).collect())
}
