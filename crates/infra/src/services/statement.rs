//! Standalone transactions and the client statement.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use clearway_accounting::{
    CurrencySummary, FinancialTransaction, LedgerEntry, RecordTransaction, StatementFilter,
    StatementSources, TransactionCommand, TransactionId, TransactionKind, VoidTransaction,
    build_statement, summarize_entries,
};
use clearway_billing::{CreditNote, CreditNoteId, Invoice, InvoiceId};
use clearway_clearance::{PaymentRequest, PaymentRequestId, ShipmentId};
use clearway_core::{ClientId, Currency, DomainError, UserId};

use super::{ClearwayServices, ServiceResult, aggregate_types};

#[derive(Debug, Clone, Deserialize)]
pub struct RecordTransactionInput {
    pub kind: TransactionKind,
    pub amount: i64,
    pub currency: Currency,
    #[serde(default)]
    pub client_id: Option<ClientId>,
    #[serde(default)]
    pub shipment_id: Option<ShipmentId>,
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Statement {
    pub entries: Vec<LedgerEntry>,
    pub summary: Vec<CurrencySummary>,
}

impl ClearwayServices {
    #[instrument(skip(self, input), fields(kind = ?input.kind, amount = input.amount))]
    pub fn record_transaction(
        &self,
        input: RecordTransactionInput,
        user: UserId,
    ) -> ServiceResult<FinancialTransaction> {
        let transaction_id = TransactionId::generate();
        let cmd = TransactionCommand::RecordTransaction(RecordTransaction {
            transaction_id,
            kind: input.kind,
            amount: input.amount,
            currency: input.currency,
            client_id: input.client_id,
            shipment_id: input.shipment_id,
            description: input.description,
            category: input.category,
            date: input.date.unwrap_or_else(|| Utc::now().date_naive()),
            recorded_by: user,
            occurred_at: Utc::now(),
        });
        self.dispatch_transaction(transaction_id, cmd)
    }

    #[instrument(skip(self, reason), fields(transaction_id = %transaction_id))]
    pub fn void_transaction(
        &self,
        transaction_id: TransactionId,
        reason: String,
        user: UserId,
    ) -> ServiceResult<FinancialTransaction> {
        let cmd = TransactionCommand::VoidTransaction(VoidTransaction {
            transaction_id,
            reason,
            voided_by: user,
            occurred_at: Utc::now(),
        });
        self.dispatch_transaction(transaction_id, cmd)
    }

    pub fn transaction(&self, transaction_id: TransactionId) -> ServiceResult<FinancialTransaction> {
        let tx = self.dispatcher.load(transaction_id.aggregate_id(), |id| {
            FinancialTransaction::empty(TransactionId::new(id))
        })?;
        if !tx.is_created() {
            return Err(DomainError::not_found().into());
        }
        Ok(tx)
    }

    /// Ledger entries and per-currency totals, rebuilt from the event streams
    /// on every call.
    #[instrument(skip(self, filter))]
    pub fn statement(&self, filter: &StatementFilter) -> ServiceResult<Statement> {
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if from > to {
                return Err(DomainError::validation("`from` must not be after `to`").into());
            }
        }

        let invoices = self.dispatcher.load_all(aggregate_types::INVOICE, |id| {
            Invoice::empty(InvoiceId::new(id))
        })?;
        let credit_notes = self.dispatcher.load_all(aggregate_types::CREDIT_NOTE, |id| {
            CreditNote::empty(CreditNoteId::new(id))
        })?;
        let payment_requests = self.dispatcher.load_all(aggregate_types::PAYMENT_REQUEST, |id| {
            PaymentRequest::empty(PaymentRequestId::new(id))
        })?;
        let transactions = self.dispatcher.load_all(aggregate_types::TRANSACTION, |id| {
            FinancialTransaction::empty(TransactionId::new(id))
        })?;

        let sources = StatementSources {
            invoices: &invoices,
            credit_notes: &credit_notes,
            payment_requests: &payment_requests,
            transactions: &transactions,
        };
        let entries = build_statement(filter, sources);
        let summary = summarize_entries(&entries)?;

        tracing::debug!(entries = entries.len(), currencies = summary.len(), "statement built");
        Ok(Statement { entries, summary })
    }

    fn dispatch_transaction(
        &self,
        transaction_id: TransactionId,
        cmd: TransactionCommand,
    ) -> ServiceResult<FinancialTransaction> {
        let committed = self.dispatcher.dispatch(
            transaction_id.aggregate_id(),
            aggregate_types::TRANSACTION,
            cmd,
            |id| FinancialTransaction::empty(TransactionId::new(id)),
        )?;
        self.project(&committed)?;
        Ok(committed.aggregate)
    }
}
