//! Accounting module: standalone financial transactions and the client
//! statement derived from every billing and clearance record.
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod statement;
pub mod transaction;

pub use statement::{
    CurrencySummary, EntryKind, LedgerEntry, StatementFilter, StatementSources, build_statement,
    summarize, summarize_entries,
};
pub use transaction::{
    FinancialTransaction, RecordTransaction, TransactionCommand, TransactionEvent, TransactionId,
    TransactionKind, TransactionRecorded, TransactionVoided, VoidTransaction,
};
