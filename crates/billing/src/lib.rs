//! Billing domain module (event-sourced).
//!
//! Invoices (with the receipts recorded against them) and credit notes.
//! Totals are always derived from line items; callers never supply them.

pub mod credit_note;
pub mod invoice;
pub mod line;
pub mod policy;

pub use credit_note::{
    ApplyCreditNote, CancelCreditNote, CreateCreditNote, CreditNote, CreditNoteApplied,
    CreditNoteCancelled, CreditNoteCommand, CreditNoteCreated, CreditNoteEvent, CreditNoteId,
    CreditNoteIssued, CreditNoteItemsRevised, CreditNoteStatus, CreditReason, CreditSource,
    IssueCreditNote, ReviseCreditNoteItems,
};
pub use invoice::{
    AddInvoiceItem, CancelInvoice, CreateInvoice, Invoice, InvoiceCancelled, InvoiceCommand,
    InvoiceCreated, InvoiceEvent, InvoiceId, InvoiceIssued, InvoiceItemsRevised, InvoicePaid,
    InvoiceStatus, IssueInvoice, PaymentMethod, Receipt, ReceiptId, ReceiptRecorded,
    RecordReceipt, RemoveInvoiceItem, ReplaceInvoiceItems,
};
pub use line::{LineItem, Totals};
pub use policy::{CreditPolicy, OverpaymentPolicy};
