//! Credit notes: value returned to a client against an issued invoice.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use clearway_core::{
    Aggregate, AggregateRoot, ClientId, Currency, DomainError, DomainResult, UserId, typed_id,
};
use clearway_events::Event;

use crate::invoice::{Invoice, InvoiceId};
use crate::line::{LineItem, Totals, number_lines};
use crate::policy::CreditPolicy;

typed_id!(CreditNoteId);

/// draft -> issued -> applied | cancelled; draft -> cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditNoteStatus {
    Draft,
    Issued,
    Applied,
    Cancelled,
}

impl CreditNoteStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CreditNoteStatus::Draft => "draft",
            CreditNoteStatus::Issued => "issued",
            CreditNoteStatus::Applied => "applied",
            CreditNoteStatus::Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for CreditNoteStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for CreditNoteStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "issued" => Ok(Self::Issued),
            "applied" => Ok(Self::Applied),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(DomainError::validation(format!(
                "unknown credit note status `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditReason {
    ProductReturn,
    ServiceCancellation,
    BillingError,
    Discount,
    Damage,
    Other,
}

/// Snapshot of the invoice a credit note is raised against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditSource {
    pub invoice_id: InvoiceId,
    pub invoice_number: String,
    pub client_id: ClientId,
    pub currency: Currency,
    pub items: Vec<LineItem>,
    /// Remaining creditable value when the cap policy is active.
    pub credit_limit: Option<i64>,
}

impl CreditSource {
    /// Snapshot an issued or paid invoice. `already_credited` is the total of
    /// non-cancelled credit notes already raised against it.
    pub fn from_invoice(
        invoice: &Invoice,
        policy: CreditPolicy,
        already_credited: i64,
    ) -> DomainResult<Self> {
        if !invoice.is_created() {
            return Err(DomainError::not_found());
        }
        if !invoice.is_billed() {
            return Err(DomainError::transition(
                "invoice",
                invoice.status(),
                "credit note",
            ));
        }
        let (Some(client_id), Some(currency)) = (invoice.client_id(), invoice.currency()) else {
            return Err(DomainError::invariant("invoice is missing client or currency"));
        };

        let credit_limit = match policy {
            CreditPolicy::Unbounded => None,
            CreditPolicy::CapAtInvoiceBalance => {
                Some((invoice.totals().total - already_credited).max(0))
            }
        };

        Ok(Self {
            invoice_id: invoice.id_typed(),
            invoice_number: invoice.number().to_string(),
            client_id,
            currency,
            items: invoice.items().to_vec(),
            credit_limit,
        })
    }
}

/// Aggregate root: CreditNote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditNote {
    id: CreditNoteId,
    number: String,
    invoice_id: Option<InvoiceId>,
    invoice_number: String,
    client_id: Option<ClientId>,
    currency: Option<Currency>,
    issue_date: Option<NaiveDate>,
    reason: Option<CreditReason>,
    description: Option<String>,
    items: Vec<LineItem>,
    totals: Totals,
    credit_limit: Option<i64>,
    status: CreditNoteStatus,
    cancellation_reason: Option<String>,
    version: u64,
    created: bool,
}

impl CreditNote {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: CreditNoteId) -> Self {
        Self {
            id,
            number: String::new(),
            invoice_id: None,
            invoice_number: String::new(),
            client_id: None,
            currency: None,
            issue_date: None,
            reason: None,
            description: None,
            items: Vec::new(),
            totals: Totals::default(),
            credit_limit: None,
            status: CreditNoteStatus::Draft,
            cancellation_reason: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> CreditNoteId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn invoice_id(&self) -> Option<InvoiceId> {
        self.invoice_id
    }

    pub fn invoice_number(&self) -> &str {
        &self.invoice_number
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn currency(&self) -> Option<Currency> {
        self.currency
    }

    pub fn issue_date(&self) -> Option<NaiveDate> {
        self.issue_date
    }

    pub fn reason(&self) -> Option<CreditReason> {
        self.reason
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn totals(&self) -> Totals {
        self.totals
    }

    pub fn credit_limit(&self) -> Option<i64> {
        self.credit_limit
    }

    pub fn status(&self) -> CreditNoteStatus {
        self.status
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    /// Issued or applied: the credit counts towards the client's ledger.
    pub fn is_effective(&self) -> bool {
        matches!(
            self.status,
            CreditNoteStatus::Issued | CreditNoteStatus::Applied
        )
    }
}

impl AggregateRoot for CreditNote {
    type Id = CreditNoteId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateCreditNote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCreditNote {
    pub credit_note_id: CreditNoteId,
    pub number: String,
    pub source: CreditSource,
    pub reason: CreditReason,
    pub description: Option<String>,
    /// Explicit items; `None` copies the invoice items.
    pub items: Option<Vec<LineItem>>,
    pub issue_date: NaiveDate,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReviseCreditNoteItems (draft only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviseCreditNoteItems {
    pub credit_note_id: CreditNoteId,
    pub items: Vec<LineItem>,
    /// Creditable value left on the invoice once every other note is counted.
    pub credit_limit: Option<i64>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: IssueCreditNote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCreditNote {
    pub credit_note_id: CreditNoteId,
    pub issued_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApplyCreditNote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyCreditNote {
    pub credit_note_id: CreditNoteId,
    pub applied_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelCreditNote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelCreditNote {
    pub credit_note_id: CreditNoteId,
    pub reason: Option<String>,
    pub cancelled_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreditNoteCommand {
    CreateCreditNote(CreateCreditNote),
    ReviseCreditNoteItems(ReviseCreditNoteItems),
    IssueCreditNote(IssueCreditNote),
    ApplyCreditNote(ApplyCreditNote),
    CancelCreditNote(CancelCreditNote),
}

/// Event: CreditNoteCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditNoteCreated {
    pub credit_note_id: CreditNoteId,
    pub number: String,
    pub invoice_id: InvoiceId,
    pub invoice_number: String,
    pub client_id: ClientId,
    pub currency: Currency,
    pub issue_date: NaiveDate,
    pub reason: CreditReason,
    pub description: Option<String>,
    pub items: Vec<LineItem>,
    pub totals: Totals,
    pub credit_limit: Option<i64>,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CreditNoteItemsRevised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditNoteItemsRevised {
    pub credit_note_id: CreditNoteId,
    pub items: Vec<LineItem>,
    pub totals: Totals,
    #[serde(default)]
    pub credit_limit: Option<i64>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CreditNoteIssued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditNoteIssued {
    pub credit_note_id: CreditNoteId,
    pub total: i64,
    pub issued_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CreditNoteApplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditNoteApplied {
    pub credit_note_id: CreditNoteId,
    pub applied_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CreditNoteCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditNoteCancelled {
    pub credit_note_id: CreditNoteId,
    pub reason: Option<String>,
    pub cancelled_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreditNoteEvent {
    CreditNoteCreated(CreditNoteCreated),
    CreditNoteItemsRevised(CreditNoteItemsRevised),
    CreditNoteIssued(CreditNoteIssued),
    CreditNoteApplied(CreditNoteApplied),
    CreditNoteCancelled(CreditNoteCancelled),
}

impl Event for CreditNoteEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CreditNoteEvent::CreditNoteCreated(_) => "billing.credit_note.created",
            CreditNoteEvent::CreditNoteItemsRevised(_) => "billing.credit_note.items_revised",
            CreditNoteEvent::CreditNoteIssued(_) => "billing.credit_note.issued",
            CreditNoteEvent::CreditNoteApplied(_) => "billing.credit_note.applied",
            CreditNoteEvent::CreditNoteCancelled(_) => "billing.credit_note.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CreditNoteEvent::CreditNoteCreated(e) => e.occurred_at,
            CreditNoteEvent::CreditNoteItemsRevised(e) => e.occurred_at,
            CreditNoteEvent::CreditNoteIssued(e) => e.occurred_at,
            CreditNoteEvent::CreditNoteApplied(e) => e.occurred_at,
            CreditNoteEvent::CreditNoteCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for CreditNote {
    type Command = CreditNoteCommand;
    type Event = CreditNoteEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CreditNoteEvent::CreditNoteCreated(e) => {
                self.id = e.credit_note_id;
                self.number = e.number.clone();
                self.invoice_id = Some(e.invoice_id);
                self.invoice_number = e.invoice_number.clone();
                self.client_id = Some(e.client_id);
                self.currency = Some(e.currency);
                self.issue_date = Some(e.issue_date);
                self.reason = Some(e.reason);
                self.description = e.description.clone();
                self.items = e.items.clone();
                self.totals = e.totals;
                self.credit_limit = e.credit_limit;
                self.status = CreditNoteStatus::Draft;
                self.created = true;
            }
            CreditNoteEvent::CreditNoteItemsRevised(e) => {
                self.items = e.items.clone();
                self.totals = e.totals;
                self.credit_limit = e.credit_limit;
            }
            CreditNoteEvent::CreditNoteIssued(_) => {
                self.status = CreditNoteStatus::Issued;
            }
            CreditNoteEvent::CreditNoteApplied(_) => {
                self.status = CreditNoteStatus::Applied;
            }
            CreditNoteEvent::CreditNoteCancelled(e) => {
                self.status = CreditNoteStatus::Cancelled;
                self.cancellation_reason = e.reason.clone();
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CreditNoteCommand::CreateCreditNote(cmd) => self.handle_create(cmd),
            CreditNoteCommand::ReviseCreditNoteItems(cmd) => self.handle_revise(cmd),
            CreditNoteCommand::IssueCreditNote(cmd) => {
                self.ensure_transition(cmd.credit_note_id, CreditNoteStatus::Issued)?;
                if self.items.is_empty() {
                    return Err(DomainError::validation(
                        "cannot issue credit note without items",
                    ));
                }
                Ok(vec![CreditNoteEvent::CreditNoteIssued(CreditNoteIssued {
                    credit_note_id: cmd.credit_note_id,
                    total: self.totals.total,
                    issued_by: cmd.issued_by,
                    occurred_at: cmd.occurred_at,
                })])
            }
            CreditNoteCommand::ApplyCreditNote(cmd) => {
                self.ensure_transition(cmd.credit_note_id, CreditNoteStatus::Applied)?;
                Ok(vec![CreditNoteEvent::CreditNoteApplied(CreditNoteApplied {
                    credit_note_id: cmd.credit_note_id,
                    applied_by: cmd.applied_by,
                    occurred_at: cmd.occurred_at,
                })])
            }
            CreditNoteCommand::CancelCreditNote(cmd) => {
                self.ensure_transition(cmd.credit_note_id, CreditNoteStatus::Cancelled)?;
                Ok(vec![CreditNoteEvent::CreditNoteCancelled(CreditNoteCancelled {
                    credit_note_id: cmd.credit_note_id,
                    reason: cmd.reason.clone(),
                    cancelled_by: cmd.cancelled_by,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

impl CreditNote {
    fn ensure_created(&self, credit_note_id: CreditNoteId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != credit_note_id {
            return Err(DomainError::invariant("credit_note_id mismatch"));
        }
        Ok(())
    }

    fn ensure_transition(
        &self,
        credit_note_id: CreditNoteId,
        to: CreditNoteStatus,
    ) -> Result<(), DomainError> {
        self.ensure_created(credit_note_id)?;
        let legal = matches!(
            (self.status, to),
            (CreditNoteStatus::Draft, CreditNoteStatus::Issued)
                | (CreditNoteStatus::Draft, CreditNoteStatus::Cancelled)
                | (CreditNoteStatus::Issued, CreditNoteStatus::Applied)
                | (CreditNoteStatus::Issued, CreditNoteStatus::Cancelled)
        );
        if !legal {
            return Err(DomainError::transition("credit note", self.status, to));
        }
        Ok(())
    }

    fn priced(items: &[LineItem], limit: Option<i64>) -> DomainResult<(Vec<LineItem>, Totals)> {
        let items = number_lines(items)?;
        let totals = Totals::compute(&items)?;
        if let Some(limit) = limit {
            if totals.total > limit {
                return Err(DomainError::validation(format!(
                    "credit total {} exceeds the remaining invoice balance {}",
                    totals.total, limit
                )));
            }
        }
        Ok((items, totals))
    }

    fn handle_create(&self, cmd: &CreateCreditNote) -> Result<Vec<CreditNoteEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("credit note already exists"));
        }
        if cmd.number.trim().is_empty() {
            return Err(DomainError::validation("credit note number must not be empty"));
        }

        let source_items = cmd.items.as_deref().unwrap_or(&cmd.source.items);
        let (items, totals) = Self::priced(source_items, cmd.source.credit_limit)?;

        Ok(vec![CreditNoteEvent::CreditNoteCreated(CreditNoteCreated {
            credit_note_id: cmd.credit_note_id,
            number: cmd.number.clone(),
            invoice_id: cmd.source.invoice_id,
            invoice_number: cmd.source.invoice_number.clone(),
            client_id: cmd.source.client_id,
            currency: cmd.source.currency,
            issue_date: cmd.issue_date,
            reason: cmd.reason,
            description: cmd.description.clone(),
            items,
            totals,
            credit_limit: cmd.source.credit_limit,
            created_by: cmd.created_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_revise(
        &self,
        cmd: &ReviseCreditNoteItems,
    ) -> Result<Vec<CreditNoteEvent>, DomainError> {
        self.ensure_created(cmd.credit_note_id)?;
        if self.status != CreditNoteStatus::Draft {
            return Err(DomainError::transition("credit note", self.status, "item edit"));
        }

        let (items, totals) = Self::priced(&cmd.items, cmd.credit_limit)?;
        Ok(vec![CreditNoteEvent::CreditNoteItemsRevised(
            CreditNoteItemsRevised {
                credit_note_id: cmd.credit_note_id,
                items,
                totals,
                credit_limit: cmd.credit_limit,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::{CreateInvoice, InvoiceCommand, IssueInvoice};
    use clearway_core::{AggregateId, TaxRate};
    use clearway_events::execute;

    fn test_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-04-15T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 15).unwrap()
    }

    fn invoice(issue: bool) -> Invoice {
        let id = InvoiceId::new(AggregateId::new());
        let mut inv = Invoice::empty(id);
        let create = InvoiceCommand::CreateInvoice(CreateInvoice {
            invoice_id: id,
            number: "INV-00001".into(),
            client_id: ClientId::new(),
            shipment_ids: vec![],
            currency: Currency::parse("MZN").unwrap(),
            issue_date: today(),
            payment_terms_days: 30,
            items: vec![LineItem::new("Customs brokerage", 2, 100, TaxRate::percent(17))],
            notes: None,
            created_by: UserId::new(),
            occurred_at: test_time(),
        });
        execute(&mut inv, &create).unwrap();
        if issue {
            let cmd = InvoiceCommand::IssueInvoice(IssueInvoice {
                invoice_id: id,
                issued_by: UserId::new(),
                occurred_at: test_time(),
            });
            execute(&mut inv, &cmd).unwrap();
        }
        inv
    }

    fn create_cmd(source: CreditSource, items: Option<Vec<LineItem>>) -> CreditNoteCommand {
        CreditNoteCommand::CreateCreditNote(CreateCreditNote {
            credit_note_id: CreditNoteId::generate(),
            number: "NC-00001".into(),
            source,
            reason: CreditReason::BillingError,
            description: None,
            items,
            issue_date: today(),
            created_by: UserId::new(),
            occurred_at: test_time(),
        })
    }

    fn created(source: CreditSource, items: Option<Vec<LineItem>>) -> CreditNote {
        let cmd = create_cmd(source, items);
        let id = match &cmd {
            CreditNoteCommand::CreateCreditNote(c) => c.credit_note_id,
            _ => unreachable!(),
        };
        let mut cn = CreditNote::empty(id);
        execute(&mut cn, &cmd).unwrap();
        cn
    }

    fn one_unit() -> Vec<LineItem> {
        vec![LineItem::new("Customs brokerage", 1, 100, TaxRate::percent(17))]
    }

    #[test]
    fn items_default_to_the_invoice_items() {
        let inv = invoice(true);
        let source = CreditSource::from_invoice(&inv, CreditPolicy::Unbounded, 0).unwrap();
        let cn = created(source, None);

        assert_eq!(cn.items(), inv.items());
        assert_eq!(cn.totals().total, 234);
        assert_eq!(cn.status(), CreditNoteStatus::Draft);
        assert_eq!(cn.invoice_number(), "INV-00001");
    }

    #[test]
    fn single_unit_credit_totals_one_hundred_seventeen() {
        let inv = invoice(true);
        let source = CreditSource::from_invoice(&inv, CreditPolicy::Unbounded, 0).unwrap();
        let cn = created(source, Some(one_unit()));
        assert_eq!(cn.totals().total, 117);
    }

    #[test]
    fn draft_invoice_cannot_be_credited() {
        let inv = invoice(false);
        let err = CreditSource::from_invoice(&inv, CreditPolicy::Unbounded, 0).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }

    #[test]
    fn cap_policy_limits_the_credit() {
        let inv = invoice(true);
        let source =
            CreditSource::from_invoice(&inv, CreditPolicy::CapAtInvoiceBalance, 200).unwrap();
        assert_eq!(source.credit_limit, Some(34));

        let cn = CreditNote::empty(CreditNoteId::generate());
        assert!(matches!(
            cn.handle(&create_cmd(source, Some(one_unit()))),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn revision_is_checked_against_the_limit_it_carries() {
        let inv = invoice(true);
        let source =
            CreditSource::from_invoice(&inv, CreditPolicy::CapAtInvoiceBalance, 0).unwrap();
        let mut cn = created(source, Some(one_unit()));
        assert_eq!(cn.credit_limit(), Some(234));

        // Another 117 note was raised since: only 117 is left for this one.
        let id = cn.id_typed();
        let revise = |credit_limit| {
            CreditNoteCommand::ReviseCreditNoteItems(ReviseCreditNoteItems {
                credit_note_id: id,
                items: vec![LineItem::new("Customs brokerage", 2, 100, TaxRate::percent(17))],
                credit_limit,
                occurred_at: test_time(),
            })
        };
        assert!(matches!(
            cn.handle(&revise(Some(117))),
            Err(DomainError::Validation(_))
        ));

        execute(&mut cn, &revise(Some(234))).unwrap();
        assert_eq!(cn.totals().total, 234);
        assert_eq!(cn.credit_limit(), Some(234));
    }

    #[test]
    fn lifecycle_follows_the_allowed_transitions() {
        let inv = invoice(true);
        let mut cn = created(
            CreditSource::from_invoice(&inv, CreditPolicy::Unbounded, 0).unwrap(),
            Some(one_unit()),
        );
        let id = cn.id_typed();

        let apply_cmd = CreditNoteCommand::ApplyCreditNote(ApplyCreditNote {
            credit_note_id: id,
            applied_by: UserId::new(),
            occurred_at: test_time(),
        });
        match cn.handle(&apply_cmd).unwrap_err() {
            DomainError::InvalidTransition { from, to, .. } => {
                assert_eq!(from, "draft");
                assert_eq!(to, "applied");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let issue = CreditNoteCommand::IssueCreditNote(IssueCreditNote {
            credit_note_id: id,
            issued_by: UserId::new(),
            occurred_at: test_time(),
        });
        execute(&mut cn, &issue).unwrap();
        assert!(cn.is_effective());

        let revise = CreditNoteCommand::ReviseCreditNoteItems(ReviseCreditNoteItems {
            credit_note_id: id,
            items: one_unit(),
            credit_limit: None,
            occurred_at: test_time(),
        });
        assert!(cn.handle(&revise).is_err());

        execute(&mut cn, &apply_cmd).unwrap();
        assert_eq!(cn.status(), CreditNoteStatus::Applied);

        let cancel = CreditNoteCommand::CancelCreditNote(CancelCreditNote {
            credit_note_id: id,
            reason: None,
            cancelled_by: UserId::new(),
            occurred_at: test_time(),
        });
        assert!(cn.handle(&cancel).is_err());
    }

    #[test]
    fn draft_can_be_cancelled() {
        let inv = invoice(true);
        let mut cn = created(
            CreditSource::from_invoice(&inv, CreditPolicy::Unbounded, 0).unwrap(),
            None,
        );
        let cancel = CreditNoteCommand::CancelCreditNote(CancelCreditNote {
            credit_note_id: cn.id_typed(),
            reason: Some("raised in error".into()),
            cancelled_by: UserId::new(),
            occurred_at: test_time(),
        });
        execute(&mut cn, &cancel).unwrap();
        assert_eq!(cn.status(), CreditNoteStatus::Cancelled);
        assert!(!cn.is_effective());
    }

    #[test]
    fn status_names_parse() {
        assert_eq!("applied".parse::<CreditNoteStatus>().unwrap(), CreditNoteStatus::Applied);
        assert!("void".parse::<CreditNoteStatus>().is_err());
    }
}
