use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use clearway_clearance::ShipmentId;
use clearway_core::{
    Aggregate, AggregateRoot, ClientId, Currency, DomainError, Money, UserId, typed_id,
};
use clearway_events::Event;

typed_id!(TransactionId);

/// Direction of a standalone money movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

/// Aggregate root: FinancialTransaction.
///
/// Money moved outside the invoice flow (office rent, a refund received from
/// a terminal operator). Recorded once, optionally voided; never edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinancialTransaction {
    id: TransactionId,
    kind: Option<TransactionKind>,
    amount: i64,
    currency: Option<Currency>,
    client_id: Option<ClientId>,
    shipment_id: Option<ShipmentId>,
    description: String,
    category: Option<String>,
    date: Option<NaiveDate>,
    voided: bool,
    void_reason: Option<String>,
    recorded_by: Option<UserId>,
    version: u64,
    created: bool,
}

impl FinancialTransaction {
    /// Empty aggregate for rehydration.
    pub fn empty(id: TransactionId) -> Self {
        Self {
            id,
            kind: None,
            amount: 0,
            currency: None,
            client_id: None,
            shipment_id: None,
            description: String::new(),
            category: None,
            date: None,
            voided: false,
            void_reason: None,
            recorded_by: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> TransactionId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn kind(&self) -> Option<TransactionKind> {
        self.kind
    }

    pub fn money(&self) -> Option<Money> {
        self.currency.map(|c| Money::new(self.amount, c))
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn shipment_id(&self) -> Option<ShipmentId> {
        self.shipment_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn is_voided(&self) -> bool {
        self.voided
    }

    pub fn void_reason(&self) -> Option<&str> {
        self.void_reason.as_deref()
    }

    pub fn recorded_by(&self) -> Option<UserId> {
        self.recorded_by
    }
}

impl AggregateRoot for FinancialTransaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordTransaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTransaction {
    pub transaction_id: TransactionId,
    pub kind: TransactionKind,
    pub amount: i64,
    pub currency: Currency,
    pub client_id: Option<ClientId>,
    pub shipment_id: Option<ShipmentId>,
    pub description: String,
    pub category: Option<String>,
    pub date: NaiveDate,
    pub recorded_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: VoidTransaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoidTransaction {
    pub transaction_id: TransactionId,
    pub reason: String,
    pub voided_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionCommand {
    RecordTransaction(RecordTransaction),
    VoidTransaction(VoidTransaction),
}

/// Event: TransactionRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecorded {
    pub transaction_id: TransactionId,
    pub kind: TransactionKind,
    pub amount: i64,
    pub currency: Currency,
    pub client_id: Option<ClientId>,
    pub shipment_id: Option<ShipmentId>,
    pub description: String,
    pub category: Option<String>,
    pub date: NaiveDate,
    pub recorded_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransactionVoided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionVoided {
    pub transaction_id: TransactionId,
    pub reason: String,
    pub voided_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionEvent {
    TransactionRecorded(TransactionRecorded),
    TransactionVoided(TransactionVoided),
}

impl Event for TransactionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TransactionEvent::TransactionRecorded(_) => "accounting.transaction.recorded",
            TransactionEvent::TransactionVoided(_) => "accounting.transaction.voided",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TransactionEvent::TransactionRecorded(e) => e.occurred_at,
            TransactionEvent::TransactionVoided(e) => e.occurred_at,
        }
    }
}

impl Aggregate for FinancialTransaction {
    type Command = TransactionCommand;
    type Event = TransactionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TransactionEvent::TransactionRecorded(e) => {
                self.id = e.transaction_id;
                self.kind = Some(e.kind);
                self.amount = e.amount;
                self.currency = Some(e.currency);
                self.client_id = e.client_id;
                self.shipment_id = e.shipment_id;
                self.description = e.description.clone();
                self.category = e.category.clone();
                self.date = Some(e.date);
                self.recorded_by = Some(e.recorded_by);
                self.created = true;
            }
            TransactionEvent::TransactionVoided(e) => {
                self.voided = true;
                self.void_reason = Some(e.reason.clone());
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TransactionCommand::RecordTransaction(cmd) => self.handle_record(cmd),
            TransactionCommand::VoidTransaction(cmd) => self.handle_void(cmd),
        }
    }
}

impl FinancialTransaction {
    fn ensure_created(&self, transaction_id: TransactionId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != transaction_id {
            return Err(DomainError::invariant("transaction_id mismatch"));
        }
        Ok(())
    }

    fn handle_record(&self, cmd: &RecordTransaction) -> Result<Vec<TransactionEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("transaction already recorded"));
        }
        Money::positive(cmd.amount, cmd.currency)?;
        if cmd.description.trim().is_empty() {
            return Err(DomainError::validation("description must not be empty"));
        }

        Ok(vec![TransactionEvent::TransactionRecorded(TransactionRecorded {
            transaction_id: cmd.transaction_id,
            kind: cmd.kind,
            amount: cmd.amount,
            currency: cmd.currency,
            client_id: cmd.client_id,
            shipment_id: cmd.shipment_id,
            description: cmd.description.trim().to_string(),
            category: cmd.category.clone(),
            date: cmd.date,
            recorded_by: cmd.recorded_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_void(&self, cmd: &VoidTransaction) -> Result<Vec<TransactionEvent>, DomainError> {
        self.ensure_created(cmd.transaction_id)?;
        if self.voided {
            return Err(DomainError::transition("transaction", "voided", "voided"));
        }
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("void reason must not be empty"));
        }

        Ok(vec![TransactionEvent::TransactionVoided(TransactionVoided {
            transaction_id: cmd.transaction_id,
            reason: cmd.reason.clone(),
            voided_by: cmd.voided_by,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clearway_events::execute;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn record(id: TransactionId, amount: i64) -> TransactionCommand {
        TransactionCommand::RecordTransaction(RecordTransaction {
            transaction_id: id,
            kind: TransactionKind::Expense,
            amount,
            currency: Currency::parse("MZN").unwrap(),
            client_id: None,
            shipment_id: None,
            description: "Office rent".into(),
            category: Some("rent".into()),
            date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            recorded_by: UserId::new(),
            occurred_at: test_time(),
        })
    }

    fn void(id: TransactionId) -> TransactionCommand {
        TransactionCommand::VoidTransaction(VoidTransaction {
            transaction_id: id,
            reason: "duplicate entry".into(),
            voided_by: UserId::new(),
            occurred_at: test_time(),
        })
    }

    #[test]
    fn record_then_void() {
        let id = TransactionId::generate();
        let mut tx = FinancialTransaction::empty(id);

        execute(&mut tx, &record(id, 5_000)).unwrap();
        assert_eq!(tx.kind(), Some(TransactionKind::Expense));
        assert_eq!(tx.money().unwrap().amount, 5_000);
        assert!(!tx.is_voided());

        execute(&mut tx, &void(id)).unwrap();
        assert!(tx.is_voided());
        assert_eq!(tx.void_reason(), Some("duplicate entry"));
        assert_eq!(tx.version(), 2);
    }

    #[test]
    fn non_positive_amount_is_rejected() {
        let id = TransactionId::generate();
        let tx = FinancialTransaction::empty(id);
        assert!(matches!(
            tx.handle(&record(id, 0)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn void_twice_is_a_state_error() {
        let id = TransactionId::generate();
        let mut tx = FinancialTransaction::empty(id);
        execute(&mut tx, &record(id, 100)).unwrap();
        execute(&mut tx, &void(id)).unwrap();

        assert!(matches!(
            tx.handle(&void(id)),
            Err(DomainError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn void_unknown_transaction_is_not_found() {
        let id = TransactionId::generate();
        let tx = FinancialTransaction::empty(id);
        assert!(matches!(tx.handle(&void(id)), Err(DomainError::NotFound)));
    }
}
