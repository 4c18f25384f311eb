use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clearway_core::{
    Aggregate, AggregateRoot, ClientId, ConsigneeId, DomainError, UserId, typed_id,
};
use clearway_events::Event;

use crate::document::{Document, DocumentGate, DocumentId, FileRef};
use crate::phase::Phase;

typed_id!(
    /// Shipment (clearance process) identifier.
    ShipmentId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CargoType {
    Import,
    Export,
    Transit,
    Transport,
}

/// Shipment status lifecycle: draft -> active -> completed | cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Draft,
    Active,
    Completed,
    Cancelled,
}

impl ShipmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ShipmentStatus::Draft => "draft",
            ShipmentStatus::Active => "active",
            ShipmentStatus::Completed => "completed",
            ShipmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ShipmentStatus::Completed | ShipmentStatus::Cancelled)
    }
}

impl core::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Advance,
    Revert,
    Complete,
}

/// One entry of the phase audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: Option<Phase>,
    pub to: Phase,
    pub kind: TransitionKind,
    pub by: UserId,
    pub at: DateTime<Utc>,
}

/// Readiness of the current phase, for prompting users before they advance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseReadiness {
    pub phase: Phase,
    pub satisfied: bool,
    pub missing_documents: Vec<String>,
}

/// Aggregate root: Shipment.
///
/// Owns its document register, so checking the gate and moving the phase are
/// decided against the same stream version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shipment {
    id: ShipmentId,
    reference: String,
    client_id: Option<ClientId>,
    consignee_id: Option<ConsigneeId>,
    cargo_type: Option<CargoType>,
    description: Option<String>,
    status: ShipmentStatus,
    current_phase: Option<Phase>,
    documents: DocumentGate,
    history: Vec<PhaseTransition>,
    cancellation_reason: Option<String>,
    created_by: Option<UserId>,
    created_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Shipment {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ShipmentId) -> Self {
        Self {
            id,
            reference: String::new(),
            client_id: None,
            consignee_id: None,
            cargo_type: None,
            description: None,
            status: ShipmentStatus::Draft,
            current_phase: None,
            documents: DocumentGate::default(),
            history: Vec::new(),
            cancellation_reason: None,
            created_by: None,
            created_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ShipmentId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn consignee_id(&self) -> Option<ConsigneeId> {
        self.consignee_id
    }

    pub fn cargo_type(&self) -> Option<CargoType> {
        self.cargo_type
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn status(&self) -> ShipmentStatus {
        self.status
    }

    pub fn current_phase(&self) -> Option<Phase> {
        self.current_phase
    }

    pub fn documents(&self) -> &DocumentGate {
        &self.documents
    }

    pub fn history(&self) -> &[PhaseTransition] {
        &self.history
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn created_by(&self) -> Option<UserId> {
        self.created_by
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Gate readiness of the current phase (`None` while draft).
    pub fn readiness(&self) -> Option<PhaseReadiness> {
        let phase = self.current_phase?;
        let missing: Vec<String> = self
            .documents
            .missing_documents(phase)
            .into_iter()
            .map(str::to_string)
            .collect();
        Some(PhaseReadiness {
            phase,
            satisfied: missing.is_empty(),
            missing_documents: missing,
        })
    }

    /// Human-readable state for transition errors: status, plus phase when active.
    fn state_label(&self) -> String {
        match (self.status, self.current_phase) {
            (ShipmentStatus::Active, Some(phase)) => phase.to_string(),
            (status, _) => status.to_string(),
        }
    }
}

impl AggregateRoot for Shipment {
    type Id = ShipmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenShipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenShipment {
    pub shipment_id: ShipmentId,
    /// Reference number allocated before the command is issued.
    pub reference: String,
    pub client_id: ClientId,
    pub consignee_id: ConsigneeId,
    pub cargo_type: CargoType,
    pub description: Option<String>,
    pub opened_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdvancePhase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvancePhase {
    pub shipment_id: ShipmentId,
    /// Pending payment requests of the current phase that must be settled
    /// first. Zero when the settlement policy is off.
    pub pending_payment_requests: usize,
    pub advanced_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RevertPhase. Privilege is checked by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevertPhase {
    pub shipment_id: ShipmentId,
    pub to_phase: Phase,
    pub reason: Option<String>,
    pub reverted_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelShipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelShipment {
    pub shipment_id: ShipmentId,
    pub reason: String,
    pub cancelled_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AttachDocument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachDocument {
    pub shipment_id: ShipmentId,
    pub document_id: DocumentId,
    pub phase: Phase,
    pub document_type: String,
    pub file: FileRef,
    pub note: Option<String>,
    pub uploaded_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveDocument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveDocument {
    pub shipment_id: ShipmentId,
    pub document_id: DocumentId,
    pub removed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipmentCommand {
    OpenShipment(OpenShipment),
    AdvancePhase(AdvancePhase),
    RevertPhase(RevertPhase),
    CancelShipment(CancelShipment),
    AttachDocument(AttachDocument),
    RemoveDocument(RemoveDocument),
}

/// Event: ShipmentOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentOpened {
    pub shipment_id: ShipmentId,
    pub reference: String,
    pub client_id: ClientId,
    pub consignee_id: ConsigneeId,
    pub cargo_type: CargoType,
    pub description: Option<String>,
    pub opened_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PhaseAdvanced. `from` is `None` when the shipment leaves draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseAdvanced {
    pub shipment_id: ShipmentId,
    pub from: Option<Phase>,
    pub to: Phase,
    pub advanced_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ShipmentCompleted (advanced past the last phase).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentCompleted {
    pub shipment_id: ShipmentId,
    pub completed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PhaseReverted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseReverted {
    pub shipment_id: ShipmentId,
    pub from: Phase,
    pub to: Phase,
    pub reason: Option<String>,
    pub reverted_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ShipmentCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentCancelled {
    pub shipment_id: ShipmentId,
    pub reason: String,
    pub cancelled_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DocumentAttached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAttached {
    pub shipment_id: ShipmentId,
    pub document: Document,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DocumentRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRemoved {
    pub shipment_id: ShipmentId,
    pub document_id: DocumentId,
    pub phase: Phase,
    pub document_type: String,
    pub removed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipmentEvent {
    ShipmentOpened(ShipmentOpened),
    PhaseAdvanced(PhaseAdvanced),
    ShipmentCompleted(ShipmentCompleted),
    PhaseReverted(PhaseReverted),
    ShipmentCancelled(ShipmentCancelled),
    DocumentAttached(DocumentAttached),
    DocumentRemoved(DocumentRemoved),
}

impl Event for ShipmentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ShipmentEvent::ShipmentOpened(_) => "clearance.shipment.opened",
            ShipmentEvent::PhaseAdvanced(_) => "clearance.shipment.phase_advanced",
            ShipmentEvent::ShipmentCompleted(_) => "clearance.shipment.completed",
            ShipmentEvent::PhaseReverted(_) => "clearance.shipment.phase_reverted",
            ShipmentEvent::ShipmentCancelled(_) => "clearance.shipment.cancelled",
            ShipmentEvent::DocumentAttached(_) => "clearance.shipment.document_attached",
            ShipmentEvent::DocumentRemoved(_) => "clearance.shipment.document_removed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ShipmentEvent::ShipmentOpened(e) => e.occurred_at,
            ShipmentEvent::PhaseAdvanced(e) => e.occurred_at,
            ShipmentEvent::ShipmentCompleted(e) => e.occurred_at,
            ShipmentEvent::PhaseReverted(e) => e.occurred_at,
            ShipmentEvent::ShipmentCancelled(e) => e.occurred_at,
            ShipmentEvent::DocumentAttached(e) => e.occurred_at,
            ShipmentEvent::DocumentRemoved(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Shipment {
    type Command = ShipmentCommand;
    type Event = ShipmentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ShipmentEvent::ShipmentOpened(e) => {
                self.id = e.shipment_id;
                self.reference = e.reference.clone();
                self.client_id = Some(e.client_id);
                self.consignee_id = Some(e.consignee_id);
                self.cargo_type = Some(e.cargo_type);
                self.description = e.description.clone();
                self.status = ShipmentStatus::Draft;
                self.current_phase = None;
                self.created_by = Some(e.opened_by);
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            ShipmentEvent::PhaseAdvanced(e) => {
                self.status = ShipmentStatus::Active;
                self.current_phase = Some(e.to);
                self.history.push(PhaseTransition {
                    from: e.from,
                    to: e.to,
                    kind: TransitionKind::Advance,
                    by: e.advanced_by,
                    at: e.occurred_at,
                });
            }
            ShipmentEvent::ShipmentCompleted(e) => {
                self.status = ShipmentStatus::Completed;
                if let Some(phase) = self.current_phase {
                    self.history.push(PhaseTransition {
                        from: Some(phase),
                        to: phase,
                        kind: TransitionKind::Complete,
                        by: e.completed_by,
                        at: e.occurred_at,
                    });
                }
            }
            ShipmentEvent::PhaseReverted(e) => {
                self.status = ShipmentStatus::Active;
                self.current_phase = Some(e.to);
                self.history.push(PhaseTransition {
                    from: Some(e.from),
                    to: e.to,
                    kind: TransitionKind::Revert,
                    by: e.reverted_by,
                    at: e.occurred_at,
                });
            }
            ShipmentEvent::ShipmentCancelled(e) => {
                self.status = ShipmentStatus::Cancelled;
                self.cancellation_reason = Some(e.reason.clone());
            }
            ShipmentEvent::DocumentAttached(e) => {
                self.documents.insert(e.document.clone());
            }
            ShipmentEvent::DocumentRemoved(e) => {
                self.documents.remove(e.document_id);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ShipmentCommand::OpenShipment(cmd) => self.handle_open(cmd),
            ShipmentCommand::AdvancePhase(cmd) => self.handle_advance(cmd),
            ShipmentCommand::RevertPhase(cmd) => self.handle_revert(cmd),
            ShipmentCommand::CancelShipment(cmd) => self.handle_cancel(cmd),
            ShipmentCommand::AttachDocument(cmd) => self.handle_attach(cmd),
            ShipmentCommand::RemoveDocument(cmd) => self.handle_remove(cmd),
        }
    }
}

impl Shipment {
    fn ensure_created(&self, shipment_id: ShipmentId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != shipment_id {
            return Err(DomainError::invariant("shipment_id mismatch"));
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenShipment) -> Result<Vec<ShipmentEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("shipment already exists"));
        }
        if cmd.reference.trim().is_empty() {
            return Err(DomainError::validation("shipment reference must not be empty"));
        }

        Ok(vec![ShipmentEvent::ShipmentOpened(ShipmentOpened {
            shipment_id: cmd.shipment_id,
            reference: cmd.reference.clone(),
            client_id: cmd.client_id,
            consignee_id: cmd.consignee_id,
            cargo_type: cmd.cargo_type,
            description: cmd.description.clone(),
            opened_by: cmd.opened_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_advance(&self, cmd: &AdvancePhase) -> Result<Vec<ShipmentEvent>, DomainError> {
        self.ensure_created(cmd.shipment_id)?;

        match (self.status, self.current_phase) {
            (ShipmentStatus::Draft, _) => Ok(vec![ShipmentEvent::PhaseAdvanced(PhaseAdvanced {
                shipment_id: cmd.shipment_id,
                from: None,
                to: Phase::FIRST,
                advanced_by: cmd.advanced_by,
                occurred_at: cmd.occurred_at,
            })]),
            (ShipmentStatus::Active, Some(current)) => {
                let missing = self.documents.missing_documents(current);
                if !missing.is_empty() || cmd.pending_payment_requests > 0 {
                    return Err(DomainError::PhaseNotReady {
                        phase: current.to_string(),
                        missing_documents: missing.into_iter().map(str::to_string).collect(),
                        pending_payment_requests: cmd.pending_payment_requests,
                    });
                }

                match current.next() {
                    Some(next) => Ok(vec![ShipmentEvent::PhaseAdvanced(PhaseAdvanced {
                        shipment_id: cmd.shipment_id,
                        from: Some(current),
                        to: next,
                        advanced_by: cmd.advanced_by,
                        occurred_at: cmd.occurred_at,
                    })]),
                    None => Ok(vec![ShipmentEvent::ShipmentCompleted(ShipmentCompleted {
                        shipment_id: cmd.shipment_id,
                        completed_by: cmd.advanced_by,
                        occurred_at: cmd.occurred_at,
                    })]),
                }
            }
            (ShipmentStatus::Active, None) => Err(DomainError::invariant(
                "active shipment without a current phase",
            )),
            (status, _) => Err(DomainError::transition("shipment", status, "next phase")),
        }
    }

    fn handle_revert(&self, cmd: &RevertPhase) -> Result<Vec<ShipmentEvent>, DomainError> {
        self.ensure_created(cmd.shipment_id)?;

        let current = match (self.status, self.current_phase) {
            (ShipmentStatus::Active | ShipmentStatus::Completed, Some(phase)) => phase,
            _ => {
                return Err(DomainError::transition(
                    "shipment",
                    self.state_label(),
                    cmd.to_phase,
                ));
            }
        };

        // Reopening a completed shipment may target its last phase.
        let allowed = if self.status == ShipmentStatus::Completed {
            cmd.to_phase <= current
        } else {
            cmd.to_phase < current
        };
        if !allowed {
            return Err(DomainError::transition(
                "shipment",
                self.state_label(),
                cmd.to_phase,
            ));
        }

        Ok(vec![ShipmentEvent::PhaseReverted(PhaseReverted {
            shipment_id: cmd.shipment_id,
            from: current,
            to: cmd.to_phase,
            reason: cmd.reason.clone(),
            reverted_by: cmd.reverted_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelShipment) -> Result<Vec<ShipmentEvent>, DomainError> {
        self.ensure_created(cmd.shipment_id)?;

        if self.status.is_terminal() {
            return Err(DomainError::transition(
                "shipment",
                self.status,
                ShipmentStatus::Cancelled,
            ));
        }
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("cancellation reason is required"));
        }

        Ok(vec![ShipmentEvent::ShipmentCancelled(ShipmentCancelled {
            shipment_id: cmd.shipment_id,
            reason: cmd.reason.clone(),
            cancelled_by: cmd.cancelled_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_attach(&self, cmd: &AttachDocument) -> Result<Vec<ShipmentEvent>, DomainError> {
        self.ensure_created(cmd.shipment_id)?;

        if self.status == ShipmentStatus::Cancelled {
            return Err(DomainError::transition(
                "shipment",
                self.status,
                "document upload",
            ));
        }
        DocumentGate::validate_type(cmd.phase, &cmd.document_type)?;
        cmd.file.validate()?;
        if self.documents.get(cmd.document_id).is_some() {
            return Err(DomainError::conflict("document already attached"));
        }

        Ok(vec![ShipmentEvent::DocumentAttached(DocumentAttached {
            shipment_id: cmd.shipment_id,
            document: Document {
                id: cmd.document_id,
                phase: cmd.phase,
                document_type: cmd.document_type.clone(),
                file: cmd.file.clone(),
                note: cmd.note.clone(),
                uploaded_by: cmd.uploaded_by,
                uploaded_at: cmd.occurred_at,
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove(&self, cmd: &RemoveDocument) -> Result<Vec<ShipmentEvent>, DomainError> {
        self.ensure_created(cmd.shipment_id)?;

        let document = self
            .documents
            .get(cmd.document_id)
            .ok_or_else(DomainError::not_found)?;

        Ok(vec![ShipmentEvent::DocumentRemoved(DocumentRemoved {
            shipment_id: cmd.shipment_id,
            document_id: document.id,
            phase: document.phase,
            document_type: document.document_type.clone(),
            removed_by: cmd.removed_by,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clearway_core::AggregateId;
    use clearway_events::execute;
    use proptest::prelude::*;

    fn test_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-02T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn user() -> UserId {
        UserId::new()
    }

    fn opened() -> Shipment {
        let id = ShipmentId::new(AggregateId::new());
        let mut s = Shipment::empty(id);
        let cmd = ShipmentCommand::OpenShipment(OpenShipment {
            shipment_id: id,
            reference: "PRC-00001".into(),
            client_id: ClientId::new(),
            consignee_id: ConsigneeId::new(),
            cargo_type: CargoType::Import,
            description: Some("12 containers of rice".into()),
            opened_by: user(),
            occurred_at: test_time(),
        });
        execute(&mut s, &cmd).unwrap();
        s
    }

    fn advance_cmd(s: &Shipment, pending: usize) -> ShipmentCommand {
        ShipmentCommand::AdvancePhase(AdvancePhase {
            shipment_id: s.id_typed(),
            pending_payment_requests: pending,
            advanced_by: user(),
            occurred_at: test_time(),
        })
    }

    fn advance(s: &mut Shipment) -> Result<Vec<ShipmentEvent>, DomainError> {
        let cmd = advance_cmd(s, 0);
        execute(s, &cmd)
    }

    fn attach(s: &mut Shipment, phase: Phase, code: &str) -> DocumentId {
        let document_id = DocumentId::generate();
        let cmd = ShipmentCommand::AttachDocument(AttachDocument {
            shipment_id: s.id_typed(),
            document_id,
            phase,
            document_type: code.into(),
            file: FileRef {
                reference: format!("store/{code}"),
                size_bytes: 2048,
                checksum: Some("sha256:abc".into()),
            },
            note: None,
            uploaded_by: user(),
            occurred_at: test_time(),
        });
        execute(s, &cmd).unwrap();
        document_id
    }

    fn satisfy(s: &mut Shipment, phase: Phase) {
        for code in phase.required_documents() {
            attach(s, phase, code);
        }
    }

    /// Walk an opened shipment forward until it sits in `target`.
    fn move_to(s: &mut Shipment, target: Phase) {
        advance(s).unwrap();
        while s.current_phase() != Some(target) {
            let current = s.current_phase().unwrap();
            satisfy(s, current);
            advance(s).unwrap();
        }
    }

    fn revert_cmd(s: &Shipment, to_phase: Phase) -> ShipmentCommand {
        ShipmentCommand::RevertPhase(RevertPhase {
            shipment_id: s.id_typed(),
            to_phase,
            reason: Some("customs rejected the declaration".into()),
            reverted_by: user(),
            occurred_at: test_time(),
        })
    }

    #[test]
    fn open_creates_a_draft_without_phase() {
        let s = opened();
        assert_eq!(s.status(), ShipmentStatus::Draft);
        assert_eq!(s.current_phase(), None);
        assert_eq!(s.reference(), "PRC-00001");
        assert_eq!(s.version(), 1);
        assert!(s.readiness().is_none());
    }

    #[test]
    fn opening_twice_conflicts() {
        let s = opened();
        let cmd = ShipmentCommand::OpenShipment(OpenShipment {
            shipment_id: s.id_typed(),
            reference: "PRC-00002".into(),
            client_id: ClientId::new(),
            consignee_id: ConsigneeId::new(),
            cargo_type: CargoType::Export,
            description: None,
            opened_by: user(),
            occurred_at: test_time(),
        });
        assert!(matches!(s.handle(&cmd), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn first_advance_enters_coleta_dispersa() {
        let mut s = opened();
        advance(&mut s).unwrap();

        assert_eq!(s.status(), ShipmentStatus::Active);
        assert_eq!(s.current_phase(), Some(Phase::ColetaDispersa));
        assert_eq!(s.history().len(), 1);
        assert_eq!(s.history()[0].from, None);
    }

    #[test]
    fn advance_without_documents_lists_every_missing_code() {
        let mut s = opened();
        move_to(&mut s, Phase::Alfandegas);
        let version_before = s.version();

        let err = s.handle(&advance_cmd(&s, 0)).unwrap_err();
        match err {
            DomainError::PhaseNotReady {
                phase,
                missing_documents,
                pending_payment_requests,
            } => {
                assert_eq!(phase, "alfandegas");
                assert_eq!(
                    missing_documents,
                    vec!["customs_declaration", "cargo_manifest", "duty_assessment"]
                );
                assert_eq!(pending_payment_requests, 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(s.current_phase(), Some(Phase::Alfandegas));
        assert_eq!(s.version(), version_before);

        let readiness = s.readiness().unwrap();
        assert!(!readiness.satisfied);
        assert_eq!(readiness.missing_documents.len(), 3);

        satisfy(&mut s, Phase::Alfandegas);
        advance(&mut s).unwrap();
        assert_eq!(s.current_phase(), Some(Phase::Cornelder));
    }

    #[test]
    fn pending_payment_requests_block_advance() {
        let mut s = opened();
        move_to(&mut s, Phase::Legalizacao);
        satisfy(&mut s, Phase::Legalizacao);

        let err = s.handle(&advance_cmd(&s, 2)).unwrap_err();
        match err {
            DomainError::PhaseNotReady {
                missing_documents,
                pending_payment_requests,
                ..
            } => {
                assert!(missing_documents.is_empty());
                assert_eq!(pending_payment_requests, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn advancing_past_pod_completes() {
        let mut s = opened();
        move_to(&mut s, Phase::Pod);
        satisfy(&mut s, Phase::Pod);

        advance(&mut s).unwrap();
        assert_eq!(s.status(), ShipmentStatus::Completed);
        assert_eq!(s.current_phase(), Some(Phase::Pod));

        let err = advance(&mut s).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }

    #[test]
    fn removing_a_document_never_rolls_the_phase_back() {
        let mut s = opened();
        advance(&mut s).unwrap();
        let bl = attach(&mut s, Phase::ColetaDispersa, "bill_of_lading");
        attach(&mut s, Phase::ColetaDispersa, "commercial_invoice");
        attach(&mut s, Phase::ColetaDispersa, "packing_list");
        advance(&mut s).unwrap();

        let cmd = ShipmentCommand::RemoveDocument(RemoveDocument {
            shipment_id: s.id_typed(),
            document_id: bl,
            removed_by: user(),
            occurred_at: test_time(),
        });
        execute(&mut s, &cmd).unwrap();

        assert_eq!(s.current_phase(), Some(Phase::Legalizacao));
        assert!(!s.documents().is_phase_satisfied(Phase::ColetaDispersa));
    }

    #[test]
    fn removing_an_unknown_document_is_not_found() {
        let s = opened();
        let err = s
            .handle(&ShipmentCommand::RemoveDocument(RemoveDocument {
                shipment_id: s.id_typed(),
                document_id: DocumentId::generate(),
                removed_by: user(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn invalid_document_type_is_rejected() {
        let s = opened();
        let err = s
            .handle(&ShipmentCommand::AttachDocument(AttachDocument {
                shipment_id: s.id_typed(),
                document_id: DocumentId::generate(),
                phase: Phase::Pod,
                document_type: "customs_declaration".into(),
                file: FileRef {
                    reference: "x".into(),
                    size_bytes: 1,
                    checksum: None,
                },
                note: None,
                uploaded_by: user(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidDocumentType { .. }));
    }

    #[test]
    fn cancel_is_terminal_and_keeps_documents() {
        let mut s = opened();
        advance(&mut s).unwrap();
        attach(&mut s, Phase::ColetaDispersa, "outro");

        let cmd = ShipmentCommand::CancelShipment(CancelShipment {
            shipment_id: s.id_typed(),
            reason: "client withdrew".into(),
            cancelled_by: user(),
            occurred_at: test_time(),
        });
        execute(&mut s, &cmd).unwrap();

        assert_eq!(s.status(), ShipmentStatus::Cancelled);
        assert_eq!(s.cancellation_reason(), Some("client withdrew"));
        assert_eq!(s.documents().documents().len(), 1);

        match advance(&mut s).unwrap_err() {
            DomainError::InvalidTransition { from, .. } => assert_eq!(from, "cancelled"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(s.handle(&cmd).is_err());
    }

    #[test]
    fn revert_requires_an_earlier_phase() {
        let mut s = opened();
        move_to(&mut s, Phase::Cornelder);

        assert!(s.handle(&revert_cmd(&s, Phase::Cornelder)).is_err());
        assert!(s.handle(&revert_cmd(&s, Phase::Taxacao)).is_err());

        let cmd = revert_cmd(&s, Phase::Alfandegas);
        execute(&mut s, &cmd).unwrap();
        assert_eq!(s.current_phase(), Some(Phase::Alfandegas));
        assert_eq!(s.history().last().unwrap().kind, TransitionKind::Revert);
    }

    #[test]
    fn revert_is_refused_while_draft() {
        let s = opened();
        let err = s.handle(&revert_cmd(&s, Phase::ColetaDispersa)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }

    #[test]
    fn revert_reopens_a_completed_shipment() {
        let mut s = opened();
        move_to(&mut s, Phase::Pod);
        satisfy(&mut s, Phase::Pod);
        advance(&mut s).unwrap();

        let cmd = revert_cmd(&s, Phase::Pod);
        execute(&mut s, &cmd).unwrap();
        assert_eq!(s.status(), ShipmentStatus::Active);
        assert_eq!(s.current_phase(), Some(Phase::Pod));
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

        /// Whatever subset of required documents is present, advance either
        /// refuses (phase unchanged) or moves exactly one step.
        #[test]
        fn advance_moves_one_step_or_none(
            phase_idx in 0usize..6,
            mask in proptest::collection::vec(any::<bool>(), 3),
        ) {
            let target = Phase::ALL[phase_idx];
            let mut s = opened();
            move_to(&mut s, target);

            let required = target.required_documents();
            let mut complete = true;
            for (i, code) in required.iter().enumerate() {
                if mask[i] {
                    attach(&mut s, target, code);
                } else {
                    complete = false;
                }
            }

            match s.handle(&advance_cmd(&s, 0)) {
                Ok(events) => {
                    prop_assert!(complete);
                    for e in &events {
                        s.apply(e);
                    }
                    prop_assert_eq!(s.current_phase(), target.next());
                }
                Err(DomainError::PhaseNotReady { .. }) => {
                    prop_assert!(!complete);
                    prop_assert_eq!(s.current_phase(), Some(target));
                }
                Err(other) => prop_assert!(false, "unexpected error: {:?}", other),
            }
        }
    }
}
