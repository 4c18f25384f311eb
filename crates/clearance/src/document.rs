//! Document gate: the per-shipment register of uploaded documents and the
//! readiness checks derived from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clearway_core::{DomainError, DomainResult, Entity, UserId, ValueObject, typed_id};

use crate::phase::Phase;

typed_id!(
    /// Identifier of an uploaded document.
    DocumentId
);

/// Reference to a file held by the external file store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub reference: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub checksum: Option<String>,
}

impl FileRef {
    pub fn validate(&self) -> DomainResult<()> {
        if self.reference.trim().is_empty() {
            return Err(DomainError::validation("file reference must not be empty"));
        }
        Ok(())
    }
}

impl ValueObject for FileRef {}

/// An uploaded document. Immutable once attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub phase: Phase,
    pub document_type: String,
    pub file: FileRef,
    pub note: Option<String>,
    pub uploaded_by: UserId,
    pub uploaded_at: DateTime<Utc>,
}

impl Entity for Document {
    type Id = DocumentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Documents attached to one shipment, in upload order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentGate {
    documents: Vec<Document>,
}

impl DocumentGate {
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn for_phase(&self, phase: Phase) -> impl Iterator<Item = &Document> {
        self.documents.iter().filter(move |d| d.phase == phase)
    }

    pub fn get(&self, id: DocumentId) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    /// Reject type codes the phase does not accept.
    pub fn validate_type(phase: Phase, document_type: &str) -> DomainResult<()> {
        if phase.accepts_document(document_type) {
            Ok(())
        } else {
            Err(DomainError::InvalidDocumentType {
                phase: phase.to_string(),
                code: document_type.to_string(),
            })
        }
    }

    /// Required codes of `phase` with no uploaded document, in table order.
    pub fn missing_documents(&self, phase: Phase) -> Vec<&'static str> {
        phase
            .required_documents()
            .iter()
            .copied()
            .filter(|code| !self.for_phase(phase).any(|d| d.document_type == *code))
            .collect()
    }

    pub fn is_phase_satisfied(&self, phase: Phase) -> bool {
        self.missing_documents(phase).is_empty()
    }

    pub(crate) fn insert(&mut self, document: Document) {
        if self.get(document.id).is_none() {
            self.documents.push(document);
        }
    }

    pub(crate) fn remove(&mut self, id: DocumentId) -> Option<Document> {
        let idx = self.documents.iter().position(|d| d.id == id)?;
        Some(self.documents.remove(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(phase: Phase, code: &str) -> Document {
        Document {
            id: DocumentId::generate(),
            phase,
            document_type: code.to_string(),
            file: FileRef {
                reference: format!("files/{code}.pdf"),
                size_bytes: 1024,
                checksum: None,
            },
            note: None,
            uploaded_by: UserId::new(),
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn empty_gate_reports_all_required_codes() {
        let gate = DocumentGate::default();
        assert_eq!(
            gate.missing_documents(Phase::Alfandegas),
            vec!["customs_declaration", "cargo_manifest", "duty_assessment"]
        );
        assert!(!gate.is_phase_satisfied(Phase::Alfandegas));
    }

    #[test]
    fn documents_only_count_for_their_own_phase() {
        let mut gate = DocumentGate::default();
        gate.insert(doc(Phase::Legalizacao, "outro"));
        gate.insert(doc(Phase::Pod, "proof_of_delivery"));

        assert!(gate.is_phase_satisfied(Phase::Pod));
        assert!(!gate.is_phase_satisfied(Phase::Legalizacao));
        assert_eq!(gate.for_phase(Phase::Legalizacao).count(), 1);
    }

    #[test]
    fn removal_can_unsatisfy_a_phase() {
        let mut gate = DocumentGate::default();
        let d = doc(Phase::Facturacao, "client_invoice");
        let id = d.id;
        gate.insert(d);
        assert!(gate.is_phase_satisfied(Phase::Facturacao));

        assert!(gate.remove(id).is_some());
        assert!(!gate.is_phase_satisfied(Phase::Facturacao));
        assert!(gate.remove(id).is_none());
    }

    #[test]
    fn unknown_codes_are_rejected_per_phase() {
        assert!(DocumentGate::validate_type(Phase::Taxacao, "tax_notice").is_ok());
        assert!(DocumentGate::validate_type(Phase::Taxacao, "outro").is_ok());
        match DocumentGate::validate_type(Phase::Taxacao, "bill_of_lading") {
            Err(DomainError::InvalidDocumentType { phase, code }) => {
                assert_eq!(phase, "taxacao");
                assert_eq!(code, "bill_of_lading");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn empty_file_reference_is_invalid() {
        let file = FileRef {
            reference: "  ".into(),
            size_bytes: 0,
            checksum: None,
        };
        assert!(file.validate().is_err());
    }
}
