//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Coarse classification of a [`DomainError`], used by callers that only need to
/// decide between "fix your input", "wrong state", "retry" and so on.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    State,
    PhaseNotReady,
    Conflict,
    NotFound,
}

/// Domain-level error.
///
/// Deterministic business failures only. Storage and allocator failures live in
/// the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or missing input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Document type code not accepted for the phase.
    #[error("document type `{code}` is not accepted in phase {phase}")]
    InvalidDocumentType { phase: String, code: String },

    /// Amount currency differs from the document currency.
    #[error("currency mismatch (expected {expected}, found {found})")]
    CurrencyMismatch { expected: String, found: String },

    /// The entity is not in a state that allows the requested transition.
    #[error("{entity} cannot move from `{from}` to `{to}`")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// The current phase is missing required documents or has pending payment requests.
    #[error("phase {phase} is not ready (missing documents: {missing_documents:?}, pending payment requests: {pending_payment_requests})")]
    PhaseNotReady {
        phase: String,
        missing_documents: Vec<String>,
        pending_payment_requests: usize,
    },

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("not found")]
    NotFound,

    /// Stale version on write. Retryable.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn transition(
        entity: &'static str,
        from: impl core::fmt::Display,
        to: impl core::fmt::Display,
    ) -> Self {
        Self::InvalidTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn currency_mismatch(
        expected: impl core::fmt::Display,
        found: impl core::fmt::Display,
    ) -> Self {
        Self::CurrencyMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Validation(_)
            | DomainError::InvalidDocumentType { .. }
            | DomainError::CurrencyMismatch { .. }
            | DomainError::InvalidId(_) => ErrorKind::Validation,
            DomainError::InvalidTransition { .. } | DomainError::InvariantViolation(_) => {
                ErrorKind::State
            }
            DomainError::PhaseNotReady { .. } => ErrorKind::PhaseNotReady,
            DomainError::Conflict(_) => ErrorKind::Conflict,
            DomainError::NotFound => ErrorKind::NotFound,
        }
    }

    /// Whether repeating the same command against fresh state may succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_subtypes_share_a_kind() {
        assert_eq!(DomainError::validation("x").kind(), ErrorKind::Validation);
        assert_eq!(
            DomainError::currency_mismatch("MZN", "USD").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            DomainError::InvalidDocumentType {
                phase: "pod".into(),
                code: "bogus".into()
            }
            .kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn transition_error_names_both_states() {
        let err = DomainError::transition("invoice", "paid", "cancelled");
        assert_eq!(err.to_string(), "invoice cannot move from `paid` to `cancelled`");
        assert_eq!(err.kind(), ErrorKind::State);
        assert!(!err.is_retryable());
    }
}
