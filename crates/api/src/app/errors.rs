use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{Map, Value as JsonValue, json};

use clearway_core::DomainError;
use clearway_infra::sequence::SequenceError;
use clearway_infra::services::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Domain(e) => domain_error_to_response(e),
        ServiceError::Concurrency(msg) => {
            json_error(StatusCode::CONFLICT, "concurrency_conflict", msg)
        }
        ServiceError::Sequence(e) => {
            tracing::error!(error = %e, "number allocation failed");
            let status = match &e {
                SequenceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                SequenceError::Overflow(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            json_error(status, "sequence_error", e.to_string())
        }
        ServiceError::Infrastructure(msg) => {
            tracing::error!(error = %msg, "request failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        DomainError::Validation(_) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", message)
        }
        DomainError::InvalidDocumentType { phase, code } => json_error_with(
            StatusCode::BAD_REQUEST,
            "invalid_document_type",
            message,
            json!({ "phase": phase, "document_type": code }),
        ),
        DomainError::CurrencyMismatch { expected, found } => json_error_with(
            StatusCode::BAD_REQUEST,
            "currency_mismatch",
            message,
            json!({ "expected": expected, "found": found }),
        ),
        DomainError::InvalidTransition { entity, from, to } => json_error_with(
            StatusCode::CONFLICT,
            "invalid_state",
            message,
            json!({ "entity": entity, "from": from, "to": to }),
        ),
        DomainError::PhaseNotReady {
            phase,
            missing_documents,
            pending_payment_requests,
        } => json_error_with(
            StatusCode::UNPROCESSABLE_ENTITY,
            "phase_not_ready",
            message,
            json!({
                "phase": phase,
                "missing_documents": missing_documents,
                "pending_payment_requests": pending_payment_requests,
            }),
        ),
        DomainError::Conflict(_) => json_error(StatusCode::CONFLICT, "concurrency_conflict", message),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::InvalidId(_) => json_error(StatusCode::BAD_REQUEST, "invalid_id", message),
        DomainError::InvariantViolation(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", message)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    json_error_with(status, code, message, JsonValue::Null)
}

/// Error body with extra top-level fields taken from `details` (an object).
pub fn json_error_with(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    details: JsonValue,
) -> axum::response::Response {
    let mut body = Map::new();
    body.insert("error".to_string(), JsonValue::from(code));
    body.insert("message".to_string(), JsonValue::from(message.into()));
    if let JsonValue::Object(extra) = details {
        body.extend(extra);
    }

    (status, axum::Json(JsonValue::Object(body))).into_response()
}

/// Parse a path or query identifier, mapping failures to a 400.
pub fn parse_id<T>(raw: &str, what: &'static str) -> Result<T, axum::response::Response>
where
    T: core::str::FromStr,
{
    raw.trim().parse().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {what}"),
        )
    })
}
