use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};

use clearway_clearance::{DocumentId, ShipmentId};
use clearway_infra::services::{AttachDocumentInput, OpenShipmentInput};

use crate::app::routes::payment_requests;
use crate::app::services::{self, SharedServices};
use crate::app::{dto, errors};
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(open_shipment))
        .route("/:id", get(get_shipment))
        .route("/:id/advance", post(advance_phase))
        .route("/:id/revert", post(revert_phase))
        .route("/:id/cancel", post(cancel_shipment))
        .route("/:id/documents", post(attach_document))
        .route("/:id/readiness", get(readiness))
        .route("/:id/payment-requests", post(payment_requests::request_payment))
}

/// Documents are addressed by their own id once attached.
pub fn documents_router() -> Router {
    Router::new().route("/:id", delete(remove_document))
}

fn shipment_id(raw: &str) -> Result<ShipmentId, Response> {
    errors::parse_id(raw, "shipment id")
}

pub async fn open_shipment(
    Extension(services): Extension<SharedServices>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<OpenShipmentInput>,
) -> Response {
    let user_id = user.user_id();
    match services::run(&services, move |s| s.open_shipment(body, user_id)).await {
        Ok(shipment) => {
            (StatusCode::CREATED, Json(dto::shipment_to_json(&shipment))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_shipment(
    Extension(services): Extension<SharedServices>,
    Path(id): Path<String>,
) -> Response {
    let shipment_id = match shipment_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services::run(&services, move |s| s.shipment(shipment_id)).await {
        Ok(shipment) => (StatusCode::OK, Json(dto::shipment_to_json(&shipment))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn advance_phase(
    Extension(services): Extension<SharedServices>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> Response {
    let shipment_id = match shipment_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let user_id = user.user_id();
    match services::run(&services, move |s| s.advance_phase(shipment_id, user_id)).await {
        Ok(shipment) => (StatusCode::OK, Json(dto::shipment_to_json(&shipment))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Moving backwards needs an `admin` or `supervisor` role from the gateway.
pub async fn revert_phase(
    Extension(services): Extension<SharedServices>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RevertRequest>,
) -> Response {
    if !user.can_revert() {
        tracing::warn!(user_id = %user.user_id(), role = ?user.role(), "revert refused");
        return errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "reverting a phase requires the admin or supervisor role",
        );
    }

    let shipment_id = match shipment_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let user_id = user.user_id();
    let result = services::run(&services, move |s| {
        s.revert_phase(shipment_id, body.to_phase, body.reason, user_id)
    })
    .await;
    match result {
        Ok(shipment) => (StatusCode::OK, Json(dto::shipment_to_json(&shipment))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn cancel_shipment(
    Extension(services): Extension<SharedServices>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CancelRequest>,
) -> Response {
    let shipment_id = match shipment_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let user_id = user.user_id();
    let result =
        services::run(&services, move |s| s.cancel_shipment(shipment_id, body.reason, user_id))
            .await;
    match result {
        Ok(shipment) => (StatusCode::OK, Json(dto::shipment_to_json(&shipment))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn attach_document(
    Extension(services): Extension<SharedServices>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(body): Json<AttachDocumentInput>,
) -> Response {
    let shipment_id = match shipment_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let user_id = user.user_id();
    let result =
        services::run(&services, move |s| s.attach_document(shipment_id, body, user_id)).await;
    match result {
        Ok((shipment, document_id)) => (
            StatusCode::CREATED,
            Json(dto::document_attached_to_json(&shipment, document_id)),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn remove_document(
    Extension(services): Extension<SharedServices>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> Response {
    let document_id: DocumentId = match errors::parse_id(&id, "document id") {
        Ok(v) => v,
        Err(res) => return res,
    };

    let user_id = user.user_id();
    match services::run(&services, move |s| s.remove_document(document_id, user_id)).await {
        Ok(shipment) => (StatusCode::OK, Json(dto::shipment_to_json(&shipment))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn readiness(
    Extension(services): Extension<SharedServices>,
    Path(id): Path<String>,
) -> Response {
    let shipment_id = match shipment_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services::run(&services, move |s| s.readiness(shipment_id)).await {
        Ok(readiness) => {
            (StatusCode::OK, Json(dto::readiness_to_json(&readiness))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}
