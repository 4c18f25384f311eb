use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use clearway_clearance::{PaymentRequestId, ShipmentId};
use clearway_infra::services::RequestPaymentInput;

use crate::app::services::{self, SharedServices};
use crate::app::{dto, errors};
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new()
        // POST takes the shipment id, GET the payment request id.
        .route("/:id", post(request_payment).get(get_payment_request))
        .route("/:id/approve", post(approve))
        .route("/:id/reject", post(reject))
        .route("/:id/pay", post(pay))
}

fn payment_request_id(raw: &str) -> Result<PaymentRequestId, Response> {
    errors::parse_id(raw, "payment request id")
}

/// POST /payment-requests/:shipment_id and POST /shipments/:id/payment-requests
pub async fn request_payment(
    Extension(services): Extension<SharedServices>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(body): Json<RequestPaymentInput>,
) -> Response {
    let shipment_id: ShipmentId = match errors::parse_id(&id, "shipment id") {
        Ok(v) => v,
        Err(res) => return res,
    };

    let user_id = user.user_id();
    let result =
        services::run(&services, move |s| s.request_payment(shipment_id, body, user_id)).await;
    match result {
        Ok(request) => {
            (StatusCode::CREATED, Json(dto::payment_request_to_json(&request))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_payment_request(
    Extension(services): Extension<SharedServices>,
    Path(id): Path<String>,
) -> Response {
    let payment_request_id = match payment_request_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services::run(&services, move |s| s.payment_request(payment_request_id)).await {
        Ok(request) => {
            (StatusCode::OK, Json(dto::payment_request_to_json(&request))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn approve(
    Extension(services): Extension<SharedServices>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::DecisionRequest>>,
) -> Response {
    let payment_request_id = match payment_request_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let note = body.and_then(|Json(b)| b.note);
    let user_id = user.user_id();
    let result = services::run(&services, move |s| {
        s.approve_payment_request(payment_request_id, note, user_id)
    })
    .await;
    match result {
        Ok(request) => {
            (StatusCode::OK, Json(dto::payment_request_to_json(&request))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn reject(
    Extension(services): Extension<SharedServices>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::DecisionRequest>>,
) -> Response {
    let payment_request_id = match payment_request_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let note = body.and_then(|Json(b)| b.note);
    let user_id = user.user_id();
    let result = services::run(&services, move |s| {
        s.reject_payment_request(payment_request_id, note, user_id)
    })
    .await;
    match result {
        Ok(request) => {
            (StatusCode::OK, Json(dto::payment_request_to_json(&request))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn pay(
    Extension(services): Extension<SharedServices>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::PayRequest>>,
) -> Response {
    let payment_request_id = match payment_request_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let dto::PayRequest { amount, reference } = body.map(|Json(b)| b).unwrap_or_default();
    let user_id = user.user_id();
    let result = services::run(&services, move |s| {
        s.mark_payment_request_paid(payment_request_id, amount, reference, user_id)
    })
    .await;
    match result {
        Ok(request) => {
            (StatusCode::OK, Json(dto::payment_request_to_json(&request))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}
