use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};

use clearway_billing::{CreditNote, CreditNoteId};
use clearway_infra::services::{CreateCreditNoteInput, ServiceResult};

use crate::app::services::{self, SharedServices};
use crate::app::{dto, errors};
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_credit_note))
        .route("/:id", get(get_credit_note))
        .route("/:id/status", post(change_status))
        .route("/:id/items", put(revise_items))
}

fn credit_note_id(raw: &str) -> Result<CreditNoteId, Response> {
    errors::parse_id(raw, "credit note id")
}

fn respond(status: StatusCode, result: ServiceResult<CreditNote>) -> Response {
    match result {
        Ok(note) => (status, Json(dto::credit_note_to_json(&note))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_credit_note(
    Extension(services): Extension<SharedServices>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<CreateCreditNoteInput>,
) -> Response {
    let user_id = user.user_id();
    let result = services::run(&services, move |s| s.create_credit_note(body, user_id)).await;
    respond(StatusCode::CREATED, result)
}

pub async fn get_credit_note(
    Extension(services): Extension<SharedServices>,
    Path(id): Path<String>,
) -> Response {
    let credit_note_id = match credit_note_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let result = services::run(&services, move |s| s.credit_note(credit_note_id)).await;
    respond(StatusCode::OK, result)
}

/// Body: `{"status": "issued" | "applied" | "cancelled", "reason": ...}`.
pub async fn change_status(
    Extension(services): Extension<SharedServices>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CreditNoteStatusRequest>,
) -> Response {
    let credit_note_id = match credit_note_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let user_id = user.user_id();
    let result = services::run(&services, move |s| {
        s.change_credit_note_status(credit_note_id, body.status, body.reason, user_id)
    })
    .await;
    respond(StatusCode::OK, result)
}

pub async fn revise_items(
    Extension(services): Extension<SharedServices>,
    Path(id): Path<String>,
    Json(body): Json<dto::ItemsRequest>,
) -> Response {
    let credit_note_id = match credit_note_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let result = services::run(&services, move |s| {
        s.revise_credit_note_items(credit_note_id, body.items)
    })
    .await;
    respond(StatusCode::OK, result)
}
