use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::Utc;

use clearway_billing::{Invoice, InvoiceId, LineItem};
use clearway_infra::services::{CreateInvoiceInput, RecordReceiptInput, ServiceResult};

use crate::app::services::{self, SharedServices};
use crate::app::{dto, errors};
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_invoice))
        .route("/:id", get(get_invoice))
        .route("/:id/items", post(add_item).put(replace_items))
        .route("/:id/items/:line_no", delete(remove_item))
        .route("/:id/issue", post(issue_invoice))
        .route("/:id/cancel", post(cancel_invoice))
}

fn invoice_id(raw: &str) -> Result<InvoiceId, Response> {
    errors::parse_id(raw, "invoice id")
}

fn respond(status: StatusCode, result: ServiceResult<Invoice>) -> Response {
    match result {
        Ok(invoice) => {
            let today = Utc::now().date_naive();
            (status, Json(dto::invoice_to_json(&invoice, today))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_invoice(
    Extension(services): Extension<SharedServices>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<CreateInvoiceInput>,
) -> Response {
    let user_id = user.user_id();
    let result = services::run(&services, move |s| s.create_invoice(body, user_id)).await;
    respond(StatusCode::CREATED, result)
}

pub async fn get_invoice(
    Extension(services): Extension<SharedServices>,
    Path(id): Path<String>,
) -> Response {
    let invoice_id = match invoice_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let result = services::run(&services, move |s| s.invoice(invoice_id)).await;
    respond(StatusCode::OK, result)
}

pub async fn add_item(
    Extension(services): Extension<SharedServices>,
    Path(id): Path<String>,
    Json(item): Json<LineItem>,
) -> Response {
    let invoice_id = match invoice_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let result = services::run(&services, move |s| s.add_invoice_item(invoice_id, item)).await;
    respond(StatusCode::OK, result)
}

pub async fn replace_items(
    Extension(services): Extension<SharedServices>,
    Path(id): Path<String>,
    Json(body): Json<dto::ItemsRequest>,
) -> Response {
    let invoice_id = match invoice_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let result =
        services::run(&services, move |s| s.replace_invoice_items(invoice_id, body.items)).await;
    respond(StatusCode::OK, result)
}

pub async fn remove_item(
    Extension(services): Extension<SharedServices>,
    Path((id, line_no)): Path<(String, u32)>,
) -> Response {
    let invoice_id = match invoice_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let result =
        services::run(&services, move |s| s.remove_invoice_item(invoice_id, line_no)).await;
    respond(StatusCode::OK, result)
}

pub async fn issue_invoice(
    Extension(services): Extension<SharedServices>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> Response {
    let invoice_id = match invoice_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let user_id = user.user_id();
    let result = services::run(&services, move |s| s.issue_invoice(invoice_id, user_id)).await;
    respond(StatusCode::OK, result)
}

pub async fn cancel_invoice(
    Extension(services): Extension<SharedServices>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CancelRequest>,
) -> Response {
    let invoice_id = match invoice_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let user_id = user.user_id();
    let result =
        services::run(&services, move |s| s.cancel_invoice(invoice_id, body.reason, user_id))
            .await;
    respond(StatusCode::OK, result)
}

/// POST /receipts
///
/// Responds with the updated invoice; the new receipt is the last entry of
/// `receipts`.
pub async fn record_receipt(
    Extension(services): Extension<SharedServices>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<RecordReceiptInput>,
) -> Response {
    let user_id = user.user_id();
    let result = services::run(&services, move |s| s.record_receipt(body, user_id)).await;
    respond(StatusCode::CREATED, result)
}
