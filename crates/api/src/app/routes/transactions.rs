use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use clearway_accounting::{FinancialTransaction, TransactionId};
use clearway_infra::services::{RecordTransactionInput, ServiceResult};

use crate::app::services::{self, SharedServices};
use crate::app::{dto, errors};
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(record_transaction))
        .route("/:id", get(get_transaction))
        .route("/:id/void", post(void_transaction))
}

fn transaction_id(raw: &str) -> Result<TransactionId, Response> {
    errors::parse_id(raw, "transaction id")
}

fn respond(status: StatusCode, result: ServiceResult<FinancialTransaction>) -> Response {
    match result {
        Ok(tx) => (status, Json(dto::transaction_to_json(&tx))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn record_transaction(
    Extension(services): Extension<SharedServices>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<RecordTransactionInput>,
) -> Response {
    let user_id = user.user_id();
    let result = services::run(&services, move |s| s.record_transaction(body, user_id)).await;
    respond(StatusCode::CREATED, result)
}

pub async fn get_transaction(
    Extension(services): Extension<SharedServices>,
    Path(id): Path<String>,
) -> Response {
    let transaction_id = match transaction_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let result = services::run(&services, move |s| s.transaction(transaction_id)).await;
    respond(StatusCode::OK, result)
}

pub async fn void_transaction(
    Extension(services): Extension<SharedServices>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::VoidRequest>,
) -> Response {
    let transaction_id = match transaction_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let user_id = user.user_id();
    let result = services::run(&services, move |s| {
        s.void_transaction(transaction_id, body.reason, user_id)
    })
    .await;
    respond(StatusCode::OK, result)
}

/// GET /statement?client_id=&from=&to=&currency=
pub async fn statement(
    Extension(services): Extension<SharedServices>,
    Query(query): Query<dto::StatementQuery>,
) -> Response {
    let filter = match query.into_filter() {
        Ok(f) => f,
        Err(res) => return res,
    };

    match services::run(&services, move |s| s.statement(&filter)).await {
        Ok(statement) => (StatusCode::OK, Json(statement)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
