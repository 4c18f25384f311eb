use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::context::UserContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(user): Extension<UserContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "user_id": user.user_id().to_string(),
        "role": user.role(),
        "can_revert": user.can_revert(),
    }))
}
