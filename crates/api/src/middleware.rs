use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use clearway_core::UserId;

use crate::app::errors;
use crate::context::UserContext;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Resolve the acting user from gateway headers; 401 when absent or malformed.
pub async fn identity_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let user = match extract_user(req.headers()) {
        Ok(user) => user,
        Err(message) => {
            return errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", message);
        }
    };

    req.extensions_mut().insert(user);
    next.run(req).await
}

fn extract_user(headers: &HeaderMap) -> Result<UserContext, &'static str> {
    let raw = headers
        .get(USER_ID_HEADER)
        .ok_or("missing x-user-id header")?
        .to_str()
        .map_err(|_| "x-user-id header is not valid text")?;

    let user_id: UserId = raw
        .trim()
        .parse()
        .map_err(|_| "x-user-id header must be a UUID")?;

    let role = headers
        .get(USER_ROLE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    Ok(UserContext::new(user_id, role))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn user_is_read_from_headers() {
        let user_id = UserId::new();
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_str(&user_id.to_string()).unwrap());
        headers.insert(USER_ROLE_HEADER, HeaderValue::from_static("admin"));

        let user = extract_user(&headers).unwrap();
        assert_eq!(user.user_id(), user_id);
        assert_eq!(user.role(), Some("admin"));
    }

    #[test]
    fn missing_or_malformed_id_is_rejected() {
        assert!(extract_user(&HeaderMap::new()).is_err());

        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert!(extract_user(&headers).is_err());
    }
}
