use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::Response;
use uuid::Uuid;

use crate::services::{Caller, CallerRole};
use crate::utils::response::error as error_response;

/// The gateway in front of this service authenticates requests and injects
/// the caller's identity as headers; this extractor only decodes them.
const USER_ID_HEADER: &str = "x-user-id";
const USER_ROLE_HEADER: &str = "x-user-role";

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| {
                error_response(
                    "AUTH_ERROR",
                    "Missing or invalid caller identity",
                    StatusCode::UNAUTHORIZED,
                )
            })?;

        let role = match parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            Some(role) if role.eq_ignore_ascii_case("admin") => CallerRole::Admin,
            _ => CallerRole::Attendee,
        };

        Ok(Caller { user_id, role })
    }
}
