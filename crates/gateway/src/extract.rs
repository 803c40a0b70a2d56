//! Request extractors

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use seatwise_common::errors::{AppError, Result};
use uuid::Uuid;

/// Identity of the caller, taken from the X-User-ID header.
///
/// Upstream infrastructure authenticates the user and injects the header;
/// this service only requires it to be present and well-formed.
#[derive(Debug, Clone, Copy)]
pub struct UserContext {
    pub user_id: Uuid,
}

impl<S> FromRequestParts<S> for UserContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing or invalid X-User-ID header".to_string(),
            })?;

        Ok(UserContext { user_id })
    }
}
