use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::conversation::UserRole;

/// Identity assertion attached by the platform gateway to every request.
/// Token issuance and validation live upstream; this service consumes the
/// already-verified `{user_id, role}` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: UserRole,
}

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, AppError> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized)
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)?
            .parse::<Uuid>()
            .map_err(|_| AppError::BadRequest(format!("invalid {USER_ID_HEADER}")))?;
        let role = header(parts, USER_ROLE_HEADER)?
            .parse::<UserRole>()
            .map_err(|_| AppError::BadRequest(format!("invalid {USER_ROLE_HEADER}")))?;
        Ok(Identity { user_id, role })
    }
}
