//! Request-scoped identity.
//!
//! Authentication happens upstream: the identity-aware proxy in front of this
//! service validates the session and forwards the caller as trusted headers.
//! Handlers take a [`Principal`] (any signed-in user) or [`RequireAdmin`].

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::models::{Principal, Role};
use crate::utils::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_ROLE_HEADER: &str = "x-user-role";

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)
            .ok_or_else(|| AppError::AuthError("Unauthorized".to_string()))?;
        let user_id = Uuid::parse_str(user_id)
            .map_err(|_| AppError::AuthError("Invalid user identity".to_string()))?;

        let role = match header(parts, USER_ROLE_HEADER) {
            Some(raw) => raw.parse::<Role>().map_err(AppError::AuthError)?,
            None => Role::User,
        };

        Ok(Principal {
            user_id,
            email: header(parts, USER_EMAIL_HEADER)
                .unwrap_or_default()
                .to_string(),
            role,
        })
    }
}

/// A principal whose role is [`Role::Admin`].
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let principal = Principal::from_request_parts(parts, state).await?;
        match principal.role {
            Role::Admin => Ok(Self(principal)),
            Role::User => Err(AppError::Forbidden("Admin access required".to_string())),
        }
    }
}
