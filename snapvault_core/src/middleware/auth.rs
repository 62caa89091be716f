use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::auth::{AuthError, User, UserId};
use crate::error::AppError;
use crate::AppState;

/// The caller resolved from a bearer token, placed in request extensions by
/// `require_bearer_auth`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: UserId,
    pub email: String,
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AppError::Unauthorized(AuthError::MissingToken))
    }
}

pub async fn require_bearer_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer(request.headers())?;

    let user = state.auth_service.authenticate(token).await?;

    tracing::debug!(user_id = %user.id, "authenticated request");
    request.extensions_mut().insert(AuthUser::from(&user));

    Ok(next.run(request).await)
}

/// The raw `Authorization` value. Scheme stripping happens during
/// verification, so a bare token is accepted too.
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::Malformed)?;

    if value.trim().is_empty() {
        return Err(AuthError::MissingToken);
    }

    Ok(value)
}
