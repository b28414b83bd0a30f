use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use super::{claims::Identity, jwt::JwtKeys};
use crate::error::{AppError, UNAUTHORIZED};

/// Pulls the token out of `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Rejects the request with 401 unless it carries a valid bearer token; on
/// success the caller's [`Identity`] is stored in the request extensions.
pub async fn require_auth(
    State(keys): State<JwtKeys>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(token) = bearer_token(req.headers()) else {
        warn!(uri = %req.uri(), "missing or malformed Authorization header");
        return Err(AppError::Unauthorized(UNAUTHORIZED));
    };

    let claims = keys.verify(token).inspect_err(|_| {
        warn!(uri = %req.uri(), "invalid or expired token");
    })?;

    req.extensions_mut().insert(Identity::from(claims));
    Ok(next.run(req).await)
}

/// Identity of the authenticated caller. Only available behind
/// [`require_auth`].
pub struct AuthUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(AuthUser)
            .ok_or(AppError::Unauthorized(UNAUTHORIZED))
    }
}
