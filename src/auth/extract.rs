//! Request-scoped principal context.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::errors::{ApiAuthError, AuthErrorKind};

/// The authenticated principal for this request, resolved once by the
/// authorizer middleware and carried in request extensions. Each request
/// gets its own value; there is no ambient "current user" state.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// Stable numeric user id
    pub id: i64,
    /// Subject email, also the ownership key for comments
    pub email: String,
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Present on every route the authorizer admitted; absence means the
        // route was left out of the protected set by mistake.
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(ApiAuthError(AuthErrorKind::NoCredential))
    }
}
