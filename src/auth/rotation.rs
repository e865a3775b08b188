//! Silent token rotation.
//!
//! Invoked when the access-token path fails to authenticate and a refresh
//! credential is present. A valid refresh token always earns a new access
//! token; the refresh token itself is only replaced inside a sliding
//! renewal window near its expiry, so long-lived sessions never lapse
//! mid-use as long as the client keeps presenting a live refresh token.

use super::errors::AuthErrorKind;
use crate::db::{User, UserStore};
use crate::jwt::{JwtCodec, TokenKind, VerifyError};

/// What a successful rotation produced. Lives for one request/response
/// cycle; the propagator writes the tokens out and the value is dropped.
#[derive(Debug, Clone)]
pub struct RotationOutcome {
    /// Principal resolved from the refresh claims
    pub subject_id: i64,
    pub subject_email: String,
    /// Replacement access token, always minted
    pub access: String,
    /// Replacement refresh token, minted only inside the renewal window
    pub refresh: Option<String>,
}

/// Run the rotation policy against a presented refresh token.
///
/// Every rejection is terminal for the request; no partial authentication
/// state escapes this function.
pub async fn rotate(
    jwt: &JwtCodec,
    users: &UserStore,
    refresh_token: &str,
    now: u64,
) -> Result<RotationOutcome, AuthErrorKind> {
    // A bad refresh token never triggers rotation; an expired one gets its
    // own re-authenticate signal rather than degrading to anonymous.
    let claims = jwt.verify(refresh_token, now).map_err(|e| match e {
        VerifyError::Malformed(e) => {
            tracing::warn!(error = %e, "Malformed refresh token");
            AuthErrorKind::MalformedToken
        }
        VerifyError::Expired => AuthErrorKind::RefreshExpired,
    })?;

    if claims.kind != TokenKind::Refresh {
        return Err(AuthErrorKind::WrongTokenKind);
    }

    let user = resolve_principal(users, claims.sub).await?;

    let access = jwt
        .mint(TokenKind::Access, user.id, &user.email, now)
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to mint access token");
            AuthErrorKind::Internal
        })?;

    // claims.exp >= now here, or verify would have said Expired
    let refresh = if claims.exp - now < jwt.lifetimes().renewal_window_secs {
        let token = jwt
            .mint(TokenKind::Refresh, user.id, &user.email, now)
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to mint refresh token");
                AuthErrorKind::Internal
            })?;
        Some(token)
    } else {
        None
    };

    Ok(RotationOutcome {
        subject_id: user.id,
        subject_email: user.email,
        access,
        refresh,
    })
}

async fn resolve_principal(users: &UserStore, id: i64) -> Result<User, AuthErrorKind> {
    users
        .get_by_id(id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to look up user");
            AuthErrorKind::Internal
        })?
        .ok_or(AuthErrorKind::PrincipalNotFound)
}
