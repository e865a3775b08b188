//! Authentication rejection types.
//!
//! Every failure of the request authorizer is one of these kinds; all are
//! terminal for the request. API routes answer with a JSON body carrying a
//! stable `error` code, browser routes redirect to the login page.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};

/// Why a request failed to authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// No usable credential on any channel
    NoCredential,
    /// Token could not be decoded or its signature did not match
    MalformedToken,
    /// Access token past expiry, with no refresh credential to rotate on
    ExpiredToken,
    /// A token of the wrong kind was presented (e.g. access in the refresh slot)
    WrongTokenKind,
    /// Refresh claims name a principal that no longer exists
    PrincipalNotFound,
    /// Refresh token past expiry; the session must re-authenticate
    RefreshExpired,
    /// Database or minting failure while authenticating
    Internal,
}

impl AuthErrorKind {
    /// Stable machine-readable code surfaced in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoCredential => "no_credential",
            Self::MalformedToken => "malformed_token",
            Self::ExpiredToken => "expired_token",
            Self::WrongTokenKind => "wrong_token_kind",
            Self::PrincipalNotFound => "principal_not_found",
            Self::RefreshExpired => "refresh_expired",
            Self::Internal => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            Self::NoCredential => "Not authenticated",
            Self::MalformedToken => "Invalid token",
            Self::ExpiredToken => "Token expired",
            Self::WrongTokenKind => "Wrong token kind",
            Self::PrincipalNotFound => "User not found",
            Self::RefreshExpired => "Session expired, please log in again",
            Self::Internal => "Internal error",
        }
    }
}

/// API authentication rejection (JSON body).
#[derive(Debug)]
pub struct ApiAuthError(pub AuthErrorKind);

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        use axum::Json;
        use serde::Serialize;

        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
            message: &'static str,
        }

        (
            self.0.status_code(),
            Json(ErrorResponse {
                error: self.0.code(),
                message: self.0.message(),
            }),
        )
            .into_response()
    }
}

/// Browser authentication rejection - redirects to the login page instead
/// of rendering a raw error.
#[derive(Debug)]
pub struct PageAuthError {
    pub login_path: String,
}

impl IntoResponse for PageAuthError {
    fn into_response(self) -> Response {
        Redirect::temporary(&self.login_path).into_response()
    }
}
