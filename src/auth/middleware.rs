//! The request authorizer and response token propagator.
//!
//! Two middleware layers composed explicitly around the application router:
//! the authorizer resolves a principal (rotating tokens when the access
//! token has lapsed but a refresh token is live), and the propagator
//! writes any rotated tokens back to the caller on successful responses.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, build_cookie, get_cookie};
use super::errors::{ApiAuthError, AuthErrorKind, PageAuthError};
use super::extract::CurrentUser;
use super::rotation;
use crate::db::Database;
use crate::jwt::{JwtCodec, TokenKind, VerifyError, unix_now};

/// Secondary header carrying the refresh token when the primary credential
/// is a header-based access token.
pub const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";

/// Response header carrying a rotated access token on the header channel.
pub const NEW_ACCESS_TOKEN_HEADER: &str = "x-new-access-token";

/// Response header carrying a rotated refresh token on the header channel.
pub const NEW_REFRESH_TOKEN_HEADER: &str = "x-new-refresh-token";

/// How a protected route answers a rejected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteGuard {
    /// JSON error body with a stable `error` code
    Api,
    /// Redirect to the login page
    Page,
}

/// The set of routes requiring authentication. Injected configuration:
/// routes are identified by method plus matched path template
/// (e.g. `POST /api/articles`, `DELETE /api/articles/{id}`), each with the
/// rejection flavor its surface expects.
#[derive(Debug, Clone, Default)]
pub struct ProtectedRoutes {
    routes: HashMap<(Method, String), RouteGuard>,
}

impl ProtectedRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Protect an API route; rejections are JSON.
    pub fn protect_api(mut self, method: Method, path: &str) -> Self {
        self.routes.insert((method, path.to_string()), RouteGuard::Api);
        self
    }

    /// Protect a browser route; rejections redirect to the login page.
    pub fn protect_page(mut self, method: Method, path: &str) -> Self {
        self.routes
            .insert((method, path.to_string()), RouteGuard::Page);
        self
    }

    pub fn lookup(&self, method: &Method, path: &str) -> Option<RouteGuard> {
        self.routes.get(&(method.clone(), path.to_string())).copied()
    }
}

/// Shared state for the authorizer and propagator layers.
#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<JwtCodec>,
    pub db: Database,
    pub secure_cookies: bool,
    pub protected: Arc<ProtectedRoutes>,
    /// Login entry point page rejections redirect to
    pub login_path: String,
}

/// Which channel family carried the inbound credential. Rotated tokens go
/// back out on the same family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialChannel {
    /// `Authorization: Bearer` / `X-Refresh-Token` headers
    Header,
    /// `access_token` / `refresh_token` cookies
    Cookie,
}

/// Tokens minted by rotation, staged on the response for the propagator.
/// Dropped unsent if the response is not a success.
#[derive(Debug, Clone)]
pub struct StagedTokens {
    pub channel: CredentialChannel,
    pub access: String,
    pub refresh: Option<String>,
}

/// Request authorizer. Runs once per inbound request, before any protected
/// handler; layered beneath [`propagate_rotated_tokens`].
pub async fn authorize(
    State(auth): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    // CORS preflights bypass the state machine entirely
    if request.method() == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }

    // Public routes skip verification altogether
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let Some(guard) = auth.protected.lookup(request.method(), &path) else {
        return next.run(request).await;
    };

    // One clock snapshot per pass so a token cannot straddle its expiry
    // between the access check and rotation
    let now = unix_now();

    match resolve_credential(&auth, request.headers(), now).await {
        Ok((user, staged)) => {
            request.extensions_mut().insert(user);
            let mut response = next.run(request).await;
            if let Some(staged) = staged {
                response.extensions_mut().insert(staged);
            }
            response
        }
        Err(kind) => auth.reject(kind, guard),
    }
}

/// Response token propagator. On 2xx responses, writes tokens staged by
/// rotation into the channel family the request used; on anything else the
/// staged tokens are discarded.
pub async fn propagate_rotated_tokens(
    State(auth): State<AuthState>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;

    let staged = response.extensions_mut().remove::<StagedTokens>();
    if !response.status().is_success() {
        return response;
    }
    let Some(staged) = staged else {
        return response;
    };

    let lifetimes = *auth.jwt.lifetimes();
    let headers = response.headers_mut();
    match staged.channel {
        CredentialChannel::Header => {
            if let Ok(value) = HeaderValue::from_str(&staged.access) {
                headers.insert(NEW_ACCESS_TOKEN_HEADER, value);
            }
            if let Some(refresh) = &staged.refresh {
                if let Ok(value) = HeaderValue::from_str(refresh) {
                    headers.insert(NEW_REFRESH_TOKEN_HEADER, value);
                }
            }
        }
        CredentialChannel::Cookie => {
            let cookie = build_cookie(
                ACCESS_COOKIE_NAME,
                &staged.access,
                lifetimes.access_secs,
                auth.secure_cookies,
            );
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                headers.append(header::SET_COOKIE, value);
            }
            if let Some(refresh) = &staged.refresh {
                let cookie = build_cookie(
                    REFRESH_COOKIE_NAME,
                    refresh,
                    lifetimes.refresh_secs,
                    auth.secure_cookies,
                );
                if let Ok(value) = HeaderValue::from_str(&cookie) {
                    headers.append(header::SET_COOKIE, value);
                }
            }
        }
    }

    response
}

impl AuthState {
    fn reject(&self, kind: AuthErrorKind, guard: RouteGuard) -> Response {
        // Malformed may indicate tampering and must never be conflated
        // with routine expiry in the logs
        match kind {
            AuthErrorKind::MalformedToken => {
                tracing::warn!(code = kind.code(), "Rejected credential")
            }
            AuthErrorKind::ExpiredToken | AuthErrorKind::RefreshExpired => {
                tracing::debug!(code = kind.code(), "Rejected credential")
            }
            _ => tracing::debug!(code = kind.code(), "Request not authenticated"),
        }

        match guard {
            RouteGuard::Api => ApiAuthError(kind).into_response(),
            RouteGuard::Page => PageAuthError {
                login_path: self.login_path.clone(),
            }
            .into_response(),
        }
    }
}

/// Run the per-request credential state machine:
/// `NO_CREDENTIAL -> CHECKING_ACCESS -> {AUTHENTICATED, CHECKING_REFRESH}
/// -> {AUTHENTICATED, REJECTED}`.
async fn resolve_credential(
    auth: &AuthState,
    headers: &HeaderMap,
    now: u64,
) -> Result<(CurrentUser, Option<StagedTokens>), AuthErrorKind> {
    let (channel, access, refresh) = split_channels(headers);

    let access_failure = match access {
        None => AuthErrorKind::NoCredential,
        Some(token) => match auth.jwt.verify(token, now) {
            Ok(claims) if claims.kind == TokenKind::Access => {
                return Ok((
                    CurrentUser {
                        id: claims.sub,
                        email: claims.email,
                    },
                    None,
                ));
            }
            Ok(_) => AuthErrorKind::WrongTokenKind,
            Err(VerifyError::Malformed(e)) => {
                tracing::warn!(error = %e, "Malformed access token");
                AuthErrorKind::MalformedToken
            }
            Err(VerifyError::Expired) => AuthErrorKind::ExpiredToken,
        },
    };

    // Rotation only runs when a refresh credential is actually present
    let Some(refresh) = refresh else {
        return Err(access_failure);
    };

    let outcome = rotation::rotate(&auth.jwt, &auth.db.users(), refresh, now).await?;
    let user = CurrentUser {
        id: outcome.subject_id,
        email: outcome.subject_email,
    };
    Ok((
        user,
        Some(StagedTokens {
            channel,
            access: outcome.access,
            refresh: outcome.refresh,
        }),
    ))
}

/// Pick the credential channel for this pass. Header credentials win when
/// either header is present; the two families are never mixed within one
/// verification pass.
fn split_channels(headers: &HeaderMap) -> (CredentialChannel, Option<&str>, Option<&str>) {
    if headers.contains_key(header::AUTHORIZATION) || headers.contains_key(REFRESH_TOKEN_HEADER) {
        let access = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_bearer);
        let refresh = headers
            .get(REFRESH_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        (CredentialChannel::Header, access, refresh)
    } else {
        (
            CredentialChannel::Cookie,
            get_cookie(headers, ACCESS_COOKIE_NAME),
            get_cookie(headers, REFRESH_COOKIE_NAME),
        )
    }
}

/// Extract the token from an Authorization header value. The scheme must be
/// exactly `Bearer <token>`; anything else counts as no credential rather
/// than a malformed token.
fn parse_bearer(value: &str) -> Option<&str> {
    let token = value.strip_prefix("Bearer ")?;
    if token.is_empty() || token.contains(' ') {
        return None;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bearer_exact_scheme() {
        assert_eq!(parse_bearer("Bearer abc.def.ghi"), Some("abc.def.ghi"));
    }

    #[test]
    fn test_parse_bearer_rejects_other_schemes() {
        assert_eq!(parse_bearer("Basic abc"), None);
        assert_eq!(parse_bearer("bearer abc"), None);
        assert_eq!(parse_bearer("Bearer"), None);
        assert_eq!(parse_bearer("Bearer "), None);
        assert_eq!(parse_bearer("Bearer a b"), None);
    }

    #[test]
    fn test_protected_routes_match_method_and_path() {
        let routes = ProtectedRoutes::new()
            .protect_api(Method::POST, "/api/articles")
            .protect_api(Method::DELETE, "/api/articles/{id}")
            .protect_page(Method::GET, "/account");

        assert_eq!(
            routes.lookup(&Method::POST, "/api/articles"),
            Some(RouteGuard::Api)
        );
        assert_eq!(
            routes.lookup(&Method::DELETE, "/api/articles/{id}"),
            Some(RouteGuard::Api)
        );
        assert_eq!(
            routes.lookup(&Method::GET, "/account"),
            Some(RouteGuard::Page)
        );
        assert_eq!(routes.lookup(&Method::GET, "/api/articles"), None);
        assert_eq!(routes.lookup(&Method::POST, "/api/comments"), None);
    }

    #[test]
    fn test_header_channel_wins_over_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer header-token"),
        );
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("access_token=cookie-token; refresh_token=cookie-refresh"),
        );

        let (channel, access, refresh) = split_channels(&headers);
        assert_eq!(channel, CredentialChannel::Header);
        assert_eq!(access, Some("header-token"));
        // Cookie refresh is not consulted on the header channel
        assert_eq!(refresh, None);
    }

    #[test]
    fn test_refresh_header_alone_selects_header_channel() {
        let mut headers = HeaderMap::new();
        headers.insert(
            REFRESH_TOKEN_HEADER,
            HeaderValue::from_static("refresh-token"),
        );

        let (channel, access, refresh) = split_channels(&headers);
        assert_eq!(channel, CredentialChannel::Header);
        assert_eq!(access, None);
        assert_eq!(refresh, Some("refresh-token"));
    }

    #[test]
    fn test_cookie_channel_when_no_auth_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("access_token=a; refresh_token=r"),
        );

        let (channel, access, refresh) = split_channels(&headers);
        assert_eq!(channel, CredentialChannel::Cookie);
        assert_eq!(access, Some("a"));
        assert_eq!(refresh, Some("r"));
    }

    #[test]
    fn test_no_credentials_at_all() {
        let headers = HeaderMap::new();
        let (_, access, refresh) = split_channels(&headers);
        assert_eq!(access, None);
        assert_eq!(refresh, None);
    }
}
