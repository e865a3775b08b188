//! Authentication API endpoints.
//!
//! - POST `/register` - Create an account and receive a token pair
//! - POST `/login` - Exchange credentials for a token pair
//! - POST `/refresh` - Exchange a refresh token for new tokens
//! - POST `/logout` - Clear auth cookies
//! - GET `/me` - Current principal (protected)

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    middleware,
    response::{AppendHeaders, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ResultExt};
use crate::auth::{
    ACCESS_COOKIE_NAME, ApiAuthError, AuthErrorKind, CredentialChannel, CurrentUser,
    REFRESH_COOKIE_NAME, REFRESH_TOKEN_HEADER, build_cookie, clear_cookie, get_cookie, rotate,
};
use crate::db::Database;
use crate::jwt::{JwtCodec, unix_now};
use crate::password;
use crate::rate_limit::{RateLimitConfig, rate_limit_login, rate_limit_register};

#[derive(Clone)]
pub struct AuthApiState {
    pub db: Database,
    pub jwt: Arc<JwtCodec>,
    pub secure_cookies: bool,
    pub no_signup: bool,
    pub rate_limits: Arc<RateLimitConfig>,
}

pub fn router(state: AuthApiState) -> Router {
    let login_routes = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limits.clone(),
            rate_limit_login,
        ));

    let mut router = Router::new()
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .with_state(state.clone())
        .merge(login_routes);

    if !state.no_signup {
        let register_routes = Router::new()
            .route("/register", post(register))
            .with_state(state.clone())
            .layer(middleware::from_fn_with_state(
                state.rate_limits.clone(),
                rate_limit_register,
            ));
        router = router.merge(register_routes);
    }

    router
}

// --- Request/Response types ---

#[derive(Deserialize)]
struct RegisterRequest {
    name: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct UserResponse {
    id: i64,
    email: String,
    name: String,
}

#[derive(Serialize)]
struct TokenPairResponse {
    access_token: String,
    refresh_token: String,
    token_type: &'static str,
    expires_in: u64,
}

#[derive(Serialize)]
struct RegisterResponse {
    user: UserResponse,
    access_token: String,
    refresh_token: String,
    token_type: &'static str,
    expires_in: u64,
}

/// Validate registration input the way the form flow does.
fn validate_registration(name: &str, email: &str, password: &str) -> Vec<String> {
    let mut errors = Vec::new();

    if name.is_empty() || email.is_empty() || password.is_empty() {
        errors.push("All fields are required".to_string());
    }
    if !email.is_empty() && (!email.contains('@') || email.len() > 100) {
        errors.push("Enter a valid email address".to_string());
    }
    if name.len() > 100 {
        errors.push("Name cannot be longer than 100 characters".to_string());
    }

    errors
}

async fn register(
    State(state): State<AuthApiState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = payload.name.trim();
    let email = payload.email.trim();

    let errors = validate_registration(name, email, &payload.password);
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let taken = state
        .db
        .users()
        .email_taken(email)
        .await
        .db_err("Failed to check email availability")?;
    if taken {
        return Err(ApiError::conflict("Email is already registered"));
    }

    let password_hash = password::hash_password(&payload.password).map_err(|e| {
        tracing::error!(error = %e, "Failed to hash password");
        ApiError::internal("Failed to create account")
    })?;

    let id = state
        .db
        .users()
        .create(email, name, &password_hash)
        .await
        .db_err("Failed to create user")?;

    let now = unix_now();
    let pair = state.jwt.mint_pair(id, email, now).map_err(|e| {
        tracing::error!(error = %e, "Failed to mint token pair");
        ApiError::internal("Failed to issue tokens")
    })?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: UserResponse {
                id,
                email: email.to_string(),
                name: name.to_string(),
            },
            access_token: pair.access,
            refresh_token: pair.refresh,
            token_type: "Bearer",
            expires_in: state.jwt.lifetimes().access_secs,
        }),
    ))
}

async fn login(
    State(state): State<AuthApiState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .get_by_email(payload.email.trim())
        .await
        .db_err("Failed to get user")?;

    // Same rejection whether the email or the password was wrong
    let user = user.ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;
    let valid = password::verify_password(&payload.password, &user.password_hash).map_err(|e| {
        tracing::error!(error = %e, "Failed to verify password");
        ApiError::internal("Failed to verify credentials")
    })?;
    if !valid {
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    // A fresh pair on every login; earlier tokens stay valid until expiry
    let now = unix_now();
    let pair = state.jwt.mint_pair(user.id, &user.email, now).map_err(|e| {
        tracing::error!(error = %e, "Failed to mint token pair");
        ApiError::internal("Failed to issue tokens")
    })?;

    Ok(Json(TokenPairResponse {
        access_token: pair.access,
        refresh_token: pair.refresh,
        token_type: "Bearer",
        expires_in: state.jwt.lifetimes().access_secs,
    }))
}

#[derive(Serialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    token_type: &'static str,
    expires_in: u64,
}

/// Explicit rotation endpoint. Accepts the refresh token from the
/// `X-Refresh-Token` header or the refresh cookie and answers on the same
/// channel family.
async fn refresh(State(state): State<AuthApiState>, headers: HeaderMap) -> Response {
    let now = unix_now();

    let (channel, token) = match headers.get(REFRESH_TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        Some(token) => (CredentialChannel::Header, Some(token)),
        None => (
            CredentialChannel::Cookie,
            get_cookie(&headers, REFRESH_COOKIE_NAME),
        ),
    };
    let Some(token) = token else {
        return ApiAuthError(AuthErrorKind::NoCredential).into_response();
    };

    let outcome = match rotate(&state.jwt, &state.db.users(), token, now).await {
        Ok(outcome) => outcome,
        Err(kind) => return ApiAuthError(kind).into_response(),
    };

    let lifetimes = *state.jwt.lifetimes();
    let body = Json(RefreshResponse {
        access_token: outcome.access.clone(),
        refresh_token: outcome.refresh.clone(),
        token_type: "Bearer",
        expires_in: lifetimes.access_secs,
    });

    match channel {
        CredentialChannel::Header => body.into_response(),
        CredentialChannel::Cookie => {
            let mut cookies = vec![build_cookie(
                ACCESS_COOKIE_NAME,
                &outcome.access,
                lifetimes.access_secs,
                state.secure_cookies,
            )];
            if let Some(refresh) = &outcome.refresh {
                cookies.push(build_cookie(
                    REFRESH_COOKIE_NAME,
                    refresh,
                    lifetimes.refresh_secs,
                    state.secure_cookies,
                ));
            }
            let headers: Vec<_> = cookies.into_iter().map(|c| (SET_COOKIE, c)).collect();
            (AppendHeaders(headers), body).into_response()
        }
    }
}

/// Logout clears both auth cookies. Tokens are stateless, so previously
/// issued ones simply age out.
async fn logout(State(state): State<AuthApiState>) -> impl IntoResponse {
    let clear_access = clear_cookie(ACCESS_COOKIE_NAME, state.secure_cookies);
    let clear_refresh = clear_cookie(REFRESH_COOKIE_NAME, state.secure_cookies);

    (
        StatusCode::OK,
        AppendHeaders([(SET_COOKIE, clear_access), (SET_COOKIE, clear_refresh)]),
        Json(serde_json::json!({ "success": true })),
    )
}

/// Current principal, resolved by the authorizer middleware.
async fn me(
    State(state): State<AuthApiState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let account = state
        .db
        .users()
        .get_by_id(user.id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(UserResponse {
        id: account.id,
        email: account.email,
        name: account.name,
    }))
}
