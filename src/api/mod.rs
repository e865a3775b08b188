mod articles;
mod auth;
mod comments;
mod error;

use axum::Router;
use std::sync::Arc;

use crate::db::Database;
use crate::jwt::JwtCodec;
use crate::rate_limit::RateLimitConfig;

/// Create the API router. Authorization layers are applied by the caller
/// so the authorizer/propagator pair wraps the whole API surface.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtCodec>,
    secure_cookies: bool,
    no_signup: bool,
    rate_limits: Arc<RateLimitConfig>,
) -> Router {
    let auth_state = auth::AuthApiState {
        db: db.clone(),
        jwt,
        secure_cookies,
        no_signup,
        rate_limits,
    };

    let articles_state = articles::ArticlesState { db: db.clone() };
    let comments_state = comments::CommentsState { db };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/articles", articles::router(articles_state))
        .nest("/comments", comments::router(comments_state))
}
