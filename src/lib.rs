pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod pages;
pub mod password;
pub mod rate_limit;

use api::create_api_router;
use auth::{AuthState, ProtectedRoutes, authorize, propagate_rotated_tokens};
use axum::{Router, http::Method, middleware};
use db::Database;
use jwt::{JwtCodec, TokenLifetimes};
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing tokens
    pub jwt_secret: Vec<u8>,
    /// Access/refresh token lifetimes and the refresh renewal window
    pub lifetimes: TokenLifetimes,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Whether new user signups are disabled
    pub no_signup: bool,
    /// Routes that require authentication
    pub protected_routes: ProtectedRoutes,
}

/// The routes that require authentication, with the rejection flavor each
/// surface expects. Injected via `ServerConfig`; this is the default set
/// matching the routers built in [`create_app`].
pub fn default_protected_routes() -> ProtectedRoutes {
    ProtectedRoutes::new()
        .protect_api(Method::GET, "/api/auth/me")
        .protect_api(Method::POST, "/api/articles")
        .protect_api(Method::PUT, "/api/articles/{id}")
        .protect_api(Method::DELETE, "/api/articles/{id}")
        .protect_api(Method::POST, "/api/comments")
        .protect_api(Method::PUT, "/api/comments/{id}")
        .protect_api(Method::DELETE, "/api/comments/{id}")
        .protect_page(Method::GET, "/account")
}

/// Create the application router with the given configuration.
///
/// The authorizer runs before every protected handler and the propagator
/// after it; the pair is composed explicitly here rather than registered
/// as ambient hooks.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtCodec::with_lifetimes(
        &config.jwt_secret,
        config.lifetimes,
    ));
    let rate_limits = Arc::new(RateLimitConfig::new());

    let api_router = create_api_router(
        config.db.clone(),
        jwt.clone(),
        config.secure_cookies,
        config.no_signup,
        rate_limits,
    );

    let pages_router = pages::router(pages::PagesState {
        db: config.db.clone(),
        jwt: jwt.clone(),
        secure_cookies: config.secure_cookies,
        no_signup: config.no_signup,
    });

    let auth_state = AuthState {
        jwt,
        db: config.db.clone(),
        secure_cookies: config.secure_cookies,
        protected: Arc::new(config.protected_routes.clone()),
        login_path: pages::LOGIN_PATH.to_string(),
    };

    Router::new()
        .nest("/api", api_router)
        .merge(pages_router)
        .layer(middleware::from_fn_with_state(auth_state.clone(), authorize))
        .layer(middleware::from_fn_with_state(
            auth_state,
            propagate_rotated_tokens,
        ))
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to
/// let the OS choose a random port. Returns the actual address the server
/// is listening on. For production use, prefer `run_server` in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> (tokio::task::JoinHandle<()>, SocketAddr) {
    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await.expect("Failed to bind");
    let local_addr = listener.local_addr().expect("Failed to get local address");

    let handle = tokio::spawn(async move {
        run_server(config, listener).await.ok();
    });

    (handle, local_addr)
}
