#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use inkpress::{
    ServerConfig, create_app,
    db::Database,
    default_protected_routes,
    jwt::{JwtCodec, TokenLifetimes},
};
use tower::ServiceExt;

pub const TEST_SECRET: &[u8] = b"test-jwt-secret-0123456789abcdef";

/// Create a test app and return (app, db, jwt codec).
pub async fn create_test_app() -> (Router, Database, JwtCodec) {
    create_test_app_with(TokenLifetimes::default(), false).await
}

pub async fn create_test_app_with(
    lifetimes: TokenLifetimes,
    no_signup: bool,
) -> (Router, Database, JwtCodec) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let jwt = JwtCodec::with_lifetimes(TEST_SECRET, lifetimes);
    let config = ServerConfig {
        db: db.clone(),
        jwt_secret: TEST_SECRET.to_vec(),
        lifetimes,
        secure_cookies: false,
        no_signup,
        protected_routes: default_protected_routes(),
    };
    (create_app(&config), db, jwt)
}

/// Build a JSON request.
pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

/// Build a JSON request with a bearer access token.
pub fn bearer_request(
    method: &str,
    uri: &str,
    token: &str,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token));
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("Failed to build request")
}

/// Read a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body was not valid JSON")
}

/// Read a response body as a string.
pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body was not UTF-8")
}

/// Register a user through the API.
/// Returns (user id, access token, refresh token).
pub async fn register_user(
    app: &Router,
    name: &str,
    email: &str,
    password: &str,
) -> (i64, String, String) {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            serde_json::json!({ "name": name, "email": email, "password": password }),
        ))
        .await
        .expect("Request failed");
    assert_eq!(
        response.status(),
        axum::http::StatusCode::CREATED,
        "registration should succeed"
    );

    let body = body_json(response).await;
    (
        body["user"]["id"].as_i64().expect("user id"),
        body["access_token"].as_str().expect("access token").to_string(),
        body["refresh_token"]
            .as_str()
            .expect("refresh token")
            .to_string(),
    )
}

pub fn auth_cookies(access_token: &str, refresh_token: &str) -> String {
    format!(
        "access_token={}; refresh_token={}",
        access_token, refresh_token
    )
}

pub fn refresh_cookie_only(refresh_token: &str) -> String {
    format!("refresh_token={}", refresh_token)
}
