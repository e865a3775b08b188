//! Tests for registration, login, and the credential state machine.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header::SET_COOKIE},
};
use common::*;
use inkpress::jwt::TokenKind;
use tower::ServiceExt;

#[tokio::test]
async fn test_register_returns_token_pair() {
    let (app, _db, jwt) = create_test_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            serde_json::json!({
                "name": "Alice",
                "email": "alice@example.com",
                "password": "s3cret-pass"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert_eq!(body["user"]["name"], "Alice");
    assert_eq!(body["token_type"], "Bearer");

    let now = inkpress::jwt::unix_now();
    let access = jwt
        .verify(body["access_token"].as_str().unwrap(), now)
        .unwrap();
    assert_eq!(access.kind, TokenKind::Access);
    assert_eq!(access.email, "alice@example.com");

    let refresh = jwt
        .verify(body["refresh_token"].as_str().unwrap(), now)
        .unwrap();
    assert_eq!(refresh.kind, TokenKind::Refresh);
    assert_eq!(refresh.sub, access.sub);
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let (app, _db, _jwt) = create_test_app().await;
    register_user(&app, "Alice", "alice@example.com", "s3cret-pass").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            serde_json::json!({
                "name": "Other",
                "email": "Alice@Example.com",
                "password": "another-pass"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_validation_errors() {
    let (app, _db, _jwt) = create_test_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            serde_json::json!({ "name": "", "email": "not-an-email", "password": "" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["errors"].as_array().unwrap().len() >= 2);
}

#[tokio::test]
async fn test_register_disabled_with_no_signup() {
    let (app, _db, _jwt) =
        create_test_app_with(inkpress::jwt::TokenLifetimes::default(), true).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            serde_json::json!({
                "name": "Alice",
                "email": "alice@example.com",
                "password": "s3cret-pass"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_login_returns_fresh_pair() {
    let (app, _db, _jwt) = create_test_app().await;
    register_user(&app, "Alice", "alice@example.com", "s3cret-pass").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({ "email": "alice@example.com", "password": "s3cret-pass" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["access_token"].as_str().is_some());
    assert!(body["refresh_token"].as_str().is_some());
    assert_eq!(body["expires_in"], 3600);
}

#[tokio::test]
async fn test_login_wrong_password_rejected() {
    let (app, _db, _jwt) = create_test_app().await;
    register_user(&app, "Alice", "alice@example.com", "s3cret-pass").await;

    for (email, password) in [
        ("alice@example.com", "wrong-pass"),
        ("nobody@example.com", "s3cret-pass"),
    ] {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/auth/login",
                serde_json::json!({ "email": email, "password": password }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_me_with_access_token() {
    let (app, _db, _jwt) = create_test_app().await;
    let (id, access, _refresh) =
        register_user(&app, "Alice", "alice@example.com", "s3cret-pass").await;

    let response = app
        .clone()
        .oneshot(bearer_request("GET", "/api/auth/me", &access, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], id);
    assert_eq!(body["email"], "alice@example.com");
    assert_eq!(body["name"], "Alice");
}

#[tokio::test]
async fn test_me_without_credential() {
    let (app, _db, _jwt) = create_test_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/auth/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "no_credential");
}

#[tokio::test]
async fn test_non_bearer_scheme_is_no_credential() {
    let (app, _db, _jwt) = create_test_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/auth/me")
                .header("authorization", "Basic dXNlcjpwYXNz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "no_credential");
}

#[tokio::test]
async fn test_malformed_token_is_not_conflated_with_expiry() {
    let (app, _db, _jwt) = create_test_app().await;

    let response = app
        .clone()
        .oneshot(bearer_request("GET", "/api/auth/me", "garbage.token", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "malformed_token");
}

#[tokio::test]
async fn test_refresh_token_in_access_slot_is_wrong_kind() {
    let (app, _db, _jwt) = create_test_app().await;
    let (_id, _access, refresh) =
        register_user(&app, "Alice", "alice@example.com", "s3cret-pass").await;

    let response = app
        .clone()
        .oneshot(bearer_request("GET", "/api/auth/me", &refresh, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "wrong_token_kind");
}

#[tokio::test]
async fn test_unauthenticated_write_has_no_side_effects() {
    let (app, db, _jwt) = create_test_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/articles",
            serde_json::json!({ "title": "Sneaky", "text": "Should never land" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    // The handler never ran
    let articles = db.articles().list().await.unwrap();
    assert!(articles.is_empty());
}

#[tokio::test]
async fn test_options_bypasses_authentication() {
    let (app, _db, _jwt) = create_test_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/articles")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_logout_clears_cookies() {
    let (app, _db, _jwt) = create_test_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookies: Vec<_> = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
    assert!(cookies.iter().any(|c| c.starts_with("access_token=;")));
    assert!(cookies.iter().any(|c| c.starts_with("refresh_token=;")));
}

#[tokio::test]
async fn test_login_rate_limit() {
    let (app, _db, _jwt) = create_test_app().await;
    register_user(&app, "Alice", "alice@example.com", "s3cret-pass").await;

    // 10 attempts per minute per IP; the 11th is throttled
    let mut last_status = StatusCode::OK;
    for _ in 0..11 {
        let mut request = json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({ "email": "alice@example.com", "password": "wrong" }),
        );
        request
            .headers_mut()
            .insert("x-forwarded-for", "203.0.113.9".parse().unwrap());
        let response = app.clone().oneshot(request).await.unwrap();
        last_status = response.status();
    }

    assert_eq!(last_status, StatusCode::TOO_MANY_REQUESTS);
}
