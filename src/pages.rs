//! Server-rendered pages.
//!
//! The browser surface of the blog: index, login/register forms, and the
//! account page. Rendering is deliberately plain inline HTML; the point of
//! these routes is the cookie credential channel. Login and registration
//! set the `access_token`/`refresh_token` cookie pair with issuance
//! lifetimes and redirect; protected pages redirect anonymous visitors to
//! the login form.

use axum::{
    Form, Router,
    extract::State,
    http::{StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, Html, IntoResponse, Redirect, Response},
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::{
    ACCESS_COOKIE_NAME, CurrentUser, REFRESH_COOKIE_NAME, build_cookie, clear_cookie,
};
use crate::db::Database;
use crate::jwt::{JwtCodec, TokenPair, unix_now};
use crate::password;

/// Path of the login entry point; rejected protected-page requests land here.
pub const LOGIN_PATH: &str = "/login";

#[derive(Clone)]
pub struct PagesState {
    pub db: Database,
    pub jwt: Arc<JwtCodec>,
    pub secure_cookies: bool,
    pub no_signup: bool,
}

pub fn router(state: PagesState) -> Router {
    let mut router = Router::new()
        .route("/", get(index))
        .route("/login", get(login_form).post(login_submit))
        .route("/logout", get(logout))
        .route("/account", get(account));

    if !state.no_signup {
        router = router.route("/register", get(register_form).post(register_submit));
    }

    router.with_state(state)
}

// --- Rendering helpers ---

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{}</title></head>\
         <body><nav><a href=\"/\">Inkpress</a> | <a href=\"/account\">Account</a> | \
         <a href=\"/login\">Log in</a></nav><main>{}</main></body></html>",
        html_escape(title),
        body
    ))
}

fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn internal_error(context: &str, e: impl std::fmt::Display) -> Response {
    tracing::error!("{}: {}", context, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        page("Error", "<p>Something went wrong.</p>"),
    )
        .into_response()
}

/// Set-Cookie headers for a freshly minted token pair.
fn pair_cookies(state: &PagesState, pair: &TokenPair) -> [(axum::http::HeaderName, String); 2] {
    let lifetimes = state.jwt.lifetimes();
    [
        (
            SET_COOKIE,
            build_cookie(
                ACCESS_COOKIE_NAME,
                &pair.access,
                lifetimes.access_secs,
                state.secure_cookies,
            ),
        ),
        (
            SET_COOKIE,
            build_cookie(
                REFRESH_COOKIE_NAME,
                &pair.refresh,
                lifetimes.refresh_secs,
                state.secure_cookies,
            ),
        ),
    ]
}

const LOGIN_FORM: &str = "<form method=\"post\" action=\"/login\">\
    <label>Email <input type=\"email\" name=\"email\" required></label>\
    <label>Password <input type=\"password\" name=\"password\" required></label>\
    <button type=\"submit\">Log in</button></form>\
    <p><a href=\"/register\">Register</a></p>";

const REGISTER_FORM: &str = "<form method=\"post\" action=\"/register\">\
    <label>Name <input type=\"text\" name=\"name\" required></label>\
    <label>Email <input type=\"email\" name=\"email\" required></label>\
    <label>Password <input type=\"password\" name=\"password\" required></label>\
    <label>Confirm password <input type=\"password\" name=\"confirm_password\" required></label>\
    <button type=\"submit\">Register</button></form>";

fn form_page(title: &str, form: &str, error: Option<&str>) -> Html<String> {
    let body = match error {
        Some(error) => format!("<p class=\"error\">{}</p>{}", html_escape(error), form),
        None => form.to_string(),
    };
    page(title, &body)
}

// --- Handlers ---

async fn index(State(state): State<PagesState>) -> Response {
    let articles = match state.db.articles().list_recent(6).await {
        Ok(articles) => articles,
        Err(e) => return internal_error("Failed to list articles", e),
    };

    let mut body = String::from("<h1>Latest articles</h1><ul>");
    for article in articles {
        body.push_str(&format!(
            "<li><strong>{}</strong> <em>{}</em><p>{}</p></li>",
            html_escape(&article.title),
            html_escape(&article.category),
            html_escape(&article.text),
        ));
    }
    body.push_str("</ul>");

    page("Inkpress", &body).into_response()
}

#[derive(Deserialize)]
struct LoginForm {
    email: String,
    password: String,
}

async fn login_form() -> Html<String> {
    form_page("Log in", LOGIN_FORM, None)
}

async fn login_submit(
    State(state): State<PagesState>,
    Form(form): Form<LoginForm>,
) -> Response {
    let user = match state.db.users().get_by_email(form.email.trim()).await {
        Ok(user) => user,
        Err(e) => return internal_error("Failed to get user", e),
    };

    let valid = match &user {
        Some(user) => match password::verify_password(&form.password, &user.password_hash) {
            Ok(valid) => valid,
            Err(e) => return internal_error("Failed to verify password", e),
        },
        None => false,
    };
    let Some(user) = user.filter(|_| valid) else {
        return form_page("Log in", LOGIN_FORM, Some("Invalid email or password"))
            .into_response();
    };

    let pair = match state.jwt.mint_pair(user.id, &user.email, unix_now()) {
        Ok(pair) => pair,
        Err(e) => return internal_error("Failed to mint token pair", e),
    };

    (AppendHeaders(pair_cookies(&state, &pair)), Redirect::to("/")).into_response()
}

#[derive(Deserialize)]
struct RegisterFormData {
    name: String,
    email: String,
    password: String,
    confirm_password: String,
}

async fn register_form() -> Html<String> {
    form_page("Register", REGISTER_FORM, None)
}

async fn register_submit(
    State(state): State<PagesState>,
    Form(form): Form<RegisterFormData>,
) -> Response {
    let name = form.name.trim();
    let email = form.email.trim();

    if name.is_empty() || email.is_empty() || form.password.is_empty() {
        return form_page("Register", REGISTER_FORM, Some("All fields are required"))
            .into_response();
    }
    if form.password != form.confirm_password {
        return form_page("Register", REGISTER_FORM, Some("Passwords do not match"))
            .into_response();
    }

    match state.db.users().email_taken(email).await {
        Ok(true) => {
            return form_page(
                "Register",
                REGISTER_FORM,
                Some("A user with this email already exists"),
            )
            .into_response();
        }
        Ok(false) => {}
        Err(e) => return internal_error("Failed to check email availability", e),
    }

    let password_hash = match password::hash_password(&form.password) {
        Ok(hash) => hash,
        Err(e) => return internal_error("Failed to hash password", e),
    };

    let id = match state.db.users().create(email, name, &password_hash).await {
        Ok(id) => id,
        Err(e) => return internal_error("Failed to create user", e),
    };

    let pair = match state.jwt.mint_pair(id, email, unix_now()) {
        Ok(pair) => pair,
        Err(e) => return internal_error("Failed to mint token pair", e),
    };

    (AppendHeaders(pair_cookies(&state, &pair)), Redirect::to("/")).into_response()
}

async fn logout(State(state): State<PagesState>) -> impl IntoResponse {
    let headers = AppendHeaders([
        (SET_COOKIE, clear_cookie(ACCESS_COOKIE_NAME, state.secure_cookies)),
        (SET_COOKIE, clear_cookie(REFRESH_COOKIE_NAME, state.secure_cookies)),
    ]);
    (headers, Redirect::to("/"))
}

/// Protected account page; anonymous visitors are redirected to `/login`
/// by the authorizer.
async fn account(State(state): State<PagesState>, user: CurrentUser) -> Response {
    let account = match state.db.users().get_by_id(user.id).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, page("Account", "<p>User not found.</p>"))
                .into_response();
        }
        Err(e) => return internal_error("Failed to get user", e),
    };

    let body = format!(
        "<h1>Account</h1><p>Name: {}</p><p>Email: {}</p>\
         <p><a href=\"/logout\">Log out</a></p>",
        html_escape(&account.name),
        html_escape(&account.email),
    );
    page("Account", &body).into_response()
}
