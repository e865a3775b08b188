//! Articles API.
//!
//! Listing and reading are public; create/update/delete require
//! authentication and are restricted to the article's author.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde::{Deserialize, Serialize};

use super::error::{ApiError, ResultExt};
use crate::auth::CurrentUser;
use crate::db::{Article, Database, DateOrder};

#[derive(Clone)]
pub struct ArticlesState {
    pub db: Database,
}

pub fn router(state: ArticlesState) -> Router {
    Router::new()
        .route("/", get(list_articles))
        .route("/", post(create_article))
        .route("/{id}", get(get_article))
        .route("/{id}", put(update_article))
        .route("/{id}", delete(delete_article))
        .route("/category/{category}", get(list_by_category))
        .route("/sort/date", get(sort_by_date))
        .with_state(state)
}

// --- Request/Response types ---

#[derive(Deserialize)]
struct ArticleRequest {
    title: String,
    text: String,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Serialize)]
struct ArticleResponse {
    id: i64,
    title: String,
    text: String,
    category: String,
    author_id: i64,
    created_at: String,
}

impl From<Article> for ArticleResponse {
    fn from(article: Article) -> Self {
        Self {
            id: article.id,
            title: article.title,
            text: article.text,
            category: article.category,
            author_id: article.user_id,
            created_at: article.created_at,
        }
    }
}

#[derive(Serialize)]
struct ListArticlesResponse {
    count: usize,
    articles: Vec<ArticleResponse>,
}

fn list_response(articles: Vec<Article>) -> ListArticlesResponse {
    let articles: Vec<ArticleResponse> = articles.into_iter().map(ArticleResponse::from).collect();
    ListArticlesResponse {
        count: articles.len(),
        articles,
    }
}

fn validate_article(title: &str, text: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if title.trim().is_empty() {
        errors.push("Title cannot be empty".to_string());
    }
    if text.trim().is_empty() {
        errors.push("Article text cannot be empty".to_string());
    }
    errors
}

// --- Handlers ---

async fn list_articles(State(state): State<ArticlesState>) -> Result<impl IntoResponse, ApiError> {
    let articles = state
        .db
        .articles()
        .list()
        .await
        .db_err("Failed to list articles")?;
    Ok(Json(list_response(articles)))
}

async fn get_article(
    State(state): State<ArticlesState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let article = state
        .db
        .articles()
        .get_by_id(id)
        .await
        .db_err("Failed to get article")?
        .ok_or_else(|| ApiError::not_found("Article not found"))?;
    Ok(Json(ArticleResponse::from(article)))
}

async fn create_article(
    State(state): State<ArticlesState>,
    user: CurrentUser,
    Json(payload): Json<ArticleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let errors = validate_article(&payload.title, &payload.text);
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let category = payload.category.as_deref().unwrap_or("general").trim();
    let id = state
        .db
        .articles()
        .create(
            user.id,
            payload.title.trim(),
            payload.text.trim(),
            if category.is_empty() { "general" } else { category },
        )
        .await
        .db_err("Failed to create article")?;

    let article = state
        .db
        .articles()
        .get_by_id(id)
        .await
        .db_err("Failed to get article")?
        .ok_or_else(|| ApiError::internal("Article vanished after insert"))?;

    Ok((StatusCode::CREATED, Json(ArticleResponse::from(article))))
}

async fn update_article(
    State(state): State<ArticlesState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<ArticleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let article = state
        .db
        .articles()
        .get_by_id(id)
        .await
        .db_err("Failed to get article")?
        .ok_or_else(|| ApiError::not_found("Article not found"))?;

    if article.user_id != user.id {
        return Err(ApiError::forbidden("You cannot edit another user's article"));
    }

    let errors = validate_article(&payload.title, &payload.text);
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let category = payload.category.as_deref().unwrap_or(&article.category).trim();
    state
        .db
        .articles()
        .update(id, payload.title.trim(), payload.text.trim(), category)
        .await
        .db_err("Failed to update article")?;

    let article = state
        .db
        .articles()
        .get_by_id(id)
        .await
        .db_err("Failed to get article")?
        .ok_or_else(|| ApiError::not_found("Article not found"))?;

    Ok(Json(ArticleResponse::from(article)))
}

async fn delete_article(
    State(state): State<ArticlesState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let article = state
        .db
        .articles()
        .get_by_id(id)
        .await
        .db_err("Failed to get article")?
        .ok_or_else(|| ApiError::not_found("Article not found"))?;

    if article.user_id != user.id {
        return Err(ApiError::forbidden(
            "You cannot delete another user's article",
        ));
    }

    state
        .db
        .articles()
        .delete_with_comments(id)
        .await
        .db_err("Failed to delete article")?;

    Ok(Json(serde_json::json!({ "success": true })))
}

async fn list_by_category(
    State(state): State<ArticlesState>,
    Path(category): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let articles = state
        .db
        .articles()
        .list_by_category(&category)
        .await
        .db_err("Failed to list articles")?;
    Ok(Json(list_response(articles)))
}

#[derive(Deserialize)]
struct SortQuery {
    #[serde(default)]
    order: Option<String>,
}

async fn sort_by_date(
    State(state): State<ArticlesState>,
    Query(query): Query<SortQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let order = match query.order.as_deref() {
        Some("asc") => DateOrder::Asc,
        _ => DateOrder::Desc,
    };
    let articles = state
        .db
        .articles()
        .list_by_date(order)
        .await
        .db_err("Failed to list articles")?;
    Ok(Json(list_response(articles)))
}
