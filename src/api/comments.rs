//! Comments API.
//!
//! Comments are owned by author email: editing and deletion compare the
//! stored author against the authenticated principal's email.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde::{Deserialize, Serialize};

use super::error::{ApiError, ResultExt};
use crate::auth::CurrentUser;
use crate::db::{Comment, Database};

#[derive(Clone)]
pub struct CommentsState {
    pub db: Database,
}

pub fn router(state: CommentsState) -> Router {
    Router::new()
        .route("/", get(list_comments))
        .route("/", post(create_comment))
        .route("/{id}", get(get_comment))
        .route("/{id}", put(update_comment))
        .route("/{id}", delete(delete_comment))
        .with_state(state)
}

// --- Request/Response types ---

#[derive(Deserialize)]
struct CreateCommentRequest {
    text: String,
    article_id: i64,
}

#[derive(Deserialize)]
struct UpdateCommentRequest {
    text: String,
}

#[derive(Serialize)]
struct CommentResponse {
    id: i64,
    article_id: i64,
    author_name: String,
    text: String,
    created_at: String,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            article_id: comment.article_id,
            author_name: comment.author_name,
            text: comment.text,
            created_at: comment.created_at,
        }
    }
}

#[derive(Serialize)]
struct ListCommentsResponse {
    count: usize,
    comments: Vec<CommentResponse>,
}

// --- Handlers ---

async fn list_comments(State(state): State<CommentsState>) -> Result<impl IntoResponse, ApiError> {
    let comments = state
        .db
        .comments()
        .list()
        .await
        .db_err("Failed to list comments")?;
    let comments: Vec<CommentResponse> = comments.into_iter().map(CommentResponse::from).collect();
    Ok(Json(ListCommentsResponse {
        count: comments.len(),
        comments,
    }))
}

async fn get_comment(
    State(state): State<CommentsState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let comment = state
        .db
        .comments()
        .get_by_id(id)
        .await
        .db_err("Failed to get comment")?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;
    Ok(Json(CommentResponse::from(comment)))
}

async fn create_comment(
    State(state): State<CommentsState>,
    user: CurrentUser,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut errors = Vec::new();
    if payload.text.trim().is_empty() {
        errors.push("Comment cannot be empty".to_string());
    }

    let article = state
        .db
        .articles()
        .get_by_id(payload.article_id)
        .await
        .db_err("Failed to get article")?;
    if article.is_none() {
        errors.push("No article with the given id".to_string());
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let id = state
        .db
        .comments()
        .create(payload.article_id, &user.email, payload.text.trim())
        .await
        .db_err("Failed to create comment")?;

    let comment = state
        .db
        .comments()
        .get_by_id(id)
        .await
        .db_err("Failed to get comment")?
        .ok_or_else(|| ApiError::internal("Comment vanished after insert"))?;

    Ok((StatusCode::CREATED, Json(CommentResponse::from(comment))))
}

async fn update_comment(
    State(state): State<CommentsState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let comment = state
        .db
        .comments()
        .get_by_id(id)
        .await
        .db_err("Failed to get comment")?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;

    if comment.author_name != user.email {
        return Err(ApiError::forbidden(
            "You cannot edit another user's comment",
        ));
    }

    if payload.text.trim().is_empty() {
        return Err(ApiError::validation(vec![
            "Comment cannot be empty".to_string(),
        ]));
    }

    state
        .db
        .comments()
        .update_text(id, payload.text.trim())
        .await
        .db_err("Failed to update comment")?;

    let comment = state
        .db
        .comments()
        .get_by_id(id)
        .await
        .db_err("Failed to get comment")?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;

    Ok(Json(CommentResponse::from(comment)))
}

async fn delete_comment(
    State(state): State<CommentsState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let comment = state
        .db
        .comments()
        .get_by_id(id)
        .await
        .db_err("Failed to get comment")?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;

    if comment.author_name != user.email {
        return Err(ApiError::forbidden(
            "You cannot delete another user's comment",
        ));
    }

    state
        .db
        .comments()
        .delete(id)
        .await
        .db_err("Failed to delete comment")?;

    Ok(Json(serde_json::json!({ "success": true })))
}
