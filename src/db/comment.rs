//! Comment storage.
//!
//! Comments are keyed to their author by email, not user id; the email is
//! also what endpoints display and check ownership against.

use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct CommentStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub id: i64,
    pub article_id: i64,
    pub author_name: String,
    pub text: String,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: i64,
    article_id: i64,
    author_name: String,
    text: String,
    created_at: String,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            article_id: row.article_id,
            author_name: row.author_name,
            text: row.text,
            created_at: row.created_at,
        }
    }
}

const SELECT: &str = "SELECT id, article_id, author_name, text, created_at FROM comments";

impl CommentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a comment. Returns the comment id.
    pub async fn create(
        &self,
        article_id: i64,
        author_name: &str,
        text: &str,
    ) -> Result<i64, sqlx::Error> {
        let result =
            sqlx::query("INSERT INTO comments (article_id, author_name, text) VALUES (?, ?, ?)")
                .bind(article_id)
                .bind(author_name)
                .bind(text)
                .execute(&self.pool)
                .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Comment>, sqlx::Error> {
        let row: Option<CommentRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Comment::from))
    }

    /// List all comments, newest first.
    pub async fn list(&self) -> Result<Vec<Comment>, sqlx::Error> {
        let rows: Vec<CommentRow> =
            sqlx::query_as(&format!("{} ORDER BY created_at DESC, id DESC", SELECT))
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }

    /// List comments for one article, newest first.
    pub async fn list_for_article(&self, article_id: i64) -> Result<Vec<Comment>, sqlx::Error> {
        let rows: Vec<CommentRow> = sqlx::query_as(&format!(
            "{} WHERE article_id = ? ORDER BY created_at DESC, id DESC",
            SELECT
        ))
        .bind(article_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }

    pub async fn update_text(&self, id: i64, text: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE comments SET text = ? WHERE id = ?")
            .bind(text)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
