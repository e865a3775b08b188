//! Article storage.

use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct ArticleStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct Article {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub text: String,
    pub category: String,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct ArticleRow {
    id: i64,
    user_id: i64,
    title: String,
    text: String,
    category: String,
    created_at: String,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            text: row.text,
            category: row.category,
            created_at: row.created_at,
        }
    }
}

/// Sort direction for date-ordered listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOrder {
    Asc,
    Desc,
}

const SELECT: &str = "SELECT id, user_id, title, text, category, created_at FROM articles";

impl ArticleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an article. Returns the article id.
    pub async fn create(
        &self,
        user_id: i64,
        title: &str,
        text: &str,
        category: &str,
    ) -> Result<i64, sqlx::Error> {
        let result =
            sqlx::query("INSERT INTO articles (user_id, title, text, category) VALUES (?, ?, ?, ?)")
                .bind(user_id)
                .bind(title)
                .bind(text)
                .bind(category)
                .execute(&self.pool)
                .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Article>, sqlx::Error> {
        let row: Option<ArticleRow> =
            sqlx::query_as(&format!("{} WHERE id = ?", SELECT))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Article::from))
    }

    /// List all articles, newest first.
    pub async fn list(&self) -> Result<Vec<Article>, sqlx::Error> {
        self.list_by_date(DateOrder::Desc).await
    }

    /// List the newest articles up to `limit`.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<Article>, sqlx::Error> {
        let rows: Vec<ArticleRow> =
            sqlx::query_as(&format!("{} ORDER BY created_at DESC, id DESC LIMIT ?", SELECT))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Article::from).collect())
    }

    /// List all articles ordered by creation date.
    pub async fn list_by_date(&self, order: DateOrder) -> Result<Vec<Article>, sqlx::Error> {
        let query = match order {
            DateOrder::Asc => format!("{} ORDER BY created_at ASC, id ASC", SELECT),
            DateOrder::Desc => format!("{} ORDER BY created_at DESC, id DESC", SELECT),
        };
        let rows: Vec<ArticleRow> = sqlx::query_as(&query).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Article::from).collect())
    }

    /// List articles in a category, newest first.
    pub async fn list_by_category(&self, category: &str) -> Result<Vec<Article>, sqlx::Error> {
        let rows: Vec<ArticleRow> = sqlx::query_as(&format!(
            "{} WHERE category = ? ORDER BY created_at DESC, id DESC",
            SELECT
        ))
        .bind(category)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Article::from).collect())
    }

    /// Distinct categories currently in use.
    pub async fn categories(&self) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT category FROM articles ORDER BY category")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    pub async fn update(
        &self,
        id: i64,
        title: &str,
        text: &str,
        category: &str,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE articles SET title = ?, text = ?, category = ? WHERE id = ?")
                .bind(title)
                .bind(text)
                .bind(category)
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete an article and its comments in one transaction.
    pub async fn delete_with_comments(&self, id: i64) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM comments WHERE article_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}
