mod article;
mod comment;
mod user;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use article::{Article, ArticleStore, DateOrder};
pub use comment::{Comment, CommentStore};
pub use user::{User, UserStore};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", path)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                // Users table
                "CREATE TABLE users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    email TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    name TEXT NOT NULL,
                    password_hash TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_users_email ON users(email)",
                // Articles table
                "CREATE TABLE articles (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    title TEXT NOT NULL,
                    text TEXT NOT NULL,
                    category TEXT NOT NULL DEFAULT 'general',
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_articles_user_id ON articles(user_id)",
                "CREATE INDEX idx_articles_category ON articles(category)",
                "CREATE INDEX idx_articles_created_at ON articles(created_at)",
                // Comments table
                "CREATE TABLE comments (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    article_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
                    author_name TEXT NOT NULL,
                    text TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_comments_article_id ON comments(article_id)",
                "CREATE INDEX idx_comments_created_at ON comments(created_at)",
            ],
        )
        .await
    }

    /// Get the user store.
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    /// Get the article store.
    pub fn articles(&self) -> ArticleStore {
        ArticleStore::new(self.pool.clone())
    }

    /// Get the comment store.
    pub fn comments(&self) -> CommentStore {
        CommentStore::new(self.pool.clone())
    }

    /// Get the underlying connection pool (for tests that need raw SQL access).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = Database::open(":memory:").await.unwrap();

        let id = db
            .users()
            .create("alice@example.com", "Alice", "hash")
            .await
            .unwrap();

        let user = db
            .users()
            .get_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.name, "Alice");

        let user = db.users().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.id, id);
    }

    #[tokio::test]
    async fn test_duplicate_email_fails() {
        let db = Database::open(":memory:").await.unwrap();

        db.users()
            .create("alice@example.com", "Alice", "hash")
            .await
            .unwrap();
        let result = db.users().create("ALICE@example.com", "Other", "hash").await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_delete_user() {
        let db = Database::open(":memory:").await.unwrap();

        let id = db
            .users()
            .create("alice@example.com", "Alice", "hash")
            .await
            .unwrap();
        db.users().delete(id).await.unwrap();

        assert!(db.users().get_by_id(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_article_crud() {
        let db = Database::open(":memory:").await.unwrap();
        let user_id = db
            .users()
            .create("alice@example.com", "Alice", "hash")
            .await
            .unwrap();

        let id = db
            .articles()
            .create(user_id, "First", "Body", "science")
            .await
            .unwrap();

        let article = db.articles().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(article.title, "First");
        assert_eq!(article.category, "science");
        assert_eq!(article.user_id, user_id);

        db.articles()
            .update(id, "Updated", "Body 2", "culture")
            .await
            .unwrap();
        let article = db.articles().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(article.title, "Updated");
        assert_eq!(article.category, "culture");

        assert!(db.articles().delete(id).await.unwrap());
        assert!(db.articles().get_by_id(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_articles_by_category() {
        let db = Database::open(":memory:").await.unwrap();
        let user_id = db
            .users()
            .create("alice@example.com", "Alice", "hash")
            .await
            .unwrap();

        db.articles()
            .create(user_id, "A", "x", "science")
            .await
            .unwrap();
        db.articles()
            .create(user_id, "B", "x", "culture")
            .await
            .unwrap();
        db.articles()
            .create(user_id, "C", "x", "science")
            .await
            .unwrap();

        let science = db.articles().list_by_category("science").await.unwrap();
        assert_eq!(science.len(), 2);

        let categories = db.articles().categories().await.unwrap();
        assert_eq!(categories.len(), 2);
    }

    #[tokio::test]
    async fn test_comment_crud_and_cascade() {
        let db = Database::open(":memory:").await.unwrap();
        let user_id = db
            .users()
            .create("alice@example.com", "Alice", "hash")
            .await
            .unwrap();
        let article_id = db
            .articles()
            .create(user_id, "A", "x", "general")
            .await
            .unwrap();

        let comment_id = db
            .comments()
            .create(article_id, "alice@example.com", "hello")
            .await
            .unwrap();

        let comment = db.comments().get_by_id(comment_id).await.unwrap().unwrap();
        assert_eq!(comment.text, "hello");
        assert_eq!(comment.author_name, "alice@example.com");

        let for_article = db.comments().list_for_article(article_id).await.unwrap();
        assert_eq!(for_article.len(), 1);

        // Deleting the article takes its comments with it
        db.articles().delete_with_comments(article_id).await.unwrap();
        assert!(db.comments().get_by_id(comment_id).await.unwrap().is_none());
    }
}
