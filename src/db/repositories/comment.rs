//! Comment repository
//!
//! Comments form threads through `parent_id`. Editing a comment archives its
//! previous text in `comment_history` within the same transaction.

use crate::config::DatabaseDriver;
use crate::db::repositories::reaction::{count_columns, counts_from_mysql_row, counts_from_sqlite_row};
use crate::db::repositories::user::{author_from_mysql_row, author_from_sqlite_row, AUTHOR_COLUMNS};
use crate::db::DynDatabasePool;
use crate::models::{Comment, CommentHistory, CommentRecord, CreateCommentInput, ReactionTarget};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// Every comment on an article with its author and reaction counts,
    /// oldest first
    async fn list_by_article(&self, article_id: i64) -> Result<Vec<CommentRecord>>;

    /// Replace the content of `comment`, archiving the old text
    async fn update_content(&self, comment: &Comment, content: &str) -> Result<Comment>;

    /// Delete a comment, its replies and every reaction on them
    async fn delete(&self, id: i64) -> Result<()>;

    /// Previous versions of a comment, oldest first
    async fn history(&self, comment_id: i64) -> Result<Vec<CommentHistory>>;
}

pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

const COMMENT_COLUMNS: &str = "id, article_id, user_id, parent_id, content, created_at, updated_at";

/// Reactions on a comment and all of its descendants
const DELETE_THREAD_REACTIONS: &str = r#"
    WITH RECURSIVE thread(id) AS (
        SELECT id FROM comments WHERE id = ?
        UNION ALL
        SELECT c.id FROM comments c JOIN thread t ON c.parent_id = t.id
    )
    DELETE FROM reactions WHERE target_type = 'comment' AND target_id IN (SELECT id FROM thread)
"#;

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment> {
        let now = Utc::now();
        let sql = r#"
            INSERT INTO comments (article_id, user_id, parent_id, content, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
        "#;

        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(input.article_id)
                .bind(input.user_id)
                .bind(input.parent_id)
                .bind(&input.content)
                .bind(now)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create comment")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(input.article_id)
                .bind(input.user_id)
                .bind(input.parent_id)
                .bind(&input.content)
                .bind(now)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create comment")?
                .last_insert_id() as i64,
        };

        Ok(Comment {
            id,
            article_id: input.article_id,
            user_id: input.user_id,
            parent_id: input.parent_id,
            content: input.content.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        let sql = format!("SELECT {} FROM comments WHERE id = ?", COMMENT_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get comment")?;
                Ok(row.as_ref().map(row_to_comment_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get comment")?;
                Ok(row.as_ref().map(row_to_comment_mysql))
            }
        }
    }

    async fn list_by_article(&self, article_id: i64) -> Result<Vec<CommentRecord>> {
        let sql = format!(
            r#"
            SELECT c.id, c.article_id, c.user_id, c.parent_id, c.content, c.created_at, c.updated_at,
                   {}, {}
            FROM comments c
            JOIN users u ON u.id = c.user_id
            WHERE c.article_id = ?
            ORDER BY c.created_at, c.id
            "#,
            AUTHOR_COLUMNS,
            count_columns(ReactionTarget::Comment, "c.id")
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(article_id)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list comments")?;
                rows.iter().map(row_to_record_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .bind(article_id)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list comments")?;
                rows.iter().map(row_to_record_mysql).collect()
            }
        }
    }

    async fn update_content(&self, comment: &Comment, content: &str) -> Result<Comment> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_content_sqlite(self.pool.sqlite()?, comment, content).await,
            DatabaseDriver::Mysql => update_content_mysql(self.pool.mysql()?, comment, content).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut tx = self.pool.sqlite()?.begin().await?;
                sqlx::query(DELETE_THREAD_REACTIONS)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to delete comment reactions")?;
                sqlx::query("DELETE FROM comments WHERE id = ?")
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to delete comment")?;
                tx.commit().await?;
            }
            DatabaseDriver::Mysql => {
                let mut tx = self.pool.mysql()?.begin().await?;
                sqlx::query(DELETE_THREAD_REACTIONS)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to delete comment reactions")?;
                sqlx::query("DELETE FROM comments WHERE id = ?")
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to delete comment")?;
                tx.commit().await?;
            }
        }
        Ok(())
    }

    async fn history(&self, comment_id: i64) -> Result<Vec<CommentHistory>> {
        let sql = "SELECT id, comment_id, content, created_at FROM comment_history WHERE comment_id = ? ORDER BY id";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(sql)
                    .bind(comment_id)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to load comment history")?;
                Ok(rows
                    .iter()
                    .map(|row| CommentHistory {
                        id: row.get("id"),
                        comment_id: row.get("comment_id"),
                        content: row.get("content"),
                        created_at: row.get("created_at"),
                    })
                    .collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(sql)
                    .bind(comment_id)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to load comment history")?;
                Ok(rows
                    .iter()
                    .map(|row| CommentHistory {
                        id: row.get("id"),
                        comment_id: row.get("comment_id"),
                        content: row.get("content"),
                        created_at: row.get("created_at"),
                    })
                    .collect())
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn update_content_sqlite(pool: &SqlitePool, comment: &Comment, content: &str) -> Result<Comment> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query("INSERT INTO comment_history (comment_id, content, created_at) VALUES (?, ?, ?)")
        .bind(comment.id)
        .bind(&comment.content)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to archive comment")?;

    sqlx::query("UPDATE comments SET content = ?, updated_at = ? WHERE id = ?")
        .bind(content)
        .bind(now)
        .bind(comment.id)
        .execute(&mut *tx)
        .await
        .context("Failed to update comment")?;

    tx.commit().await.context("Failed to commit comment edit")?;

    Ok(Comment {
        content: content.to_string(),
        updated_at: now,
        ..comment.clone()
    })
}

fn row_to_comment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        article_id: row.get("article_id"),
        user_id: row.get("user_id"),
        parent_id: row.get("parent_id"),
        content: row.get("content"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_record_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<CommentRecord> {
    Ok(CommentRecord {
        comment: row_to_comment_sqlite(row),
        author: author_from_sqlite_row(row)?,
        reactions: counts_from_sqlite_row(row),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn update_content_mysql(pool: &MySqlPool, comment: &Comment, content: &str) -> Result<Comment> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query("INSERT INTO comment_history (comment_id, content, created_at) VALUES (?, ?, ?)")
        .bind(comment.id)
        .bind(&comment.content)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to archive comment")?;

    sqlx::query("UPDATE comments SET content = ?, updated_at = ? WHERE id = ?")
        .bind(content)
        .bind(now)
        .bind(comment.id)
        .execute(&mut *tx)
        .await
        .context("Failed to update comment")?;

    tx.commit().await.context("Failed to commit comment edit")?;

    Ok(Comment {
        content: content.to_string(),
        updated_at: now,
        ..comment.clone()
    })
}

fn row_to_comment_mysql(row: &sqlx::mysql::MySqlRow) -> Comment {
    Comment {
        id: row.get("id"),
        article_id: row.get("article_id"),
        user_id: row.get("user_id"),
        parent_id: row.get("parent_id"),
        content: row.get("content"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_record_mysql(row: &sqlx::mysql::MySqlRow) -> Result<CommentRecord> {
    Ok(CommentRecord {
        comment: row_to_comment_mysql(row),
        author: author_from_mysql_row(row)?,
        reactions: counts_from_mysql_row(row),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{ArticleRepository, SqlxArticleRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Article, CreateArticleInput, User};

    async fn setup() -> (SqlxCommentRepository, i64, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new("critic".to_string(), "critic@example.com".to_string(), "h".to_string()))
            .await
            .unwrap();
        let article = SqlxArticleRepository::new(pool.clone())
            .create(&Article::new(
                "topic".to_string(),
                CreateArticleInput::new("Topic", "d", "b"),
                user.id,
            ))
            .await
            .unwrap();

        (SqlxCommentRepository::new(pool), article.id, user.id)
    }

    fn input(article_id: i64, user_id: i64, parent_id: Option<i64>, content: &str) -> CreateCommentInput {
        CreateCommentInput {
            article_id,
            user_id,
            parent_id,
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_list_threads() {
        let (repo, article_id, user_id) = setup().await;
        let root = repo.create(&input(article_id, user_id, None, "first")).await.unwrap();
        let reply = repo
            .create(&input(article_id, user_id, Some(root.id), "reply"))
            .await
            .unwrap();

        let all = repo.list_by_article(article_id).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].comment.id, root.id);
        assert_eq!(all[1].comment.parent_id, Some(root.id));
        assert_eq!(all[1].author.username, "critic");
        assert_eq!(all[1].reactions.likes, 0);

        let fetched = repo.get_by_id(reply.id).await.unwrap().unwrap();
        assert_eq!(fetched.content, "reply");
    }

    #[tokio::test]
    async fn test_update_content_records_history() {
        let (repo, article_id, user_id) = setup().await;
        let comment = repo.create(&input(article_id, user_id, None, "v1")).await.unwrap();

        let comment = repo.update_content(&comment, "v2").await.unwrap();
        let comment = repo.update_content(&comment, "v3").await.unwrap();
        assert_eq!(comment.content, "v3");

        let history = repo.history(comment.id).await.unwrap();
        let versions: Vec<_> = history.iter().map(|h| h.content.as_str()).collect();
        assert_eq!(versions, vec!["v1", "v2"]);

        let stored = repo.get_by_id(comment.id).await.unwrap().unwrap();
        assert_eq!(stored.content, "v3");
    }

    #[tokio::test]
    async fn test_delete_removes_replies() {
        let (repo, article_id, user_id) = setup().await;
        let root = repo.create(&input(article_id, user_id, None, "root")).await.unwrap();
        let reply = repo
            .create(&input(article_id, user_id, Some(root.id), "child"))
            .await
            .unwrap();

        repo.delete(root.id).await.unwrap();
        assert!(repo.get_by_id(root.id).await.unwrap().is_none());
        assert!(repo.get_by_id(reply.id).await.unwrap().is_none());
    }
}
