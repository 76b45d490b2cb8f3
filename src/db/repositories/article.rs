//! Article repository
//!
//! `images` and `tag_list` are stored as JSON arrays in TEXT columns.
//! List filters are case-insensitive substring matches.

use crate::config::DatabaseDriver;
use crate::db::repositories::rating::{summary_columns, summary_from_mysql_row, summary_from_sqlite_row};
use crate::db::repositories::reaction::{count_columns, counts_from_mysql_row, counts_from_sqlite_row};
use crate::db::repositories::user::{author_from_mysql_row, author_from_sqlite_row, AUTHOR_COLUMNS};
use crate::db::DynDatabasePool;
use crate::models::{Article, ArticleFilter, ArticleRecord, ListParams, ReactionTarget};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Insert an article, returning it with its new id
    async fn create(&self, article: &Article) -> Result<Article>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Article>>;

    /// The article at `slug` with its author, reaction counts and rating summary
    async fn get_record_by_slug(&self, slug: &str) -> Result<Option<ArticleRecord>>;

    /// Persist every mutable column and bump `updated_at`
    async fn update(&self, article: &Article) -> Result<Article>;

    /// Delete an article together with its comments, ratings and reactions
    async fn delete(&self, id: i64) -> Result<()>;

    /// One page of articles matching `filter`, ordered by title, and the
    /// total number of matches
    async fn list(
        &self,
        filter: &ArticleFilter,
        params: &ListParams,
    ) -> Result<(Vec<ArticleRecord>, i64)>;
}

pub struct SqlxArticleRepository {
    pool: DynDatabasePool,
}

impl SqlxArticleRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ArticleRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ArticleRepository for SqlxArticleRepository {
    async fn create(&self, article: &Article) -> Result<Article> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_article_sqlite(self.pool.sqlite()?, article).await,
            DatabaseDriver::Mysql => create_article_mysql(self.pool.mysql()?, article).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>> {
        let sql = format!("SELECT {} FROM articles a WHERE a.id = ?", ARTICLE_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get article by ID")?;
                row.as_ref().map(row_to_article_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get article by ID")?;
                row.as_ref().map(row_to_article_mysql).transpose()
            }
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Article>> {
        let sql = format!("SELECT {} FROM articles a WHERE a.slug = ?", ARTICLE_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(slug)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get article by slug")?;
                row.as_ref().map(row_to_article_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(slug)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get article by slug")?;
                row.as_ref().map(row_to_article_mysql).transpose()
            }
        }
    }

    async fn get_record_by_slug(&self, slug: &str) -> Result<Option<ArticleRecord>> {
        let sql = format!("{} WHERE a.slug = ?", record_select());
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(slug)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to load article")?;
                row.as_ref().map(row_to_record_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(slug)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to load article")?;
                row.as_ref().map(row_to_record_mysql).transpose()
            }
        }
    }

    async fn update(&self, article: &Article) -> Result<Article> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_article_sqlite(self.pool.sqlite()?, article).await,
            DatabaseDriver::Mysql => update_article_mysql(self.pool.mysql()?, article).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_article_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => delete_article_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn list(
        &self,
        filter: &ArticleFilter,
        params: &ListParams,
    ) -> Result<(Vec<ArticleRecord>, i64)> {
        let (where_clause, binds) = build_filter(filter);
        let count_sql = format!(
            "SELECT COUNT(*) FROM articles a JOIN users u ON u.id = a.author_id{}",
            where_clause
        );
        let list_sql = format!(
            "{}{} ORDER BY a.title, a.id LIMIT ? OFFSET ?",
            record_select(),
            where_clause
        );

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;

                let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
                for value in &binds {
                    count_query = count_query.bind(value);
                }
                let total = count_query
                    .fetch_one(pool)
                    .await
                    .context("Failed to count articles")?;

                let mut list_query = sqlx::query(&list_sql);
                for value in &binds {
                    list_query = list_query.bind(value);
                }
                let rows = list_query
                    .bind(params.limit as i64)
                    .bind(params.offset as i64)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list articles")?;

                let articles = rows.iter().map(row_to_record_sqlite).collect::<Result<Vec<_>>>()?;
                Ok((articles, total))
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;

                let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
                for value in &binds {
                    count_query = count_query.bind(value);
                }
                let total = count_query
                    .fetch_one(pool)
                    .await
                    .context("Failed to count articles")?;

                let mut list_query = sqlx::query(&list_sql);
                for value in &binds {
                    list_query = list_query.bind(value);
                }
                let rows = list_query
                    .bind(params.limit as i64)
                    .bind(params.offset as i64)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list articles")?;

                let articles = rows.iter().map(row_to_record_mysql).collect::<Result<Vec<_>>>()?;
                Ok((articles, total))
            }
        }
    }
}

const ARTICLE_COLUMNS: &str = "a.id, a.slug, a.title, a.description, a.body, a.images, a.tag_list, a.author_id, a.created_at, a.updated_at";

/// Articles joined with their author, plus reaction and rating aggregates
/// computed per row
fn record_select() -> String {
    format!(
        "SELECT {}, {}, {}, {} FROM articles a JOIN users u ON u.id = a.author_id",
        ARTICLE_COLUMNS,
        AUTHOR_COLUMNS,
        count_columns(ReactionTarget::Article, "a.id"),
        summary_columns("a.id")
    )
}

/// Build the WHERE clause for a filter. Every condition binds one pattern.
fn build_filter(filter: &ArticleFilter) -> (String, Vec<String>) {
    let mut conditions = Vec::new();
    let mut binds = Vec::new();

    for (name, value) in filter.active() {
        let column = match name {
            "title" => "a.title",
            "description" => "a.description",
            "body" => "a.body",
            "author" => "u.username",
            "tag" => "a.tag_list",
            _ => continue,
        };
        conditions.push(format!("LOWER({}) LIKE ? ESCAPE '!'", column));
        binds.push(contains_pattern(value));
    }

    if conditions.is_empty() {
        (String::new(), binds)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), binds)
    }
}

/// `%value%`, lowercased, with LIKE wildcards escaped by `!`
fn contains_pattern(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('%');
    for c in value.trim().to_lowercase().chars() {
        if matches!(c, '!' | '%' | '_') {
            escaped.push('!');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn encode_list(values: &[String]) -> Result<String> {
    serde_json::to_string(values).context("Failed to encode list column")
}

fn decode_list(raw: &str) -> Result<Vec<String>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw).with_context(|| format!("Invalid list column: {}", raw))
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_article_sqlite(pool: &SqlitePool, article: &Article) -> Result<Article> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO articles (slug, title, description, body, images, tag_list, author_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&article.slug)
    .bind(&article.title)
    .bind(&article.description)
    .bind(&article.body)
    .bind(encode_list(&article.images)?)
    .bind(encode_list(&article.tag_list)?)
    .bind(article.author_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create article")?;

    Ok(Article {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..article.clone()
    })
}

async fn update_article_sqlite(pool: &SqlitePool, article: &Article) -> Result<Article> {
    let now = Utc::now();

    sqlx::query(
        r#"
        UPDATE articles
        SET slug = ?, title = ?, description = ?, body = ?, images = ?, tag_list = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&article.slug)
    .bind(&article.title)
    .bind(&article.description)
    .bind(&article.body)
    .bind(encode_list(&article.images)?)
    .bind(encode_list(&article.tag_list)?)
    .bind(now)
    .bind(article.id)
    .execute(pool)
    .await
    .context("Failed to update article")?;

    Ok(Article {
        updated_at: now,
        ..article.clone()
    })
}

async fn delete_article_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query(
        "DELETE FROM reactions WHERE target_type = 'comment' AND target_id IN (SELECT id FROM comments WHERE article_id = ?)",
    )
    .bind(id)
    .execute(&mut *tx)
    .await
    .context("Failed to delete comment reactions")?;

    sqlx::query("DELETE FROM reactions WHERE target_type = 'article' AND target_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete article reactions")?;

    sqlx::query("DELETE FROM articles WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete article")?;

    tx.commit().await.context("Failed to commit article deletion")?;
    Ok(())
}

fn row_to_article_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Article> {
    let images: String = row.get("images");
    let tag_list: String = row.get("tag_list");
    Ok(Article {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        description: row.get("description"),
        body: row.get("body"),
        images: decode_list(&images)?,
        tag_list: decode_list(&tag_list)?,
        author_id: row.get("author_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_record_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<ArticleRecord> {
    Ok(ArticleRecord {
        article: row_to_article_sqlite(row)?,
        author: author_from_sqlite_row(row)?,
        reactions: counts_from_sqlite_row(row),
        rating: summary_from_sqlite_row(row),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_article_mysql(pool: &MySqlPool, article: &Article) -> Result<Article> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO articles (slug, title, description, body, images, tag_list, author_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&article.slug)
    .bind(&article.title)
    .bind(&article.description)
    .bind(&article.body)
    .bind(encode_list(&article.images)?)
    .bind(encode_list(&article.tag_list)?)
    .bind(article.author_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create article")?;

    Ok(Article {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..article.clone()
    })
}

async fn update_article_mysql(pool: &MySqlPool, article: &Article) -> Result<Article> {
    let now = Utc::now();

    sqlx::query(
        r#"
        UPDATE articles
        SET slug = ?, title = ?, description = ?, body = ?, images = ?, tag_list = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&article.slug)
    .bind(&article.title)
    .bind(&article.description)
    .bind(&article.body)
    .bind(encode_list(&article.images)?)
    .bind(encode_list(&article.tag_list)?)
    .bind(now)
    .bind(article.id)
    .execute(pool)
    .await
    .context("Failed to update article")?;

    Ok(Article {
        updated_at: now,
        ..article.clone()
    })
}

async fn delete_article_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query(
        "DELETE FROM reactions WHERE target_type = 'comment' AND target_id IN (SELECT id FROM comments WHERE article_id = ?)",
    )
    .bind(id)
    .execute(&mut *tx)
    .await
    .context("Failed to delete comment reactions")?;

    sqlx::query("DELETE FROM reactions WHERE target_type = 'article' AND target_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete article reactions")?;

    sqlx::query("DELETE FROM articles WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete article")?;

    tx.commit().await.context("Failed to commit article deletion")?;
    Ok(())
}

fn row_to_article_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Article> {
    let images: String = row.get("images");
    let tag_list: String = row.get("tag_list");
    Ok(Article {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        description: row.get("description"),
        body: row.get("body"),
        images: decode_list(&images)?,
        tag_list: decode_list(&tag_list)?,
        author_id: row.get("author_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_record_mysql(row: &sqlx::mysql::MySqlRow) -> Result<ArticleRecord> {
    Ok(ArticleRecord {
        article: row_to_article_mysql(row)?,
        author: author_from_mysql_row(row)?,
        reactions: counts_from_mysql_row(row),
        rating: summary_from_mysql_row(row),
    })
}
