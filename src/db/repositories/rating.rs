//! Rating repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Rating, RatingSummary};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait RatingRepository: Send + Sync {
    /// Insert or replace the rating `user_id` gave `article_id`
    async fn upsert(&self, user_id: i64, article_id: i64, stars: i32) -> Result<Rating>;

    async fn get(&self, user_id: i64, article_id: i64) -> Result<Option<Rating>>;

    /// Ratings of an article in creation order, each with the rater's username
    async fn list_by_article(&self, article_id: i64) -> Result<Vec<(Rating, String)>>;

    async fn summary(&self, article_id: i64) -> Result<RatingSummary>;
}

pub struct SqlxRatingRepository {
    pool: DynDatabasePool,
}

impl SqlxRatingRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn RatingRepository> {
        Arc::new(Self::new(pool))
    }
}

const RATING_COLUMNS: &str =
    "r.id, r.user_id, r.article_id, r.stars, r.created_at, r.updated_at";

/// Correlated `rating_average` and `rating_count` columns for the article
/// whose id is `id_column`. AVG over integers is DECIMAL in MySQL, hence
/// the cast.
pub(crate) fn summary_columns(id_column: &str) -> String {
    format!(
        "(SELECT CAST(AVG(stars) AS DOUBLE) FROM ratings WHERE article_id = {id}) AS rating_average, \
         (SELECT COUNT(*) FROM ratings WHERE article_id = {id}) AS rating_count",
        id = id_column
    )
}

macro_rules! summary_from_row {
    ($row:expr) => {
        RatingSummary {
            average: $row.get("rating_average"),
            count: $row.get("rating_count"),
        }
    };
}

pub(crate) fn summary_from_sqlite_row(row: &sqlx::sqlite::SqliteRow) -> RatingSummary {
    summary_from_row!(row)
}

pub(crate) fn summary_from_mysql_row(row: &sqlx::mysql::MySqlRow) -> RatingSummary {
    summary_from_row!(row)
}

macro_rules! row_to_rating {
    ($row:expr) => {
        Rating {
            id: $row.get("id"),
            user_id: $row.get("user_id"),
            article_id: $row.get("article_id"),
            stars: $row.get("stars"),
            created_at: $row.get("created_at"),
            updated_at: $row.get("updated_at"),
        }
    };
}

#[async_trait]
impl RatingRepository for SqlxRatingRepository {
    async fn upsert(&self, user_id: i64, article_id: i64, stars: i32) -> Result<Rating> {
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(
                    r#"
                    INSERT INTO ratings (user_id, article_id, stars, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?)
                    ON CONFLICT(user_id, article_id)
                    DO UPDATE SET stars = excluded.stars, updated_at = excluded.updated_at
                    "#,
                )
                .bind(user_id)
                .bind(article_id)
                .bind(stars)
                .bind(now)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to save rating")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(
                    r#"
                    INSERT INTO ratings (user_id, article_id, stars, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?)
                    ON DUPLICATE KEY UPDATE stars = VALUES(stars), updated_at = VALUES(updated_at)
                    "#,
                )
                .bind(user_id)
                .bind(article_id)
                .bind(stars)
                .bind(now)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to save rating")?;
            }
        }

        self.get(user_id, article_id)
            .await?
            .context("Rating missing after save")
    }

    async fn get(&self, user_id: i64, article_id: i64) -> Result<Option<Rating>> {
        let sql = format!(
            "SELECT {} FROM ratings r WHERE r.user_id = ? AND r.article_id = ?",
            RATING_COLUMNS
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(user_id)
                    .bind(article_id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get rating")?;
                Ok(row.map(|row| row_to_rating!(row)))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(user_id)
                    .bind(article_id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get rating")?;
                Ok(row.map(|row| row_to_rating!(row)))
            }
        }
    }

    async fn list_by_article(&self, article_id: i64) -> Result<Vec<(Rating, String)>> {
        let sql = format!(
            "SELECT {}, u.username FROM ratings r JOIN users u ON u.id = r.user_id WHERE r.article_id = ? ORDER BY r.id",
            RATING_COLUMNS
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(article_id)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list ratings")?;
                Ok(rows
                    .iter()
                    .map(|row| (row_to_rating!(row), row.get("username")))
                    .collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .bind(article_id)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list ratings")?;
                Ok(rows
                    .iter()
                    .map(|row| (row_to_rating!(row), row.get("username")))
                    .collect())
            }
        }
    }

    async fn summary(&self, article_id: i64) -> Result<RatingSummary> {
        let (average, count): (Option<f64>, i64) = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_as(
                "SELECT AVG(stars), COUNT(*) FROM ratings WHERE article_id = ?",
            )
            .bind(article_id)
            .fetch_one(self.pool.sqlite()?)
            .await
            .context("Failed to summarize ratings")?,
            // AVG over integers is DECIMAL in MySQL
            DatabaseDriver::Mysql => sqlx::query_as(
                "SELECT CAST(AVG(stars) AS DOUBLE), COUNT(*) FROM ratings WHERE article_id = ?",
            )
            .bind(article_id)
            .fetch_one(self.pool.mysql()?)
            .await
            .context("Failed to summarize ratings")?,
        };

        Ok(RatingSummary { average, count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{ArticleRepository, SqlxArticleRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Article, CreateArticleInput, User};

    async fn setup() -> (SqlxRatingRepository, Arc<dyn UserRepository>, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::boxed(pool.clone());
        let author = users
            .create(&User::new("author".to_string(), "author@example.com".to_string(), "h".to_string()))
            .await
            .unwrap();
        let article = SqlxArticleRepository::new(pool.clone())
            .create(&Article::new(
                "rated".to_string(),
                CreateArticleInput::new("Rated", "d", "b"),
                author.id,
            ))
            .await
            .unwrap();

        (SqlxRatingRepository::new(pool), users, article.id)
    }

    async fn reader(users: &Arc<dyn UserRepository>, name: &str) -> i64 {
        users
            .create(&User::new(name.to_string(), format!("{}@example.com", name), "h".to_string()))
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_upsert_replaces_previous_rating() {
        let (repo, users, article_id) = setup().await;
        let reader = reader(&users, "reader").await;

        let first = repo.upsert(reader, article_id, 2).await.unwrap();
        let second = repo.upsert(reader, article_id, 5).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.stars, 5);
        let all = repo.list_by_article(article_id).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].1, "reader");
    }

    #[tokio::test]
    async fn test_summary() {
        let (repo, users, article_id) = setup().await;
        assert_eq!(
            repo.summary(article_id).await.unwrap(),
            RatingSummary { average: None, count: 0 }
        );

        let a = reader(&users, "a").await;
        let b = reader(&users, "b").await;
        repo.upsert(a, article_id, 4).await.unwrap();
        repo.upsert(b, article_id, 5).await.unwrap();

        let summary = repo.summary(article_id).await.unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.average, Some(4.5));
    }
}
