//! Follow repository
//!
//! The follow graph is a self-referential many-to-many on `users`.

use crate::config::DatabaseDriver;
use crate::db::repositories::placeholders;
use crate::db::repositories::user::{row_to_user_mysql, row_to_user_sqlite, USER_COLUMNS};
use crate::db::DynDatabasePool;
use crate::models::User;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;

#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Record that `follower_id` follows `followed_id`. Idempotent.
    async fn follow(&self, follower_id: i64, followed_id: i64) -> Result<()>;

    /// Remove the edge if present. Idempotent.
    async fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<()>;

    async fn is_following(&self, follower_id: i64, followed_id: i64) -> Result<bool>;

    /// Which of `user_ids` `follower_id` follows
    async fn followed_among(&self, follower_id: i64, user_ids: &[i64]) -> Result<HashSet<i64>>;

    /// Users following `user_id`, ordered by username
    async fn followers(&self, user_id: i64) -> Result<Vec<User>>;

    /// Users `user_id` follows, ordered by username
    async fn following(&self, user_id: i64) -> Result<Vec<User>>;
}

pub struct SqlxFollowRepository {
    pool: DynDatabasePool,
}

impl SqlxFollowRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn FollowRepository> {
        Arc::new(Self::new(pool))
    }

    async fn users_joined_on(&self, join_column: &str, filter_column: &str, user_id: i64) -> Result<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM follows f JOIN users u ON u.id = f.{} WHERE f.{} = ? ORDER BY u.username",
            USER_COLUMNS, join_column, filter_column
        );

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(user_id)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list follow edges")?;
                rows.iter().map(row_to_user_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .bind(user_id)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list follow edges")?;
                rows.iter().map(row_to_user_mysql).collect()
            }
        }
    }
}

#[async_trait]
impl FollowRepository for SqlxFollowRepository {
    async fn follow(&self, follower_id: i64, followed_id: i64) -> Result<()> {
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(
                    "INSERT OR IGNORE INTO follows (follower_id, followed_id, created_at) VALUES (?, ?, ?)",
                )
                .bind(follower_id)
                .bind(followed_id)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to follow user")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(
                    "INSERT IGNORE INTO follows (follower_id, followed_id, created_at) VALUES (?, ?, ?)",
                )
                .bind(follower_id)
                .bind(followed_id)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to follow user")?;
            }
        }
        Ok(())
    }

    async fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<()> {
        let sql = "DELETE FROM follows WHERE follower_id = ? AND followed_id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(follower_id)
                    .bind(followed_id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to unfollow user")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(follower_id)
                    .bind(followed_id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to unfollow user")?;
            }
        }
        Ok(())
    }

    async fn is_following(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        let sql = "SELECT COUNT(*) FROM follows WHERE follower_id = ? AND followed_id = ?";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(sql)
                .bind(follower_id)
                .bind(followed_id)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to check follow")?,
            DatabaseDriver::Mysql => sqlx::query_scalar(sql)
                .bind(follower_id)
                .bind(followed_id)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to check follow")?,
        };
        Ok(count > 0)
    }

    async fn followed_among(&self, follower_id: i64, user_ids: &[i64]) -> Result<HashSet<i64>> {
        if user_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let sql = format!(
            "SELECT followed_id FROM follows WHERE follower_id = ? AND followed_id IN ({})",
            placeholders(user_ids.len())
        );
        let ids: Vec<i64> = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query_scalar(&sql).bind(follower_id);
                for id in user_ids {
                    query = query.bind(*id);
                }
                query
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to check follows")?
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query_scalar(&sql).bind(follower_id);
                for id in user_ids {
                    query = query.bind(*id);
                }
                query
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to check follows")?
            }
        };
        Ok(ids.into_iter().collect())
    }

    async fn followers(&self, user_id: i64) -> Result<Vec<User>> {
        self.users_joined_on("follower_id", "followed_id", user_id).await
    }

    async fn following(&self, user_id: i64) -> Result<Vec<User>> {
        self.users_joined_on("followed_id", "follower_id", user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> (Arc<dyn UserRepository>, SqlxFollowRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        (SqlxUserRepository::boxed(pool.clone()), SqlxFollowRepository::new(pool))
    }

    async fn user(repo: &Arc<dyn UserRepository>, name: &str) -> User {
        repo.create(&User::new(
            name.to_string(),
            format!("{}@example.com", name),
            "hash".to_string(),
        ))
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_follow_is_idempotent_and_directed() {
        let (users, follows) = setup().await;
        let alice = user(&users, "alice").await;
        let bob = user(&users, "bob").await;

        follows.follow(alice.id, bob.id).await.unwrap();
        follows.follow(alice.id, bob.id).await.unwrap();

        assert!(follows.is_following(alice.id, bob.id).await.unwrap());
        assert!(!follows.is_following(bob.id, alice.id).await.unwrap());

        let followers = follows.followers(bob.id).await.unwrap();
        assert_eq!(followers.len(), 1);
        assert_eq!(followers[0].username, "alice");

        let following = follows.following(alice.id).await.unwrap();
        assert_eq!(following.len(), 1);
        assert_eq!(following[0].username, "bob");
    }

    #[tokio::test]
    async fn test_unfollow() {
        let (users, follows) = setup().await;
        let alice = user(&users, "alice").await;
        let bob = user(&users, "bob").await;

        follows.follow(alice.id, bob.id).await.unwrap();
        follows.unfollow(alice.id, bob.id).await.unwrap();
        follows.unfollow(alice.id, bob.id).await.unwrap();

        assert!(!follows.is_following(alice.id, bob.id).await.unwrap());
        assert!(follows.followers(bob.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_followed_among() {
        let (users, follows) = setup().await;
        let alice = user(&users, "alice").await;
        let bob = user(&users, "bob").await;
        let carol = user(&users, "carol").await;

        follows.follow(alice.id, bob.id).await.unwrap();
        follows.follow(carol.id, alice.id).await.unwrap();

        let followed = follows
            .followed_among(alice.id, &[bob.id, carol.id])
            .await
            .unwrap();
        assert_eq!(followed, HashSet::from([bob.id]));
        assert!(follows.followed_among(alice.id, &[]).await.unwrap().is_empty());
    }
}
