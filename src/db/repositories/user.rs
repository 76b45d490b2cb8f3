//! User repository
//!
//! - `UserRepository` trait defining user data access
//! - `SqlxUserRepository` implementing it for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{User, UserStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user, returning it with its new id
    async fn create(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Persist every mutable column and bump `updated_at`
    async fn update(&self, user: &User) -> Result<User>;

    async fn delete(&self, id: i64) -> Result<()>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_user_sqlite(self.pool.sqlite()?, user).await,
            DatabaseDriver::Mysql => create_user_mysql(self.pool.mysql()?, user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_user_where_sqlite(self.pool.sqlite()?, "id = ?", UserKey::Id(id)).await
            }
            DatabaseDriver::Mysql => {
                get_user_where_mysql(self.pool.mysql()?, "id = ?", UserKey::Id(id)).await
            }
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let key = UserKey::Text(username);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_user_where_sqlite(self.pool.sqlite()?, "username = ?", key).await
            }
            DatabaseDriver::Mysql => {
                get_user_where_mysql(self.pool.mysql()?, "username = ?", key).await
            }
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let key = UserKey::Text(email);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_user_where_sqlite(self.pool.sqlite()?, "email = ?", key).await
            }
            DatabaseDriver::Mysql => get_user_where_mysql(self.pool.mysql()?, "email = ?", key).await,
        }
    }

    async fn update(&self, user: &User) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_user_sqlite(self.pool.sqlite()?, user).await,
            DatabaseDriver::Mysql => update_user_mysql(self.pool.mysql()?, user).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("DELETE FROM users WHERE id = ?")
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to delete user")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query("DELETE FROM users WHERE id = ?")
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to delete user")?;
            }
        }
        Ok(())
    }
}

/// Lookup value for single-user queries
enum UserKey<'a> {
    Id(i64),
    Text(&'a str),
}

pub(crate) const USER_COLUMNS: &str =
    "u.id, u.username, u.email, u.password_hash, u.bio, u.image, u.status, u.created_at, u.updated_at";

/// `users u` columns for queries that also select another table's columns
pub(crate) const AUTHOR_COLUMNS: &str = "u.id AS author_user_id, u.username AS author_username, \
    u.email AS author_email, u.password_hash AS author_password_hash, u.bio AS author_bio, \
    u.image AS author_image, u.status AS author_status, u.created_at AS author_created_at, \
    u.updated_at AS author_updated_at";

macro_rules! author_from_row {
    ($row:expr) => {{
        let status: String = $row.get("author_status");
        Ok(User {
            id: $row.get("author_user_id"),
            username: $row.get("author_username"),
            email: $row.get("author_email"),
            password_hash: $row.get("author_password_hash"),
            bio: $row.get("author_bio"),
            image: $row.get("author_image"),
            status: UserStatus::from_str(&status)
                .with_context(|| format!("Invalid status in database: {}", status))?,
            created_at: $row.get("author_created_at"),
            updated_at: $row.get("author_updated_at"),
        })
    }};
}

/// The author selected through [`AUTHOR_COLUMNS`]
pub(crate) fn author_from_sqlite_row(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    author_from_row!(row)
}

pub(crate) fn author_from_mysql_row(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    author_from_row!(row)
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, bio, image, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.bio)
    .bind(&user.image)
    .bind(user.status.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

async fn get_user_where_sqlite(
    pool: &SqlitePool,
    condition: &str,
    key: UserKey<'_>,
) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users u WHERE u.{}", USER_COLUMNS, condition);
    let query = sqlx::query(&sql);
    let query = match key {
        UserKey::Id(id) => query.bind(id),
        UserKey::Text(text) => query.bind(text),
    };

    let row = query
        .fetch_optional(pool)
        .await
        .context("Failed to get user")?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn update_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let now = Utc::now();

    sqlx::query(
        r#"
        UPDATE users
        SET username = ?, email = ?, password_hash = ?, bio = ?, image = ?, status = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.bio)
    .bind(&user.image)
    .bind(user.status.to_string())
    .bind(now)
    .bind(user.id)
    .execute(pool)
    .await
    .context("Failed to update user")?;

    Ok(User {
        updated_at: now,
        ..user.clone()
    })
}

pub(crate) fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let status: String = row.get("status");
    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        bio: row.get("bio"),
        image: row.get("image"),
        status: UserStatus::from_str(&status)
            .with_context(|| format!("Invalid status in database: {}", status))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, bio, image, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.bio)
    .bind(&user.image)
    .bind(user.status.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

async fn get_user_where_mysql(
    pool: &MySqlPool,
    condition: &str,
    key: UserKey<'_>,
) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users u WHERE u.{}", USER_COLUMNS, condition);
    let query = sqlx::query(&sql);
    let query = match key {
        UserKey::Id(id) => query.bind(id),
        UserKey::Text(text) => query.bind(text),
    };

    let row = query
        .fetch_optional(pool)
        .await
        .context("Failed to get user")?;

    row.as_ref().map(row_to_user_mysql).transpose()
}

async fn update_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let now = Utc::now();

    sqlx::query(
        r#"
        UPDATE users
        SET username = ?, email = ?, password_hash = ?, bio = ?, image = ?, status = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.bio)
    .bind(&user.image)
    .bind(user.status.to_string())
    .bind(now)
    .bind(user.id)
    .execute(pool)
    .await
    .context("Failed to update user")?;

    Ok(User {
        updated_at: now,
        ..user.clone()
    })
}

pub(crate) fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    let status: String = row.get("status");
    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        bio: row.get("bio"),
        image: row.get("image"),
        status: UserStatus::from_str(&status)
            .with_context(|| format!("Invalid status in database: {}", status))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
