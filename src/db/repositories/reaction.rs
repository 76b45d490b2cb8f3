//! Reaction repository
//!
//! One table holds likes, dislikes and favorites for both articles and
//! comments, keyed by `(target_type, target_id, user_id, kind)`.

use crate::config::DatabaseDriver;
use crate::db::repositories::placeholders;
use crate::db::DynDatabasePool;
use crate::models::{ReactionCounts, ReactionKind, ReactionTarget};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait ReactionRepository: Send + Sync {
    /// Record a reaction. Returns false if it already existed.
    async fn add(
        &self,
        target: ReactionTarget,
        target_id: i64,
        user_id: i64,
        kind: ReactionKind,
    ) -> Result<bool>;

    /// Remove a reaction. Returns false if there was nothing to remove.
    async fn remove(
        &self,
        target: ReactionTarget,
        target_id: i64,
        user_id: i64,
        kind: ReactionKind,
    ) -> Result<bool>;

    async fn counts(&self, target: ReactionTarget, target_id: i64) -> Result<ReactionCounts>;

    /// Which of `target_ids` carry a `kind` reaction from `user_id`
    async fn reacted_among(
        &self,
        target: ReactionTarget,
        target_ids: &[i64],
        user_id: i64,
        kind: ReactionKind,
    ) -> Result<HashSet<i64>>;
}

const COUNTED_KINDS: [ReactionKind; 3] =
    [ReactionKind::Like, ReactionKind::Dislike, ReactionKind::Favorite];

/// Correlated `like_count`, `dislike_count` and `favorite_count` columns for
/// the row whose id is `id_column`
pub(crate) fn count_columns(target: ReactionTarget, id_column: &str) -> String {
    COUNTED_KINDS
        .iter()
        .map(|kind| {
            format!(
                "(SELECT COUNT(*) FROM reactions r WHERE r.target_type = '{}' AND r.target_id = {} AND r.kind = '{}') AS {}_count",
                target.as_str(),
                id_column,
                kind.as_str(),
                kind.as_str()
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

macro_rules! counts_from_row {
    ($row:expr) => {
        ReactionCounts {
            likes: $row.get("like_count"),
            dislikes: $row.get("dislike_count"),
            favorites: $row.get("favorite_count"),
        }
    };
}

pub(crate) fn counts_from_sqlite_row(row: &sqlx::sqlite::SqliteRow) -> ReactionCounts {
    counts_from_row!(row)
}

pub(crate) fn counts_from_mysql_row(row: &sqlx::mysql::MySqlRow) -> ReactionCounts {
    counts_from_row!(row)
}

pub struct SqlxReactionRepository {
    pool: DynDatabasePool,
}

impl SqlxReactionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ReactionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ReactionRepository for SqlxReactionRepository {
    async fn add(
        &self,
        target: ReactionTarget,
        target_id: i64,
        user_id: i64,
        kind: ReactionKind,
    ) -> Result<bool> {
        let now = Utc::now();
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(
                "INSERT OR IGNORE INTO reactions (target_type, target_id, user_id, kind, created_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(target.as_str())
            .bind(target_id)
            .bind(user_id)
            .bind(kind.as_str())
            .bind(now)
            .execute(self.pool.sqlite()?)
            .await
            .context("Failed to add reaction")?
            .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(
                "INSERT IGNORE INTO reactions (target_type, target_id, user_id, kind, created_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(target.as_str())
            .bind(target_id)
            .bind(user_id)
            .bind(kind.as_str())
            .bind(now)
            .execute(self.pool.mysql()?)
            .await
            .context("Failed to add reaction")?
            .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn remove(
        &self,
        target: ReactionTarget,
        target_id: i64,
        user_id: i64,
        kind: ReactionKind,
    ) -> Result<bool> {
        let sql = "DELETE FROM reactions WHERE target_type = ? AND target_id = ? AND user_id = ? AND kind = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(target.as_str())
                .bind(target_id)
                .bind(user_id)
                .bind(kind.as_str())
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to remove reaction")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(target.as_str())
                .bind(target_id)
                .bind(user_id)
                .bind(kind.as_str())
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to remove reaction")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn counts(&self, target: ReactionTarget, target_id: i64) -> Result<ReactionCounts> {
        let sql = "SELECT kind, COUNT(*) FROM reactions WHERE target_type = ? AND target_id = ? GROUP BY kind";
        let rows: Vec<(String, i64)> = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_as(sql)
                .bind(target.as_str())
                .bind(target_id)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to count reactions")?,
            DatabaseDriver::Mysql => sqlx::query_as(sql)
                .bind(target.as_str())
                .bind(target_id)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to count reactions")?,
        };

        let mut counts = ReactionCounts::default();
        for (kind, count) in rows {
            counts.add(ReactionKind::from_str(&kind)?, count);
        }
        Ok(counts)
    }

    async fn reacted_among(
        &self,
        target: ReactionTarget,
        target_ids: &[i64],
        user_id: i64,
        kind: ReactionKind,
    ) -> Result<HashSet<i64>> {
        if target_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let sql = format!(
            "SELECT target_id FROM reactions WHERE target_type = ? AND user_id = ? AND kind = ? AND target_id IN ({})",
            placeholders(target_ids.len())
        );
        let ids: Vec<i64> = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query_scalar(&sql)
                    .bind(target.as_str())
                    .bind(user_id)
                    .bind(kind.as_str());
                for id in target_ids {
                    query = query.bind(*id);
                }
                query
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to load viewer reactions")?
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query_scalar(&sql)
                    .bind(target.as_str())
                    .bind(user_id)
                    .bind(kind.as_str());
                for id in target_ids {
                    query = query.bind(*id);
                }
                query
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to load viewer reactions")?
            }
        };
        Ok(ids.into_iter().collect())
    }
}
