//! Rating model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_STARS: i64 = 1;
pub const MAX_STARS: i64 = 5;

/// A reader's star rating of an article. One per (user, article).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub id: i64,
    pub user_id: i64,
    pub article_id: i64,
    pub stars: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate over all ratings of an article
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    /// `None` when nobody has rated the article
    pub average: Option<f64>,
    pub count: i64,
}
