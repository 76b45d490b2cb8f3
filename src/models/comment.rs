//! Comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ReactionCounts, User};

/// Comment entity. Replies point at their parent through `parent_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub article_id: i64,
    pub user_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A comment loaded with its author and reaction counts
#[derive(Debug, Clone)]
pub struct CommentRecord {
    pub comment: Comment,
    pub author: User,
    pub reactions: ReactionCounts,
}

/// A previous version of a comment, recorded when it is edited
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentHistory {
    pub id: i64,
    pub comment_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a comment or a reply
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommentInput {
    pub article_id: i64,
    pub user_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
}
