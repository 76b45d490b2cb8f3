//! Reactions: likes, dislikes and favorites on articles and comments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a reaction is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionTarget {
    Article,
    Comment,
}

impl ReactionTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::Comment => "comment",
        }
    }
}

impl fmt::Display for ReactionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of reaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Dislike,
    Favorite,
}

impl ReactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
            Self::Favorite => "favorite",
        }
    }

    /// The reaction that cannot coexist with this one
    pub fn opposite(&self) -> Option<ReactionKind> {
        match self {
            Self::Like => Some(Self::Dislike),
            Self::Dislike => Some(Self::Like),
            Self::Favorite => None,
        }
    }
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReactionKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(Self::Like),
            "dislike" => Ok(Self::Dislike),
            "favorite" => Ok(Self::Favorite),
            _ => Err(anyhow::anyhow!("Invalid reaction kind: {}", s)),
        }
    }
}

/// Reaction entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub id: i64,
    pub target_type: ReactionTarget,
    pub target_id: i64,
    pub user_id: i64,
    pub kind: ReactionKind,
    pub created_at: DateTime<Utc>,
}

/// Per-kind totals for a single target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionCounts {
    pub likes: i64,
    pub dislikes: i64,
    pub favorites: i64,
}

impl ReactionCounts {
    pub fn add(&mut self, kind: ReactionKind, count: i64) {
        match kind {
            ReactionKind::Like => self.likes += count,
            ReactionKind::Dislike => self.dislikes += count,
            ReactionKind::Favorite => self.favorites += count,
        }
    }
}
