//! Shared API response types
//!
//! JSON representations of users, profiles, articles, comments and ratings.
//! Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

use crate::models::{CommentHistory, Profile, User};
use crate::services::{ArticleView, AuthSession, CommentView, RatingView};

// ============================================================================
// Users and profiles
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub email: String,
    pub username: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            email: user.email,
            username: user.username,
            bio: user.bio,
            image: user.image,
            token: None,
        }
    }
}

impl From<AuthSession> for UserResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            token: Some(session.token),
            ..UserResponse::from(session.user)
        }
    }
}

/// `{user: ...}`
#[derive(Debug, Serialize, Deserialize)]
pub struct UserEnvelope {
    pub user: UserResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub username: String,
    pub email: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub following: bool,
}

impl From<Profile> for ProfileResponse {
    fn from(profile: Profile) -> Self {
        Self {
            username: profile.username,
            email: profile.email,
            bio: profile.bio,
            image: profile.image,
            following: profile.following,
        }
    }
}

/// `{profile: ...}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileEnvelope {
    pub profile: ProfileResponse,
}

/// `{message: ...}`
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============================================================================
// Articles
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleResponse {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub images: Vec<String>,
    pub tag_list: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    pub author: ProfileResponse,
    pub likes_count: i64,
    pub dislikes_count: i64,
    pub favorites_count: i64,
    pub favorited: bool,
    pub average_rating: Option<f64>,
    pub ratings_count: i64,
}

impl From<ArticleView> for ArticleResponse {
    fn from(view: ArticleView) -> Self {
        let article = view.article;
        Self {
            id: article.id,
            slug: article.slug,
            title: article.title,
            description: article.description,
            body: article.body,
            images: article.images,
            tag_list: article.tag_list,
            created_at: article.created_at.to_rfc3339(),
            updated_at: article.updated_at.to_rfc3339(),
            author: view.author.into(),
            likes_count: view.reactions.likes,
            dislikes_count: view.reactions.dislikes,
            favorites_count: view.reactions.favorites,
            favorited: view.favorited,
            average_rating: view.rating.average,
            ratings_count: view.rating.count,
        }
    }
}

/// `{article: ...}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ArticleEnvelope {
    pub article: ArticleResponse,
}

/// One page of a list, with relative links to its neighbours
#[derive(Debug, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

// ============================================================================
// Comments
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: i64,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
    pub parent: Option<i64>,
    pub author: ProfileResponse,
    pub likes_count: i64,
    pub dislikes_count: i64,
    pub replies: Vec<CommentResponse>,
}

impl From<CommentView> for CommentResponse {
    fn from(view: CommentView) -> Self {
        let comment = view.comment;
        Self {
            id: comment.id,
            content: comment.content,
            created_at: comment.created_at.to_rfc3339(),
            updated_at: comment.updated_at.to_rfc3339(),
            parent: comment.parent_id,
            author: view.author.into(),
            likes_count: view.reactions.likes,
            dislikes_count: view.reactions.dislikes,
            replies: view.replies.into_iter().map(Into::into).collect(),
        }
    }
}

/// `{comment: ...}`
#[derive(Debug, Serialize, Deserialize)]
pub struct CommentEnvelope {
    pub comment: CommentResponse,
}

/// A previous version of a comment
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub id: i64,
    /// The text before the edit
    pub comment: String,
    pub parent_comment: i64,
    pub date_created: String,
}

impl From<CommentHistory> for HistoryResponse {
    fn from(entry: CommentHistory) -> Self {
        Self {
            id: entry.id,
            comment: entry.content,
            parent_comment: entry.comment_id,
            date_created: entry.created_at.to_rfc3339(),
        }
    }
}

// ============================================================================
// Ratings
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RatingResponse {
    pub id: i64,
    /// Username of the rater
    pub user: String,
    /// Slug of the rated article
    pub article: String,
    pub stars: i32,
}

impl From<RatingView> for RatingResponse {
    fn from(view: RatingView) -> Self {
        Self {
            id: view.rating.id,
            user: view.username,
            article: view.article_slug,
            stars: view.rating.stars,
        }
    }
}
