//! Reaction service: likes, dislikes and favorites
//!
//! Like and dislike are mutually exclusive toggles. Reacting adds the
//! reaction and removes its opposite; reacting again takes it back.

use crate::db::repositories::{CommentRepository, ReactionRepository};
use crate::models::{Article, ReactionKind, ReactionTarget, User};
use crate::services::article::{ArticleService, ArticleServiceError, ArticleView};
use anyhow::Context;
use std::sync::Arc;

pub const ARTICLE_SLUG_NOT_FOUND: &str = "An article with this slug does not exist.";
pub const COMMENT_ID_NOT_FOUND: &str = "A comment with this id does not exist.";
pub const FAVORITE_ARTICLE_NOT_FOUND: &str = "The article was not found";
pub const ALREADY_FAVORITED: &str = "You have already marked this article as a favourite";
pub const NOT_FAVORITED: &str = "You have not marked this article as a favourite";

#[derive(Debug, thiserror::Error)]
pub enum ReactionServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<ArticleServiceError> for ReactionServiceError {
    fn from(err: ArticleServiceError) -> Self {
        match err {
            ArticleServiceError::NotFound(msg) => Self::NotFound(msg),
            ArticleServiceError::InternalError(e) => Self::InternalError(e),
            other => Self::InternalError(anyhow::anyhow!(other.to_string())),
        }
    }
}

/// What a like or dislike request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Added,
    Removed,
}

impl Toggle {
    /// Client message, e.g. "You have successfully liked this article"
    pub fn message(&self, kind: ReactionKind, target: ReactionTarget) -> String {
        match self {
            Toggle::Added => format!("You have successfully {}d this {}", kind, target),
            Toggle::Removed => format!("You no longer {} this {}", kind, target),
        }
    }
}

/// What a favorite or unfavorite request did
#[derive(Debug, Clone)]
pub enum FavoriteOutcome {
    /// Nothing to do; carries the client message
    Unchanged(&'static str),
    Changed(ArticleView),
}

pub struct ReactionService {
    articles: Arc<ArticleService>,
    comment_repo: Arc<dyn CommentRepository>,
    reaction_repo: Arc<dyn ReactionRepository>,
}

impl ReactionService {
    pub fn new(
        articles: Arc<ArticleService>,
        comment_repo: Arc<dyn CommentRepository>,
        reaction_repo: Arc<dyn ReactionRepository>,
    ) -> Self {
        Self {
            articles,
            comment_repo,
            reaction_repo,
        }
    }

    /// Toggle a like or dislike on an article
    pub async fn react_to_article(
        &self,
        user: &User,
        slug: &str,
        kind: ReactionKind,
    ) -> Result<Toggle, ReactionServiceError> {
        let article = self
            .articles
            .find(slug)
            .await?
            .ok_or_else(|| ReactionServiceError::NotFound(ARTICLE_SLUG_NOT_FOUND.to_string()))?;

        self.toggle(user, ReactionTarget::Article, article.id, kind).await
    }

    /// Toggle a like or dislike on a comment of the article at `slug`
    pub async fn react_to_comment(
        &self,
        user: &User,
        slug: &str,
        comment_id: i64,
        kind: ReactionKind,
    ) -> Result<Toggle, ReactionServiceError> {
        let article = self
            .articles
            .find(slug)
            .await?
            .ok_or_else(|| ReactionServiceError::NotFound(ARTICLE_SLUG_NOT_FOUND.to_string()))?;

        let comment = self
            .comment_repo
            .get_by_id(comment_id)
            .await
            .context("Failed to load comment")?
            .filter(|c| c.article_id == article.id)
            .ok_or_else(|| ReactionServiceError::NotFound(COMMENT_ID_NOT_FOUND.to_string()))?;

        self.toggle(user, ReactionTarget::Comment, comment.id, kind).await
    }

    pub async fn favorite(&self, user: &User, slug: &str) -> Result<FavoriteOutcome, ReactionServiceError> {
        let article = self.favorite_target(slug).await?;

        let added = self
            .reaction_repo
            .add(ReactionTarget::Article, article.id, user.id, ReactionKind::Favorite)
            .await
            .context("Failed to favorite article")?;
        if !added {
            return Ok(FavoriteOutcome::Unchanged(ALREADY_FAVORITED));
        }

        Ok(FavoriteOutcome::Changed(self.articles.view(article, Some(user)).await?))
    }

    pub async fn unfavorite(&self, user: &User, slug: &str) -> Result<FavoriteOutcome, ReactionServiceError> {
        let article = self.favorite_target(slug).await?;

        let removed = self
            .reaction_repo
            .remove(ReactionTarget::Article, article.id, user.id, ReactionKind::Favorite)
            .await
            .context("Failed to unfavorite article")?;
        if !removed {
            return Ok(FavoriteOutcome::Unchanged(NOT_FAVORITED));
        }

        Ok(FavoriteOutcome::Changed(self.articles.view(article, Some(user)).await?))
    }

    async fn favorite_target(&self, slug: &str) -> Result<Article, ReactionServiceError> {
        self.articles
            .find(slug)
            .await?
            .ok_or_else(|| ReactionServiceError::NotFound(FAVORITE_ARTICLE_NOT_FOUND.to_string()))
    }

    async fn toggle(
        &self,
        user: &User,
        target: ReactionTarget,
        target_id: i64,
        kind: ReactionKind,
    ) -> Result<Toggle, ReactionServiceError> {
        if let Some(opposite) = kind.opposite() {
            self.reaction_repo
                .remove(target, target_id, user.id, opposite)
                .await
                .context("Failed to clear opposite reaction")?;
        }

        let removed = self
            .reaction_repo
            .remove(target, target_id, user.id, kind)
            .await
            .context("Failed to remove reaction")?;
        if removed {
            tracing::debug!(user_id = user.id, %target, target_id, %kind, "Reaction withdrawn");
            return Ok(Toggle::Removed);
        }

        self.reaction_repo
            .add(target, target_id, user.id, kind)
            .await
            .context("Failed to add reaction")?;
        tracing::debug!(user_id = user.id, %target, target_id, %kind, "Reaction added");
        Ok(Toggle::Added)
    }
}
