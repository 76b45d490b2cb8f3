//! Rating service: one star rating per reader per article

use crate::db::repositories::RatingRepository;
use crate::models::{Article, Rating, User, MAX_STARS, MIN_STARS};
use crate::services::article::{ArticleService, ArticleServiceError};
use crate::services::validation::FieldErrors;
use anyhow::Context;
use std::sync::Arc;

pub const RATING_ARTICLE_NOT_FOUND: &str = "Article not found";
pub const STARS_OUT_OF_RANGE: &str = "Star ratings should be from 1 and 5 stars";
pub const STARS_TOO_LARGE: &str = "Ensure this value is less than or equal to 32767.";
pub const STARS_TOO_SMALL: &str = "Ensure this value is greater than or equal to 0.";
pub const CANNOT_RATE_OWN: &str = "You cannot rate your own article";

#[derive(Debug, thiserror::Error)]
pub enum RatingServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(FieldErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<ArticleServiceError> for RatingServiceError {
    fn from(err: ArticleServiceError) -> Self {
        match err {
            ArticleServiceError::InternalError(e) => Self::InternalError(e),
            other => Self::InternalError(anyhow::anyhow!(other.to_string())),
        }
    }
}

/// A rating with the names the API shows instead of ids
#[derive(Debug, Clone)]
pub struct RatingView {
    pub rating: Rating,
    pub username: String,
    pub article_slug: String,
}

pub struct RatingService {
    articles: Arc<ArticleService>,
    rating_repo: Arc<dyn RatingRepository>,
}

impl RatingService {
    pub fn new(
        articles: Arc<ArticleService>,
        rating_repo: Arc<dyn RatingRepository>,
    ) -> Self {
        Self {
            articles,
            rating_repo,
        }
    }

    pub async fn list(&self, slug: &str) -> Result<Vec<RatingView>, RatingServiceError> {
        let article = self.article(slug).await?;
        let ratings = self
            .rating_repo
            .list_by_article(article.id)
            .await
            .context("Failed to list ratings")?;

        Ok(ratings
            .into_iter()
            .map(|(rating, username)| RatingView {
                rating,
                username,
                article_slug: article.slug.clone(),
            })
            .collect())
    }

    /// Rate an article, replacing any earlier rating by the same reader
    pub async fn rate(&self, user: &User, slug: &str, stars: i64) -> Result<RatingView, RatingServiceError> {
        let article = self.article(slug).await?;
        let stars = check_stars(stars)?;
        if user.owns(article.author_id) {
            return Err(RatingServiceError::BadRequest(CANNOT_RATE_OWN.to_string()));
        }

        let rating = self
            .rating_repo
            .upsert(user.id, article.id, stars)
            .await
            .context("Failed to save rating")?;

        tracing::debug!(user_id = user.id, article_id = article.id, stars, "Article rated");
        Ok(RatingView {
            rating,
            username: user.username.clone(),
            article_slug: article.slug,
        })
    }

    async fn article(&self, slug: &str) -> Result<Article, RatingServiceError> {
        self.articles
            .find(slug)
            .await?
            .ok_or_else(|| RatingServiceError::NotFound(RATING_ARTICLE_NOT_FOUND.to_string()))
    }
}

/// Range-check a star value. Values outside a 16-bit column get the column's
/// own message.
fn check_stars(stars: i64) -> Result<i32, RatingServiceError> {
    let message = if stars > i16::MAX as i64 {
        STARS_TOO_LARGE
    } else if stars < 0 {
        STARS_TOO_SMALL
    } else if !(MIN_STARS..=MAX_STARS).contains(&stars) {
        STARS_OUT_OF_RANGE
    } else {
        return Ok(stars as i32);
    };
    Err(RatingServiceError::Validation(FieldErrors::single("stars", message)))
}
