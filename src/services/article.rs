//! Article service
//!
//! Implements business logic for articles:
//! - create, read, update and delete with author-only writes
//! - filtered, paginated listing
//! - assembling the article view (author profile, reaction counts,
//!   favorite flag and rating summary)

use crate::db::repositories::{ArticleRepository, ReactionRepository};
use crate::models::{
    Article, ArticleFilter, ArticleRecord, CreateArticleInput, ListParams, PagedResult, Profile,
    RatingSummary, ReactionCounts, ReactionKind, ReactionTarget, UpdateArticleInput, User,
};
use crate::services::profile::{ProfileService, ProfileServiceError};
use crate::services::validation::{too_long, FieldErrors, BLANK};
use anyhow::Context;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

pub const MAX_TITLE_LENGTH: usize = 100;
pub const MAX_DESCRIPTION_LENGTH: usize = 100;
pub const MAX_IMAGES: usize = 20;

pub const ARTICLE_NOT_FOUND: &str = "Article not found";
pub const NOT_THE_AUTHOR: &str = "You do not have permission to perform this action.";

/// Error types for article service operations
#[derive(Debug, thiserror::Error)]
pub enum ArticleServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(FieldErrors),

    /// The caller is not the article's author
    #[error("{0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<FieldErrors> for ArticleServiceError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<ProfileServiceError> for ArticleServiceError {
    fn from(err: ProfileServiceError) -> Self {
        match err {
            ProfileServiceError::NotFound(msg) => Self::NotFound(msg),
            ProfileServiceError::BadRequest(msg) => Self::Validation(FieldErrors::single("author", msg)),
            ProfileServiceError::InternalError(e) => Self::InternalError(e),
        }
    }
}

/// An article with everything its representation needs
#[derive(Debug, Clone)]
pub struct ArticleView {
    pub article: Article,
    pub author: Profile,
    pub reactions: ReactionCounts,
    /// Whether the viewer has favorited the article
    pub favorited: bool,
    pub rating: RatingSummary,
}

pub struct ArticleService {
    repo: Arc<dyn ArticleRepository>,
    reaction_repo: Arc<dyn ReactionRepository>,
    profiles: Arc<ProfileService>,
}

impl ArticleService {
    pub fn new(
        repo: Arc<dyn ArticleRepository>,
        reaction_repo: Arc<dyn ReactionRepository>,
        profiles: Arc<ProfileService>,
    ) -> Self {
        Self {
            repo,
            reaction_repo,
            profiles,
        }
    }

    /// Create an article owned by `author`.
    ///
    /// The slug is derived from the title plus a random suffix, so two
    /// articles with the same title get different slugs.
    pub async fn create(
        &self,
        author: &User,
        input: CreateArticleInput,
    ) -> Result<ArticleView, ArticleServiceError> {
        let mut errors = FieldErrors::new();
        check_text("title", &input.title, MAX_TITLE_LENGTH, &mut errors);
        check_text("description", &input.description, MAX_DESCRIPTION_LENGTH, &mut errors);
        if input.body.trim().is_empty() {
            errors.add("body", BLANK);
        }
        check_images(&input.images, &mut errors);
        errors.into_result()?;

        let slug = article_slug(&input.title);
        let article = self
            .repo
            .create(&Article::new(slug, input, author.id))
            .await
            .context("Failed to create article")?;

        tracing::info!(article_id = article.id, slug = %article.slug, "Article created");
        self.view(article, Some(author)).await
    }

    /// Fetch an article by slug, or `None`
    pub async fn find(&self, slug: &str) -> Result<Option<Article>, ArticleServiceError> {
        Ok(self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to get article by slug")?)
    }

    /// Fetch an article by slug, failing with `NotFound`
    pub async fn get_article(&self, slug: &str) -> Result<Article, ArticleServiceError> {
        self.find(slug)
            .await?
            .ok_or_else(|| ArticleServiceError::NotFound(ARTICLE_NOT_FOUND.to_string()))
    }

    pub async fn get(
        &self,
        slug: &str,
        viewer: Option<&User>,
    ) -> Result<ArticleView, ArticleServiceError> {
        let record = self
            .repo
            .get_record_by_slug(slug)
            .await
            .context("Failed to load article")?
            .ok_or_else(|| ArticleServiceError::NotFound(ARTICLE_NOT_FOUND.to_string()))?;
        let mut views = self.views(vec![record], viewer).await?;
        views
            .pop()
            .ok_or_else(|| ArticleServiceError::NotFound(ARTICLE_NOT_FOUND.to_string()))
    }

    /// Apply a partial update. A new title produces a new slug.
    pub async fn update(
        &self,
        user: &User,
        slug: &str,
        input: UpdateArticleInput,
    ) -> Result<ArticleView, ArticleServiceError> {
        let mut article = self.get_article(slug).await?;
        if !user.owns(article.author_id) {
            return Err(ArticleServiceError::Forbidden(NOT_THE_AUTHOR.to_string()));
        }

        let mut errors = FieldErrors::new();
        if let Some(title) = &input.title {
            check_text("title", title, MAX_TITLE_LENGTH, &mut errors);
        }
        if let Some(description) = &input.description {
            check_text("description", description, MAX_DESCRIPTION_LENGTH, &mut errors);
        }
        if let Some(body) = &input.body {
            if body.trim().is_empty() {
                errors.add("body", BLANK);
            }
        }
        if let Some(images) = &input.images {
            check_images(images, &mut errors);
        }
        errors.into_result()?;

        if !input.has_changes() {
            return self.view(article, Some(user)).await;
        }

        if let Some(title) = input.title {
            if title != article.title {
                article.slug = article_slug(&title);
            }
            article.title = title;
        }
        if let Some(description) = input.description {
            article.description = description;
        }
        if let Some(body) = input.body {
            article.body = body;
        }
        if let Some(images) = input.images {
            article.images = images;
        }
        if let Some(tag_list) = input.tag_list {
            article.tag_list = tag_list;
        }

        let updated = self
            .repo
            .update(&article)
            .await
            .context("Failed to update article")?;

        tracing::info!(article_id = updated.id, slug = %updated.slug, "Article updated");
        self.view(updated, Some(user)).await
    }

    pub async fn delete(&self, user: &User, slug: &str) -> Result<(), ArticleServiceError> {
        let article = self.get_article(slug).await?;
        if !user.owns(article.author_id) {
            return Err(ArticleServiceError::Forbidden(NOT_THE_AUTHOR.to_string()));
        }

        self.repo
            .delete(article.id)
            .await
            .context("Failed to delete article")?;

        tracing::info!(article_id = article.id, slug = %article.slug, "Article deleted");
        Ok(())
    }

    /// One page of articles matching `filter`, in title order
    pub async fn list(
        &self,
        filter: &ArticleFilter,
        params: &ListParams,
        viewer: Option<&User>,
    ) -> Result<PagedResult<ArticleView>, ArticleServiceError> {
        let (records, total) = self
            .repo
            .list(filter, params)
            .await
            .context("Failed to list articles")?;

        let views = self.views(records, viewer).await?;
        Ok(PagedResult::new(views, total, params))
    }

    /// The view of `article` for `viewer`, reloaded with its aggregates
    pub async fn view(
        &self,
        article: Article,
        viewer: Option<&User>,
    ) -> Result<ArticleView, ArticleServiceError> {
        self.get(&article.slug, viewer).await
    }

    /// Add the viewer's favorite and follow flags to loaded records. Costs
    /// one query per flag regardless of how many records there are.
    async fn views(
        &self,
        records: Vec<ArticleRecord>,
        viewer: Option<&User>,
    ) -> Result<Vec<ArticleView>, ArticleServiceError> {
        let article_ids: Vec<i64> = records.iter().map(|r| r.article.id).collect();
        let author_ids: Vec<i64> = records.iter().map(|r| r.author.id).collect();

        let favorited = match viewer {
            Some(viewer) => self
                .reaction_repo
                .reacted_among(ReactionTarget::Article, &article_ids, viewer.id, ReactionKind::Favorite)
                .await
                .context("Failed to check favorites")?,
            None => HashSet::new(),
        };
        let followed = self.profiles.followed_by(viewer, &author_ids).await?;

        Ok(records
            .into_iter()
            .map(|record| ArticleView {
                author: Profile::from_user(&record.author, followed.contains(&record.author.id)),
                favorited: favorited.contains(&record.article.id),
                article: record.article,
                reactions: record.reactions,
                rating: record.rating,
            })
            .collect())
    }
}

fn check_text(field: &str, value: &str, max: usize, errors: &mut FieldErrors) {
    if value.trim().is_empty() {
        errors.add(field, BLANK);
    } else if value.chars().count() > max {
        errors.add(field, too_long(max));
    }
}

fn check_images(images: &[String], errors: &mut FieldErrors) {
    if images.len() > MAX_IMAGES {
        errors.add(
            "images",
            format!("Ensure this field has no more than {} elements.", MAX_IMAGES),
        );
    }
}

/// Slug for a new or retitled article
fn article_slug(title: &str) -> String {
    generate_slug(&format!("{} {}", title, Uuid::new_v4().simple()))
}

/// Generate a URL slug.
///
/// Characters other than ASCII letters, digits, underscores, hyphens and
/// whitespace are dropped. Runs of whitespace and hyphens become a single
/// hyphen and the result is lowercased with no leading or trailing hyphen.
pub fn generate_slug(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_hyphen = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            result.push(c.to_ascii_lowercase());
            prev_hyphen = false;
        } else if c == '-' || c.is_whitespace() {
            if !prev_hyphen && !result.is_empty() {
                result.push('-');
                prev_hyphen = true;
            }
        }
    }

    result.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        FollowRepository, RatingRepository, SqlxArticleRepository, SqlxFollowRepository,
        SqlxRatingRepository, SqlxReactionRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};

    struct Harness {
        service: ArticleService,
        ratings: Arc<dyn RatingRepository>,
        reactions: Arc<dyn ReactionRepository>,
        follows: Arc<dyn FollowRepository>,
        jake: User,
        anne: User,
    }

    async fn setup_test_service() -> Harness {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::boxed(pool.clone());
        let jake = users
            .create(&User::new("jake".into(), "jake@jake.jake".into(), "h".into()))
            .await
            .unwrap();
        let anne = users
            .create(&User::new("anne".into(), "anne@example.com".into(), "h".into()))
            .await
            .unwrap();

        let ratings = SqlxRatingRepository::boxed(pool.clone());
        let reactions = SqlxReactionRepository::boxed(pool.clone());
        let follows = SqlxFollowRepository::boxed(pool.clone());
        let profiles = Arc::new(ProfileService::new(users.clone(), follows.clone()));
        let service = ArticleService::new(
            SqlxArticleRepository::boxed(pool),
            reactions.clone(),
            profiles,
        );

        Harness {
            service,
            ratings,
            reactions,
            follows,
            jake,
            anne,
        }
    }

    fn dragon() -> CreateArticleInput {
        CreateArticleInput::new(
            "How to train your dragon",
            "Ever wonder how?",
            "You have to believe",
        )
        .with_tags(&["dragons", "training"])
    }

    #[test]
    fn test_generate_slug() {
        assert_eq!(generate_slug("How to train your dragon"), "how-to-train-your-dragon");
        assert_eq!(generate_slug("  Hello,   World! "), "hello-world");
        assert_eq!(generate_slug("snake_case -- kept"), "snake_case-kept");
        assert_eq!(generate_slug("Café au lait"), "caf-au-lait");
        assert_eq!(generate_slug("!!!"), "");
    }

    #[tokio::test]
    async fn test_create_article() {
        let h = setup_test_service().await;
        let view = h.service.create(&h.jake, dragon()).await.unwrap();

        assert!(view.article.slug.starts_with("how-to-train-your-dragon-"));
        assert_eq!(view.article.tag_list, vec!["dragons", "training"]);
        assert_eq!(view.author.username, "jake");
        assert_eq!(view.reactions, ReactionCounts::default());
        assert_eq!(view.rating.average, None);
        assert!(!view.favorited);

        let other = h.service.create(&h.jake, dragon()).await.unwrap();
        assert_ne!(other.article.slug, view.article.slug);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let h = setup_test_service().await;
        let mut input = CreateArticleInput::new("", "x".repeat(101), "");
        input.images = vec!["https://img.example.com/a.png".to_string(); 21];

        let err = h.service.create(&h.jake, input).await.unwrap_err();
        let ArticleServiceError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("title").unwrap()[0], BLANK);
        assert_eq!(errors.get("description").unwrap()[0], too_long(100));
        assert_eq!(errors.get("body").unwrap()[0], BLANK);
        assert!(errors.get("images").is_some());
    }

    #[tokio::test]
    async fn test_update_is_author_only_and_reslugs() {
        let h = setup_test_service().await;
        let created = h.service.create(&h.jake, dragon()).await.unwrap();
        let slug = created.article.slug.clone();

        let err = h
            .service
            .update(&h.anne, &slug, UpdateArticleInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ArticleServiceError::Forbidden(_)));

        let same_title = h
            .service
            .update(
                &h.jake,
                &slug,
                UpdateArticleInput {
                    body: Some("With two hands".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(same_title.article.slug, slug);
        assert_eq!(same_title.article.body, "With two hands");

        let retitled = h
            .service
            .update(
                &h.jake,
                &slug,
                UpdateArticleInput {
                    title: Some("Did you train your dragon?".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(retitled.article.slug.starts_with("did-you-train-your-dragon-"));
        assert!(h.service.find(&slug).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_is_author_only() {
        let h = setup_test_service().await;
        let slug = h.service.create(&h.jake, dragon()).await.unwrap().article.slug;

        assert!(matches!(
            h.service.delete(&h.anne, &slug).await,
            Err(ArticleServiceError::Forbidden(_))
        ));
        h.service.delete(&h.jake, &slug).await.unwrap();
        assert!(matches!(
            h.service.get(&slug, None).await,
            Err(ArticleServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_view_includes_reactions_and_ratings() {
        let h = setup_test_service().await;
        let view = h.service.create(&h.jake, dragon()).await.unwrap();
        let id = view.article.id;

        h.reactions
            .add(ReactionTarget::Article, id, h.anne.id, ReactionKind::Like)
            .await
            .unwrap();
        h.reactions
            .add(ReactionTarget::Article, id, h.anne.id, ReactionKind::Favorite)
            .await
            .unwrap();
        h.ratings.upsert(h.anne.id, id, 4).await.unwrap();

        let seen_by_anne = h.service.get(&view.article.slug, Some(&h.anne)).await.unwrap();
        assert_eq!(seen_by_anne.reactions.likes, 1);
        assert_eq!(seen_by_anne.reactions.favorites, 1);
        assert!(seen_by_anne.favorited);
        assert_eq!(seen_by_anne.rating.average, Some(4.0));
        assert_eq!(seen_by_anne.rating.count, 1);

        let anonymous = h.service.get(&view.article.slug, None).await.unwrap();
        assert!(!anonymous.favorited);
    }

    #[tokio::test]
    async fn test_list_flags_each_article_for_the_viewer() {
        let h = setup_test_service().await;
        let dragon = h.service.create(&h.jake, dragon()).await.unwrap();
        let alpha = h
            .service
            .create(&h.anne, CreateArticleInput::new("Alpha", "first", "body"))
            .await
            .unwrap();
        h.reactions
            .add(ReactionTarget::Article, dragon.article.id, h.anne.id, ReactionKind::Favorite)
            .await
            .unwrap();
        h.follows.follow(h.anne.id, h.jake.id).await.unwrap();

        let page = h
            .service
            .list(&ArticleFilter::default(), &ListParams::default(), Some(&h.anne))
            .await
            .unwrap();
        let titles: Vec<_> = page.items.iter().map(|v| v.article.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "How to train your dragon"]);

        let alpha_view = &page.items[0];
        assert_eq!(alpha_view.article.id, alpha.article.id);
        assert!(!alpha_view.favorited);
        assert!(!alpha_view.author.following);

        let dragon_view = &page.items[1];
        assert!(dragon_view.favorited);
        assert!(dragon_view.author.following);
        assert_eq!(dragon_view.author.username, "jake");
        assert_eq!(dragon_view.reactions.favorites, 1);
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let h = setup_test_service().await;
        h.service.create(&h.jake, dragon()).await.unwrap();
        h.service
            .create(&h.anne, CreateArticleInput::new("Alpha", "first", "body").with_tags(&["greek"]))
            .await
            .unwrap();
        h.service
            .create(&h.anne, CreateArticleInput::new("Beta", "second", "body"))
            .await
            .unwrap();

        let all = h
            .service
            .list(&ArticleFilter::default(), &ListParams::default(), None)
            .await
            .unwrap();
        assert_eq!(all.total, 3);
        let titles: Vec<_> = all.items.iter().map(|v| v.article.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "Beta", "How to train your dragon"]);

        let by_author = ArticleFilter {
            author: Some("anne".to_string()),
            ..Default::default()
        };
        let page = h
            .service
            .list(&by_author, &ListParams::new(1, 1), None)
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].article.title, "Beta");
        assert_eq!(page.next_offset(), None);
        assert_eq!(page.previous_offset(), Some(0));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn slugs_are_url_safe(text in "\\PC{0,60}") {
                let slug = generate_slug(&text);
                prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-'));
                prop_assert!(!slug.starts_with('-') && !slug.ends_with('-'));
                prop_assert!(!slug.contains("--"));
            }

            #[test]
            fn slugging_is_idempotent(text in "[a-zA-Z0-9 _-]{0,40}") {
                let once = generate_slug(&text);
                prop_assert_eq!(generate_slug(&once), once.clone());
            }
        }
    }
}
