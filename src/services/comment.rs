//! Comment service
//!
//! Comments belong to an article and may reply to another comment of the
//! same article, forming threads of any depth. Editing archives the previous
//! text as a history entry.

use crate::db::repositories::CommentRepository;
use crate::models::{
    Article, Comment, CommentHistory, CommentRecord, CreateCommentInput, Profile, ReactionCounts,
    User,
};
use crate::services::article::{ArticleService, ArticleServiceError, NOT_THE_AUTHOR};
use crate::services::profile::{ProfileService, ProfileServiceError};
use crate::services::validation::{FieldErrors, BLANK};
use anyhow::Context;
use std::collections::HashMap;
use std::sync::Arc;

pub const COMMENT_ARTICLE_NOT_FOUND: &str = "An article with this slug does not exist.";
pub const COMMENT_NOT_FOUND: &str = "Comment not found";
pub const PARENT_NOT_FOUND: &str = "A comment with this ID does not exist.";
pub const DELETE_TARGET_NOT_FOUND: &str = "A comment with this id does not exist.";
pub const EDIT_UNCHANGED: &str = "New comment same as the existing. Editing rejected";

#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(FieldErrors),

    #[error("{0}")]
    BadRequest(String),

    /// The caller did not write the comment
    #[error("{0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<ArticleServiceError> for CommentServiceError {
    fn from(err: ArticleServiceError) -> Self {
        match err {
            ArticleServiceError::InternalError(e) => Self::InternalError(e),
            other => Self::InternalError(anyhow::anyhow!(other.to_string())),
        }
    }
}

impl From<ProfileServiceError> for CommentServiceError {
    fn from(err: ProfileServiceError) -> Self {
        match err {
            ProfileServiceError::InternalError(e) => Self::InternalError(e),
            other => Self::InternalError(anyhow::anyhow!(other.to_string())),
        }
    }
}

/// A comment with its author, reaction counts and replies
#[derive(Debug, Clone)]
pub struct CommentView {
    pub comment: Comment,
    pub author: Profile,
    pub reactions: ReactionCounts,
    pub replies: Vec<CommentView>,
}

pub struct CommentService {
    articles: Arc<ArticleService>,
    comment_repo: Arc<dyn CommentRepository>,
    profiles: Arc<ProfileService>,
}

impl CommentService {
    pub fn new(
        articles: Arc<ArticleService>,
        comment_repo: Arc<dyn CommentRepository>,
        profiles: Arc<ProfileService>,
    ) -> Self {
        Self {
            articles,
            comment_repo,
            profiles,
        }
    }

    /// Top-level comments of an article, oldest first, with nested replies
    pub async fn list(&self, slug: &str, viewer: &User) -> Result<Vec<CommentView>, CommentServiceError> {
        let article = self.article(slug).await?;
        let records = self.article_comments(&article).await?;
        let (comments, decorations) = self.decorate(records, viewer).await?;
        Ok(assemble(&comments, None, &decorations))
    }

    pub async fn create(
        &self,
        user: &User,
        slug: &str,
        content: &str,
    ) -> Result<CommentView, CommentServiceError> {
        let article = self.article(slug).await?;
        self.insert(user, &article, None, content).await
    }

    /// Reply to comment `parent_id`
    pub async fn reply(
        &self,
        user: &User,
        slug: &str,
        parent_id: i64,
        content: &str,
    ) -> Result<CommentView, CommentServiceError> {
        let article = self.article(slug).await?;
        let parent = self
            .find_in(&article, parent_id)
            .await?
            .ok_or_else(|| CommentServiceError::NotFound(PARENT_NOT_FOUND.to_string()))?;

        self.insert(user, &article, Some(parent.id), content).await
    }

    /// One comment with its replies
    pub async fn get(
        &self,
        slug: &str,
        id: i64,
        viewer: &User,
    ) -> Result<CommentView, CommentServiceError> {
        let article = self.article(slug).await?;
        let records = self.article_comments(&article).await?;
        let (comments, decorations) = self.decorate(records, viewer).await?;
        let comment = comments
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| CommentServiceError::NotFound(COMMENT_NOT_FOUND.to_string()))?;

        view_of(comment, &comments, &decorations)
            .ok_or_else(|| CommentServiceError::NotFound(COMMENT_NOT_FOUND.to_string()))
    }

    /// Replace the text of a comment written by `user`
    pub async fn edit(
        &self,
        user: &User,
        slug: &str,
        id: i64,
        content: &str,
    ) -> Result<CommentView, CommentServiceError> {
        check_content(content)?;

        let article = self.article(slug).await?;
        let comment = self
            .find_in(&article, id)
            .await?
            .ok_or_else(|| CommentServiceError::NotFound(COMMENT_NOT_FOUND.to_string()))?;

        if !user.owns(comment.user_id) {
            return Err(CommentServiceError::Forbidden(NOT_THE_AUTHOR.to_string()));
        }
        if comment.content == content {
            return Err(CommentServiceError::BadRequest(EDIT_UNCHANGED.to_string()));
        }

        self.comment_repo
            .update_content(&comment, content)
            .await
            .context("Failed to edit comment")?;
        tracing::debug!(comment_id = comment.id, "Comment edited");

        self.get(slug, id, user).await
    }

    pub async fn delete(&self, user: &User, slug: &str, id: i64) -> Result<(), CommentServiceError> {
        let article = self.article(slug).await?;
        let comment = self
            .find_in(&article, id)
            .await?
            .ok_or_else(|| CommentServiceError::NotFound(DELETE_TARGET_NOT_FOUND.to_string()))?;

        if !user.owns(comment.user_id) {
            return Err(CommentServiceError::Forbidden(NOT_THE_AUTHOR.to_string()));
        }

        self.comment_repo
            .delete(comment.id)
            .await
            .context("Failed to delete comment")?;

        tracing::info!(comment_id = comment.id, article_id = article.id, "Comment deleted");
        Ok(())
    }

    /// Earlier versions of a comment, oldest first
    pub async fn history(&self, slug: &str, id: i64) -> Result<Vec<CommentHistory>, CommentServiceError> {
        let article = self.article(slug).await?;
        let comment = self
            .find_in(&article, id)
            .await?
            .ok_or_else(|| CommentServiceError::NotFound(COMMENT_NOT_FOUND.to_string()))?;

        Ok(self
            .comment_repo
            .history(comment.id)
            .await
            .context("Failed to load comment history")?)
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    async fn article(&self, slug: &str) -> Result<Article, CommentServiceError> {
        self.articles
            .find(slug)
            .await?
            .ok_or_else(|| CommentServiceError::NotFound(COMMENT_ARTICLE_NOT_FOUND.to_string()))
    }

    async fn article_comments(&self, article: &Article) -> Result<Vec<CommentRecord>, CommentServiceError> {
        Ok(self
            .comment_repo
            .list_by_article(article.id)
            .await
            .context("Failed to list comments")?)
    }

    /// A comment of `article`, or `None` if it is missing or on another article
    async fn find_in(&self, article: &Article, id: i64) -> Result<Option<Comment>, CommentServiceError> {
        Ok(self
            .comment_repo
            .get_by_id(id)
            .await
            .context("Failed to load comment")?
            .filter(|c| c.article_id == article.id))
    }

    async fn insert(
        &self,
        user: &User,
        article: &Article,
        parent_id: Option<i64>,
        content: &str,
    ) -> Result<CommentView, CommentServiceError> {
        check_content(content)?;

        let comment = self
            .comment_repo
            .create(&CreateCommentInput {
                article_id: article.id,
                user_id: user.id,
                parent_id,
                content: content.to_string(),
            })
            .await
            .context("Failed to create comment")?;

        tracing::debug!(comment_id = comment.id, article_id = article.id, ?parent_id, "Comment created");

        Ok(CommentView {
            author: Profile::from_user(user, false),
            comment,
            reactions: ReactionCounts::default(),
            replies: Vec::new(),
        })
    }

    /// Split records into comments and their author profile and reaction
    /// counts keyed by comment id. The follow flags take a single query.
    async fn decorate(
        &self,
        records: Vec<CommentRecord>,
        viewer: &User,
    ) -> Result<(Vec<Comment>, HashMap<i64, (Profile, ReactionCounts)>), CommentServiceError> {
        let author_ids: Vec<i64> = records.iter().map(|r| r.author.id).collect();
        let followed = self.profiles.followed_by(Some(viewer), &author_ids).await?;

        let mut comments = Vec::with_capacity(records.len());
        let mut decorations = HashMap::with_capacity(records.len());
        for record in records {
            let author = Profile::from_user(&record.author, followed.contains(&record.author.id));
            decorations.insert(record.comment.id, (author, record.reactions));
            comments.push(record.comment);
        }

        Ok((comments, decorations))
    }
}

fn check_content(content: &str) -> Result<(), CommentServiceError> {
    if content.trim().is_empty() {
        return Err(CommentServiceError::Validation(FieldErrors::single("content", BLANK)));
    }
    Ok(())
}

/// Children of `parent` in creation order, each with its own subtree
fn assemble(
    comments: &[Comment],
    parent: Option<i64>,
    decorations: &HashMap<i64, (Profile, ReactionCounts)>,
) -> Vec<CommentView> {
    comments
        .iter()
        .filter(|c| c.parent_id == parent)
        .filter_map(|c| view_of(c.clone(), comments, decorations))
        .collect()
}

fn view_of(
    comment: Comment,
    comments: &[Comment],
    decorations: &HashMap<i64, (Profile, ReactionCounts)>,
) -> Option<CommentView> {
    let (author, reactions) = decorations.get(&comment.id).cloned()?;
    let replies = assemble(comments, Some(comment.id), decorations);

    Some(CommentView {
        comment,
        author,
        reactions,
        replies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        FollowRepository, ReactionRepository, SqlxArticleRepository, SqlxCommentRepository,
        SqlxFollowRepository, SqlxReactionRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreateArticleInput, ReactionKind, ReactionTarget};

    struct Harness {
        service: CommentService,
        reactions: Arc<dyn ReactionRepository>,
        follows: Arc<dyn FollowRepository>,
        jake: User,
        anne: User,
        slug: String,
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

        let reactions = SqlxReactionRepository::boxed(pool.clone());
        let follows = SqlxFollowRepository::boxed(pool.clone());
        let profiles = Arc::new(ProfileService::new(users.clone(), follows.clone()));
        let articles = Arc::new(ArticleService::new(
            SqlxArticleRepository::boxed(pool.clone()),
            reactions.clone(),
            profiles.clone(),
        ));
        let slug = articles
            .create(&jake, CreateArticleInput::new("Threads", "d", "b"))
            .await
            .unwrap()
            .article
            .slug;

        Harness {
            service: CommentService::new(articles, SqlxCommentRepository::boxed(pool), profiles),
            reactions,
            follows,
            jake,
            anne,
            slug,
        }
    }

    #[tokio::test]
    async fn test_threads() {
        let h = setup_test_service().await;
        let root = h.service.create(&h.jake, &h.slug, "root").await.unwrap();
        let second = h.service.create(&h.anne, &h.slug, "second").await.unwrap();
        let reply = h
            .service
            .reply(&h.anne, &h.slug, root.comment.id, "reply")
            .await
            .unwrap();
        h.service
            .reply(&h.jake, &h.slug, reply.comment.id, "nested")
            .await
            .unwrap();

        let threads = h.service.list(&h.slug, &h.jake).await.unwrap();
        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].comment.id, root.comment.id);
        assert_eq!(threads[1].comment.id, second.comment.id);
        assert_eq!(threads[0].replies.len(), 1);
        assert_eq!(threads[0].replies[0].author.username, "anne");
        assert_eq!(threads[0].replies[0].replies[0].comment.content, "nested");

        let single = h.service.get(&h.slug, reply.comment.id, &h.jake).await.unwrap();
        assert_eq!(single.comment.parent_id, Some(root.comment.id));
        assert_eq!(single.replies.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_targets() {
        let h = setup_test_service().await;

        let err = h.service.create(&h.jake, "nope", "hi").await.unwrap_err();
        assert_eq!(err.to_string(), COMMENT_ARTICLE_NOT_FOUND);

        let err = h.service.reply(&h.jake, &h.slug, 404, "hi").await.unwrap_err();
        assert_eq!(err.to_string(), PARENT_NOT_FOUND);

        let err = h.service.get(&h.slug, 404, &h.jake).await.unwrap_err();
        assert_eq!(err.to_string(), COMMENT_NOT_FOUND);

        let err = h.service.delete(&h.jake, &h.slug, 404).await.unwrap_err();
        assert_eq!(err.to_string(), DELETE_TARGET_NOT_FOUND);

        let err = h.service.create(&h.jake, &h.slug, "   ").await.unwrap_err();
        assert!(matches!(err, CommentServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_edit_records_history() {
        let h = setup_test_service().await;
        let created = h.service.create(&h.jake, &h.slug, "first take").await.unwrap();
        let id = created.comment.id;

        let err = h
            .service
            .edit(&h.jake, &h.slug, id, "first take")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), EDIT_UNCHANGED);

        let err = h
            .service
            .edit(&h.anne, &h.slug, id, "hijacked")
            .await
            .unwrap_err();
        assert!(matches!(err, CommentServiceError::Forbidden(_)));

        let edited = h
            .service
            .edit(&h.jake, &h.slug, id, "second take")
            .await
            .unwrap();
        assert_eq!(edited.comment.content, "second take");

        let history = h.service.history(&h.slug, id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "first take");
        assert_eq!(history[0].comment_id, id);
    }

    #[tokio::test]
    async fn test_delete_is_author_only() {
        let h = setup_test_service().await;
        let created = h.service.create(&h.jake, &h.slug, "mine").await.unwrap();
        let id = created.comment.id;

        let err = h.service.delete(&h.anne, &h.slug, id).await.unwrap_err();
        assert!(matches!(err, CommentServiceError::Forbidden(_)));

        h.service.delete(&h.jake, &h.slug, id).await.unwrap();
        assert!(h.service.list(&h.slug, &h.jake).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_views_carry_reaction_counts() {
        let h = setup_test_service().await;
        let created = h.service.create(&h.jake, &h.slug, "like me").await.unwrap();
        h.reactions
            .add(ReactionTarget::Comment, created.comment.id, h.anne.id, ReactionKind::Like)
            .await
            .unwrap();

        let view = h.service.get(&h.slug, created.comment.id, &h.anne).await.unwrap();
        assert_eq!(view.reactions.likes, 1);
        assert_eq!(view.author.username, "jake");
    }

    #[tokio::test]
    async fn test_author_follow_flags_follow_the_viewer() {
        let h = setup_test_service().await;
        let root = h.service.create(&h.jake, &h.slug, "from jake").await.unwrap();
        h.service
            .reply(&h.anne, &h.slug, root.comment.id, "from anne")
            .await
            .unwrap();
        h.service.create(&h.jake, &h.slug, "jake again").await.unwrap();
        h.follows.follow(h.anne.id, h.jake.id).await.unwrap();

        let threads = h.service.list(&h.slug, &h.anne).await.unwrap();
        assert!(threads.iter().all(|t| t.author.following));
        assert!(!threads[0].replies[0].author.following);

        let threads = h.service.list(&h.slug, &h.jake).await.unwrap();
        assert!(threads.iter().all(|t| !t.author.following));
    }
}
