//! Data models
//!
//! Database entities (User, Article, Comment, Rating, Reaction) and the
//! input and pagination types the services accept.

mod article;
mod comment;
mod rating;
mod reaction;
mod user;

pub use article::{
    Article, ArticleFilter, ArticleRecord, CreateArticleInput, ListParams, PagedResult, UpdateArticleInput,
    DEFAULT_LIMIT, MAX_LIMIT,
};
pub use comment::{Comment, CommentHistory, CommentRecord, CreateCommentInput};
pub use rating::{Rating, RatingSummary, MAX_STARS, MIN_STARS};
pub use reaction::{Reaction, ReactionCounts, ReactionKind, ReactionTarget};
pub use user::{Profile, UpdateUserInput, User, UserStatus, UNUSABLE_PASSWORD_PREFIX};
