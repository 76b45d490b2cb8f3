//! Database repositories
//!
//! One repository per aggregate. Each trait has an SQLx implementation that
//! dispatches on the configured driver.

pub mod article;
pub mod comment;
pub mod follow;
pub mod rating;
pub mod reaction;
pub mod user;

pub use article::{ArticleRepository, SqlxArticleRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use follow::{FollowRepository, SqlxFollowRepository};
pub use rating::{RatingRepository, SqlxRatingRepository};
pub use reaction::{ReactionRepository, SqlxReactionRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// `?, ?, ?` for an `IN (...)` list of `count` values
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }
}
