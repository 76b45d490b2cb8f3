//! Services layer - Business logic
//!
//! Services own the rules of the application: validation, permission checks
//! and the coordination of repositories, tokens, mail and social providers.
//! Handlers in [`crate::api`] only translate HTTP to service calls.

pub mod article;
pub mod comment;
pub mod email;
pub mod password;
pub mod profile;
pub mod rating;
pub mod reaction;
pub mod social;
pub mod token;
pub mod user;
pub mod validation;

pub use article::{generate_slug, ArticleService, ArticleServiceError, ArticleView};
pub use comment::{CommentService, CommentServiceError, CommentView};
pub use email::{mailer_from_config, DynMailer, EmailTemplates, LogMailer, Mailer, OutgoingEmail, SmtpMailer};
pub use password::{hash_password, verify_password};
pub use profile::{ProfileService, ProfileServiceError};
pub use rating::{RatingService, RatingServiceError, RatingView};
pub use reaction::{FavoriteOutcome, ReactionService, ReactionServiceError, Toggle};
pub use social::{SocialAuthError, SocialAuthProvider, SocialProfile, SocialProviders};
pub use token::{Claims, Identity, TokenError, TokenService};
pub use user::{
    ActivationOutcome, AuthSession, LoginInput, RegisterInput, ResetPasswordInput, UserService,
    UserServiceError,
};
pub use validation::FieldErrors;
