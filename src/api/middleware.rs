//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The JSON error type and service error conversions
//! - Bearer token authentication (required and optional)

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;

use crate::config::Config;
use crate::db::repositories::{
    SqlxArticleRepository, SqlxCommentRepository, SqlxFollowRepository, SqlxRatingRepository,
    SqlxReactionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{
    ArticleService, ArticleServiceError, CommentService, CommentServiceError, DynMailer,
    EmailTemplates, FieldErrors, ProfileService, ProfileServiceError, RatingService,
    RatingServiceError, ReactionService, ReactionServiceError, SocialProviders, TokenError,
    TokenService, UserService, UserServiceError,
};

pub const CREDENTIALS_MISSING: &str = "Authentication credentials were not provided.";
pub const USER_NOT_FOUND: &str = "User matching this token was not found.";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub user_service: Arc<UserService>,
    pub profile_service: Arc<ProfileService>,
    pub article_service: Arc<ArticleService>,
    pub reaction_service: Arc<ReactionService>,
    pub rating_service: Arc<RatingService>,
    pub comment_service: Arc<CommentService>,
}

impl AppState {
    /// Wire repositories and services over `pool`
    pub fn build(
        pool: DynDatabasePool,
        config: &Config,
        mailer: DynMailer,
        social: SocialProviders,
    ) -> Self {
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let follow_repo = SqlxFollowRepository::boxed(pool.clone());
        let article_repo = SqlxArticleRepository::boxed(pool.clone());
        let comment_repo = SqlxCommentRepository::boxed(pool.clone());
        let rating_repo = SqlxRatingRepository::boxed(pool.clone());
        let reaction_repo = SqlxReactionRepository::boxed(pool.clone());

        let user_service = Arc::new(UserService::new(
            user_repo.clone(),
            TokenService::from_config(&config.auth),
            mailer,
            EmailTemplates::new(&config.email),
            social,
        ));
        let profile_service = Arc::new(ProfileService::new(user_repo.clone(), follow_repo));
        let article_service = Arc::new(ArticleService::new(
            article_repo,
            reaction_repo.clone(),
            profile_service.clone(),
        ));
        let reaction_service = Arc::new(ReactionService::new(
            article_service.clone(),
            comment_repo.clone(),
            reaction_repo,
        ));
        let rating_service = Arc::new(RatingService::new(article_service.clone(), rating_repo));
        let comment_service = Arc::new(CommentService::new(
            article_service.clone(),
            comment_repo,
            profile_service.clone(),
        ));

        Self {
            pool,
            user_service,
            profile_service,
            article_service,
            reaction_service,
            rating_service,
            comment_service,
        }
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// The user behind the request, if any.
///
/// Filled by [`optional_auth`] on public routes and by [`require_auth`] on
/// protected ones.
#[derive(Debug, Clone)]
pub struct Viewer(pub Option<User>);

impl Viewer {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Viewer {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Viewer(
            parts
                .extensions
                .get::<AuthenticatedUser>()
                .map(|u| u.0.clone()),
        ))
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    /// 400 with per-field messages under `details`
    pub fn fields(errors: &FieldErrors) -> Self {
        let details = serde_json::to_value(errors).unwrap_or(serde_json::Value::Null);
        Self::with_details(
            "VALIDATION_ERROR",
            errors.first_message().unwrap_or("Invalid input"),
            details,
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    /// Log the underlying failure and hide it from the client
    fn internal(err: anyhow::Error) -> Self {
        tracing::error!("Request failed: {:#}", err);
        Self::internal_error("Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

// ============================================================================
// Service error conversions
// ============================================================================

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        Self::unauthorized(err.to_string())
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::Validation(errors) => Self::fields(&errors),
            UserServiceError::BadRequest(msg) => Self::validation_error(msg),
            UserServiceError::Token(e) => e.into(),
            UserServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<ProfileServiceError> for ApiError {
    fn from(err: ProfileServiceError) -> Self {
        match err {
            ProfileServiceError::NotFound(msg) => Self::not_found(msg),
            ProfileServiceError::BadRequest(msg) => Self::validation_error(msg),
            ProfileServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<ArticleServiceError> for ApiError {
    fn from(err: ArticleServiceError) -> Self {
        match err {
            ArticleServiceError::NotFound(msg) => Self::not_found(msg),
            ArticleServiceError::Validation(errors) => Self::fields(&errors),
            ArticleServiceError::Forbidden(msg) => Self::forbidden(msg),
            ArticleServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<ReactionServiceError> for ApiError {
    fn from(err: ReactionServiceError) -> Self {
        match err {
            ReactionServiceError::NotFound(msg) => Self::not_found(msg),
            ReactionServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<RatingServiceError> for ApiError {
    fn from(err: RatingServiceError) -> Self {
        match err {
            RatingServiceError::NotFound(msg) => Self::not_found(msg),
            RatingServiceError::Validation(errors) => Self::fields(&errors),
            RatingServiceError::BadRequest(msg) => Self::validation_error(msg),
            RatingServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<CommentServiceError> for ApiError {
    fn from(err: CommentServiceError) -> Self {
        match err {
            CommentServiceError::NotFound(msg) => Self::not_found(msg),
            CommentServiceError::Validation(errors) => Self::fields(&errors),
            CommentServiceError::BadRequest(msg) => Self::validation_error(msg),
            CommentServiceError::Forbidden(msg) => Self::forbidden(msg),
            CommentServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// Extract the bearer token from the Authorization header
fn extract_bearer_token(request: &Request) -> Option<String> {
    let value = request.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(&request)
        .ok_or_else(|| ApiError::unauthorized(CREDENTIALS_MISSING))?;

    let user = state
        .user_service
        .authenticate(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized(USER_NOT_FOUND))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Optional authentication middleware
///
/// A missing or unusable token leaves the request anonymous.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_bearer_token(&request) {
        match state.user_service.authenticate(&token).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(AuthenticatedUser(user));
            }
            Ok(None) => {}
            Err(e) => tracing::debug!("Ignoring unusable token on public route: {}", e),
        }
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_extract_bearer_token() {
        let request = axum::http::Request::builder()
            .header(header::AUTHORIZATION, "Bearer abc.def")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_bearer_token(&request).as_deref(), Some("abc.def"));

        let request = axum::http::Request::builder()
            .header(header::AUTHORIZATION, "Token abc")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_bearer_token(&request), None);

        let request = axum::http::Request::builder()
            .header(header::AUTHORIZATION, "Bearer ")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_bearer_token(&request), None);
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::unauthorized("x"), StatusCode::UNAUTHORIZED),
            (ApiError::forbidden("x"), StatusCode::FORBIDDEN),
            (ApiError::not_found("x"), StatusCode::NOT_FOUND),
            (ApiError::validation_error("x"), StatusCode::BAD_REQUEST),
            (ApiError::new("CONFLICT", "x"), StatusCode::CONFLICT),
            (ApiError::internal_error("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_field_errors_become_details() {
        let errors = FieldErrors::single("email", "Enter a valid email address.");
        let error = ApiError::fields(&errors);
        assert_eq!(error.error.code, "VALIDATION_ERROR");
        assert_eq!(error.error.message, "Enter a valid email address.");
        assert_eq!(
            error.error.details,
            Some(serde_json::json!({"email": ["Enter a valid email address."]}))
        );
    }

    #[test]
    fn test_token_errors_are_unauthorized() {
        let error: ApiError = UserServiceError::Token(TokenError::Expired).into();
        assert_eq!(error.error.code, "UNAUTHORIZED");
        assert_eq!(error.error.message, "Expired Token.");
    }
}
