//! Extractors whose rejections use the API error body

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequest, FromRequestParts,
    },
    http::request::Parts,
};

use crate::api::middleware::ApiError;
use crate::services::comment::DELETE_TARGET_NOT_FOUND;

pub const NOT_FOUND: &str = "Not found.";

/// `axum::Json` that fails with a 400 `VALIDATION_ERROR`
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Path` that fails with a 404
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!("Rejected request body: {}", rejection);
        Self::validation_error(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!("Rejected path: {}", rejection);
        Self::not_found(NOT_FOUND)
    }
}

/// `/articles/{slug}/comments/{id}` segments. A non-numeric id names no
/// comment.
#[derive(Debug, Clone)]
pub struct CommentPath {
    pub slug: String,
    pub id: i64,
}

impl<S: Send + Sync> FromRequestParts<S> for CommentPath {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ApiPath((slug, id)) = ApiPath::<(String, String)>::from_request_parts(parts, state).await?;
        let id = id
            .parse()
            .map_err(|_| ApiError::not_found(DELETE_TARGET_NOT_FOUND))?;
        Ok(Self { slug, id })
    }
}
