//! Comment API endpoints
//!
//! Every route requires authentication:
//! - GET, POST /api/articles/{slug}/comments - List threads / comment
//! - GET, POST, PUT, DELETE /api/articles/{slug}/comments/{id} - Get / reply / edit / delete
//! - GET /api/articles/{slug}/comments/history/{id} - Earlier versions
//! - PUT /api/articles/{slug}/comments/{id}/like, /dislike - Toggle a reaction

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::extract::{ApiJson, ApiPath, CommentPath};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{CommentEnvelope, CommentResponse, HistoryResponse, MessageResponse};
use crate::models::{ReactionKind, ReactionTarget};

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct CommentListResponse {
    pub comments: Vec<CommentResponse>,
}

#[derive(Debug, Serialize)]
pub struct HistoryListResponse {
    pub history: Vec<HistoryResponse>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/articles/{slug}/comments",
            get(list_comments).post(create_comment),
        )
        .route(
            "/articles/{slug}/comments/{id}",
            get(get_comment)
                .post(reply_to_comment)
                .put(edit_comment)
                .delete(delete_comment),
        )
        .route("/articles/{slug}/comments/history/{id}", get(comment_history))
        .route("/articles/{slug}/comments/{id}/like", put(like_comment))
        .route("/articles/{slug}/comments/{id}/dislike", put(dislike_comment))
}

/// GET /api/articles/{slug}/comments
pub async fn list_comments(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<CommentListResponse>, ApiError> {
    let threads = state.comment_service.list(&slug, &user).await?;
    Ok(Json(CommentListResponse {
        comments: threads.into_iter().map(Into::into).collect(),
    }))
}

/// POST /api/articles/{slug}/comments
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    ApiPath(slug): ApiPath<String>,
    ApiJson(request): ApiJson<CommentRequest>,
) -> Result<(StatusCode, Json<CommentEnvelope>), ApiError> {
    let view = state
        .comment_service
        .create(&user, &slug, &request.content)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CommentEnvelope {
            comment: view.into(),
        }),
    ))
}

/// GET /api/articles/{slug}/comments/{id}
pub async fn get_comment(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    CommentPath { slug, id }: CommentPath,
) -> Result<Json<CommentEnvelope>, ApiError> {
    let view = state.comment_service.get(&slug, id, &user).await?;
    Ok(Json(CommentEnvelope {
        comment: view.into(),
    }))
}

/// POST /api/articles/{slug}/comments/{id}
pub async fn reply_to_comment(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    CommentPath { slug, id }: CommentPath,
    ApiJson(request): ApiJson<CommentRequest>,
) -> Result<(StatusCode, Json<CommentEnvelope>), ApiError> {
    let view = state
        .comment_service
        .reply(&user, &slug, id, &request.content)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CommentEnvelope {
            comment: view.into(),
        }),
    ))
}

/// PUT /api/articles/{slug}/comments/{id}
pub async fn edit_comment(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    CommentPath { slug, id }: CommentPath,
    ApiJson(request): ApiJson<CommentRequest>,
) -> Result<Json<CommentEnvelope>, ApiError> {
    let view = state
        .comment_service
        .edit(&user, &slug, id, &request.content)
        .await?;
    Ok(Json(CommentEnvelope {
        comment: view.into(),
    }))
}

/// DELETE /api/articles/{slug}/comments/{id}
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    CommentPath { slug, id }: CommentPath,
) -> Result<StatusCode, ApiError> {
    state.comment_service.delete(&user, &slug, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/articles/{slug}/comments/history/{id}
pub async fn comment_history(
    State(state): State<AppState>,
    CommentPath { slug, id }: CommentPath,
) -> Result<Json<HistoryListResponse>, ApiError> {
    let history = state.comment_service.history(&slug, id).await?;
    Ok(Json(HistoryListResponse {
        history: history.into_iter().map(Into::into).collect(),
    }))
}

/// PUT /api/articles/{slug}/comments/{id}/like
pub async fn like_comment(
    state: State<AppState>,
    user: Extension<AuthenticatedUser>,
    path: CommentPath,
) -> Result<Json<MessageResponse>, ApiError> {
    react(state, user, path, ReactionKind::Like).await
}

/// PUT /api/articles/{slug}/comments/{id}/dislike
pub async fn dislike_comment(
    state: State<AppState>,
    user: Extension<AuthenticatedUser>,
    path: CommentPath,
) -> Result<Json<MessageResponse>, ApiError> {
    react(state, user, path, ReactionKind::Dislike).await
}

async fn react(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    CommentPath { slug, id }: CommentPath,
    kind: ReactionKind,
) -> Result<Json<MessageResponse>, ApiError> {
    let toggle = state
        .reaction_service
        .react_to_comment(&user, &slug, id, kind)
        .await?;
    Ok(Json(MessageResponse::new(
        toggle.message(kind, ReactionTarget::Comment),
    )))
}
