//! Article API endpoints
//!
//! Handles HTTP requests for articles and their reactions:
//! - GET /api/articles - List with limit/offset and filters
//! - GET /api/articles/{slug} - Get article by slug
//! - POST /api/articles - Create (auth)
//! - PUT /api/articles/{slug} - Update (author only)
//! - DELETE /api/articles/{slug} - Delete (author only)
//! - PUT /api/articles/{slug}/like, /dislike - Toggle a reaction (auth)
//! - POST, DELETE /api/articles/{slug}/favorite - Favorite (auth)

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Extension, Json, Router,
};

use crate::api::common::{page_links, ArticleListQuery};
use crate::api::extract::{ApiJson, ApiPath};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, Viewer};
use crate::api::responses::{ArticleEnvelope, ArticleResponse, MessageResponse, PaginatedResponse};
use crate::models::{CreateArticleInput, ReactionKind, ReactionTarget, UpdateArticleInput};
use crate::services::FavoriteOutcome;

const LIST_PATH: &str = "/api/articles";

/// Build the public articles router (read-only)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/articles", get(list_articles))
        .route("/articles/{slug}", get(get_article))
}

/// Build the protected articles router
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/articles", post(create_article))
        .route("/articles/{slug}", put(update_article).delete(delete_article))
        .route("/articles/{slug}/like", put(like_article))
        .route("/articles/{slug}/dislike", put(dislike_article))
        .route("/articles/{slug}/favorite", post(favorite).delete(unfavorite))
}

/// GET /api/articles
pub async fn list_articles(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<ArticleListQuery>,
) -> Result<Json<PaginatedResponse<ArticleResponse>>, ApiError> {
    let filter = query.filter();
    let page = state
        .article_service
        .list(&filter, &query.params(), viewer.user())
        .await?;

    let (next, previous) = page_links(LIST_PATH, &filter, &page);
    Ok(Json(PaginatedResponse {
        count: page.total,
        next,
        previous,
        results: page.items.into_iter().map(Into::into).collect(),
    }))
}

/// GET /api/articles/{slug}
pub async fn get_article(
    State(state): State<AppState>,
    viewer: Viewer,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<ArticleEnvelope>, ApiError> {
    let view = state.article_service.get(&slug, viewer.user()).await?;
    Ok(Json(ArticleEnvelope {
        article: view.into(),
    }))
}

/// POST /api/articles
pub async fn create_article(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    ApiJson(input): ApiJson<CreateArticleInput>,
) -> Result<(StatusCode, Json<ArticleEnvelope>), ApiError> {
    let view = state.article_service.create(&user, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(ArticleEnvelope {
            article: view.into(),
        }),
    ))
}

/// PUT /api/articles/{slug}
pub async fn update_article(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    ApiPath(slug): ApiPath<String>,
    ApiJson(input): ApiJson<UpdateArticleInput>,
) -> Result<Json<ArticleEnvelope>, ApiError> {
    let view = state.article_service.update(&user, &slug, input).await?;
    Ok(Json(ArticleEnvelope {
        article: view.into(),
    }))
}

/// DELETE /api/articles/{slug}
pub async fn delete_article(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    ApiPath(slug): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    state.article_service.delete(&user, &slug).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/articles/{slug}/like
pub async fn like_article(
    state: State<AppState>,
    user: Extension<AuthenticatedUser>,
    slug: ApiPath<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    react(state, user, slug, ReactionKind::Like).await
}

/// PUT /api/articles/{slug}/dislike
pub async fn dislike_article(
    state: State<AppState>,
    user: Extension<AuthenticatedUser>,
    slug: ApiPath<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    react(state, user, slug, ReactionKind::Dislike).await
}

async fn react(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    ApiPath(slug): ApiPath<String>,
    kind: ReactionKind,
) -> Result<Json<MessageResponse>, ApiError> {
    let toggle = state
        .reaction_service
        .react_to_article(&user, &slug, kind)
        .await?;
    Ok(Json(MessageResponse::new(
        toggle.message(kind, ReactionTarget::Article),
    )))
}

/// POST /api/articles/{slug}/favorite
pub async fn favorite(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Response, ApiError> {
    let outcome = state.reaction_service.favorite(&user, &slug).await?;
    Ok(favorite_response(outcome))
}

/// DELETE /api/articles/{slug}/favorite
pub async fn unfavorite(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Response, ApiError> {
    let outcome = state.reaction_service.unfavorite(&user, &slug).await?;
    Ok(favorite_response(outcome))
}

fn favorite_response(outcome: FavoriteOutcome) -> Response {
    match outcome {
        FavoriteOutcome::Unchanged(message) => Json(MessageResponse::new(message)).into_response(),
        FavoriteOutcome::Changed(view) => Json(ArticleEnvelope {
            article: view.into(),
        })
        .into_response(),
    }
}
