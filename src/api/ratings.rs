//! Rating API endpoints
//!
//! - GET /api/articles/{slug}/ratings - All ratings of an article
//! - POST /api/articles/{slug}/ratings - Rate an article (auth)

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::extract::{ApiJson, ApiPath};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::RatingResponse;
use crate::services::validation::{FieldErrors, INVALID_INTEGER, REQUIRED};

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    #[serde(default)]
    pub stars: Value,
}

#[derive(Debug, Serialize)]
pub struct RatingListResponse {
    pub ratings: Vec<RatingResponse>,
}

#[derive(Debug, Serialize)]
pub struct RatingEnvelope {
    pub ratings: RatingResponse,
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/articles/{slug}/ratings", get(list_ratings))
}

pub fn protected_router() -> Router<AppState> {
    Router::new().route("/articles/{slug}/ratings", post(rate_article))
}

/// GET /api/articles/{slug}/ratings
pub async fn list_ratings(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<RatingListResponse>, ApiError> {
    let ratings = state.rating_service.list(&slug).await?;
    Ok(Json(RatingListResponse {
        ratings: ratings.into_iter().map(Into::into).collect(),
    }))
}

/// POST /api/articles/{slug}/ratings
pub async fn rate_article(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    ApiPath(slug): ApiPath<String>,
    ApiJson(request): ApiJson<RateRequest>,
) -> Result<(StatusCode, Json<RatingEnvelope>), ApiError> {
    let stars = parse_stars(&request.stars)
        .map_err(|message| ApiError::fields(&FieldErrors::single("stars", message)))?;

    let view = state.rating_service.rate(&user, &slug, stars).await?;
    Ok((
        StatusCode::CREATED,
        Json(RatingEnvelope {
            ratings: view.into(),
        }),
    ))
}

/// Read `stars` as an integer. Whole numbers outside `i64` saturate so the
/// range check reports them; strings holding an integer are accepted.
fn parse_stars(value: &Value) -> Result<i64, &'static str> {
    match value {
        Value::Null => Err(REQUIRED),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(stars), _, _) => Ok(stars),
            (None, Some(_), _) => Ok(i64::MAX),
            (None, None, Some(f)) if f.is_finite() && f.fract() == 0.0 => Ok(f as i64),
            _ => Err(INVALID_INTEGER),
        },
        Value::String(s) => s.trim().parse().map_err(|_| INVALID_INTEGER),
        _ => Err(INVALID_INTEGER),
    }
}
