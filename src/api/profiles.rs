//! Profile API endpoints
//!
//! - GET /api/profiles/{username} - View a profile
//! - PUT /api/profiles/{username}/follow - Follow (auth)
//! - DELETE /api/profiles/{username}/follow - Unfollow (auth)
//! - GET /api/profiles/followers - Who follows me (auth)
//! - GET /api/profiles/following - Who I follow (auth)

use axum::{
    extract::State,
    routing::{get, put},
    Extension, Json, Router,
};
use serde::Serialize;

use crate::api::extract::ApiPath;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, Viewer};
use crate::api::responses::{ProfileEnvelope, ProfileResponse};

#[derive(Debug, Serialize)]
pub struct FollowersResponse {
    pub followers: Vec<ProfileResponse>,
}

#[derive(Debug, Serialize)]
pub struct FollowingResponse {
    pub following: Vec<ProfileResponse>,
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/profiles/{username}", get(get_profile))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/profiles/{username}/follow", put(follow).delete(unfollow))
        .route("/profiles/followers", get(followers))
        .route("/profiles/following", get(following))
}

/// GET /api/profiles/{username}
pub async fn get_profile(
    State(state): State<AppState>,
    viewer: Viewer,
    ApiPath(username): ApiPath<String>,
) -> Result<Json<ProfileEnvelope>, ApiError> {
    let profile = state
        .profile_service
        .get_profile(&username, viewer.user())
        .await?;
    Ok(Json(ProfileEnvelope {
        profile: profile.into(),
    }))
}

/// PUT /api/profiles/{username}/follow
pub async fn follow(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    ApiPath(username): ApiPath<String>,
) -> Result<Json<ProfileEnvelope>, ApiError> {
    let profile = state.profile_service.follow(&user, &username).await?;
    Ok(Json(ProfileEnvelope {
        profile: profile.into(),
    }))
}

/// DELETE /api/profiles/{username}/follow
pub async fn unfollow(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    ApiPath(username): ApiPath<String>,
) -> Result<Json<ProfileEnvelope>, ApiError> {
    let profile = state.profile_service.unfollow(&user, &username).await?;
    Ok(Json(ProfileEnvelope {
        profile: profile.into(),
    }))
}

/// GET /api/profiles/followers
pub async fn followers(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Result<Json<FollowersResponse>, ApiError> {
    let profiles = state.profile_service.followers(&user).await?;
    Ok(Json(FollowersResponse {
        followers: profiles.into_iter().map(Into::into).collect(),
    }))
}

/// GET /api/profiles/following
pub async fn following(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Result<Json<FollowingResponse>, ApiError> {
    let profiles = state.profile_service.following(&user).await?;
    Ok(Json(FollowingResponse {
        following: profiles.into_iter().map(Into::into).collect(),
    }))
}
