//! Authentication API endpoints
//!
//! Handles HTTP requests for accounts:
//! - POST /api/users - Register
//! - POST /api/users/login - Log in
//! - GET /api/users/activate/{token} - Activate from the emailed link
//! - POST /api/users/reset_password - Request a password reset email
//! - GET /api/users/reset_password/{token} - Echo a reset token
//! - PUT /api/users/reset_password_done - Set a new password
//! - POST /api/users/social_auth - Log in with a social provider
//! - GET /api/user - Current user (auth)
//! - PUT /api/user - Update current user (auth)

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::extract::{ApiJson, ApiPath};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{MessageResponse, UserEnvelope, UserResponse};
use crate::models::UpdateUserInput;
use crate::services::user::{
    REGISTERED_MESSAGE, RESET_DONE_MESSAGE, RESET_REQUESTED_MESSAGE,
};
use crate::services::{LoginInput, RegisterInput, ResetPasswordInput};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct RegisterUser {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub user: RegisterUser,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginUser {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub user: LoginUser,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub user: UpdateUserInput,
}

/// Response for registration: the new user plus a hint to check the inbox
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: UserResponse,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetDoneRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub reset_token: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct SocialAuthRequest {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub access_token: String,
}

// ============================================================================
// Routers
// ============================================================================

/// Account routes that need no token
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/users", post(register))
        .route("/users/login", post(login))
        .route("/users/activate/{token}", get(activate))
        .route("/users/reset_password", post(request_reset))
        .route("/users/reset_password/{token}", get(echo_reset_token))
        .route("/users/reset_password_done", put(complete_reset))
        .route("/users/social_auth", post(social_auth))
}

/// Current-user routes
pub fn protected_router() -> Router<AppState> {
    Router::new().route("/user", get(current_user).put(update_user))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/users
pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let input = request.user;
    let user = state
        .user_service
        .register(RegisterInput::new(input.username, input.email, input.password))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: user.into(),
            message: REGISTERED_MESSAGE.to_string(),
        }),
    ))
}

/// POST /api/users/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let session = state
        .user_service
        .login(LoginInput::new(request.user.email, request.user.password))
        .await?;

    Ok(Json(UserEnvelope {
        user: session.into(),
    }))
}

/// GET /api/users/activate/{token}
pub async fn activate(
    State(state): State<AppState>,
    ApiPath(token): ApiPath<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let outcome = state.user_service.activate(&token).await?;
    Ok(Json(MessageResponse::new(outcome.message())))
}

/// GET /api/user
pub async fn current_user(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let session = state.user_service.current(user)?;
    Ok(Json(UserEnvelope {
        user: session.into(),
    }))
}

/// PUT /api/user
pub async fn update_user(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    ApiJson(request): ApiJson<UpdateUserRequest>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let session = state.user_service.update(user, request.user).await?;
    Ok(Json(UserEnvelope {
        user: session.into(),
    }))
}

/// POST /api/users/reset_password
pub async fn request_reset(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ResetRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    state
        .user_service
        .request_password_reset(&request.email)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(RESET_REQUESTED_MESSAGE)),
    ))
}

/// GET /api/users/reset_password/{token}
///
/// The emailed link lands here; the client reads the token back to submit it
/// with the new password.
pub async fn echo_reset_token(ApiPath(token): ApiPath<String>) -> Json<TokenResponse> {
    Json(TokenResponse { token })
}

/// PUT /api/users/reset_password_done
pub async fn complete_reset(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ResetDoneRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    state
        .user_service
        .complete_password_reset(ResetPasswordInput {
            email: request.email,
            reset_token: request.reset_token,
            new_password: request.new_password,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(RESET_DONE_MESSAGE)),
    ))
}

/// POST /api/users/social_auth
pub async fn social_auth(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SocialAuthRequest>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let session = state
        .user_service
        .social_login(&request.provider, &request.access_token)
        .await?;

    Ok(Json(UserEnvelope {
        user: session.into(),
    }))
}
