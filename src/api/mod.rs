//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api`:
//! - Account endpoints (register, login, activation, password reset, social login)
//! - Profile and follow endpoints
//! - Article endpoints with likes, dislikes and favorites
//! - Rating endpoints
//! - Comment endpoints with replies, history and reactions

pub mod articles;
pub mod auth;
pub mod comments;
pub mod common;
pub mod extract;
pub mod middleware;
pub mod profiles;
pub mod ratings;
pub mod responses;


use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub use extract::{ApiJson, ApiPath, CommentPath};
pub use middleware::{ApiError, AppState, AuthenticatedUser, Viewer};

/// Build the `/api` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Protected routes (need a valid token)
    let protected_routes = Router::new()
        .merge(auth::protected_router())
        .merge(profiles::protected_router())
        .merge(articles::protected_router())
        .merge(ratings::protected_router())
        .merge(comments::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public routes (a token, if sent, identifies the viewer)
    let public_routes = Router::new()
        .merge(profiles::public_router())
        .merge(articles::public_router())
        .merge(ratings::public_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::optional_auth,
        ));

    Router::new()
        .merge(auth::public_router())
        .merge(public_routes)
        .merge(protected_routes)
}

fn cors_layer(cors_origin: &str) -> CorsLayer {
    let origin = if cors_origin.trim() == "*" {
        AllowOrigin::any()
    } else {
        match cors_origin.parse::<HeaderValue>() {
            Ok(origin) => AllowOrigin::exact(origin),
            Err(_) => {
                tracing::warn!("Invalid CORS origin {:?}, allowing any origin", cors_origin);
                AllowOrigin::any()
            }
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    Router::new()
        .nest("/api", build_api_router(state.clone()))
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
