//! API layer - HTTP handlers and routing
//!
//! Every endpoint lives under `/api` except the liveness probe:
//! - Auth endpoints
//! - Product and category endpoints
//! - Address endpoints
//! - Order endpoints
//! - Support ticket endpoints

pub mod addresses;
pub mod auth;
pub mod common;
pub mod health;
pub mod middleware;
pub mod orders;
pub mod products;
pub mod responses;
pub mod support;
pub mod validation;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Build the `/api` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router(state.clone()))
        .nest("/products", products::router(state.clone()))
        .nest("/addresses", addresses::router(state.clone()))
        .nest("/orders", orders::router(state.clone()))
        .nest("/support", support::router(state))
}

/// Build the complete application router
pub fn build_router(state: AppState, cors_origin: &str) -> anyhow::Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    Ok(Router::new()
        .nest("/api", build_api_router(state.clone()))
        .route("/health", get(health::health))
        .fallback(middleware::route_not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(CatchPanicLayer::custom(middleware::panic_response)),
        )
        .with_state(state))
}
