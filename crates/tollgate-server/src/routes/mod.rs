//! Route configuration for the Tollgate API server.

mod internal;
mod v1;

use crate::{config::ServerBindConfig, error::ApiError, state::AppState};
use axum::{http::Uri, Router};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Create the main application router.
pub fn create_router(state: AppState, settings: &ServerBindConfig) -> Router {
    // Common middleware stack applied to all routes
    let common_middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .layer(RequestBodyLimitLayer::new(settings.body_limit_bytes))
        .layer(TimeoutLayer::new(settings.request_timeout()));

    Router::new()
        .nest("/v1", v1::router(&state))
        .nest("/internal", internal::router())
        .fallback(fallback_handler)
        .layer(common_middleware)
        .with_state(state)
}

async fn fallback_handler(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("Route {}", uri.path()))
}
