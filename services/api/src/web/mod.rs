pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::web::{
    middleware::{enforce_daily_quota, tag_request_id},
    rest::{answer_handler, health_handler, models_handler, snapshot_handler, ApiDoc},
    state::AppState,
};

/// Builds the complete application router, Swagger UI included.
pub fn create_router(state: Arc<AppState>) -> Router {
    let answer_routes = Router::new()
        .route("/answer", post(answer_handler))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            enforce_daily_quota,
        ));

    let api_router = Router::new()
        .route("/health", get(health_handler))
        .route("/models", get(models_handler))
        .route("/forums/{forum}/snapshot", get(snapshot_handler))
        .merge(answer_routes)
        .with_state(state);

    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(axum_middleware::from_fn(tag_request_id))
        .layer(TraceLayer::new_for_http())
}
