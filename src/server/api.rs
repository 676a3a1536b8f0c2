//! API route definitions

use std::sync::Arc;
use axum::{
    http::{header, HeaderName, HeaderValue, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::{auth, handlers, state::AppState};

async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": true,
            "kind": "not_found",
            "message": "Not found. Visit / for the prediction form or /api/health to check API status.",
        })),
    )
}

async fn handle_405() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({
            "error": true,
            "kind": "method_not_allowed",
            "message": "Method not allowed.",
        })),
    )
}

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/model", get(handlers::model_info))
        .route(
            "/model/reload",
            post(handlers::reload_model).route_layer(middleware::from_fn_with_state(
                Arc::clone(&state),
                auth::require_admin_key,
            )),
        )
        .route("/schema", get(handlers::get_schema))
        .route("/predict", post(handlers::predict))
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405);

    // CORS configured via CORS_ORIGIN (default: allow all). Only a named
    // origin may send the admin key header cross-origin.
    let public = || CorsLayer::new().allow_origin(Any).allow_headers([header::CONTENT_TYPE]);
    let cors = match std::env::var("CORS_ORIGIN") {
        Ok(origin) if !origin.is_empty() && origin != "*" => match origin.parse::<HeaderValue>() {
            Ok(value) => CorsLayer::new()
                .allow_origin(value)
                .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(auth::API_KEY_HEADER)]),
            Err(_) => public(),
        },
        _ => public(),
    }
    .allow_methods(Any);

    Router::new()
        .nest("/api", api_routes)
        .route("/", get(handlers::serve_index))
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
