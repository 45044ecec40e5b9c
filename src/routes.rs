// routes.rs
use std::sync::Arc;

use axum::{middleware, routing::get, Extension, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    handler::{
        jobs::jobs_handler,
        notifications::notifications_handler,
        quotes::quotes_handler,
        requests::requests_handler,
        reviews::{providers_handler, reviews_handler},
        users::users_handler,
    },
    middleware::auth,
    AppState,
};

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running"
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .nest("/users", users_handler())
        .nest("/requests", requests_handler())
        .nest("/quotes", quotes_handler())
        .nest("/jobs", jobs_handler())
        .nest("/reviews", reviews_handler())
        .nest("/notifications", notifications_handler())
        .layer(middleware::from_fn(auth));

    let api_route = Router::new()
        .route("/health", get(health_check))
        .nest("/providers", providers_handler())
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(Extension(app_state));

    Router::new().nest("/api", api_route)
}
