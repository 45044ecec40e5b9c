// handler/notifications.rs
use std::sync::Arc;

use axum::{
    extract::Path,
    response::IntoResponse,
    routing::{get, put},
    Extension, Json, Router,
};
use uuid::Uuid;

use crate::{
    dtos::marketdtos::ApiResponse,
    error::HttpError,
    middleware::JWTAuthMiddeware,
    AppState,
};

pub fn notifications_handler() -> Router {
    Router::new()
        .route("/", get(get_notifications))
        .route("/:notification_id/read", put(mark_notification_read))
}

pub async fn get_notifications(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let notifications = app_state
        .notification_service
        .get_notifications(auth.user.id)
        .await?;

    Ok(Json(ApiResponse::success(
        "Notifications retrieved successfully",
        notifications,
    )))
}

pub async fn mark_notification_read(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(notification_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let notification = app_state
        .notification_service
        .mark_read(auth.user.id, notification_id)
        .await?;

    Ok(Json(ApiResponse::success("Notification marked as read", notification)))
}
