// handler/users.rs
use axum::{response::IntoResponse, routing::get, Extension, Json, Router};

use crate::{dtos::marketdtos::ApiResponse, error::HttpError, middleware::JWTAuthMiddeware};

pub fn users_handler() -> Router {
    Router::new().route("/me", get(get_me))
}

/// The authenticated user, including provider rating and review count.
pub async fn get_me(
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    Ok(Json(ApiResponse::success("User retrieved successfully", auth.user)))
}
