// handler/jobs.rs
use std::sync::Arc;

use axum::{
    extract::Path,
    response::IntoResponse,
    routing::{get, put},
    Extension, Json, Router,
};
use uuid::Uuid;

use crate::{
    dtos::marketdtos::{ApiResponse, UpdateJobStatusDto},
    error::HttpError,
    middleware::JWTAuthMiddeware,
    AppState,
};

pub fn jobs_handler() -> Router {
    Router::new()
        .route("/", get(get_my_jobs))
        .route("/:job_id", get(get_job))
        .route("/:job_id/status", put(update_job_status))
}

pub async fn get_my_jobs(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let jobs = app_state.job_service.get_my_jobs(&auth.caller()).await?;

    Ok(Json(ApiResponse::success("Jobs retrieved successfully", jobs)))
}

pub async fn get_job(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let job = app_state.job_service.get_job(&auth.caller(), job_id).await?;

    Ok(Json(ApiResponse::success("Job retrieved successfully", job)))
}

pub async fn update_job_status(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(job_id): Path<Uuid>,
    Json(body): Json<UpdateJobStatusDto>,
) -> Result<impl IntoResponse, HttpError> {
    let result = app_state
        .job_service
        .update_job_status(&auth.caller(), job_id, body.status)
        .await?;

    Ok(Json(ApiResponse::success("Job status updated successfully", result)))
}
