// handler/requests.rs
use std::sync::Arc;

use axum::{
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::marketdtos::*,
    error::HttpError,
    middleware::JWTAuthMiddeware,
    AppState,
};

pub fn requests_handler() -> Router {
    Router::new()
        .route("/", get(get_my_requests).post(create_request))
        .route("/open", get(get_open_requests))
        .route("/:request_id", get(get_request).delete(delete_request))
        .route("/:request_id/quotes", get(get_request_quotes).post(submit_quote))
}

pub async fn create_request(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let request = app_state
        .request_service
        .create_request(&auth.caller(), body.into())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Service request created successfully", request)),
    ))
}

pub async fn get_my_requests(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let requests = app_state.request_service.get_my_requests(&auth.caller()).await?;

    Ok(Json(ApiResponse::success("Service requests retrieved successfully", requests)))
}

pub async fn get_open_requests(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let requests = app_state.request_service.get_open_requests(&auth.caller()).await?;

    Ok(Json(ApiResponse::success("Open requests retrieved successfully", requests)))
}

pub async fn get_request(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let request = app_state.request_service.get_request(request_id).await?;

    Ok(Json(ApiResponse::success("Service request retrieved successfully", request)))
}

pub async fn delete_request(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let request = app_state
        .request_service
        .delete_request(&auth.caller(), request_id)
        .await?;

    Ok(Json(ApiResponse::success("Service request deleted successfully", request)))
}

pub async fn submit_quote(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(request_id): Path<Uuid>,
    Json(body): Json<SubmitQuoteDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let submission = app_state
        .quote_service
        .submit_quote(&auth.caller(), request_id, body.into_new_quote()?)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Quote submitted successfully", submission.quote)),
    ))
}

pub async fn get_request_quotes(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let quotes = app_state
        .quote_service
        .get_request_quotes(&auth.caller(), request_id)
        .await?;

    Ok(Json(ApiResponse::success("Quotes retrieved successfully", quotes)))
}
