// handler/quotes.rs
use std::sync::Arc;

use axum::{extract::Path, response::IntoResponse, routing::put, Extension, Json, Router};
use uuid::Uuid;

use crate::{
    dtos::marketdtos::ApiResponse,
    error::HttpError,
    middleware::JWTAuthMiddeware,
    AppState,
};

pub fn quotes_handler() -> Router {
    Router::new()
        .route("/:quote_id/accept", put(accept_quote))
        .route("/:quote_id/reject", put(reject_quote))
}

pub async fn accept_quote(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(quote_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let acceptance = app_state
        .quote_service
        .accept_quote(&auth.caller(), quote_id)
        .await?;

    Ok(Json(ApiResponse::success(
        "Quote accepted and job created successfully",
        acceptance,
    )))
}

pub async fn reject_quote(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(quote_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let quote = app_state
        .quote_service
        .reject_quote(&auth.caller(), quote_id)
        .await?;

    Ok(Json(ApiResponse::success("Quote rejected", quote)))
}
