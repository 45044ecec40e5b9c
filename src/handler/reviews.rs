// handler/reviews.rs
use std::sync::Arc;

use axum::{
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
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

pub fn reviews_handler() -> Router {
    Router::new()
        .route("/", post(create_review))
        .route("/:review_id", put(update_review).delete(delete_review))
        .route("/:review_id/response", put(respond_to_review))
}

/// Public routes, mounted without the auth layer.
pub fn providers_handler() -> Router {
    Router::new().route("/:provider_id/reviews", get(get_provider_reviews))
}

pub async fn create_review(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateReviewDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let (review, provider_rating) = app_state
        .review_service
        .create_review(&auth.caller(), body.into())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            "Review submitted successfully",
            ReviewWithRatingDto {
                review,
                provider_rating,
            },
        )),
    ))
}

pub async fn update_review(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(review_id): Path<Uuid>,
    Json(body): Json<UpdateReviewDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let (review, provider_rating) = app_state
        .review_service
        .update_review(&auth.caller(), review_id, body.into())
        .await?;

    Ok(Json(ApiResponse::success(
        "Review updated successfully",
        ReviewWithRatingDto {
            review,
            provider_rating,
        },
    )))
}

pub async fn delete_review(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(review_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let provider_rating = app_state
        .review_service
        .delete_review(&auth.caller(), review_id)
        .await?;

    Ok(Json(ApiResponse::success("Review deleted successfully", provider_rating)))
}

pub async fn respond_to_review(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(review_id): Path<Uuid>,
    Json(body): Json<RespondReviewDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let review = app_state
        .review_service
        .respond_to_review(&auth.caller(), review_id, body.response)
        .await?;

    Ok(Json(ApiResponse::success("Response saved successfully", review)))
}

pub async fn get_provider_reviews(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(provider_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let (summary, reviews) = app_state
        .review_service
        .get_provider_reviews(provider_id)
        .await?;

    Ok(Json(ApiResponse::success(
        "Provider reviews retrieved successfully",
        ProviderReviewsDto {
            provider_id,
            rating: summary.rating,
            review_count: summary.review_count,
            reviews,
        },
    )))
}
