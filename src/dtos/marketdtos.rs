use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    error::HttpError,
    models::{marketmodel::*, usermodel::RatingSummary},
};

// Request DTOs
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateRequestDto {
    pub vehicle_id: Uuid,

    #[validate(length(min = 1, max = 100, message = "Title must be between 1 and 100 characters"))]
    pub title: String,

    #[validate(length(min = 10, max = 2000, message = "Description must be between 10 and 2000 characters"))]
    pub description: String,

    pub urgency: Urgency,

    #[serde(default)]
    #[validate(custom = "validate_image_urls")]
    pub image_urls: Vec<String>,
}

fn validate_image_urls(urls: &Vec<String>) -> Result<(), ValidationError> {
    if urls.len() > 10 {
        return Err(ValidationError::new("At most 10 images per request"));
    }
    if urls.iter().any(|url| !validator::validate_url(url.as_str())) {
        return Err(ValidationError::new("Invalid image URL"));
    }
    Ok(())
}

impl From<CreateRequestDto> for NewServiceRequest {
    fn from(dto: CreateRequestDto) -> Self {
        NewServiceRequest {
            vehicle_id: dto.vehicle_id,
            title: dto.title,
            description: dto.description,
            urgency: dto.urgency,
            image_urls: dto.image_urls,
        }
    }
}

// Quote DTOs
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SubmitQuoteDto {
    #[validate(range(min = 0.01, max = 9999999999.99, message = "Amount must be between 0.01 and 9999999999.99"))]
    pub amount: f64,

    #[validate(range(min = 0.0, max = 9999999999.99, message = "Labor cost must be between 0 and 9999999999.99"))]
    pub labor_cost: Option<f64>,

    #[validate(range(min = 0.0, max = 9999999999.99, message = "Parts cost must be between 0 and 9999999999.99"))]
    pub parts_cost: Option<f64>,

    #[validate(length(min = 1, max = 100, message = "Estimated duration is required"))]
    pub estimated_duration: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    #[serde(default)]
    pub includes_warranty: bool,
}

/// Amounts travel as JSON numbers and are stored to the cent.
pub fn to_money(value: f64) -> Result<BigDecimal, HttpError> {
    if !value.is_finite() {
        return Err(HttpError::bad_request("Amount must be a finite number"));
    }
    BigDecimal::from_str(&format!("{:.2}", value))
        .map_err(|e| HttpError::bad_request(format!("Invalid amount: {}", e)))
}

impl SubmitQuoteDto {
    pub fn into_new_quote(self) -> Result<NewQuote, HttpError> {
        Ok(NewQuote {
            amount: to_money(self.amount)?,
            labor_cost: self.labor_cost.map(to_money).transpose()?,
            parts_cost: self.parts_cost.map(to_money).transpose()?,
            estimated_duration: self.estimated_duration,
            description: self.description,
            includes_warranty: self.includes_warranty,
        })
    }
}

// Job DTOs
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateJobStatusDto {
    pub status: JobStatus,
}

// Review DTOs
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateReviewDto {
    pub job_id: Uuid,

    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,

    #[validate(length(max = 1000, message = "Comment must be at most 1000 characters"))]
    pub comment: Option<String>,
}

impl From<CreateReviewDto> for NewReview {
    fn from(dto: CreateReviewDto) -> Self {
        NewReview {
            job_id: dto.job_id,
            rating: dto.rating,
            comment: dto.comment,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdateReviewDto {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: Option<i32>,

    #[validate(length(max = 1000, message = "Comment must be at most 1000 characters"))]
    pub comment: Option<String>,
}

impl From<UpdateReviewDto> for ReviewPatch {
    fn from(dto: UpdateReviewDto) -> Self {
        ReviewPatch {
            rating: dto.rating,
            comment: dto.comment,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RespondReviewDto {
    #[validate(length(min = 1, max = 1000, message = "Response must be between 1 and 1000 characters"))]
    pub response: String,
}

#[derive(Debug, Serialize)]
pub struct ReviewWithRatingDto {
    pub review: Review,
    pub provider_rating: RatingSummary,
}

#[derive(Debug, Serialize)]
pub struct ProviderReviewsDto {
    pub provider_id: Uuid,
    pub rating: f64,
    pub review_count: i32,
    pub reviews: Vec<Review>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(message: &str, data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: message.to_string(),
            data: Some(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::quote_service::validate_quote;

    #[test]
    fn test_money_is_rounded_to_cents() {
        assert_eq!(to_money(149.999).unwrap(), BigDecimal::from_str("150.00").unwrap());
        assert_eq!(to_money(12.5).unwrap(), BigDecimal::from_str("12.50").unwrap());
        assert!(to_money(f64::NAN).is_err());
    }

    #[test]
    fn test_quote_dto_validation() {
        let dto: SubmitQuoteDto = serde_json::from_value(serde_json::json!({
            "amount": 0,
            "estimated_duration": "2 days"
        }))
        .unwrap();
        assert!(dto.validate().is_err());

        let dto: SubmitQuoteDto = serde_json::from_value(serde_json::json!({
            "amount": 320.5,
            "labor_cost": 200,
            "estimated_duration": "2 days"
        }))
        .unwrap();
        assert!(dto.validate().is_ok());
        let quote = dto.into_new_quote().unwrap();
        assert!(!quote.includes_warranty);
        assert!(quote.parts_cost.is_none());
    }

    #[test]
    fn test_quote_amounts_fit_money_column() {
        for body in [
            serde_json::json!({ "amount": 1e12, "estimated_duration": "2 days" }),
            serde_json::json!({ "amount": 100, "labor_cost": 1e10, "estimated_duration": "2 days" }),
            serde_json::json!({ "amount": 100, "parts_cost": 1e15, "estimated_duration": "2 days" }),
        ] {
            let dto: SubmitQuoteDto = serde_json::from_value(body).unwrap();
            assert!(dto.validate().is_err());
        }

        let dto: SubmitQuoteDto = serde_json::from_value(serde_json::json!({
            "amount": 9999999999.99,
            "estimated_duration": "2 days"
        }))
        .unwrap();
        assert!(dto.validate().is_ok());
        let quote = dto.into_new_quote().unwrap();
        assert!(validate_quote(&quote).is_ok());
        assert!(!quote.includes_warranty);
        assert!(quote.parts_cost.is_none());
    }

    #[test]
    fn test_request_dto_rejects_bad_image_url() {
        let dto: CreateRequestDto = serde_json::from_value(serde_json::json!({
            "vehicle_id": Uuid::new_v4(),
            "title": "Battery drains overnight",
            "description": "Car will not start after sitting overnight",
            "urgency": "high",
            "image_urls": ["not a url"]
        }))
        .unwrap();
        assert!(dto.validate().is_err());
    }

    #[test]
    fn test_review_rating_range() {
        let dto = CreateReviewDto {
            job_id: Uuid::new_v4(),
            rating: 0,
            comment: None,
        };
        assert!(dto.validate().is_err());
    }
}
