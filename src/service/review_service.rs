// service/review_service.rs
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::marketdb::MarketExt,
    models::{marketmodel::*, usermodel::{Caller, RatingSummary}},
    service::{error::ServiceError, lifecycle, notification_service::NotificationService},
};

#[derive(Clone)]
pub struct ReviewService {
    store: Arc<dyn MarketExt>,
    notification_service: Arc<NotificationService>,
}

impl ReviewService {
    pub fn new(store: Arc<dyn MarketExt>, notification_service: Arc<NotificationService>) -> Self {
        Self {
            store,
            notification_service,
        }
    }

    pub async fn create_review(
        &self,
        caller: &Caller,
        review: NewReview,
    ) -> Result<(Review, RatingSummary), ServiceError> {
        lifecycle::validate_rating(review.rating)?;

        let (review, summary) = self.store.create_review(caller.id, review).await?;
        tracing::info!(
            review_id = %review.id,
            job_id = %review.job_id,
            provider_id = %review.provider_id,
            rating = review.rating,
            provider_rating = summary.rating,
            "Review created"
        );

        self.notification_service.notify_review_created(&review).await;

        Ok((review, summary))
    }

    pub async fn update_review(
        &self,
        caller: &Caller,
        review_id: Uuid,
        patch: ReviewPatch,
    ) -> Result<(Review, RatingSummary), ServiceError> {
        if let Some(rating) = patch.rating {
            lifecycle::validate_rating(rating)?;
        }

        let (review, summary) = self.store.update_review(caller.id, review_id, patch).await?;
        tracing::info!(%review_id, provider_rating = summary.rating, "Review updated");

        Ok((review, summary))
    }

    pub async fn delete_review(
        &self,
        caller: &Caller,
        review_id: Uuid,
    ) -> Result<RatingSummary, ServiceError> {
        let (_, summary) = self.store.delete_review(caller.id, review_id).await?;
        tracing::info!(%review_id, provider_rating = summary.rating, "Review deleted");

        Ok(summary)
    }

    pub async fn respond_to_review(
        &self,
        caller: &Caller,
        review_id: Uuid,
        response: String,
    ) -> Result<Review, ServiceError> {
        let response = response.trim().to_string();
        if response.is_empty() {
            return Err(ServiceError::Validation("Response cannot be empty".to_string()));
        }

        let review = self.store.respond_to_review(caller.id, review_id, response).await?;
        tracing::info!(%review_id, provider_id = %caller.id, "Provider responded to review");

        self.notification_service.notify_review_response(&review).await;

        Ok(review)
    }

    /// Public listing: the provider's reviews and the aggregate over exactly
    /// those reviews.
    pub async fn get_provider_reviews(
        &self,
        provider_id: Uuid,
    ) -> Result<(RatingSummary, Vec<Review>), ServiceError> {
        self.store
            .get_user(provider_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("provider", provider_id))?;

        let reviews = self.store.get_provider_reviews(provider_id).await?;
        let summary = lifecycle::rating_summary(provider_id, reviews.iter().map(|review| review.rating));

        Ok((summary, reviews))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;

    fn review_of(job_id: Uuid, rating: i32) -> NewReview {
        NewReview {
            job_id,
            rating,
            comment: Some("Quick and tidy".to_string()),
        }
    }

    #[tokio::test]
    async fn test_review_requires_completed_job() {
        let fixture = Fixture::new().await;
        let (acceptance, _) = fixture.accepted_job().await;

        let result = fixture
            .reviews
            .create_review(&fixture.owner.as_caller(), review_of(acceptance.job.id, 5))
            .await;
        assert!(matches!(result, Err(ServiceError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_only_job_owner_reviews_once() {
        let fixture = Fixture::new().await;
        let job = fixture.completed_job().await;

        let by_provider = fixture
            .reviews
            .create_review(&fixture.provider.as_caller(), review_of(job.id, 5))
            .await;
        assert!(matches!(by_provider, Err(ServiceError::Forbidden { .. })));

        let out_of_range = fixture
            .reviews
            .create_review(&fixture.owner.as_caller(), review_of(job.id, 6))
            .await;
        assert!(matches!(out_of_range, Err(ServiceError::Validation(_))));

        let (review, summary) = fixture
            .reviews
            .create_review(&fixture.owner.as_caller(), review_of(job.id, 4))
            .await
            .unwrap();
        assert_eq!(review.provider_id, fixture.provider.id);
        assert_eq!(summary.review_count, 1);

        let second = fixture
            .reviews
            .create_review(&fixture.owner.as_caller(), review_of(job.id, 5))
            .await;
        assert!(matches!(second, Err(ServiceError::InvalidState { .. })));

        let provider_notes = fixture.store.get_user_notifications(fixture.provider.id).await.unwrap();
        assert!(provider_notes.iter().any(|n| n.kind == "review_received"));
    }

    #[tokio::test]
    async fn test_rating_aggregate_tracks_surviving_reviews() {
        let fixture = Fixture::new().await;
        let first_job = fixture.completed_job().await;
        let second_job = fixture.completed_job().await;
        let owner = fixture.owner.as_caller();

        fixture
            .reviews
            .create_review(&owner, review_of(first_job.id, 5))
            .await
            .unwrap();
        let (three, summary) = fixture
            .reviews
            .create_review(&owner, review_of(second_job.id, 3))
            .await
            .unwrap();
        assert_eq!(summary.rating, 4.0);
        assert_eq!(summary.review_count, 2);

        let summary = fixture.reviews.delete_review(&owner, three.id).await.unwrap();
        assert_eq!(summary.rating, 5.0);
        assert_eq!(summary.review_count, 1);

        let (aggregate, reviews) = fixture
            .reviews
            .get_provider_reviews(fixture.provider.id)
            .await
            .unwrap();
        assert_eq!(aggregate.rating, 5.0);
        assert_eq!(aggregate.review_count, 1);
        assert_eq!(reviews.len(), 1);
    }

    #[tokio::test]
    async fn test_listing_aggregate_matches_listed_reviews() {
        let fixture = Fixture::new().await;
        let owner = fixture.owner.as_caller();

        for rating in [4, 2, 5] {
            let job = fixture.completed_job().await;
            fixture
                .reviews
                .create_review(&owner, review_of(job.id, rating))
                .await
                .unwrap();
        }

        let (aggregate, reviews) = fixture
            .reviews
            .get_provider_reviews(fixture.provider.id)
            .await
            .unwrap();
        let mean = reviews.iter().map(|review| review.rating as f64).sum::<f64>() / reviews.len() as f64;
        assert_eq!(aggregate.review_count as usize, reviews.len());
        assert_eq!(aggregate.review_count, 3);
        assert!((aggregate.rating - mean).abs() < f64::EPSILON);
        assert!((aggregate.rating - 11.0 / 3.0).abs() < 1e-9);

        assert!(matches!(
            fixture.reviews.get_provider_reviews(Uuid::new_v4()).await,
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_only_author_edits_review() {
        let fixture = Fixture::new().await;
        let job = fixture.completed_job().await;
        let (review, _) = fixture
            .reviews
            .create_review(&fixture.owner.as_caller(), review_of(job.id, 2))
            .await
            .unwrap();

        let patch = ReviewPatch {
            rating: Some(4),
            ..Default::default()
        };

        assert!(matches!(
            fixture
                .reviews
                .update_review(&fixture.provider.as_caller(), review.id, patch.clone())
                .await,
            Err(ServiceError::Forbidden { .. })
        ));
        assert!(matches!(
            fixture.reviews.delete_review(&fixture.stranger.as_caller(), review.id).await,
            Err(ServiceError::Forbidden { .. })
        ));

        let (updated, summary) = fixture
            .reviews
            .update_review(&fixture.owner.as_caller(), review.id, patch)
            .await
            .unwrap();
        assert_eq!(updated.rating, 4);
        assert_eq!(updated.comment, review.comment);
        assert_eq!(summary.rating, 4.0);

        let invalid = ReviewPatch {
            rating: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            fixture
                .reviews
                .update_review(&fixture.owner.as_caller(), review.id, invalid)
                .await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_provider_response_overwrites() {
        let fixture = Fixture::new().await;
        let job = fixture.completed_job().await;
        let (review, _) = fixture
            .reviews
            .create_review(&fixture.owner.as_caller(), review_of(job.id, 3))
            .await
            .unwrap();

        assert!(matches!(
            fixture
                .reviews
                .respond_to_review(&fixture.owner.as_caller(), review.id, "Thanks".to_string())
                .await,
            Err(ServiceError::Forbidden { .. })
        ));

        let provider = fixture.provider.as_caller();
        fixture
            .reviews
            .respond_to_review(&provider, review.id, "Thanks for the feedback".to_string())
            .await
            .unwrap();
        let responded = fixture
            .reviews
            .respond_to_review(&provider, review.id, "We replaced the part at no cost".to_string())
            .await
            .unwrap();
        assert_eq!(responded.response.as_deref(), Some("We replaced the part at no cost"));
        assert!(responded.responded_at.is_some());

        let owner_notes = fixture.store.get_user_notifications(fixture.owner.id).await.unwrap();
        assert!(owner_notes.iter().any(|n| n.kind == "review_response"));
    }
}
