// db/memory.rs
//! In-process implementation of [`MarketExt`] for local runs and tests.
//!
//! Every operation holds one async mutex for its whole duration, which gives
//! the same serialization the Postgres store gets from row locks. Multi-row
//! operations check every precondition before the first write.
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::marketdb::MarketExt;
use crate::{
    models::{marketmodel::*, usermodel::*},
    service::{
        error::ServiceError,
        lifecycle::{self, RequestEvent},
    },
};

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    requests: HashMap<Uuid, ServiceRequest>,
    quotes: HashMap<Uuid, Quote>,
    jobs: HashMap<Uuid, Job>,
    reviews: HashMap<Uuid, Review>,
    notifications: HashMap<Uuid, Notification>,
}

impl MemoryState {
    fn live_request(&self, request_id: Uuid) -> Result<&ServiceRequest, ServiceError> {
        self.requests
            .get(&request_id)
            .filter(|request| !request.is_deleted())
            .ok_or_else(|| ServiceError::not_found("request", request_id))
    }

    fn quote(&self, quote_id: Uuid) -> Result<&Quote, ServiceError> {
        self.quotes
            .get(&quote_id)
            .ok_or_else(|| ServiceError::not_found("quote", quote_id))
    }

    fn review(&self, review_id: Uuid) -> Result<&Review, ServiceError> {
        self.reviews
            .get(&review_id)
            .ok_or_else(|| ServiceError::not_found("review", review_id))
    }

    fn set_request_status(&mut self, request_id: Uuid, status: RequestStatus, now: DateTime<Utc>) -> Option<ServiceRequest> {
        let request = self.requests.get_mut(&request_id)?;
        request.status = status;
        request.updated_at = now;
        Some(request.clone())
    }

    fn set_quote_status(&mut self, quote_id: Uuid, status: QuoteStatus, now: DateTime<Utc>) -> Option<Quote> {
        let quote = self.quotes.get_mut(&quote_id)?;
        quote.status = status;
        quote.updated_at = now;
        Some(quote.clone())
    }

    /// Rejects every pending quote on the request except `keep`.
    fn reject_pending(&mut self, request_id: Uuid, keep: Option<Uuid>, now: DateTime<Utc>) -> Vec<Quote> {
        let mut rejected = Vec::new();
        for quote in self.quotes.values_mut() {
            if quote.request_id == request_id
                && Some(quote.id) != keep
                && quote.status == QuoteStatus::Pending
            {
                quote.status = QuoteStatus::Rejected;
                quote.updated_at = now;
                rejected.push(quote.clone());
            }
        }
        rejected
    }

    fn ensure_user(&self, user_id: Uuid) -> Result<(), ServiceError> {
        if self.users.contains_key(&user_id) {
            Ok(())
        } else {
            Err(ServiceError::not_found("user", user_id))
        }
    }

    fn refresh_provider_rating(&mut self, provider_id: Uuid, now: DateTime<Utc>) -> RatingSummary {
        let summary = lifecycle::rating_summary(
            provider_id,
            self.reviews
                .values()
                .filter(|review| review.provider_id == provider_id)
                .map(|review| review.rating),
        );

        if let Some(user) = self.users.get_mut(&provider_id) {
            user.rating = summary.rating;
            user.review_count = summary.review_count;
            user.updated_at = now;
        }

        summary
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T, F>(mut items: Vec<T>, created_at: F) -> Vec<T>
where
    F: Fn(&T) -> DateTime<Utc>,
{
    items.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    items
}

#[async_trait]
impl MarketExt for MemoryStore {
    async fn save_user(&self, user: NewUser) -> Result<User, ServiceError> {
        let mut state = self.state.lock().await;

        if state.users.values().any(|existing| existing.email == user.email) {
            return Err(ServiceError::Validation(format!("Email {} already registered", user.email)));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            roles: user.roles,
            provider_status: user.provider_status,
            rating: 0.0,
            review_count: 0,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        let state = self.state.lock().await;
        Ok(state.users.get(&user_id).cloned())
    }

    async fn create_request(
        &self,
        owner_id: Uuid,
        request: NewServiceRequest,
    ) -> Result<ServiceRequest, ServiceError> {
        let mut state = self.state.lock().await;
        state.ensure_user(owner_id)?;

        let now = Utc::now();
        let request = ServiceRequest {
            id: Uuid::new_v4(),
            owner_id,
            vehicle_id: request.vehicle_id,
            title: request.title,
            description: request.description,
            urgency: request.urgency,
            status: RequestStatus::Open,
            image_urls: request.image_urls,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        state.requests.insert(request.id, request.clone());

        Ok(request)
    }

    async fn get_request(&self, request_id: Uuid) -> Result<Option<ServiceRequest>, ServiceError> {
        let state = self.state.lock().await;
        Ok(state.live_request(request_id).ok().cloned())
    }

    async fn get_owner_requests(&self, owner_id: Uuid) -> Result<Vec<ServiceRequest>, ServiceError> {
        let state = self.state.lock().await;
        let requests: Vec<ServiceRequest> = state
            .requests
            .values()
            .filter(|request| request.owner_id == owner_id && !request.is_deleted())
            .cloned()
            .collect();

        Ok(newest_first(requests, |request| request.created_at))
    }

    async fn get_open_requests(&self) -> Result<Vec<ServiceRequest>, ServiceError> {
        let state = self.state.lock().await;
        let requests: Vec<ServiceRequest> = state
            .requests
            .values()
            .filter(|request| {
                !request.is_deleted()
                    && matches!(request.status, RequestStatus::Open | RequestStatus::Quoted)
            })
            .cloned()
            .collect();

        Ok(newest_first(requests, |request| request.created_at))
    }

    async fn delete_request(
        &self,
        owner_id: Uuid,
        request_id: Uuid,
    ) -> Result<RequestRemoval, ServiceError> {
        let mut state = self.state.lock().await;

        let request = state.live_request(request_id)?;
        lifecycle::plan_request_removal(owner_id, request)?;

        let now = Utc::now();
        let rejected = state.reject_pending(request_id, None, now);

        let request = state
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| ServiceError::not_found("request", request_id))?;
        request.deleted_at = Some(now);
        request.updated_at = now;

        Ok(RequestRemoval {
            request: request.clone(),
            rejected,
        })
    }

    async fn submit_quote(
        &self,
        provider_id: Uuid,
        request_id: Uuid,
        quote: NewQuote,
    ) -> Result<QuoteSubmission, ServiceError> {
        let mut state = self.state.lock().await;

        let request = state.live_request(request_id)?;
        let previous_status = request.status;
        let next_status = lifecycle::plan_submission(provider_id, request)?;
        state.ensure_user(provider_id)?;

        let now = Utc::now();
        let created = Quote {
            id: Uuid::new_v4(),
            request_id,
            provider_id,
            amount: quote.amount,
            labor_cost: quote.labor_cost,
            parts_cost: quote.parts_cost,
            estimated_duration: quote.estimated_duration,
            description: quote.description,
            includes_warranty: quote.includes_warranty,
            status: QuoteStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        state.quotes.insert(created.id, created.clone());

        let request_advanced = next_status != previous_status;
        let request = if request_advanced {
            state.set_request_status(request_id, next_status, now)
        } else {
            state.requests.get(&request_id).cloned()
        }
        .ok_or_else(|| ServiceError::not_found("request", request_id))?;

        Ok(QuoteSubmission {
            quote: created,
            request,
            request_advanced,
        })
    }

    async fn get_quote(&self, quote_id: Uuid) -> Result<Option<Quote>, ServiceError> {
        let state = self.state.lock().await;
        Ok(state.quotes.get(&quote_id).cloned())
    }

    async fn get_request_quotes(&self, request_id: Uuid) -> Result<Vec<Quote>, ServiceError> {
        let state = self.state.lock().await;
        let mut quotes: Vec<Quote> = state
            .quotes
            .values()
            .filter(|quote| quote.request_id == request_id)
            .cloned()
            .collect();
        quotes.sort_by_key(|quote| quote.created_at);

        Ok(quotes)
    }

    async fn accept_quote(&self, owner_id: Uuid, quote_id: Uuid) -> Result<QuoteAcceptance, ServiceError> {
        let mut state = self.state.lock().await;

        let quote = state.quote(quote_id)?;
        let request = state.live_request(quote.request_id)?;
        let next_status = lifecycle::plan_acceptance(owner_id, quote, request)?;

        let request_id = request.id;
        let provider_id = quote.provider_id;
        let now = Utc::now();

        let quote = state
            .set_quote_status(quote_id, QuoteStatus::Accepted, now)
            .ok_or_else(|| ServiceError::not_found("quote", quote_id))?;
        let rejected = state.reject_pending(request_id, Some(quote_id), now);
        let request = state
            .set_request_status(request_id, next_status, now)
            .ok_or_else(|| ServiceError::not_found("request", request_id))?;

        let job = Job {
            id: Uuid::new_v4(),
            request_id,
            quote_id,
            owner_id,
            provider_id,
            status: JobStatus::Pending,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        state.jobs.insert(job.id, job.clone());

        Ok(QuoteAcceptance {
            quote,
            rejected,
            request,
            job,
        })
    }

    async fn reject_quote(&self, owner_id: Uuid, quote_id: Uuid) -> Result<Quote, ServiceError> {
        let mut state = self.state.lock().await;

        let quote = state.quote(quote_id)?;
        let request = state.live_request(quote.request_id)?;
        let next_status = lifecycle::plan_rejection(owner_id, quote, request)?;

        state
            .set_quote_status(quote_id, next_status, Utc::now())
            .ok_or_else(|| ServiceError::not_found("quote", quote_id))
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, ServiceError> {
        let state = self.state.lock().await;
        Ok(state.jobs.get(&job_id).cloned())
    }

    async fn get_jobs_for_quote(&self, quote_id: Uuid) -> Result<Vec<Job>, ServiceError> {
        let state = self.state.lock().await;
        Ok(state
            .jobs
            .values()
            .filter(|job| job.quote_id == quote_id)
            .cloned()
            .collect())
    }

    async fn get_user_jobs(&self, user_id: Uuid) -> Result<Vec<Job>, ServiceError> {
        let state = self.state.lock().await;
        let jobs: Vec<Job> = state
            .jobs
            .values()
            .filter(|job| job.owner_id == user_id || job.provider_id == user_id)
            .cloned()
            .collect();

        Ok(newest_first(jobs, |job| job.created_at))
    }

    async fn transition_job(
        &self,
        user_id: Uuid,
        job_id: Uuid,
        status: JobStatus,
    ) -> Result<JobTransitionResult, ServiceError> {
        let mut state = self.state.lock().await;

        let job = state
            .jobs
            .get(&job_id)
            .ok_or_else(|| ServiceError::not_found("job", job_id))?;
        let plan = lifecycle::plan_job_transition(job, user_id, status)?;

        let request_step = if plan.completes_request {
            let request = state
                .requests
                .get(&job.request_id)
                .ok_or_else(|| ServiceError::not_found("request", job.request_id))?;
            let next_status = lifecycle::advance_request(request, RequestEvent::JobCompleted)?;
            Some((request.id, next_status))
        } else {
            None
        };

        let now = Utc::now();
        let mut updated = job.clone();
        plan.apply(&mut updated, now);
        state.jobs.insert(job_id, updated.clone());

        let request = match request_step {
            Some((request_id, next_status)) => state.set_request_status(request_id, next_status, now),
            None => None,
        };

        Ok(JobTransitionResult {
            job: updated,
            previous: plan.from,
            request,
        })
    }

    async fn create_review(
        &self,
        owner_id: Uuid,
        review: NewReview,
    ) -> Result<(Review, RatingSummary), ServiceError> {
        let mut state = self.state.lock().await;

        let job = state
            .jobs
            .get(&review.job_id)
            .ok_or_else(|| ServiceError::not_found("job", review.job_id))?;
        let existing = state.reviews.values().find(|r| r.job_id == review.job_id);
        lifecycle::check_review_allowed(owner_id, job, existing)?;

        let now = Utc::now();
        let created = Review {
            id: Uuid::new_v4(),
            job_id: job.id,
            provider_id: job.provider_id,
            owner_id,
            rating: review.rating,
            comment: review.comment,
            response: None,
            responded_at: None,
            created_at: now,
            updated_at: now,
        };
        state.reviews.insert(created.id, created.clone());
        let summary = state.refresh_provider_rating(created.provider_id, now);

        Ok((created, summary))
    }

    async fn update_review(
        &self,
        owner_id: Uuid,
        review_id: Uuid,
        patch: ReviewPatch,
    ) -> Result<(Review, RatingSummary), ServiceError> {
        let mut state = self.state.lock().await;

        let review = state.review(review_id)?;
        lifecycle::ensure_review_author(review, owner_id, "update")?;

        let now = Utc::now();
        let mut updated = review.clone();
        if let Some(rating) = patch.rating {
            updated.rating = rating;
        }
        if let Some(comment) = patch.comment {
            updated.comment = Some(comment);
        }
        updated.updated_at = now;
        state.reviews.insert(review_id, updated.clone());
        let summary = state.refresh_provider_rating(updated.provider_id, now);

        Ok((updated, summary))
    }

    async fn delete_review(
        &self,
        owner_id: Uuid,
        review_id: Uuid,
    ) -> Result<(Review, RatingSummary), ServiceError> {
        let mut state = self.state.lock().await;

        let review = state.review(review_id)?;
        lifecycle::ensure_review_author(review, owner_id, "delete")?;

        let removed = state
            .reviews
            .remove(&review_id)
            .ok_or_else(|| ServiceError::not_found("review", review_id))?;
        let summary = state.refresh_provider_rating(removed.provider_id, Utc::now());

        Ok((removed, summary))
    }

    async fn respond_to_review(
        &self,
        provider_id: Uuid,
        review_id: Uuid,
        response: String,
    ) -> Result<Review, ServiceError> {
        let mut state = self.state.lock().await;

        let review = state.review(review_id)?;
        lifecycle::ensure_review_provider(review, provider_id)?;

        let now = Utc::now();
        let mut updated = review.clone();
        updated.response = Some(response);
        updated.responded_at = Some(now);
        updated.updated_at = now;
        state.reviews.insert(review_id, updated.clone());

        Ok(updated)
    }

    async fn get_provider_reviews(&self, provider_id: Uuid) -> Result<Vec<Review>, ServiceError> {
        let state = self.state.lock().await;
        let reviews: Vec<Review> = state
            .reviews
            .values()
            .filter(|review| review.provider_id == provider_id)
            .cloned()
            .collect();

        Ok(newest_first(reviews, |review| review.created_at))
    }

    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, ServiceError> {
        let mut state = self.state.lock().await;
        state.ensure_user(notification.user_id)?;

        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: notification.user_id,
            kind: notification.kind,
            title: notification.title,
            message: notification.message,
            link: notification.link,
            is_read: false,
            created_at: Utc::now(),
        };
        state.notifications.insert(notification.id, notification.clone());

        Ok(notification)
    }

    async fn get_user_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>, ServiceError> {
        let state = self.state.lock().await;
        let notifications: Vec<Notification> = state
            .notifications
            .values()
            .filter(|notification| notification.user_id == user_id)
            .cloned()
            .collect();

        Ok(newest_first(notifications, |notification| notification.created_at))
    }

    async fn mark_notification_read(
        &self,
        user_id: Uuid,
        notification_id: Uuid,
    ) -> Result<Notification, ServiceError> {
        let mut state = self.state.lock().await;

        let notification = state
            .notifications
            .get_mut(&notification_id)
            .filter(|notification| notification.user_id == user_id)
            .ok_or_else(|| ServiceError::not_found("notification", notification_id))?;
        notification.is_read = true;

        Ok(notification.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::BigDecimal;

    async fn seed_user(store: &MemoryStore, email: &str, roles: Vec<UserRole>) -> User {
        store
            .save_user(NewUser {
                name: email.split('@').next().unwrap_or("user").to_string(),
                email: email.to_string(),
                roles,
                provider_status: None,
            })
            .await
            .unwrap()
    }

    fn new_request() -> NewServiceRequest {
        NewServiceRequest {
            vehicle_id: Uuid::new_v4(),
            title: "Check engine light".to_string(),
            description: "Light came on after refuelling".to_string(),
            urgency: Urgency::High,
            image_urls: vec![],
        }
    }

    fn new_quote(amount: i64) -> NewQuote {
        NewQuote {
            amount: BigDecimal::from(amount),
            labor_cost: Some(BigDecimal::from(amount / 2)),
            parts_cost: None,
            estimated_duration: "3 hours".to_string(),
            description: None,
            includes_warranty: true,
        }
    }

    #[tokio::test]
    async fn test_failed_acceptance_leaves_no_trace() {
        let store = MemoryStore::new();
        let owner = seed_user(&store, "owner@example.com", vec![UserRole::Owner]).await;
        let provider = seed_user(&store, "garage@example.com", vec![UserRole::Provider]).await;
        let stranger = seed_user(&store, "someone@example.com", vec![UserRole::Owner]).await;

        let request = store.create_request(owner.id, new_request()).await.unwrap();
        let first = store.submit_quote(provider.id, request.id, new_quote(300)).await.unwrap();
        let second = store.submit_quote(provider.id, request.id, new_quote(280)).await.unwrap();

        let result = store.accept_quote(stranger.id, first.quote.id).await;
        assert!(matches!(result, Err(ServiceError::Forbidden { .. })));

        let quotes = store.get_request_quotes(request.id).await.unwrap();
        assert!(quotes.iter().all(|quote| quote.status == QuoteStatus::Pending));
        assert!(store.get_jobs_for_quote(first.quote.id).await.unwrap().is_empty());
        assert!(store.get_jobs_for_quote(second.quote.id).await.unwrap().is_empty());
        let request = store.get_request(request.id).await.unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Quoted);
    }

    #[tokio::test]
    async fn test_deleted_request_is_hidden_and_quotes_rejected() {
        let store = MemoryStore::new();
        let owner = seed_user(&store, "owner@example.com", vec![UserRole::Owner]).await;
        let provider = seed_user(&store, "garage@example.com", vec![UserRole::Provider]).await;

        let request = store.create_request(owner.id, new_request()).await.unwrap();
        let submission = store.submit_quote(provider.id, request.id, new_quote(150)).await.unwrap();

        let removal = store.delete_request(owner.id, request.id).await.unwrap();
        assert!(removal.request.is_deleted());
        assert_eq!(removal.rejected.len(), 1);
        assert_eq!(removal.rejected[0].id, submission.quote.id);

        assert!(store.get_request(request.id).await.unwrap().is_none());
        assert!(store.get_open_requests().await.unwrap().is_empty());
        assert!(matches!(
            store.submit_quote(provider.id, request.id, new_quote(100)).await,
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_notifications_are_scoped_to_their_user() {
        let store = MemoryStore::new();
        let owner = seed_user(&store, "owner@example.com", vec![UserRole::Owner]).await;
        let other = seed_user(&store, "other@example.com", vec![UserRole::Owner]).await;

        let notification = store
            .create_notification(NewNotification {
                user_id: owner.id,
                kind: "quote_received".to_string(),
                title: "New quote".to_string(),
                message: "You have a new quote".to_string(),
                link: None,
            })
            .await
            .unwrap();

        assert!(matches!(
            store.mark_notification_read(other.id, notification.id).await,
            Err(ServiceError::NotFound { .. })
        ));

        let read = store.mark_notification_read(owner.id, notification.id).await.unwrap();
        assert!(read.is_read);
        assert!(store.get_user_notifications(other.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryStore::new();
        seed_user(&store, "owner@example.com", vec![UserRole::Owner]).await;
        let duplicate = store
            .save_user(NewUser {
                name: "again".to_string(),
                email: "owner@example.com".to_string(),
                roles: vec![UserRole::Owner],
                provider_status: None,
            })
            .await;
        assert!(matches!(duplicate, Err(ServiceError::Validation(_))));
    }
}
