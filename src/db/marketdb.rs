// db/marketdb.rs
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::db::DBClient;
use crate::{
    models::{marketmodel::*, usermodel::*},
    service::{
        error::ServiceError,
        lifecycle::{self, RequestEvent},
    },
};

/// Entity store used by every lifecycle service.
///
/// Plain reads return `Ok(None)` for missing rows. The multi-row operations
/// (`submit_quote`, `accept_quote`, `transition_job`, the review writes and
/// `delete_request`) validate against the lifecycle tables and write inside a
/// single transaction: they either fully commit or leave nothing behind.
/// Soft-deleted requests are invisible to every method.
#[async_trait]
pub trait MarketExt: Send + Sync {
    // Users
    async fn save_user(&self, user: NewUser) -> Result<User, ServiceError>;

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, ServiceError>;

    // Requests
    async fn create_request(
        &self,
        owner_id: Uuid,
        request: NewServiceRequest,
    ) -> Result<ServiceRequest, ServiceError>;

    async fn get_request(&self, request_id: Uuid) -> Result<Option<ServiceRequest>, ServiceError>;

    async fn get_owner_requests(&self, owner_id: Uuid) -> Result<Vec<ServiceRequest>, ServiceError>;

    /// Requests still accepting quotes.
    async fn get_open_requests(&self) -> Result<Vec<ServiceRequest>, ServiceError>;

    async fn delete_request(
        &self,
        owner_id: Uuid,
        request_id: Uuid,
    ) -> Result<RequestRemoval, ServiceError>;

    // Quotes
    async fn submit_quote(
        &self,
        provider_id: Uuid,
        request_id: Uuid,
        quote: NewQuote,
    ) -> Result<QuoteSubmission, ServiceError>;

    async fn get_quote(&self, quote_id: Uuid) -> Result<Option<Quote>, ServiceError>;

    async fn get_request_quotes(&self, request_id: Uuid) -> Result<Vec<Quote>, ServiceError>;

    async fn accept_quote(&self, owner_id: Uuid, quote_id: Uuid) -> Result<QuoteAcceptance, ServiceError>;

    async fn reject_quote(&self, owner_id: Uuid, quote_id: Uuid) -> Result<Quote, ServiceError>;

    // Jobs
    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, ServiceError>;

    async fn get_jobs_for_quote(&self, quote_id: Uuid) -> Result<Vec<Job>, ServiceError>;

    /// Jobs where the user is either owner or provider.
    async fn get_user_jobs(&self, user_id: Uuid) -> Result<Vec<Job>, ServiceError>;

    async fn transition_job(
        &self,
        user_id: Uuid,
        job_id: Uuid,
        status: JobStatus,
    ) -> Result<JobTransitionResult, ServiceError>;

    // Reviews
    async fn create_review(
        &self,
        owner_id: Uuid,
        review: NewReview,
    ) -> Result<(Review, RatingSummary), ServiceError>;

    async fn update_review(
        &self,
        owner_id: Uuid,
        review_id: Uuid,
        patch: ReviewPatch,
    ) -> Result<(Review, RatingSummary), ServiceError>;

    async fn delete_review(
        &self,
        owner_id: Uuid,
        review_id: Uuid,
    ) -> Result<(Review, RatingSummary), ServiceError>;

    async fn respond_to_review(
        &self,
        provider_id: Uuid,
        review_id: Uuid,
        response: String,
    ) -> Result<Review, ServiceError>;

    async fn get_provider_reviews(&self, provider_id: Uuid) -> Result<Vec<Review>, ServiceError>;

    // Notifications
    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, ServiceError>;

    async fn get_user_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>, ServiceError>;

    async fn mark_notification_read(
        &self,
        user_id: Uuid,
        notification_id: Uuid,
    ) -> Result<Notification, ServiceError>;
}

#[async_trait]
impl MarketExt for DBClient {
    async fn save_user(&self, user: NewUser) -> Result<User, ServiceError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, roles, provider_status)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#
        )
        .bind(user.name)
        .bind(user.email)
        .bind(user.roles)
        .bind(user.provider_status)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn create_request(
        &self,
        owner_id: Uuid,
        request: NewServiceRequest,
    ) -> Result<ServiceRequest, ServiceError> {
        let request = sqlx::query_as::<_, ServiceRequest>(
            r#"
            INSERT INTO service_requests
            (owner_id, vehicle_id, title, description, urgency, image_urls)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#
        )
        .bind(owner_id)
        .bind(request.vehicle_id)
        .bind(request.title)
        .bind(request.description)
        .bind(request.urgency)
        .bind(request.image_urls)
        .fetch_one(&self.pool)
        .await?;

        Ok(request)
    }

    async fn get_request(&self, request_id: Uuid) -> Result<Option<ServiceRequest>, ServiceError> {
        let request = sqlx::query_as::<_, ServiceRequest>(
            "SELECT * FROM service_requests WHERE id = $1 AND deleted_at IS NULL"
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    async fn get_owner_requests(&self, owner_id: Uuid) -> Result<Vec<ServiceRequest>, ServiceError> {
        let requests = sqlx::query_as::<_, ServiceRequest>(
            r#"
            SELECT * FROM service_requests
            WHERE owner_id = $1 AND deleted_at IS NULL
            ORDER BY created_at DESC
            "#
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    async fn get_open_requests(&self) -> Result<Vec<ServiceRequest>, ServiceError> {
        let requests = sqlx::query_as::<_, ServiceRequest>(
            r#"
            SELECT * FROM service_requests
            WHERE status IN ('open'::request_status, 'quoted'::request_status)
            AND deleted_at IS NULL
            ORDER BY created_at DESC
            "#
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    async fn delete_request(
        &self,
        owner_id: Uuid,
        request_id: Uuid,
    ) -> Result<RequestRemoval, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let request = sqlx::query_as::<_, ServiceRequest>(
            "SELECT * FROM service_requests WHERE id = $1 AND deleted_at IS NULL FOR UPDATE"
        )
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServiceError::not_found("request", request_id))?;

        lifecycle::plan_request_removal(owner_id, &request)?;

        let rejected = sqlx::query_as::<_, Quote>(
            r#"
            UPDATE quotes
            SET status = 'rejected'::quote_status, updated_at = NOW()
            WHERE request_id = $1 AND status = 'pending'::quote_status
            RETURNING *
            "#
        )
        .bind(request_id)
        .fetch_all(&mut *tx)
        .await?;

        let request = sqlx::query_as::<_, ServiceRequest>(
            r#"
            UPDATE service_requests
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(request_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(RequestRemoval { request, rejected })
    }

    async fn submit_quote(
        &self,
        provider_id: Uuid,
        request_id: Uuid,
        quote: NewQuote,
    ) -> Result<QuoteSubmission, ServiceError> {
        let mut tx = self.pool.begin().await?;

        // Row lock: an acceptance on the same request must not interleave.
        let request = sqlx::query_as::<_, ServiceRequest>(
            "SELECT * FROM service_requests WHERE id = $1 AND deleted_at IS NULL FOR UPDATE"
        )
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServiceError::not_found("request", request_id))?;

        let next_status = lifecycle::plan_submission(provider_id, &request)?;

        let created = sqlx::query_as::<_, Quote>(
            r#"
            INSERT INTO quotes
            (request_id, provider_id, amount, labor_cost, parts_cost,
             estimated_duration, description, includes_warranty)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#
        )
        .bind(request_id)
        .bind(provider_id)
        .bind(quote.amount)
        .bind(quote.labor_cost)
        .bind(quote.parts_cost)
        .bind(quote.estimated_duration)
        .bind(quote.description)
        .bind(quote.includes_warranty)
        .fetch_one(&mut *tx)
        .await?;

        let request_advanced = next_status != request.status;
        let request = if request_advanced {
            sqlx::query_as::<_, ServiceRequest>(
                r#"
                UPDATE service_requests
                SET status = $2, updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#
            )
            .bind(request_id)
            .bind(next_status)
            .fetch_one(&mut *tx)
            .await?
        } else {
            request
        };

        tx.commit().await?;

        Ok(QuoteSubmission {
            quote: created,
            request,
            request_advanced,
        })
    }

    async fn get_quote(&self, quote_id: Uuid) -> Result<Option<Quote>, ServiceError> {
        let quote = sqlx::query_as::<_, Quote>("SELECT * FROM quotes WHERE id = $1")
            .bind(quote_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(quote)
    }

    async fn get_request_quotes(&self, request_id: Uuid) -> Result<Vec<Quote>, ServiceError> {
        let quotes = sqlx::query_as::<_, Quote>(
            r#"
            SELECT * FROM quotes
            WHERE request_id = $1
            ORDER BY created_at ASC
            "#
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(quotes)
    }

    async fn accept_quote(&self, owner_id: Uuid, quote_id: Uuid) -> Result<QuoteAcceptance, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let request_id: Uuid = sqlx::query_scalar("SELECT request_id FROM quotes WHERE id = $1")
            .bind(quote_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ServiceError::not_found("quote", quote_id))?;

        // Lock the request before reading its quotes. Two acceptances on sibling
        // quotes queue here and the second one sees the first one's writes.
        let request = sqlx::query_as::<_, ServiceRequest>(
            "SELECT * FROM service_requests WHERE id = $1 AND deleted_at IS NULL FOR UPDATE"
        )
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServiceError::not_found("request", request_id))?;

        let quote = sqlx::query_as::<_, Quote>("SELECT * FROM quotes WHERE id = $1 FOR UPDATE")
            .bind(quote_id)
            .fetch_one(&mut *tx)
            .await?;

        let next_status = lifecycle::plan_acceptance(owner_id, &quote, &request)?;

        let quote = sqlx::query_as::<_, Quote>(
            r#"
            UPDATE quotes
            SET status = 'accepted'::quote_status, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(quote_id)
        .fetch_one(&mut *tx)
        .await?;

        let rejected = sqlx::query_as::<_, Quote>(
            r#"
            UPDATE quotes
            SET status = 'rejected'::quote_status, updated_at = NOW()
            WHERE request_id = $1 AND id <> $2 AND status = 'pending'::quote_status
            RETURNING *
            "#
        )
        .bind(request_id)
        .bind(quote_id)
        .fetch_all(&mut *tx)
        .await?;

        let request = sqlx::query_as::<_, ServiceRequest>(
            r#"
            UPDATE service_requests
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(request_id)
        .bind(next_status)
        .fetch_one(&mut *tx)
        .await?;

        let job = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (request_id, quote_id, owner_id, provider_id, status)
            VALUES ($1, $2, $3, $4, 'pending'::job_status)
            RETURNING *
            "#
        )
        .bind(request_id)
        .bind(quote_id)
        .bind(owner_id)
        .bind(quote.provider_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(QuoteAcceptance {
            quote,
            rejected,
            request,
            job,
        })
    }

    async fn reject_quote(&self, owner_id: Uuid, quote_id: Uuid) -> Result<Quote, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let request_id: Uuid = sqlx::query_scalar("SELECT request_id FROM quotes WHERE id = $1")
            .bind(quote_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ServiceError::not_found("quote", quote_id))?;

        let request = sqlx::query_as::<_, ServiceRequest>(
            "SELECT * FROM service_requests WHERE id = $1 AND deleted_at IS NULL FOR UPDATE"
        )
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServiceError::not_found("request", request_id))?;

        let quote = sqlx::query_as::<_, Quote>("SELECT * FROM quotes WHERE id = $1 FOR UPDATE")
            .bind(quote_id)
            .fetch_one(&mut *tx)
            .await?;

        let next_status = lifecycle::plan_rejection(owner_id, &quote, &request)?;

        let quote = sqlx::query_as::<_, Quote>(
            r#"
            UPDATE quotes
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(quote_id)
        .bind(next_status)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(quote)
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, ServiceError> {
        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(job)
    }

    async fn get_jobs_for_quote(&self, quote_id: Uuid) -> Result<Vec<Job>, ServiceError> {
        let jobs = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE quote_id = $1")
            .bind(quote_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(jobs)
    }

    async fn get_user_jobs(&self, user_id: Uuid) -> Result<Vec<Job>, ServiceError> {
        let jobs = sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE owner_id = $1 OR provider_id = $1
            ORDER BY created_at DESC
            "#
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    async fn transition_job(
        &self,
        user_id: Uuid,
        job_id: Uuid,
        status: JobStatus,
    ) -> Result<JobTransitionResult, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1 FOR UPDATE")
            .bind(job_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ServiceError::not_found("job", job_id))?;

        let plan = lifecycle::plan_job_transition(&job, user_id, status)?;

        let mut next = job.clone();
        plan.apply(&mut next, Utc::now());

        let updated = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET status = $2, started_at = $3, completed_at = $4, updated_at = $5
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(job_id)
        .bind(next.status)
        .bind(next.started_at)
        .bind(next.completed_at)
        .bind(next.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        let request = if plan.completes_request {
            let request = sqlx::query_as::<_, ServiceRequest>(
                "SELECT * FROM service_requests WHERE id = $1 FOR UPDATE"
            )
            .bind(job.request_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ServiceError::not_found("request", job.request_id))?;

            let next_status = lifecycle::advance_request(&request, RequestEvent::JobCompleted)?;

            let request = sqlx::query_as::<_, ServiceRequest>(
                r#"
                UPDATE service_requests
                SET status = $2, updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#
            )
            .bind(job.request_id)
            .bind(next_status)
            .fetch_one(&mut *tx)
            .await?;

            Some(request)
        } else {
            None
        };

        tx.commit().await?;

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
        let mut tx = self.pool.begin().await?;

        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1 FOR UPDATE")
            .bind(review.job_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ServiceError::not_found("job", review.job_id))?;

        let existing = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE job_id = $1")
            .bind(review.job_id)
            .fetch_optional(&mut *tx)
            .await?;

        lifecycle::check_review_allowed(owner_id, &job, existing.as_ref())?;

        lock_provider(&mut tx, job.provider_id).await?;

        let created = sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (job_id, provider_id, owner_id, rating, comment)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#
        )
        .bind(job.id)
        .bind(job.provider_id)
        .bind(owner_id)
        .bind(review.rating)
        .bind(review.comment)
        .fetch_one(&mut *tx)
        .await?;

        let summary = refresh_provider_rating(&mut tx, job.provider_id).await?;

        tx.commit().await?;

        Ok((created, summary))
    }

    async fn update_review(
        &self,
        owner_id: Uuid,
        review_id: Uuid,
        patch: ReviewPatch,
    ) -> Result<(Review, RatingSummary), ServiceError> {
        let mut tx = self.pool.begin().await?;

        let review = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = $1 FOR UPDATE")
            .bind(review_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ServiceError::not_found("review", review_id))?;

        lifecycle::ensure_review_author(&review, owner_id, "update")?;

        lock_provider(&mut tx, review.provider_id).await?;

        let updated = sqlx::query_as::<_, Review>(
            r#"
            UPDATE reviews
            SET rating = COALESCE($2, rating),
                comment = COALESCE($3, comment),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(review_id)
        .bind(patch.rating)
        .bind(patch.comment)
        .fetch_one(&mut *tx)
        .await?;

        let summary = refresh_provider_rating(&mut tx, review.provider_id).await?;

        tx.commit().await?;

        Ok((updated, summary))
    }

    async fn delete_review(
        &self,
        owner_id: Uuid,
        review_id: Uuid,
    ) -> Result<(Review, RatingSummary), ServiceError> {
        let mut tx = self.pool.begin().await?;

        let review = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = $1 FOR UPDATE")
            .bind(review_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ServiceError::not_found("review", review_id))?;

        lifecycle::ensure_review_author(&review, owner_id, "delete")?;

        lock_provider(&mut tx, review.provider_id).await?;

        sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(review_id)
            .execute(&mut *tx)
            .await?;

        let summary = refresh_provider_rating(&mut tx, review.provider_id).await?;

        tx.commit().await?;

        Ok((review, summary))
    }

    async fn respond_to_review(
        &self,
        provider_id: Uuid,
        review_id: Uuid,
        response: String,
    ) -> Result<Review, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let review = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = $1 FOR UPDATE")
            .bind(review_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ServiceError::not_found("review", review_id))?;

        lifecycle::ensure_review_provider(&review, provider_id)?;

        let updated = sqlx::query_as::<_, Review>(
            r#"
            UPDATE reviews
            SET response = $2, responded_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(review_id)
        .bind(response)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(updated)
    }

    async fn get_provider_reviews(&self, provider_id: Uuid) -> Result<Vec<Review>, ServiceError> {
        let reviews = sqlx::query_as::<_, Review>(
            r#"
            SELECT * FROM reviews
            WHERE provider_id = $1
            ORDER BY created_at DESC
            "#
        )
        .bind(provider_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reviews)
    }

    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, ServiceError> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (user_id, kind, title, message, link)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#
        )
        .bind(notification.user_id)
        .bind(notification.kind)
        .bind(notification.title)
        .bind(notification.message)
        .bind(notification.link)
        .fetch_one(&self.pool)
        .await?;

        Ok(notification)
    }

    async fn get_user_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>, ServiceError> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT 100
            "#
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    async fn mark_notification_read(
        &self,
        user_id: Uuid,
        notification_id: Uuid,
    ) -> Result<Notification, ServiceError> {
        sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications
            SET is_read = TRUE
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#
        )
        .bind(notification_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("notification", notification_id))
    }
}

/// Serializes rating recomputation per provider.
async fn lock_provider(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    provider_id: Uuid,
) -> Result<(), ServiceError> {
    sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
        .bind(provider_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| ServiceError::not_found("user", provider_id))?;

    Ok(())
}

async fn refresh_provider_rating(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    provider_id: Uuid,
) -> Result<RatingSummary, ServiceError> {
    let (rating, review_count): (f64, i32) = sqlx::query_as(
        r#"
        UPDATE users
        SET rating = COALESCE(
                (SELECT AVG(rating)::DOUBLE PRECISION FROM reviews WHERE provider_id = $1),
                0
            ),
            review_count = (SELECT COUNT(*)::INTEGER FROM reviews WHERE provider_id = $1),
            updated_at = NOW()
        WHERE id = $1
        RETURNING rating, review_count
        "#
    )
    .bind(provider_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(RatingSummary {
        provider_id,
        rating,
        review_count,
    })
}
