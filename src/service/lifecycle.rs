// service/lifecycle.rs
//! Transition tables for requests, quotes and jobs, plus the ownership rules
//! guarding them.
//!
//! Everything here is pure. The store implementations call these functions
//! while holding their transaction (or lock), so the same rules decide the
//! outcome whether the data lives in Postgres or in memory.
use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    models::{marketmodel::*, usermodel::RatingSummary},
    service::error::ServiceError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestEvent {
    QuoteSubmitted,
    QuoteAccepted,
    JobCompleted,
}

impl fmt::Display for RequestEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestEvent::QuoteSubmitted => "quote_submitted",
            RequestEvent::QuoteAccepted => "quote_accepted",
            RequestEvent::JobCompleted => "job_completed",
        };
        f.write_str(name)
    }
}

pub fn request_transition(current: RequestStatus, event: RequestEvent) -> Option<RequestStatus> {
    use RequestEvent::*;
    use RequestStatus::*;

    match (current, event) {
        (Open, QuoteSubmitted) | (Quoted, QuoteSubmitted) => Some(Quoted),
        (Quoted, QuoteAccepted) => Some(InProgress),
        (InProgress, JobCompleted) => Some(Completed),
        _ => None,
    }
}

pub fn advance_request(
    request: &ServiceRequest,
    event: RequestEvent,
) -> Result<RequestStatus, ServiceError> {
    request_transition(request.status, event)
        .ok_or_else(|| ServiceError::invalid_state("request", request.id, request.status, event))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteEvent {
    Accept,
    Reject,
}

impl fmt::Display for QuoteEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteEvent::Accept => f.write_str("accept"),
            QuoteEvent::Reject => f.write_str("reject"),
        }
    }
}

/// Accepted and rejected are terminal.
pub fn quote_transition(current: QuoteStatus, event: QuoteEvent) -> Option<QuoteStatus> {
    match (current, event) {
        (QuoteStatus::Pending, QuoteEvent::Accept) => Some(QuoteStatus::Accepted),
        (QuoteStatus::Pending, QuoteEvent::Reject) => Some(QuoteStatus::Rejected),
        _ => None,
    }
}

pub fn advance_quote(quote: &Quote, event: QuoteEvent) -> Result<QuoteStatus, ServiceError> {
    quote_transition(quote.status, event)
        .ok_or_else(|| ServiceError::invalid_state("quote", quote.id, quote.status, event))
}

/// Checks a provider may quote on `request` and returns the request's next status.
pub fn plan_submission(provider_id: Uuid, request: &ServiceRequest) -> Result<RequestStatus, ServiceError> {
    if request.owner_id == provider_id {
        return Err(ServiceError::forbidden(provider_id, "quote on their own request"));
    }
    advance_request(request, RequestEvent::QuoteSubmitted)
}

/// Checks `owner_id` may accept `quote` and returns the request's next status.
pub fn plan_acceptance(
    owner_id: Uuid,
    quote: &Quote,
    request: &ServiceRequest,
) -> Result<RequestStatus, ServiceError> {
    ensure_request_owner(request, owner_id, "accept quotes on this request")?;
    advance_quote(quote, QuoteEvent::Accept)?;
    advance_request(request, RequestEvent::QuoteAccepted)
}

pub fn plan_rejection(
    owner_id: Uuid,
    quote: &Quote,
    request: &ServiceRequest,
) -> Result<QuoteStatus, ServiceError> {
    ensure_request_owner(request, owner_id, "reject quotes on this request")?;
    advance_quote(quote, QuoteEvent::Reject)
}

/// A request can be withdrawn by its owner until a job exists for it.
pub fn plan_request_removal(owner_id: Uuid, request: &ServiceRequest) -> Result<(), ServiceError> {
    ensure_request_owner(request, owner_id, "delete this request")?;
    match request.status {
        RequestStatus::Open | RequestStatus::Quoted => Ok(()),
        current => Err(ServiceError::invalid_state("request", request.id, current, "delete")),
    }
}

fn ensure_request_owner(request: &ServiceRequest, user_id: Uuid, action: &str) -> Result<(), ServiceError> {
    if request.owner_id != user_id {
        return Err(ServiceError::forbidden(user_id, action));
    }
    Ok(())
}

/// Forward edges of the job lifecycle. `PendingConfirmation` is an optional
/// stop between `InProgress` and `Completed`.
pub fn job_edge(from: JobStatus, to: JobStatus) -> bool {
    use JobStatus::*;

    matches!(
        (from, to),
        (Pending, InProgress)
            | (InProgress, PendingConfirmation)
            | (InProgress, Completed)
            | (PendingConfirmation, Completed)
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobParty {
    Owner,
    Provider,
}

/// The caller's relationship to the job. Provider wins when a user is both.
pub fn job_party(job: &Job, user_id: Uuid) -> Option<JobParty> {
    if job.provider_id == user_id {
        Some(JobParty::Provider)
    } else if job.owner_id == user_id {
        Some(JobParty::Owner)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobTransition {
    pub from: JobStatus,
    pub to: JobStatus,
    pub stamp_started: bool,
    pub stamp_completed: bool,
    pub completes_request: bool,
}

impl JobTransition {
    pub fn apply(&self, job: &mut Job, now: DateTime<Utc>) {
        job.status = self.to;
        if self.stamp_started {
            job.started_at = Some(now);
        }
        if self.stamp_completed {
            job.completed_at = Some(now);
        }
        job.updated_at = now;
    }
}

/// Decides whether `user_id` may move `job` to `requested`.
///
/// Providers may take any forward edge. Owners may only confirm a job the
/// provider has put in `PendingConfirmation`.
pub fn plan_job_transition(
    job: &Job,
    user_id: Uuid,
    requested: JobStatus,
) -> Result<JobTransition, ServiceError> {
    let party = job_party(job, user_id)
        .ok_or_else(|| ServiceError::forbidden(user_id, format!("update job {}", job.id)))?;

    if job.status == JobStatus::Completed {
        return Err(ServiceError::invalid_state("job", job.id, job.status, requested));
    }

    match party {
        JobParty::Owner => {
            if requested != JobStatus::Completed {
                return Err(ServiceError::forbidden(
                    user_id,
                    format!("move job {} to {}", job.id, requested),
                ));
            }
            if job.status != JobStatus::PendingConfirmation {
                return Err(ServiceError::invalid_state("job", job.id, job.status, requested));
            }
        }
        JobParty::Provider => {
            if !job_edge(job.status, requested) {
                return Err(ServiceError::invalid_state("job", job.id, job.status, requested));
            }
        }
    }

    Ok(JobTransition {
        from: job.status,
        to: requested,
        stamp_started: requested == JobStatus::InProgress && job.started_at.is_none(),
        stamp_completed: requested == JobStatus::Completed && job.completed_at.is_none(),
        completes_request: requested == JobStatus::Completed,
    })
}

pub fn validate_rating(rating: i32) -> Result<(), ServiceError> {
    if !(1..=5).contains(&rating) {
        return Err(ServiceError::Validation(format!(
            "Rating must be between 1 and 5, got {}",
            rating
        )));
    }
    Ok(())
}

/// Review gate: only the owner of a completed job, and only once.
pub fn check_review_allowed(
    owner_id: Uuid,
    job: &Job,
    existing: Option<&Review>,
) -> Result<(), ServiceError> {
    if job.owner_id != owner_id {
        return Err(ServiceError::forbidden(owner_id, format!("review job {}", job.id)));
    }
    if job.status != JobStatus::Completed {
        return Err(ServiceError::invalid_state("job", job.id, job.status, "review"));
    }
    if let Some(review) = existing {
        return Err(ServiceError::invalid_state("review", review.id, "exists", "create"));
    }
    Ok(())
}

pub fn ensure_review_author(review: &Review, user_id: Uuid, action: &str) -> Result<(), ServiceError> {
    if review.owner_id != user_id {
        return Err(ServiceError::forbidden(user_id, format!("{} review {}", action, review.id)));
    }
    Ok(())
}

pub fn ensure_review_provider(review: &Review, user_id: Uuid) -> Result<(), ServiceError> {
    if review.provider_id != user_id {
        return Err(ServiceError::forbidden(user_id, format!("respond to review {}", review.id)));
    }
    Ok(())
}

pub fn rating_summary<I>(provider_id: Uuid, ratings: I) -> RatingSummary
where
    I: IntoIterator<Item = i32>,
{
    let (sum, count) = ratings
        .into_iter()
        .fold((0i64, 0i32), |(sum, count), rating| (sum + rating as i64, count + 1));

    let rating = if count == 0 { 0.0 } else { sum as f64 / count as f64 };

    RatingSummary {
        provider_id,
        rating,
        review_count: count,
    }
}
