use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "request_urgency", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Emergency,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "request_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Open,
    Quoted,
    InProgress,
    Completed,
}

impl RequestStatus {
    pub fn to_str(&self) -> &str {
        match self {
            RequestStatus::Open => "open",
            RequestStatus::Quoted => "quoted",
            RequestStatus::InProgress => "in_progress",
            RequestStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "quote_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Pending,
    Accepted,
    Rejected,
}

impl QuoteStatus {
    pub fn to_str(&self) -> &str {
        match self {
            QuoteStatus::Pending => "pending",
            QuoteStatus::Accepted => "accepted",
            QuoteStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    /// Provider reports the work done; waiting for the owner to confirm.
    PendingConfirmation,
    Completed,
}

impl JobStatus {
    pub fn to_str(&self) -> &str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in_progress",
            JobStatus::PendingConfirmation => "pending_confirmation",
            JobStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ServiceRequest {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub vehicle_id: Uuid,
    pub title: String,
    pub description: String,
    pub urgency: Urgency,
    pub status: RequestStatus,
    pub image_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ServiceRequest {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewServiceRequest {
    pub vehicle_id: Uuid,
    pub title: String,
    pub description: String,
    pub urgency: Urgency,
    pub image_urls: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Quote {
    pub id: Uuid,
    pub request_id: Uuid,
    pub provider_id: Uuid,
    pub amount: BigDecimal,
    pub labor_cost: Option<BigDecimal>,
    pub parts_cost: Option<BigDecimal>,
    pub estimated_duration: String,
    pub description: Option<String>,
    pub includes_warranty: bool,
    pub status: QuoteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewQuote {
    pub amount: BigDecimal,
    pub labor_cost: Option<BigDecimal>,
    pub parts_cost: Option<BigDecimal>,
    pub estimated_duration: String,
    pub description: Option<String>,
    pub includes_warranty: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    pub id: Uuid,
    pub request_id: Uuid,
    pub quote_id: Uuid,
    pub owner_id: Uuid,
    pub provider_id: Uuid,
    pub status: JobStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Review {
    pub id: Uuid,
    pub job_id: Uuid,
    pub provider_id: Uuid,
    pub owner_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub response: Option<String>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub job_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReviewPatch {
    pub rating: Option<i32>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

// Results of the atomic store operations

#[derive(Debug, Clone, Serialize)]
pub struct QuoteSubmission {
    pub quote: Quote,
    pub request: ServiceRequest,
    /// True when this submission moved the request from open to quoted.
    pub request_advanced: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuoteAcceptance {
    pub quote: Quote,
    pub rejected: Vec<Quote>,
    pub request: ServiceRequest,
    pub job: Job,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobTransitionResult {
    pub job: Job,
    pub previous: JobStatus,
    /// Parent request, present when the transition completed it.
    pub request: Option<ServiceRequest>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestRemoval {
    pub request: ServiceRequest,
    pub rejected: Vec<Quote>,
}
