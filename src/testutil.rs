// Shared fixtures for the service tests.
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::{
    db::{marketdb::MarketExt, memory::MemoryStore},
    mail::sendmail::{validate_email, MailError, Mailer},
    models::{marketmodel::*, usermodel::*},
    service::{
        job_service::JobService, notification_service::NotificationService,
        quote_service::QuoteService, request_service::RequestService,
        review_service::ReviewService,
    },
};

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub template: String,
}

#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentEmail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn templates(&self) -> Vec<String> {
        self.sent().into_iter().map(|email| email.template).collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        template: &str,
        _placeholders: &[(String, String)],
    ) -> Result<(), MailError> {
        validate_email(to_email)?;
        self.sent.lock().unwrap().push(SentEmail {
            to: to_email.to_string(),
            subject: subject.to_string(),
            template: template.to_string(),
        });
        Ok(())
    }
}

pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send_email(
        &self,
        _to_email: &str,
        _subject: &str,
        _template: &str,
        _placeholders: &[(String, String)],
    ) -> Result<(), MailError> {
        Err(MailError::Delivery("mail provider unavailable".to_string()))
    }
}

pub fn sample_request() -> NewServiceRequest {
    NewServiceRequest {
        vehicle_id: Uuid::new_v4(),
        title: "Grinding noise when braking".to_string(),
        description: "Front left wheel grinds below 20 km/h".to_string(),
        urgency: Urgency::Medium,
        image_urls: vec!["https://img.example.com/brake.jpg".to_string()],
    }
}

pub fn sample_quote(amount: i64) -> NewQuote {
    NewQuote {
        amount: BigDecimal::from(amount),
        labor_cost: Some(BigDecimal::from(amount / 2)),
        parts_cost: Some(BigDecimal::from(amount - amount / 2)),
        estimated_duration: "2 days".to_string(),
        description: Some("Replace pads and skim discs".to_string()),
        includes_warranty: true,
    }
}

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub notifications: Arc<NotificationService>,
    pub requests: RequestService,
    pub quotes: QuoteService,
    pub jobs: JobService,
    pub reviews: ReviewService,
    pub owner: User,
    pub provider: User,
    pub other_provider: User,
    /// Owner role only, unrelated to any fixture request.
    pub stranger: User,
    /// Holds both owner and provider roles.
    pub hybrid: User,
}

impl Fixture {
    pub async fn new() -> Self {
        let mailer = Arc::new(RecordingMailer::default());
        Self::build(mailer.clone(), mailer).await
    }

    pub async fn with_mailer(mailer: Arc<dyn Mailer>) -> Self {
        Self::build(mailer, Arc::new(RecordingMailer::default())).await
    }

    async fn build(mailer: Arc<dyn Mailer>, recording: Arc<RecordingMailer>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let dyn_store: Arc<dyn MarketExt> = store.clone();

        let notifications = Arc::new(
            NotificationService::new(dyn_store.clone(), mailer, "http://localhost:3000".to_string())
                .inline(),
        );

        let owner = seed_user(&store, "Olu Owner", "owner@example.com", vec![UserRole::Owner]).await;
        let provider = seed_user(&store, "Ace Garage", "ace@garage.example.com", vec![UserRole::Provider]).await;
        let other_provider =
            seed_user(&store, "Bolt Motors", "bolt@garage.example.com", vec![UserRole::Provider]).await;
        let stranger = seed_user(&store, "Sam Stranger", "sam@example.com", vec![UserRole::Owner]).await;
        let hybrid = seed_user(
            &store,
            "Dual Role",
            "dual@example.com",
            vec![UserRole::Owner, UserRole::Provider],
        )
        .await;

        Self {
            requests: RequestService::new(dyn_store.clone(), notifications.clone()),
            quotes: QuoteService::new(dyn_store.clone(), notifications.clone()),
            jobs: JobService::new(dyn_store.clone(), notifications.clone()),
            reviews: ReviewService::new(dyn_store, notifications.clone()),
            store,
            mailer: recording,
            notifications,
            owner,
            provider,
            other_provider,
            stranger,
            hybrid,
        }
    }

    pub async fn open_request(&self) -> ServiceRequest {
        self.requests
            .create_request(&self.owner.as_caller(), sample_request())
            .await
            .unwrap()
    }

    /// An owner request carrying one pending quote from `provider`.
    pub async fn quoted_request(&self) -> (ServiceRequest, Quote) {
        let request = self.open_request().await;
        let submission = self
            .quotes
            .submit_quote(&self.provider.as_caller(), request.id, sample_quote(200))
            .await
            .unwrap();
        (submission.request, submission.quote)
    }

    pub async fn accepted_job(&self) -> (QuoteAcceptance, ServiceRequest) {
        let (_, quote) = self.quoted_request().await;
        let acceptance = self
            .quotes
            .accept_quote(&self.owner.as_caller(), quote.id)
            .await
            .unwrap();
        let request = acceptance.request.clone();
        (acceptance, request)
    }

    pub async fn completed_job(&self) -> Job {
        let (acceptance, _) = self.accepted_job().await;
        let provider = self.provider.as_caller();
        self.jobs
            .update_job_status(&provider, acceptance.job.id, JobStatus::InProgress)
            .await
            .unwrap();
        self.jobs
            .update_job_status(&provider, acceptance.job.id, JobStatus::Completed)
            .await
            .unwrap()
            .job
    }
}

async fn seed_user(store: &MemoryStore, name: &str, email: &str, roles: Vec<UserRole>) -> User {
    let provider_status = roles
        .contains(&UserRole::Provider)
        .then_some(ProviderStatus::Approved);

    store
        .save_user(NewUser {
            name: name.to_string(),
            email: email.to_string(),
            roles,
            provider_status,
        })
        .await
        .unwrap()
}
