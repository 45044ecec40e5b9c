// service/notification_service.rs
use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use num_traits::ToPrimitive;
use uuid::Uuid;

use crate::{
    db::marketdb::MarketExt,
    mail::{mails, sendmail::Mailer},
    models::{marketmodel::*, usermodel::User},
    service::error::ServiceError,
};

/// In-app notifications and transactional email.
///
/// Everything here runs after the lifecycle transaction has committed. Errors
/// are logged and dropped; none of the `notify_*` methods can fail.
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn MarketExt>,
    mailer: Arc<dyn Mailer>,
    app_url: String,
    background: bool,
}

impl NotificationService {
    pub fn new(store: Arc<dyn MarketExt>, mailer: Arc<dyn Mailer>, app_url: String) -> Self {
        Self {
            store,
            mailer,
            app_url,
            background: true,
        }
    }

    /// Deliver on the caller's task instead of spawning. Tests use this to
    /// observe deliveries deterministically.
    pub fn inline(mut self) -> Self {
        self.background = false;
        self
    }

    async fn dispatch<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.background {
            tokio::spawn(task);
        } else {
            task.await;
        }
    }

    fn job_link(&self, job_id: Uuid) -> String {
        format!("{}/jobs/{}", self.app_url, job_id)
    }

    fn request_link(&self, request_id: Uuid) -> String {
        format!("{}/requests/{}", self.app_url, request_id)
    }

    /// Stores an in-app notification. Never fails.
    pub async fn notify(
        &self,
        user_id: Uuid,
        kind: &str,
        title: &str,
        message: String,
        link: Option<String>,
    ) {
        tracing::info!(%user_id, kind, "Notification: {}", title);

        let result = self
            .store
            .create_notification(NewNotification {
                user_id,
                kind: kind.to_string(),
                title: title.to_string(),
                message,
                link,
            })
            .await;

        if let Err(e) = result {
            tracing::warn!(%user_id, kind, "Failed to store notification: {}", e);
        }
    }

    async fn load_user(&self, user_id: Uuid) -> Option<User> {
        match self.store.get_user(user_id).await {
            Ok(Some(user)) => Some(user),
            Ok(None) => {
                tracing::warn!(%user_id, "Notification recipient no longer exists");
                None
            }
            Err(e) => {
                tracing::warn!(%user_id, "Failed to load notification recipient: {}", e);
                None
            }
        }
    }

    pub async fn notify_quote_received(&self, submission: &QuoteSubmission) {
        let this = self.clone();
        let submission = submission.clone();
        self.dispatch(async move {
            let request = &submission.request;
            this.notify(
                request.owner_id,
                "quote_received",
                "New quote received",
                format!(
                    "A provider quoted {} for \"{}\"",
                    format_amount(&submission.quote.amount),
                    request.title
                ),
                Some(this.request_link(request.id)),
            )
            .await;
        })
        .await;
    }

    pub async fn notify_quote_accepted(&self, acceptance: &QuoteAcceptance) {
        let this = self.clone();
        let acceptance = acceptance.clone();
        self.dispatch(async move { this.deliver_quote_accepted(&acceptance).await })
            .await;
    }

    async fn deliver_quote_accepted(&self, acceptance: &QuoteAcceptance) {
        let job = &acceptance.job;
        let request = &acceptance.request;
        let job_link = self.job_link(job.id);

        self.notify(
            job.provider_id,
            "quote_accepted",
            "Quote accepted",
            format!("Your quote for \"{}\" was accepted. The job is booked.", request.title),
            Some(job_link.clone()),
        )
        .await;

        join_all(acceptance.rejected.iter().map(|quote| {
            self.notify(
                quote.provider_id,
                "quote_rejected",
                "Quote declined",
                format!("The owner chose another quote for \"{}\"", request.title),
                Some(self.request_link(request.id)),
            )
        }))
        .await;

        let provider = self.load_user(job.provider_id).await;
        let owner = self.load_user(job.owner_id).await;

        if let Some(provider) = &provider {
            if let Err(e) = mails::send_quote_accepted_email(
                self.mailer.as_ref(),
                &provider.email,
                &provider.name,
                &request.title,
                &format_amount(&acceptance.quote.amount),
                &job_link,
            )
            .await
            {
                tracing::warn!(job_id = %job.id, "Failed to send quote accepted email: {}", e);
            }
        }

        if let (Some(owner), Some(provider)) = (&owner, &provider) {
            if let Err(e) = mails::send_job_created_email(
                self.mailer.as_ref(),
                &owner.email,
                &owner.name,
                &request.title,
                &provider.name,
                &job_link,
            )
            .await
            {
                tracing::warn!(job_id = %job.id, "Failed to send job created email: {}", e);
            }
        }
    }

    pub async fn notify_quote_rejected(&self, quote: &Quote) {
        let this = self.clone();
        let quote = quote.clone();
        self.dispatch(async move {
            this.notify(
                quote.provider_id,
                "quote_rejected",
                "Quote declined",
                format!("Your quote of {} was declined", format_amount(&quote.amount)),
                Some(this.request_link(quote.request_id)),
            )
            .await;
        })
        .await;
    }

    pub async fn notify_job_status(&self, result: &JobTransitionResult) {
        let this = self.clone();
        let result = result.clone();
        self.dispatch(async move { this.deliver_job_status(&result).await })
            .await;
    }

    async fn deliver_job_status(&self, result: &JobTransitionResult) {
        let job = &result.job;
        let job_link = self.job_link(job.id);

        match job.status {
            JobStatus::InProgress => {
                self.notify(
                    job.owner_id,
                    "job_started",
                    "Work has started",
                    "The provider has started working on your vehicle".to_string(),
                    Some(job_link),
                )
                .await;
            }
            JobStatus::PendingConfirmation => {
                self.notify(
                    job.owner_id,
                    "job_awaiting_confirmation",
                    "Please confirm the job",
                    "The provider marked the work as done. Please confirm completion.".to_string(),
                    Some(job_link),
                )
                .await;
            }
            JobStatus::Completed => {
                self.notify(
                    job.owner_id,
                    "job_completed",
                    "Job completed",
                    "Your job is complete. Please review and pay.".to_string(),
                    Some(job_link.clone()),
                )
                .await;
                if result.previous == JobStatus::PendingConfirmation {
                    self.notify(
                        job.provider_id,
                        "job_confirmed",
                        "Job confirmed",
                        "The owner confirmed the job is complete".to_string(),
                        Some(job_link.clone()),
                    )
                    .await;
                }
                self.send_completion_emails(result, &job_link).await;
            }
            JobStatus::Pending => {}
        }
    }

    async fn send_completion_emails(&self, result: &JobTransitionResult, job_link: &str) {
        let job = &result.job;
        let Some(owner) = self.load_user(job.owner_id).await else {
            return;
        };

        let request_title = match &result.request {
            Some(request) => request.title.clone(),
            None => "your vehicle".to_string(),
        };

        if let Err(e) = mails::send_job_status_email(
            self.mailer.as_ref(),
            &owner.email,
            &owner.name,
            &request_title,
            job.status.to_str(),
            job_link,
        )
        .await
        {
            tracing::warn!(job_id = %job.id, "Failed to send job status email: {}", e);
        }

        let provider_name = self
            .load_user(job.provider_id)
            .await
            .map(|provider| provider.name)
            .unwrap_or_else(|| "Your provider".to_string());

        if let Err(e) = mails::send_review_reminder_email(
            self.mailer.as_ref(),
            &owner.email,
            &owner.name,
            &provider_name,
            &format!("{}/reviews/new?job_id={}", self.app_url, job.id),
        )
        .await
        {
            tracing::warn!(job_id = %job.id, "Failed to send review reminder email: {}", e);
        }
    }

    pub async fn notify_review_created(&self, review: &Review) {
        let this = self.clone();
        let review = review.clone();
        self.dispatch(async move {
            this.notify(
                review.provider_id,
                "review_received",
                "New review",
                format!("You received a {}-star review", review.rating),
                Some(this.job_link(review.job_id)),
            )
            .await;
        })
        .await;
    }

    pub async fn notify_review_response(&self, review: &Review) {
        let this = self.clone();
        let review = review.clone();
        self.dispatch(async move {
            this.notify(
                review.owner_id,
                "review_response",
                "The provider responded to your review",
                review.response.clone().unwrap_or_default(),
                Some(this.job_link(review.job_id)),
            )
            .await;
        })
        .await;
    }

    pub async fn get_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>, ServiceError> {
        self.store.get_user_notifications(user_id).await
    }

    pub async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<Notification, ServiceError> {
        self.store.mark_notification_read(user_id, notification_id).await
    }
}

fn format_amount(amount: &sqlx::types::BigDecimal) -> String {
    format!("{:.2}", amount.to_f64().unwrap_or(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;

    #[tokio::test]
    async fn test_notify_swallows_store_errors() {
        let fixture = Fixture::new().await;
        // No such user: the store refuses the insert, notify still returns.
        fixture
            .notifications
            .notify(Uuid::new_v4(), "test", "Ghost", "nobody home".to_string(), None)
            .await;
    }

    #[tokio::test]
    async fn test_mail_failures_do_not_escape() {
        let fixture = Fixture::with_mailer(Arc::new(FailingMailer)).await;
        let (acceptance, _) = fixture.accepted_job().await;

        fixture.notifications.notify_quote_accepted(&acceptance).await;

        let provider_notes = fixture.store.get_user_notifications(fixture.provider.id).await.unwrap();
        assert!(provider_notes.iter().any(|n| n.kind == "quote_accepted"));
    }

    #[test]
    fn test_format_amount() {
        let amount: sqlx::types::BigDecimal = "149.5".parse().unwrap();
        assert_eq!(format_amount(&amount), "149.50");
    }
}
