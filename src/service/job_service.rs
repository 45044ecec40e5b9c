// service/job_service.rs
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::marketdb::MarketExt,
    models::{marketmodel::*, usermodel::Caller},
    service::{error::ServiceError, lifecycle, notification_service::NotificationService},
};

#[derive(Clone)]
pub struct JobService {
    store: Arc<dyn MarketExt>,
    notification_service: Arc<NotificationService>,
}

impl JobService {
    pub fn new(store: Arc<dyn MarketExt>, notification_service: Arc<NotificationService>) -> Self {
        Self {
            store,
            notification_service,
        }
    }

    /// Moves a job along its lifecycle. Completing it also completes the
    /// request, in the same unit of work.
    pub async fn update_job_status(
        &self,
        caller: &Caller,
        job_id: Uuid,
        status: JobStatus,
    ) -> Result<JobTransitionResult, ServiceError> {
        let result = self.store.transition_job(caller.id, job_id, status).await?;
        tracing::info!(
            %job_id,
            from = %result.previous,
            to = %result.job.status,
            user_id = %caller.id,
            "Job status updated"
        );

        if let Some(request) = &result.request {
            tracing::info!(request_id = %request.id, status = %request.status, "Request completed with its job");
        }

        self.notification_service.notify_job_status(&result).await;

        Ok(result)
    }

    pub async fn get_job(&self, caller: &Caller, job_id: Uuid) -> Result<Job, ServiceError> {
        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("job", job_id))?;

        if lifecycle::job_party(&job, caller.id).is_none() {
            return Err(ServiceError::forbidden(caller.id, format!("view job {}", job_id)));
        }

        Ok(job)
    }

    pub async fn get_my_jobs(&self, caller: &Caller) -> Result<Vec<Job>, ServiceError> {
        self.store.get_user_jobs(caller.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;

    #[tokio::test]
    async fn test_provider_starts_job_and_owner_cannot() {
        let fixture = Fixture::new().await;
        let (acceptance, _) = fixture.accepted_job().await;
        let job_id = acceptance.job.id;

        let by_owner = fixture
            .jobs
            .update_job_status(&fixture.owner.as_caller(), job_id, JobStatus::InProgress)
            .await;
        assert!(matches!(by_owner, Err(ServiceError::Forbidden { .. })));

        let started = fixture
            .jobs
            .update_job_status(&fixture.provider.as_caller(), job_id, JobStatus::InProgress)
            .await
            .unwrap();
        assert_eq!(started.previous, JobStatus::Pending);
        assert_eq!(started.job.status, JobStatus::InProgress);
        assert!(started.job.started_at.is_some());
        assert!(started.job.completed_at.is_none());
        assert!(started.request.is_none());

        let owner_notes = fixture.store.get_user_notifications(fixture.owner.id).await.unwrap();
        assert!(owner_notes.iter().any(|n| n.kind == "job_started"));
    }

    #[tokio::test]
    async fn test_strangers_cannot_touch_a_job() {
        let fixture = Fixture::new().await;
        let (acceptance, _) = fixture.accepted_job().await;
        let stranger = fixture.other_provider.as_caller();

        assert!(matches!(
            fixture
                .jobs
                .update_job_status(&stranger, acceptance.job.id, JobStatus::InProgress)
                .await,
            Err(ServiceError::Forbidden { .. })
        ));
        assert!(matches!(
            fixture.jobs.get_job(&stranger, acceptance.job.id).await,
            Err(ServiceError::Forbidden { .. })
        ));
        assert!(matches!(
            fixture.jobs.get_job(&stranger, Uuid::new_v4()).await,
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_skips_and_regressions_are_invalid() {
        let fixture = Fixture::new().await;
        let (acceptance, _) = fixture.accepted_job().await;
        let provider = fixture.provider.as_caller();
        let job_id = acceptance.job.id;

        let skip = fixture
            .jobs
            .update_job_status(&provider, job_id, JobStatus::Completed)
            .await;
        assert!(matches!(
            skip,
            Err(ServiceError::InvalidState { ref current, ref requested, .. })
                if current == "pending" && requested == "completed"
        ));

        let same = fixture
            .jobs
            .update_job_status(&provider, job_id, JobStatus::Pending)
            .await;
        assert!(matches!(same, Err(ServiceError::InvalidState { .. })));

        fixture
            .jobs
            .update_job_status(&provider, job_id, JobStatus::InProgress)
            .await
            .unwrap();
        let back = fixture
            .jobs
            .update_job_status(&provider, job_id, JobStatus::Pending)
            .await;
        assert!(matches!(back, Err(ServiceError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_completion_cascades_to_request() {
        let fixture = Fixture::new().await;
        let (acceptance, request) = fixture.accepted_job().await;
        let provider = fixture.provider.as_caller();
        let job_id = acceptance.job.id;

        fixture
            .jobs
            .update_job_status(&provider, job_id, JobStatus::InProgress)
            .await
            .unwrap();
        let done = fixture
            .jobs
            .update_job_status(&provider, job_id, JobStatus::Completed)
            .await
            .unwrap();

        assert_eq!(done.job.status, JobStatus::Completed);
        assert!(done.job.completed_at.is_some());
        assert_eq!(done.request.as_ref().map(|r| r.status), Some(RequestStatus::Completed));

        let request = fixture.requests.get_request(request.id).await.unwrap();
        assert_eq!(request.status, RequestStatus::Completed);

        let owner_notes = fixture.store.get_user_notifications(fixture.owner.id).await.unwrap();
        assert!(owner_notes.iter().any(|n| n.kind == "job_completed"));
        let templates = fixture.mailer.templates();
        assert!(templates.contains(&"Job-status.html".to_string()));
        assert!(templates.contains(&"Review-reminder.html".to_string()));
        assert!(fixture.mailer.sent().iter().any(|email| {
            email.template == "Review-reminder.html"
                && email.to == fixture.owner.email
                && email.subject.contains(&fixture.provider.name)
        }));
    }

    #[tokio::test]
    async fn test_owner_confirms_pending_confirmation() {
        let fixture = Fixture::new().await;
        let (acceptance, _) = fixture.accepted_job().await;
        let provider = fixture.provider.as_caller();
        let owner = fixture.owner.as_caller();
        let job_id = acceptance.job.id;

        fixture
            .jobs
            .update_job_status(&provider, job_id, JobStatus::InProgress)
            .await
            .unwrap();

        // Owner may only confirm once the provider asks for it.
        let early = fixture
            .jobs
            .update_job_status(&owner, job_id, JobStatus::Completed)
            .await;
        assert!(matches!(early, Err(ServiceError::InvalidState { .. })));

        fixture
            .jobs
            .update_job_status(&provider, job_id, JobStatus::PendingConfirmation)
            .await
            .unwrap();
        let owner_notes = fixture.store.get_user_notifications(fixture.owner.id).await.unwrap();
        assert!(owner_notes.iter().any(|n| n.kind == "job_awaiting_confirmation"));

        let confirmed = fixture
            .jobs
            .update_job_status(&owner, job_id, JobStatus::Completed)
            .await
            .unwrap();
        assert_eq!(confirmed.previous, JobStatus::PendingConfirmation);
        assert_eq!(confirmed.job.status, JobStatus::Completed);

        let provider_notes = fixture.store.get_user_notifications(fixture.provider.id).await.unwrap();
        assert!(provider_notes.iter().any(|n| n.kind == "job_confirmed"));
    }

    #[tokio::test]
    async fn test_completed_job_is_frozen() {
        let fixture = Fixture::new().await;
        let job = fixture.completed_job().await;

        for caller in [fixture.provider.as_caller(), fixture.owner.as_caller()] {
            for status in [JobStatus::Pending, JobStatus::InProgress, JobStatus::Completed] {
                let result = fixture.jobs.update_job_status(&caller, job.id, status).await;
                assert!(matches!(result, Err(ServiceError::InvalidState { .. })));
            }
        }

        let stored = fixture.store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert_eq!(stored.completed_at, job.completed_at);
    }

    #[tokio::test]
    async fn test_job_listing_covers_both_parties() {
        let fixture = Fixture::new().await;
        let (acceptance, _) = fixture.accepted_job().await;

        let owner_jobs = fixture.jobs.get_my_jobs(&fixture.owner.as_caller()).await.unwrap();
        let provider_jobs = fixture.jobs.get_my_jobs(&fixture.provider.as_caller()).await.unwrap();
        assert_eq!(owner_jobs.len(), 1);
        assert_eq!(provider_jobs.len(), 1);
        assert_eq!(owner_jobs[0].id, acceptance.job.id);

        let other = fixture.jobs.get_my_jobs(&fixture.other_provider.as_caller()).await.unwrap();
        assert!(other.is_empty());
    }
}
