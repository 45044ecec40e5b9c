// service/quote_service.rs
use std::sync::Arc;

use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::{
    db::marketdb::MarketExt,
    models::{marketmodel::*, usermodel::{Caller, UserRole}},
    service::{error::ServiceError, notification_service::NotificationService},
};

#[derive(Clone)]
pub struct QuoteService {
    store: Arc<dyn MarketExt>,
    notification_service: Arc<NotificationService>,
}

impl QuoteService {
    pub fn new(store: Arc<dyn MarketExt>, notification_service: Arc<NotificationService>) -> Self {
        Self {
            store,
            notification_service,
        }
    }

    pub async fn submit_quote(
        &self,
        caller: &Caller,
        request_id: Uuid,
        quote: NewQuote,
    ) -> Result<QuoteSubmission, ServiceError> {
        if !caller.has_role(UserRole::Provider) {
            return Err(ServiceError::forbidden(caller.id, "submit quotes"));
        }
        validate_quote(&quote)?;

        let submission = self.store.submit_quote(caller.id, request_id, quote).await?;
        tracing::info!(
            quote_id = %submission.quote.id,
            %request_id,
            provider_id = %caller.id,
            request_status = %submission.request.status,
            "Quote submitted"
        );

        self.notification_service.notify_quote_received(&submission).await;

        Ok(submission)
    }

    /// Accepts one quote: the quote, its rejected siblings, the request and
    /// the new job are committed together or not at all.
    pub async fn accept_quote(
        &self,
        caller: &Caller,
        quote_id: Uuid,
    ) -> Result<QuoteAcceptance, ServiceError> {
        let acceptance = self.store.accept_quote(caller.id, quote_id).await?;
        tracing::info!(
            %quote_id,
            job_id = %acceptance.job.id,
            request_id = %acceptance.request.id,
            rejected = acceptance.rejected.len(),
            "Quote accepted, job created"
        );

        self.notification_service.notify_quote_accepted(&acceptance).await;

        Ok(acceptance)
    }

    pub async fn reject_quote(&self, caller: &Caller, quote_id: Uuid) -> Result<Quote, ServiceError> {
        let quote = self.store.reject_quote(caller.id, quote_id).await?;
        tracing::info!(%quote_id, request_id = %quote.request_id, "Quote rejected");

        self.notification_service.notify_quote_rejected(&quote).await;

        Ok(quote)
    }

    /// The request owner sees every quote, a provider only their own.
    pub async fn get_request_quotes(
        &self,
        caller: &Caller,
        request_id: Uuid,
    ) -> Result<Vec<Quote>, ServiceError> {
        let request = self
            .store
            .get_request(request_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("request", request_id))?;

        let quotes = self.store.get_request_quotes(request_id).await?;

        if request.owner_id == caller.id {
            Ok(quotes)
        } else if caller.has_role(UserRole::Provider) {
            Ok(quotes
                .into_iter()
                .filter(|quote| quote.provider_id == caller.id)
                .collect())
        } else {
            Err(ServiceError::forbidden(caller.id, format!("view quotes for request {}", request_id)))
        }
    }
}

pub fn validate_quote(quote: &NewQuote) -> Result<(), ServiceError> {
    let zero = BigDecimal::from(0);
    // Money columns are NUMERIC(12, 2).
    let ceiling = BigDecimal::from(10_000_000_000i64);
    let too_large = |value: &BigDecimal| *value >= ceiling;

    if quote.amount <= zero {
        return Err(ServiceError::Validation("Quote amount must be greater than zero".to_string()));
    }
    if quote.labor_cost.as_ref().is_some_and(|cost| *cost < zero) {
        return Err(ServiceError::Validation("Labor cost cannot be negative".to_string()));
    }
    if quote.parts_cost.as_ref().is_some_and(|cost| *cost < zero) {
        return Err(ServiceError::Validation("Parts cost cannot be negative".to_string()));
    }
    if too_large(&quote.amount)
        || quote.labor_cost.as_ref().is_some_and(too_large)
        || quote.parts_cost.as_ref().is_some_and(too_large)
    {
        return Err(ServiceError::Validation(
            "Quote amounts must be at most 9999999999.99".to_string(),
        ));
    }
    if quote.estimated_duration.trim().is_empty() {
        return Err(ServiceError::Validation("Estimated duration is required".to_string()));
    }
    Ok(())
}
