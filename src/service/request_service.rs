// service/request_service.rs
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::marketdb::MarketExt,
    models::{marketmodel::*, usermodel::{Caller, UserRole}},
    service::{error::ServiceError, notification_service::NotificationService},
};

#[derive(Clone)]
pub struct RequestService {
    store: Arc<dyn MarketExt>,
    notification_service: Arc<NotificationService>,
}

impl RequestService {
    pub fn new(store: Arc<dyn MarketExt>, notification_service: Arc<NotificationService>) -> Self {
        Self {
            store,
            notification_service,
        }
    }

    pub async fn create_request(
        &self,
        caller: &Caller,
        request: NewServiceRequest,
    ) -> Result<ServiceRequest, ServiceError> {
        if !caller.has_role(UserRole::Owner) {
            return Err(ServiceError::forbidden(caller.id, "create service requests"));
        }
        if request.title.trim().is_empty() {
            return Err(ServiceError::Validation("Title cannot be empty".to_string()));
        }
        if request.description.trim().is_empty() {
            return Err(ServiceError::Validation("Description cannot be empty".to_string()));
        }

        let request = self.store.create_request(caller.id, request).await?;
        tracing::info!(request_id = %request.id, owner_id = %caller.id, "Service request created");

        Ok(request)
    }

    pub async fn get_request(&self, request_id: Uuid) -> Result<ServiceRequest, ServiceError> {
        self.store
            .get_request(request_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("request", request_id))
    }

    pub async fn get_my_requests(&self, caller: &Caller) -> Result<Vec<ServiceRequest>, ServiceError> {
        self.store.get_owner_requests(caller.id).await
    }

    /// Requests a provider can still quote on.
    pub async fn get_open_requests(&self, caller: &Caller) -> Result<Vec<ServiceRequest>, ServiceError> {
        if !caller.has_role(UserRole::Provider) {
            return Err(ServiceError::forbidden(caller.id, "browse open requests"));
        }
        self.store.get_open_requests().await
    }

    pub async fn delete_request(
        &self,
        caller: &Caller,
        request_id: Uuid,
    ) -> Result<ServiceRequest, ServiceError> {
        let removal = self.store.delete_request(caller.id, request_id).await?;
        tracing::info!(
            %request_id,
            rejected_quotes = removal.rejected.len(),
            "Service request withdrawn"
        );

        for quote in &removal.rejected {
            self.notification_service.notify_quote_rejected(quote).await;
        }

        Ok(removal.request)
    }
}
