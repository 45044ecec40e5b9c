use thiserror::Error;
use uuid::Uuid;
use crate::error::HttpError;
use axum::http::StatusCode;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("User {user_id} is not allowed to {action}")]
    Forbidden { user_id: Uuid, action: String },

    #[error("Invalid {entity} transition for {id}: current status is {current}, requested {requested}")]
    InvalidState {
        entity: &'static str,
        id: Uuid,
        current: String,
        requested: String,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        ServiceError::NotFound { entity, id }
    }

    pub fn forbidden(user_id: Uuid, action: impl Into<String>) -> Self {
        ServiceError::Forbidden { user_id, action: action.into() }
    }

    pub fn invalid_state(
        entity: &'static str,
        id: Uuid,
        current: impl ToString,
        requested: impl ToString,
    ) -> Self {
        ServiceError::InvalidState {
            entity,
            id,
            current: current.to_string(),
            requested: requested.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ServiceError::InvalidState { .. } => StatusCode::CONFLICT,
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Database(_) | ServiceError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        let status = error.status_code();
        match error {
            ServiceError::Database(ref e) => {
                tracing::error!("Database error surfaced to handler: {}", e);
                HttpError::new("Database error occurred", status)
            }
            _ => HttpError::new(error.to_string(), status),
        }
    }
}

impl From<String> for ServiceError {
    fn from(err: String) -> Self {
        ServiceError::Other(err)
    }
}
