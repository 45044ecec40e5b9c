pub mod error;
pub mod job_service;
pub mod lifecycle;
pub mod notification_service;
pub mod quote_service;
pub mod request_service;
pub mod review_service;
