pub mod jobs;
pub mod notifications;
pub mod quotes;
pub mod requests;
pub mod reviews;
pub mod users;
