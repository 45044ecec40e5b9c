use std::fs;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use thiserror::Error;
use tokio::time::{sleep, Duration};

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_MS: u64 = 1000;
const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Invalid email address: {0}")]
    InvalidRecipient(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Email delivery failed: {0}")]
    Delivery(String),
}

/// Templated email delivery.
///
/// Callers treat this as best effort: a failed send is logged and never
/// propagated into lifecycle operations.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        template: &str,
        placeholders: &[(String, String)],
    ) -> Result<(), MailError>;
}

pub fn validate_email(email: &str) -> Result<(), MailError> {
    let email_regex = Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .map_err(|e| MailError::InvalidRecipient(e.to_string()))?;

    if email_regex.is_match(email) {
        Ok(())
    } else {
        Err(MailError::InvalidRecipient(email.to_string()))
    }
}

/// Resolves `template` inside `template_dir`, refusing anything that could
/// escape the directory.
pub fn template_path(template_dir: &Path, template: &str) -> Result<PathBuf, MailError> {
    let relative = Path::new(template);

    if relative.components().any(|c| !matches!(c, Component::Normal(_))) {
        return Err(MailError::Template(format!("Invalid template name: {}", template)));
    }
    if relative.extension() != Some(std::ffi::OsStr::new("html")) {
        return Err(MailError::Template("Template must be an HTML file".to_string()));
    }

    Ok(template_dir.join(relative))
}

/// Placeholder values are user supplied (titles, comments), so they are
/// escaped before being substituted into the HTML.
pub fn render_template(html_template: &str, placeholders: &[(String, String)]) -> String {
    placeholders
        .iter()
        .fold(html_template.to_string(), |html, (key, value)| {
            html.replace(key, &ammonia::clean_text(value))
        })
}

#[derive(Debug, Clone)]
pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
    from_email: String,
    template_dir: PathBuf,
}

impl ResendMailer {
    pub fn new(api_key: String, from_email: String, template_dir: PathBuf) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            from_email,
            template_dir,
        }
    }

    async fn send_with_retries(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), MailError> {
        let mut last_error = None;

        for attempt in 1..=MAX_RETRIES {
            match self.send_via_resend(to_email, subject, html_body).await {
                Ok(email_id) => {
                    tracing::info!("Email sent to {} (id: {})", to_email, email_id);
                    return Ok(());
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < MAX_RETRIES {
                        let delay = RETRY_DELAY_MS * (2_u64.pow(attempt - 1));
                        tracing::warn!(
                            "Email send attempt {} failed for {}. Retrying in {}ms...",
                            attempt,
                            to_email,
                            delay
                        );
                        sleep(Duration::from_millis(delay)).await;
                    }
                }
            }
        }

        let error_msg = last_error
            .map(|e| format!("Failed after {} retries: {}", MAX_RETRIES, e))
            .unwrap_or_else(|| "Unknown email sending error".to_string());

        tracing::error!("Email failed for {}: {}", to_email, error_msg);
        Err(MailError::Delivery(error_msg))
    }

    async fn send_via_resend(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<String, String> {
        let request_body = json!({
            "from": self.from_email,
            "to": to_email,
            "subject": subject,
            "html": html_body,
        });

        let response = self
            .client
            .post(RESEND_ENDPOINT)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| format!("Network error: {}", e))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .unwrap_or_else(|_| "No response body".to_string());

        if status.is_success() {
            let id = serde_json::from_str::<serde_json::Value>(&response_text)
                .ok()
                .and_then(|body| body.get("id").and_then(|v| v.as_str()).map(str::to_string))
                .unwrap_or_else(|| "success".to_string());
            Ok(id)
        } else {
            Err(format!("Resend API error ({}): {}", status.as_u16(), response_text))
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        template: &str,
        placeholders: &[(String, String)],
    ) -> Result<(), MailError> {
        validate_email(to_email)?;

        let path = template_path(&self.template_dir, template)?;
        let html_template = fs::read_to_string(&path).map_err(|e| {
            tracing::error!("Failed to read email template {}: {}", path.display(), e);
            MailError::Template(format!("Template not found: {}", template))
        })?;

        let html_body = render_template(&html_template, placeholders);
        self.send_with_retries(to_email, subject, &html_body).await
    }
}

/// Used when no email provider is configured: the message is only logged.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        template: &str,
        _placeholders: &[(String, String)],
    ) -> Result<(), MailError> {
        validate_email(to_email)?;
        tracing::info!(to = to_email, subject, template, "Email delivery disabled, message logged only");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(validate_email("owner@example.com").is_ok());
        assert!(validate_email("user.name+tag@garage.co.uk").is_ok());
        assert!(validate_email("invalid-email").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("test@.com").is_err());
    }

    #[test]
    fn test_template_path_validation() {
        let dir = Path::new("src/mail/templates");
        assert_eq!(
            template_path(dir, "Job-status.html").unwrap(),
            dir.join("Job-status.html")
        );
        assert!(template_path(dir, "../../../etc/passwd").is_err());
        assert!(template_path(dir, "nested/../config.html").is_err());
        assert!(template_path(dir, "/etc/passwd.html").is_err());
        assert!(template_path(dir, "notes.txt").is_err());
    }

    #[test]
    fn test_placeholders_are_escaped() {
        let html = "<p>Hello {{username}}, {{title}}</p>";
        let rendered = render_template(
            html,
            &[
                ("{{username}}".to_string(), "Ada".to_string()),
                ("{{title}}".to_string(), "<script>alert('x')</script>".to_string()),
            ],
        );
        assert!(rendered.starts_with("<p>Hello Ada, "));
        assert!(!rendered.contains("<script>"));
    }
}
