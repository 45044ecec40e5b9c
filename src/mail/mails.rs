use super::sendmail::{MailError, Mailer};

pub async fn send_quote_accepted_email(
    mailer: &dyn Mailer,
    to_email: &str,
    username: &str,
    request_title: &str,
    amount: &str,
    job_link: &str,
) -> Result<(), MailError> {
    let subject = "Your quote was accepted";
    let template = "Quote-accepted.html";
    let placeholders = vec![
        ("{{username}}".to_string(), username.to_string()),
        ("{{request_title}}".to_string(), request_title.to_string()),
        ("{{amount}}".to_string(), amount.to_string()),
        ("{{job_link}}".to_string(), job_link.to_string()),
    ];

    mailer.send_email(to_email, subject, template, &placeholders).await
}

pub async fn send_job_created_email(
    mailer: &dyn Mailer,
    to_email: &str,
    username: &str,
    request_title: &str,
    provider_name: &str,
    job_link: &str,
) -> Result<(), MailError> {
    let subject = "Your repair job has been booked";
    let template = "Job-created.html";
    let placeholders = vec![
        ("{{username}}".to_string(), username.to_string()),
        ("{{request_title}}".to_string(), request_title.to_string()),
        ("{{provider_name}}".to_string(), provider_name.to_string()),
        ("{{job_link}}".to_string(), job_link.to_string()),
    ];

    mailer.send_email(to_email, subject, template, &placeholders).await
}

pub async fn send_job_status_email(
    mailer: &dyn Mailer,
    to_email: &str,
    username: &str,
    request_title: &str,
    status: &str,
    job_link: &str,
) -> Result<(), MailError> {
    let subject = format!("Job update: {}", status.replace('_', " "));
    let template = "Job-status.html";
    let placeholders = vec![
        ("{{username}}".to_string(), username.to_string()),
        ("{{request_title}}".to_string(), request_title.to_string()),
        ("{{status}}".to_string(), status.replace('_', " ")),
        ("{{job_link}}".to_string(), job_link.to_string()),
    ];

    mailer.send_email(to_email, &subject, template, &placeholders).await
}

pub async fn send_review_reminder_email(
    mailer: &dyn Mailer,
    to_email: &str,
    username: &str,
    provider_name: &str,
    review_link: &str,
) -> Result<(), MailError> {
    let subject = format!("How did {} do?", provider_name);
    let template = "Review-reminder.html";
    let placeholders = vec![
        ("{{username}}".to_string(), username.to_string()),
        ("{{provider_name}}".to_string(), provider_name.to_string()),
        ("{{review_link}}".to_string(), review_link.to_string()),
    ];

    mailer.send_email(to_email, &subject, template, &placeholders).await
}
