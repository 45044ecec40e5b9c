// config.rs
use std::path::PathBuf;

use anyhow::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub app_url: String,
    pub jwt_secret: String,
    pub port: u16,
    pub store_backend: StoreBackend,
    pub db_max_connections: u32,
    // Email
    pub resend_api_key: Option<String>,
    pub from_email: String,
    pub mail_template_dir: PathBuf,
}

impl Config {
    pub fn init() -> anyhow::Result<Config> {
        let jwt_secret = std::env::var("JWT_SECRET_KEY").context("JWT_SECRET_KEY must be set")?;
        let app_url = std::env::var("APP_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());

        let port = match std::env::var("PORT") {
            Ok(port) => port.parse::<u16>().context("PORT must be a valid port number")?,
            Err(_) => 8000,
        };

        let store_backend = match std::env::var("STORE_BACKEND").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            Ok("postgres") | Err(_) => StoreBackend::Postgres,
            Ok(other) => anyhow::bail!("Unknown STORE_BACKEND '{}', expected postgres or memory", other),
        };

        let database_url = std::env::var("DATABASE_URL").ok();
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL must be set when STORE_BACKEND is postgres");
        }

        let db_max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(20);

        // Email service configuration (with defaults)
        let resend_api_key = std::env::var("RESEND_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        let from_email = std::env::var("FROM_EMAIL")
            .unwrap_or_else(|_| "RepairHub <noreply@repairhub.app>".to_string());
        let mail_template_dir = std::env::var("MAIL_TEMPLATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("src/mail/templates"));

        Ok(Config {
            database_url,
            app_url,
            jwt_secret,
            port,
            store_backend,
            db_max_connections,
            resend_api_key,
            from_email,
            mail_template_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test so the process-wide environment is only touched here.
    #[test]
    fn test_init_reads_environment() {
        std::env::set_var("JWT_SECRET_KEY", "config-test-secret");
        std::env::set_var("STORE_BACKEND", "memory");
        std::env::set_var("PORT", "9090");
        std::env::remove_var("JWT_MAXAGE");

        let config = Config::init().unwrap();
        assert_eq!(config.jwt_secret, "config-test-secret");
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.port, 9090);

        std::env::set_var("STORE_BACKEND", "sqlite");
        assert!(Config::init().is_err());

        std::env::set_var("STORE_BACKEND", "memory");
        std::env::set_var("PORT", "not-a-port");
        assert!(Config::init().is_err());
    }
}
