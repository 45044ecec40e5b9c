mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod mail;
mod middleware;
mod models;
mod routes;
mod service;
mod utils;

#[cfg(test)]
mod testutil;

use std::sync::Arc;

use anyhow::Context;
use axum::http::{header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE}, HeaderValue, Method};
use config::{Config, StoreBackend};
use dotenv::dotenv;
use routes::create_router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::filter::LevelFilter;

use crate::{
    db::{db::DBClient, marketdb::MarketExt, memory::MemoryStore},
    mail::sendmail::{LogMailer, Mailer, ResendMailer},
    service::{
        job_service::JobService,
        notification_service::NotificationService,
        quote_service::QuoteService,
        request_service::RequestService,
        review_service::ReviewService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub env: Config,
    pub store: Arc<dyn MarketExt>,
    // Services
    pub notification_service: Arc<NotificationService>,
    pub request_service: Arc<RequestService>,
    pub quote_service: Arc<QuoteService>,
    pub job_service: Arc<JobService>,
    pub review_service: Arc<ReviewService>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn MarketExt>, mailer: Arc<dyn Mailer>) -> Self {
        let notification_service = Arc::new(NotificationService::new(
            store.clone(),
            mailer,
            config.app_url.clone(),
        ));

        let request_service = Arc::new(RequestService::new(store.clone(), notification_service.clone()));
        let quote_service = Arc::new(QuoteService::new(store.clone(), notification_service.clone()));
        let job_service = Arc::new(JobService::new(store.clone(), notification_service.clone()));
        let review_service = Arc::new(ReviewService::new(store.clone(), notification_service.clone()));

        Self {
            env: config,
            store,
            notification_service,
            request_service,
            quote_service,
            job_service,
            review_service,
        }
    }
}

async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn MarketExt>> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set")?;
            let db_client = DBClient::connect(database_url, config.db_max_connections)
                .await
                .context("Failed to connect to the database")?;
            tracing::info!(
                max_connections = config.db_max_connections,
                "Connection to the database is successful"
            );
            Ok(Arc::new(db_client))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; all data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

fn build_mailer(config: &Config) -> Arc<dyn Mailer> {
    match &config.resend_api_key {
        Some(api_key) => Arc::new(ResendMailer::new(
            api_key.clone(),
            config.from_email.clone(),
            config.mail_template_dir.clone(),
        )),
        None => {
            tracing::warn!("RESEND_API_KEY not set, emails will only be logged");
            Arc::new(LogMailer)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let max_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|level| level.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::DEBUG);
    tracing_subscriber::fmt().with_max_level(max_level).init();

    let config = Config::init()?;

    let store = build_store(&config).await?;
    let mailer = build_mailer(&config);

    let allowed_origins = vec![
        config.app_url.parse::<HeaderValue>().context("APP_URL is not a valid origin")?,
        HeaderValue::from_static("http://localhost:5173"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE]);

    let app_state = Arc::new(AppState::new(config.clone(), store, mailer));

    let app = create_router(app_state).layer(cors);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;

    tracing::info!("Server is running on http://localhost:{}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
