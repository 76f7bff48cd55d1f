//! Lipid Orchestrator
//!
//! HTTP service that accepts analysis jobs, persists their lifecycle, hands
//! them to workers through the configured dispatch strategy and serves
//! signed access to their results.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod clock;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod repository;
pub mod service;
pub mod signing;

use crate::api::AppState;
use crate::clock::SystemClock;
use crate::config::Config;
use crate::repository::{PgImageStore, PgJobStore};
use crate::service::{JobService, ResultGateway, SignedUrlCache, UploadService, ViewerService};
use crate::signing::HmacV4Signer;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lipid_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Lipid Orchestrator...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate()?;

    tracing::info!("Connecting to database...");

    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to create database pool")?;

    tracing::info!("Database connection pool created");

    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    // Every long-lived handle is built here and injected below
    let job_store = Arc::new(PgJobStore::new(pool.clone()));
    let image_store = Arc::new(PgImageStore::new(pool));
    let dispatcher = dispatch::from_config(&config.dispatch, config.dispatch_timeout)?;
    let signer = Arc::new(HmacV4Signer::new(
        config.signing.access_id.clone(),
        config.signing.secret.clone(),
        config.signing.host.clone(),
    ));
    let clock = Arc::new(SystemClock);

    tracing::info!("Dispatch strategy: {}", dispatcher.name());

    let state = AppState {
        jobs: Arc::new(JobService::new(job_store.clone(), dispatcher)),
        results: Arc::new(ResultGateway::new(
            job_store,
            signer.clone(),
            SignedUrlCache::new(config.signed_url_cache_capacity),
            clock.clone(),
            config.results_bucket.clone(),
        )),
        uploads: Arc::new(UploadService::new(
            signer,
            clock,
            config.uploads_bucket.clone(),
        )),
        viewer: Arc::new(ViewerService::new(image_store)),
        api_tokens: Arc::new(config.api_tokens.clone()),
    };

    let app = api::create_router(state);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
