//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod auth;
pub mod error;
pub mod health;
pub mod job;
pub mod results;
pub mod upload;
pub mod viewer;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::service::{JobService, ResultGateway, UploadService, ViewerService};

/// Shared handles injected into every handler
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobService>,
    pub results: Arc<ResultGateway>,
    pub uploads: Arc<UploadService>,
    pub viewer: Arc<ViewerService>,
    /// Accepted bearer tokens; empty accepts any
    pub api_tokens: Arc<Vec<String>>,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Job endpoints
        .route("/jobs", post(job::create_job))
        .route("/jobs/{job_id}", get(job::get_job))
        // Result access
        .route("/results/{job_id}/signed-urls", get(results::signed_urls))
        // Uploads
        .route("/auth/signed-upload", post(upload::signed_upload))
        // Viewer
        .route("/viewer/config", get(viewer::viewer_config))
        // Worker write path
        .route("/internal/jobs/{job_id}/merge", post(job::merge_job))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
