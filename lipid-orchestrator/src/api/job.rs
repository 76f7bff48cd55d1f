//! Job API Handlers
//!
//! HTTP endpoints for job lifecycle management.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use lipid_core::domain::job::{Job, JobId, JobPatch};
use lipid_core::dto::job::{CreateJob, JobCreated, MergeResponse};

use super::AppState;
use super::auth::Bearer;
use crate::api::error::ApiResult;

/// POST /jobs
/// Create a job and dispatch it to a worker
pub async fn create_job(
    State(state): State<AppState>,
    _auth: Bearer,
    payload: Result<Json<CreateJob>, JsonRejection>,
) -> ApiResult<Json<JobCreated>> {
    let Json(req) = payload?;
    tracing::info!("Creating {} job for image: {}", req.mode, req.image_id);

    let job_id = state.jobs.create(req).await?;

    Ok(Json(JobCreated { job_id }))
}

/// GET /jobs/{job_id}
/// Get the job document
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Job>> {
    tracing::debug!("Getting job: {}", job_id);

    let job = state.jobs.get(&JobId::from(job_id)).await?;

    Ok(Json(job))
}

/// POST /internal/jobs/{job_id}/merge
/// Merge a worker patch into the job document
pub async fn merge_job(
    State(state): State<AppState>,
    _auth: Bearer,
    Path(job_id): Path<String>,
    payload: Result<Json<JobPatch>, JsonRejection>,
) -> ApiResult<Json<MergeResponse>> {
    let Json(patch) = payload?;
    tracing::debug!("Merging patch into job: {}", job_id);

    let outcome = state.jobs.merge(&JobId::from(job_id), patch).await?;

    Ok(Json(MergeResponse { outcome }))
}
