//! Result API Handlers

use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
};
use lipid_core::domain::job::JobId;
use lipid_core::dto::results::{SignedUrls, SignedUrlsQuery};

use super::AppState;
use crate::api::error::ApiResult;

/// GET /results/{job_id}/signed-urls?minutes=&prefix=
/// Signed download URLs for the job's artifacts
pub async fn signed_urls(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    query: Result<Query<SignedUrlsQuery>, QueryRejection>,
) -> ApiResult<Json<SignedUrls>> {
    let Query(query) = query?;
    tracing::debug!("Signing result URLs for job: {}", job_id);

    let urls = state
        .results
        .signed_urls(&JobId::from(job_id), &query)
        .await?;

    Ok(Json(urls))
}
