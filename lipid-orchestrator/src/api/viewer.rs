//! Viewer API Handlers

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use lipid_core::dto::viewer::{ViewerConfig, ViewerConfigQuery};

use super::AppState;
use crate::api::error::ApiResult;

/// GET /viewer/config?imageId=
pub async fn viewer_config(
    State(state): State<AppState>,
    query: Result<Query<ViewerConfigQuery>, QueryRejection>,
) -> ApiResult<Json<ViewerConfig>> {
    let Query(query) = query?;
    tracing::debug!("Viewer config for image: {}", query.image_id);

    Ok(Json(state.viewer.config(&query.image_id).await?))
}
