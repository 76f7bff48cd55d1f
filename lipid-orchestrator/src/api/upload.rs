//! Upload API Handlers

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use lipid_core::dto::upload::{SignedUploadRequest, SignedUploadResponse};

use super::AppState;
use super::auth::Bearer;
use crate::api::error::ApiResult;

/// POST /auth/signed-upload
/// Signed PUT URL for a new slide upload
pub async fn signed_upload(
    State(state): State<AppState>,
    _auth: Bearer,
    payload: Result<Json<SignedUploadRequest>, JsonRejection>,
) -> ApiResult<Json<SignedUploadResponse>> {
    let Json(req) = payload?;

    Ok(Json(state.uploads.signed_upload(&req)?))
}
