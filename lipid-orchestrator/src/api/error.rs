//! API Error Handling
//!
//! Unified error types and conversion for API responses. Every error body is
//! `{"error": message, "code": CODE}`; dispatch failures add the `jobId`.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lipid_core::domain::job::JobId;
use lipid_core::error::CoreError;

use crate::service::ServiceError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    DispatchFailed { job_id: JobId, message: String },
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, job_id) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg, None),
            ApiError::DispatchFailed { job_id, message } => {
                (StatusCode::BAD_GATEWAY, "DISPATCH_FAILED", message, Some(job_id))
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        let mut body = serde_json::json!({ "error": message, "code": code });
        if let Some(job_id) = job_id {
            body["jobId"] = serde_json::Value::String(job_id.to_string());
        }

        (status, Json(body)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Core(core) => match core {
                CoreError::Validation(msg) => ApiError::BadRequest(msg),
                CoreError::UnknownMode(mode) => ApiError::BadRequest(format!("Unknown mode {mode}")),
                err @ CoreError::NotFound { .. } => ApiError::NotFound(err.to_string()),
                other => ApiError::InternalError(other.to_string()),
            },
            ServiceError::Dispatch { job_id, source } => ApiError::DispatchFailed {
                job_id,
                message: source.to_string(),
            },
            ServiceError::Store(err) => ApiError::InternalError(err.to_string()),
            ServiceError::Sign(err) => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::DispatchError;
    use http_body_util::BodyExt;

    async fn error_to_response(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_not_found_mapping() {
        let err = ApiError::from(ServiceError::Core(CoreError::job_not_found("J9")));
        let (status, json) = error_to_response(err).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["error"], "Job J9 not found");
    }

    #[tokio::test]
    async fn test_dispatch_failure_carries_job_id() {
        let err = ApiError::from(ServiceError::Dispatch {
            job_id: JobId::from("J1"),
            source: DispatchError::Rejected {
                status: 503,
                body: "unavailable".to_string(),
            },
        });
        let (status, json) = error_to_response(err).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["code"], "DISPATCH_FAILED");
        assert_eq!(json["jobId"], "J1");
    }

    #[tokio::test]
    async fn test_internal_errors_are_sanitized() {
        let err = ApiError::from(ServiceError::Store(
            lipid_core::store::StoreError::Corrupt("row J1 has pct 300".to_string()),
        ));
        let (status, json) = error_to_response(err).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Internal server error");
        assert!(json.get("jobId").is_none());
    }
}
