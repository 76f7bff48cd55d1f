//! Bearer token extractor
//!
//! Handlers taking [`Bearer`] require `Authorization: Bearer <token>`. When
//! API tokens are configured the token must be one of them; otherwise any
//! bearer token is accepted.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use super::AppState;
use crate::api::error::ApiError;

#[derive(Debug, Clone)]
pub struct Bearer(pub String);

impl FromRequestParts<AppState> for Bearer {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ApiError::Unauthorized(
                    "Invalid Authorization format. Expected: Bearer <token>".to_string(),
                )
            })?;

        if !state.api_tokens.is_empty() && !state.api_tokens.iter().any(|t| t == token) {
            tracing::warn!("Rejected request with unknown bearer token");
            return Err(ApiError::Unauthorized("Invalid token".to_string()));
        }

        Ok(Bearer(token.to_string()))
    }
}
