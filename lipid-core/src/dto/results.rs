//! Result access DTOs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::job::JobId;
use crate::error::CoreError;

pub const DEFAULT_URL_MINUTES: u32 = 60;
pub const MIN_URL_MINUTES: u32 = 1;
pub const MAX_URL_MINUTES: u32 = 1440;

/// Query of `GET /results/{job_id}/signed-urls`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignedUrlsQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

impl SignedUrlsQuery {
    /// Requested lifetime in minutes, defaulted and range-checked
    pub fn minutes(&self) -> Result<u32, CoreError> {
        let minutes = self.minutes.unwrap_or(DEFAULT_URL_MINUTES);
        if (MIN_URL_MINUTES..=MAX_URL_MINUTES).contains(&minutes) {
            Ok(minutes)
        } else {
            Err(CoreError::Validation(format!(
                "minutes must be between {MIN_URL_MINUTES} and {MAX_URL_MINUTES}, got {minutes}"
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUrls {
    #[serde(rename = "jobId")]
    pub job_id: JobId,
    /// Relative artifact path -> signed URL
    pub files: BTreeMap<String, String>,
}
