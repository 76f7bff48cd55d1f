//! Job DTOs for inter-service communication

use serde::{Deserialize, Serialize};

use crate::domain::job::{JobId, MergeOutcome, Mode};

/// Request to create a new analysis job
///
/// `mode` stays a raw string so the controller can reject bad values with a
/// validation error instead of a deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    #[serde(rename = "imageId")]
    pub image_id: String,
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gs_input: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCreated {
    #[serde(rename = "jobId")]
    pub job_id: JobId,
}

/// Everything a worker needs to run one job
///
/// Serialized verbatim onto the task queue and accepted by the runner in its
/// `DISPATCH_MESSAGE` environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchMessage {
    pub job_id: JobId,
    pub mode: Mode,
    #[serde(rename = "imageId")]
    pub image_id: String,
    pub input_ref: String,
}

/// Response of the internal merge endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeResponse {
    pub outcome: MergeOutcome,
}
