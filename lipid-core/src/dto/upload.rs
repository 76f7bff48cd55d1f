//! Signed upload DTOs

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Slide formats accepted for upload, matched case-insensitively
pub const ACCEPTED_UPLOAD_SUFFIXES: &[&str] = &[
    ".svs", ".ndpi", ".ome.tif", ".tif", ".tiff", ".czi", ".vsi", ".mrxs",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedUploadRequest {
    pub filename: String,
    pub size: u64,
    pub mime: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUploadResponse {
    pub signed_url: String,
    pub gs_path: String,
}

/// Checks that `filename` is a bare file name with an accepted slide suffix
pub fn validate_upload_filename(filename: &str) -> Result<(), CoreError> {
    if filename.is_empty() || filename.contains('/') {
        return Err(CoreError::Validation(format!(
            "Invalid filename '{filename}'"
        )));
    }

    let lower = filename.to_ascii_lowercase();
    if ACCEPTED_UPLOAD_SUFFIXES
        .iter()
        .any(|suffix| lower.ends_with(suffix))
    {
        Ok(())
    } else {
        Err(CoreError::Validation("Unsupported suffix".to_string()))
    }
}
