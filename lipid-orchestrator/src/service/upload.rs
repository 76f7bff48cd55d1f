//! Upload Service
//!
//! Issues signed PUT URLs so clients upload slides straight into the
//! uploads bucket.

use lipid_core::dto::upload::{SignedUploadRequest, SignedUploadResponse, validate_upload_filename};
use lipid_core::storage::StorageUri;
use std::sync::Arc;
use std::time::Duration;

use super::ServiceError;
use crate::clock::Clock;
use crate::signing::{HttpMethod, SignRequest, UrlSigner};

/// How long an upload URL stays valid
pub const UPLOAD_URL_TTL: Duration = Duration::from_secs(3600);

const DEFAULT_UPLOAD_MIME: &str = "application/octet-stream";

pub struct UploadService {
    signer: Arc<dyn UrlSigner>,
    clock: Arc<dyn Clock>,
    uploads_bucket: String,
}

impl UploadService {
    pub fn new(signer: Arc<dyn UrlSigner>, clock: Arc<dyn Clock>, uploads_bucket: String) -> Self {
        Self {
            signer,
            clock,
            uploads_bucket,
        }
    }

    pub fn signed_upload(
        &self,
        req: &SignedUploadRequest,
    ) -> Result<SignedUploadResponse, ServiceError> {
        validate_upload_filename(&req.filename)?;

        let now = self.clock.now();
        let object = format!("uploads/{}_{}", now.timestamp(), req.filename);
        let mime = match req.mime.trim() {
            "" => DEFAULT_UPLOAD_MIME,
            mime => mime,
        };

        let signed_url = self.signer.sign(&SignRequest {
            bucket: &self.uploads_bucket,
            path: &object,
            method: HttpMethod::Put,
            expires_in: UPLOAD_URL_TTL,
            content_type: Some(mime),
            now,
        })?;

        tracing::info!(
            "Signed upload for {} ({} bytes, {})",
            object,
            req.size,
            mime
        );

        Ok(SignedUploadResponse {
            signed_url,
            gs_path: StorageUri::new(self.uploads_bucket.as_str(), object).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::signing::HmacV4Signer;
    use chrono::{TimeZone, Utc};
    use lipid_core::error::CoreError;

    fn service() -> UploadService {
        UploadService::new(
            Arc::new(HmacV4Signer::new(
                "GOOG1EXAMPLE".into(),
                "secret".into(),
                "storage.googleapis.com".into(),
            )),
            Arc::new(ManualClock::at(Utc.timestamp_opt(1_700_000_000, 0).unwrap())),
            "lipid-uploads".into(),
        )
    }

    fn request(filename: &str) -> SignedUploadRequest {
        SignedUploadRequest {
            filename: filename.to_string(),
            size: 1024,
            mime: "image/tiff".to_string(),
        }
    }

    #[test]
    fn test_signed_upload() {
        let resp = service().signed_upload(&request("slide.ome.tif")).unwrap();

        assert_eq!(
            resp.gs_path,
            "gs://lipid-uploads/uploads/1700000000_slide.ome.tif"
        );
        assert!(resp.signed_url.starts_with(
            "https://storage.googleapis.com/lipid-uploads/uploads/1700000000_slide.ome.tif?"
        ));
        assert!(resp.signed_url.contains("X-Goog-Expires=3600"));
        assert!(resp.signed_url.contains("X-Goog-SignedHeaders=content-type%3Bhost"));
    }

    #[test]
    fn test_unsupported_suffix() {
        assert!(matches!(
            service().signed_upload(&request("notes.txt")),
            Err(ServiceError::Core(CoreError::Validation(_)))
        ));
    }
}
