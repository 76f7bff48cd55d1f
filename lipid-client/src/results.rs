//! Result, upload and viewer endpoints

use lipid_core::domain::job::JobId;
use lipid_core::dto::results::{SignedUrls, SignedUrlsQuery};
use lipid_core::dto::upload::{SignedUploadRequest, SignedUploadResponse};
use lipid_core::dto::viewer::ViewerConfig;

use crate::OrchestratorClient;
use crate::error::Result;

impl OrchestratorClient {
    /// Signed download URLs for a job's artifacts
    pub async fn signed_urls(&self, job_id: &JobId, query: &SignedUrlsQuery) -> Result<SignedUrls> {
        let url = format!("{}/results/{}/signed-urls", self.base_url, job_id);
        let response = self.client.get(&url).query(query).send().await?;

        self.handle_response(response).await
    }

    /// Signed PUT URL for a new slide upload
    pub async fn signed_upload(&self, req: &SignedUploadRequest) -> Result<SignedUploadResponse> {
        let url = format!("{}/auth/signed-upload", self.base_url);
        let response = self
            .authorized(self.client.post(&url))
            .json(req)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Viewer configuration of an image
    pub async fn viewer_config(&self, image_id: &str) -> Result<ViewerConfig> {
        let url = format!("{}/viewer/config", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("imageId", image_id)])
            .send()
            .await?;

        self.handle_response(response).await
    }
}
