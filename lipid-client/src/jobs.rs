//! Job-related API endpoints

use lipid_core::domain::job::{Job, JobId, JobPatch, MergeOutcome};
use lipid_core::dto::job::{CreateJob, JobCreated, MergeResponse};

use crate::OrchestratorClient;
use crate::error::Result;

impl OrchestratorClient {
    // =============================================================================
    // Job Lifecycle
    // =============================================================================

    /// Create a job and have the orchestrator dispatch it
    pub async fn create_job(&self, req: &CreateJob) -> Result<JobCreated> {
        let url = format!("{}/jobs", self.base_url);
        let response = self
            .authorized(self.client.post(&url))
            .json(req)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get the job document
    pub async fn get_job(&self, job_id: &JobId) -> Result<Job> {
        let url = format!("{}/jobs/{}", self.base_url, job_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Worker Write Path
    // =============================================================================

    /// Merge a patch into the job document
    pub async fn merge_job(&self, job_id: &JobId, patch: &JobPatch) -> Result<MergeOutcome> {
        let url = format!("{}/internal/jobs/{}/merge", self.base_url, job_id);
        let response = self
            .authorized(self.client.post(&url))
            .json(patch)
            .send()
            .await?;

        let merged: MergeResponse = self.handle_response(response).await?;
        Ok(merged.outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_create_job_sends_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jobs"))
            .and(header("authorization", "Bearer tok"))
            .and(body_json(json!({"imageId": "img1", "mode": "40X"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jobId": "J1"})))
            .mount(&server)
            .await;

        let client = OrchestratorClient::new(server.uri()).with_token("tok");
        let created = client
            .create_job(&CreateJob {
                image_id: "img1".into(),
                mode: "40X".into(),
                gs_input: None,
            })
            .await
            .unwrap();

        assert_eq!(created.job_id, JobId::from("J1"));
    }

    #[tokio::test]
    async fn test_get_missing_job() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs/nope"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"error": "Job nope not found", "code": "NOT_FOUND"})),
            )
            .mount(&server)
            .await;

        let err = OrchestratorClient::new(server.uri())
            .get_job(&JobId::from("nope"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_merge_job_returns_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/internal/jobs/J1/merge"))
            .and(body_json(json!({"status": "failed", "error": "boom"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"outcome": "terminal"})))
            .mount(&server)
            .await;

        let outcome = OrchestratorClient::new(server.uri())
            .merge_job(&JobId::from("J1"), &JobPatch::failed("boom"))
            .await
            .unwrap();
        assert_eq!(outcome, MergeOutcome::Terminal);
    }
}
