//! Jobs repository
//!
//! Reads the job document and writes merge patches through the
//! orchestrator's worker endpoint.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lipid_client::OrchestratorClient;
use lipid_core::domain::job::{Job, JobId, JobPatch, MergeOutcome};

/// Repository trait for job document access
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Current document, `None` if the job does not exist
    async fn fetch(&self, job_id: &JobId) -> Result<Option<Job>>;

    /// Merges `patch` into the document
    async fn merge(&self, job_id: &JobId, patch: JobPatch) -> Result<MergeOutcome>;
}

/// HTTP implementation of JobRepository
pub struct HttpJobRepository {
    client: OrchestratorClient,
}

impl HttpJobRepository {
    pub fn new(client: OrchestratorClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JobRepository for HttpJobRepository {
    async fn fetch(&self, job_id: &JobId) -> Result<Option<Job>> {
        match self.client.get_job(job_id).await {
            Ok(job) => Ok(Some(job)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to fetch job {}", job_id)),
        }
    }

    async fn merge(&self, job_id: &JobId, patch: JobPatch) -> Result<MergeOutcome> {
        self.client
            .merge_job(job_id, &patch)
            .await
            .with_context(|| format!("Failed to update job {}", job_id))
    }
}
