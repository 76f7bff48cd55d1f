//! Queued invocation
//!
//! Enqueues the dispatch message as an HTTP task. The queue delivers it to
//! the worker trigger URL at least once; the task name is derived from the
//! job id so a repeated enqueue of the same job is deduplicated.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use lipid_core::dto::job::DispatchMessage;
use reqwest::StatusCode;
use serde_json::json;

use super::{DispatchError, DispatchStrategy, rejected};

pub struct QueuedInvoke {
    client: reqwest::Client,
    api_base: String,
    queue: String,
    worker_trigger_url: String,
    access_token: Option<String>,
}

impl QueuedInvoke {
    pub fn new(
        client: reqwest::Client,
        api_base: String,
        queue: String,
        worker_trigger_url: String,
        access_token: Option<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            queue,
            worker_trigger_url,
            access_token,
        }
    }

    fn tasks_url(&self) -> String {
        format!("{}/{}/tasks", self.api_base, self.queue)
    }

    fn body(&self, message: &DispatchMessage) -> Result<serde_json::Value, DispatchError> {
        let payload = serde_json::to_vec(message)?;

        Ok(json!({
            "task": {
                "name": format!("{}/tasks/{}", self.queue, message.job_id),
                "httpRequest": {
                    "httpMethod": "POST",
                    "url": self.worker_trigger_url,
                    "headers": { "Content-Type": "application/json" },
                    "body": STANDARD.encode(payload),
                }
            }
        }))
    }
}

#[async_trait]
impl DispatchStrategy for QueuedInvoke {
    fn name(&self) -> &'static str {
        "queued"
    }

    async fn submit(&self, message: &DispatchMessage) -> Result<(), DispatchError> {
        tracing::debug!("Enqueueing job {} onto {}", message.job_id, self.queue);

        let mut request = self.client.post(self.tasks_url()).json(&self.body(message)?);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        // The task already exists: an earlier enqueue of this job got through
        if response.status() == StatusCode::CONFLICT {
            tracing::warn!("Task for job {} already enqueued", message.job_id);
            return Ok(());
        }

        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        tracing::info!("Job {} enqueued", message.job_id);
        Ok(())
    }
}
