//! Direct invocation
//!
//! Starts one worker execution through the execution API's "run" endpoint,
//! passing the job through container environment overrides. The API answers
//! with a long-running operation handle, which is not awaited.

use async_trait::async_trait;
use lipid_core::dto::job::DispatchMessage;
use serde_json::json;

use super::{DispatchError, DispatchStrategy, rejected};

pub struct DirectInvoke {
    client: reqwest::Client,
    run_url: String,
    access_token: Option<String>,
}

impl DirectInvoke {
    pub fn new(client: reqwest::Client, run_url: String, access_token: Option<String>) -> Self {
        Self {
            client,
            run_url,
            access_token,
        }
    }

    fn body(message: &DispatchMessage) -> serde_json::Value {
        json!({
            "overrides": {
                "containerOverrides": [{
                    "env": [
                        { "name": "JOB_ID", "value": message.job_id.as_str() },
                        { "name": "MODE", "value": message.mode.as_str() },
                        { "name": "GS_INPUT", "value": message.input_ref },
                    ]
                }]
            }
        })
    }
}

#[async_trait]
impl DispatchStrategy for DirectInvoke {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn submit(&self, message: &DispatchMessage) -> Result<(), DispatchError> {
        tracing::debug!("Starting worker execution for job {}", message.job_id);

        let mut request = self.client.post(&self.run_url).json(&Self::body(message));
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        tracing::info!("Worker execution started for job {}", message.job_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lipid_core::domain::job::{JobId, Mode};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn message() -> DispatchMessage {
        DispatchMessage {
            job_id: JobId::from("J1"),
            mode: Mode::X40,
            image_id: "img1".to_string(),
            input_ref: "gs://uploads/uploads/1_x.svs".to_string(),
        }
    }

    #[tokio::test]
    async fn test_submit_sends_env_overrides() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/projects/p/locations/r/jobs/worker:run"))
            .and(header("authorization", "Bearer tok"))
            .and(body_json(json!({
                "overrides": {"containerOverrides": [{"env": [
                    {"name": "JOB_ID", "value": "J1"},
                    {"name": "MODE", "value": "40X"},
                    {"name": "GS_INPUT", "value": "gs://uploads/uploads/1_x.svs"}
                ]}]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "op-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let dispatcher = DirectInvoke::new(
            reqwest::Client::new(),
            format!("{}/v2/projects/p/locations/r/jobs/worker:run", server.uri()),
            Some("tok".to_string()),
        );

        dispatcher.submit(&message()).await.unwrap();
    }

    #[tokio::test]
    async fn test_non_success_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("permission denied"))
            .mount(&server)
            .await;

        let dispatcher = DirectInvoke::new(reqwest::Client::new(), server.uri(), None);

        match dispatcher.submit(&message()).await {
            Err(DispatchError::Rejected { status, body }) => {
                assert_eq!(status, 403);
                assert_eq!(body, "permission denied");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let dispatcher = DirectInvoke::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1/run".to_string(),
            None,
        );

        assert!(matches!(
            dispatcher.submit(&message()).await,
            Err(DispatchError::Transport(_))
        ));
    }
}
