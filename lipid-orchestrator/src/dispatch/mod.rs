//! Dispatch Strategies
//!
//! How a freshly created job reaches a worker. Both variants only hand the
//! job off; neither waits for the worker to run it.

pub mod direct;
pub mod queued;

pub use direct::DirectInvoke;
pub use queued::QueuedInvoke;

use async_trait::async_trait;
use lipid_core::dto::job::DispatchMessage;
use std::sync::Arc;
use std::time::Duration;

use crate::config::DispatchConfig;

/// Dispatch error type
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Dispatch transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Dispatch rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Failed to encode dispatch message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Hands a job to the worker fleet
#[async_trait]
pub trait DispatchStrategy: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Submits one job; returns once the hand-off was accepted
    async fn submit(&self, message: &DispatchMessage) -> Result<(), DispatchError>;
}

/// Builds the configured strategy
pub fn from_config(
    config: &DispatchConfig,
    timeout: Duration,
) -> anyhow::Result<Arc<dyn DispatchStrategy>> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;

    let strategy: Arc<dyn DispatchStrategy> = match config {
        DispatchConfig::Direct {
            run_url,
            access_token,
        } => Arc::new(DirectInvoke::new(
            client,
            run_url.clone(),
            access_token.clone(),
        )),
        DispatchConfig::Queued {
            api_base,
            queue,
            worker_trigger_url,
            access_token,
        } => Arc::new(QueuedInvoke::new(
            client,
            api_base.clone(),
            queue.clone(),
            worker_trigger_url.clone(),
            access_token.clone(),
        )),
    };

    Ok(strategy)
}

/// Turns a non-2xx response into [`DispatchError::Rejected`]
async fn rejected(response: reqwest::Response) -> DispatchError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    DispatchError::Rejected { status, body }
}
