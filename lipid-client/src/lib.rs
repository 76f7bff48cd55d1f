//! Lipid HTTP Client
//!
//! A type-safe HTTP client for the Lipid orchestrator API, shared by the
//! CLI and the worker runner.
//!
//! # Example
//!
//! ```no_run
//! use lipid_client::OrchestratorClient;
//! use lipid_core::dto::job::CreateJob;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), lipid_client::ClientError> {
//!     let client = OrchestratorClient::new("http://localhost:8080").with_token("dev-token");
//!
//!     let created = client.create_job(&CreateJob {
//!         image_id: "img1".to_string(),
//!         mode: "40X".to_string(),
//!         gs_input: Some("gs://lipid-uploads/uploads/1700000000_slide.svs".to_string()),
//!     }).await?;
//!
//!     println!("Created job: {}", created.job_id);
//!     Ok(())
//! }
//! ```

pub mod error;
mod jobs;
mod results;

pub use error::{ClientError, Result};

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

/// HTTP client for the Lipid orchestrator API
///
/// Methods are grouped into:
/// - Job lifecycle (create, get, merge)
/// - Result access, uploads and viewer configuration
#[derive(Debug, Clone)]
pub struct OrchestratorClient {
    /// Base URL of the orchestrator (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
    /// Sent as `Authorization: Bearer <token>` when set
    token: Option<String>,
}

impl OrchestratorClient {
    /// Create a new orchestrator client
    ///
    /// # Example
    /// ```
    /// use lipid_client::OrchestratorClient;
    ///
    /// let client = OrchestratorClient::new("http://localhost:8080");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new orchestrator client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            token: None,
        }
    }

    /// Attach a bearer token to every request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = (!token.is_empty()).then_some(token);
        self
    }

    /// Get the base URL of the orchestrator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the status code and deserialize the JSON body
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::debug!("Orchestrator responded {}: {}", status, error_text);
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}
