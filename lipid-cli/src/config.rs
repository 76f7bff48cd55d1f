//! Configuration module
//!
//! Handles CLI configuration: where the orchestrator lives and how to
//! authenticate against it.

use lipid_client::OrchestratorClient;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the orchestrator service
    pub orchestrator_url: String,

    /// Bearer token for authenticated endpoints
    pub token: Option<String>,
}

impl Config {
    /// Client for the configured orchestrator
    pub fn client(&self) -> OrchestratorClient {
        let client = OrchestratorClient::new(self.orchestrator_url.clone());
        match &self.token {
            Some(token) => client.with_token(token.clone()),
            None => client,
        }
    }
}
