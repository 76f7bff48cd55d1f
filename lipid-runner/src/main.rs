//! Lipid Runner
//!
//! A one-shot worker: each process runs exactly one analysis job and exits.
//!
//! Architecture:
//! - Configuration: job invocation and tool settings from the environment
//! - Repositories: job document access through the orchestrator
//! - Services: blob store, format converter and analysis stages
//! - Pipeline: stage sequencing and progress reporting
//!
//! Exit codes: 0 on success (or when the job was already finished), 1 when
//! the job failed, 2 when the invocation itself is unusable.

mod config;
mod pipeline;
mod repository;
mod service;

use anyhow::{Context, Result};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, ConfigError};
use crate::pipeline::Pipeline;
use crate::repository::{HttpJobRepository, JobRepository};
use crate::service::{CommandAnalysisStage, CommandConverter, FsBlobStore};
use lipid_client::OrchestratorClient;
use lipid_core::domain::job::JobPatch;

const EXIT_CONFIG: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lipid_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Lipid Runner");

    let config = match Config::from_env().and_then(|config| config.validate().map(|_| config)) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid invocation: {}", e);
            report_config_error(&e).await;
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    info!(
        "Loaded configuration: job_id={}, mode={}, input={}, orchestrator_url={}",
        config.invocation.job_id,
        config.invocation.mode,
        config.invocation.input_ref,
        config.orchestrator_url
    );

    match run(&config).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("Runner error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &Config) -> Result<u8> {
    let client = orchestrator_client(config)?;
    let jobs: Arc<dyn JobRepository> = Arc::new(HttpJobRepository::new(client));

    let pipeline = Pipeline::new(
        jobs,
        Arc::new(FsBlobStore::new(config.blob_root.clone())),
        Arc::new(CommandConverter::new(config.converter_cmd.clone())),
        Arc::new(CommandAnalysisStage::new(
            "QuPath 40x",
            config.analysis_40x_cmd.clone(),
        )),
        Arc::new(CommandAnalysisStage::new(
            "Cellpose 20x",
            config.analysis_20x_cmd.clone(),
        )),
        config.results_bucket.clone(),
        config.scratch_dir.clone(),
    );

    info!("Runner initialized successfully");

    let outcome = pipeline.run(&config.invocation).await?;
    info!("Job {} finished: {:?}", config.invocation.job_id, outcome);

    Ok(u8::try_from(outcome.exit_code()).unwrap_or(1))
}

fn orchestrator_client(config: &Config) -> Result<OrchestratorClient> {
    let http = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let client = OrchestratorClient::with_client(config.orchestrator_url.clone(), http);
    Ok(match &config.worker_token {
        Some(token) => client.with_token(token.clone()),
        None => client,
    })
}

/// Marks the job failed when the broken invocation still named one
///
/// Only the environment is trusted here; the report is best effort.
async fn report_config_error(err: &ConfigError) {
    let Some(job_id) = &err.job_id else {
        return;
    };

    let base_url = std::env::var("ORCHESTRATOR_URL")
        .ok()
        .filter(|url| url.starts_with("http://") || url.starts_with("https://"))
        .unwrap_or_else(|| "http://localhost:8080".to_string());

    let mut client = OrchestratorClient::new(base_url);
    if let Ok(token) = std::env::var("WORKER_TOKEN") {
        client = client.with_token(token);
    }

    if let Err(e) = client.merge_job(job_id, &JobPatch::failed(err.message.clone())).await {
        error!("Failed to mark job {} failed: {}", job_id, e);
    }
}
