//! Job command handlers
//!
//! Handles job creation, inspection and waiting for completion.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use lipid_client::OrchestratorClient;
use lipid_core::domain::job::{Job, JobId, JobStatus};
use lipid_core::dto::job::CreateJob;
use std::time::{Duration, Instant};

use super::with_auth_hint;

/// Job subcommands
#[derive(Subcommand)]
pub enum JobCommands {
    /// Create an analysis job
    Create {
        /// Image the slide belongs to
        #[arg(long)]
        image_id: String,

        /// Magnification mode (20X or 40X)
        #[arg(long)]
        mode: String,

        /// Source slide, e.g. gs://uploads/slide.svs
        #[arg(long)]
        input: Option<String>,
    },
    /// Get job details
    Get {
        /// Job ID
        id: String,
    },
    /// Poll a job until it finishes
    Wait {
        /// Job ID
        id: String,

        /// Seconds between polls
        #[arg(long, default_value_t = 5)]
        interval: u64,

        /// Give up after this many seconds (0 waits forever)
        #[arg(long, default_value_t = 0)]
        timeout: u64,
    },
}

/// Handle job commands
///
/// Routes job subcommands to their respective handlers.
pub async fn handle_job_command(command: JobCommands, client: &OrchestratorClient) -> Result<()> {
    match command {
        JobCommands::Create {
            image_id,
            mode,
            input,
        } => create_job(client, image_id, mode, input).await,
        JobCommands::Get { id } => get_job(client, &JobId::from(id)).await,
        JobCommands::Wait {
            id,
            interval,
            timeout,
        } => wait_for_job(client, &JobId::from(id), interval, timeout).await,
    }
}

async fn create_job(
    client: &OrchestratorClient,
    image_id: String,
    mode: String,
    gs_input: Option<String>,
) -> Result<()> {
    let created = client
        .create_job(&CreateJob {
            image_id,
            mode,
            gs_input,
        })
        .await
        .map_err(with_auth_hint)
        .context("Failed to create job")?;

    println!("{} Job created", "✓".green());
    println!("  ID: {}", created.job_id.to_string().cyan());

    Ok(())
}

async fn get_job(client: &OrchestratorClient, id: &JobId) -> Result<()> {
    let job = client.get_job(id).await?;
    print_job_details(&job);
    Ok(())
}

async fn wait_for_job(
    client: &OrchestratorClient,
    id: &JobId,
    interval: u64,
    timeout: u64,
) -> Result<()> {
    let started = Instant::now();
    let interval = Duration::from_secs(interval.max(1));
    let mut last_pct = None;

    loop {
        let job = client.get_job(id).await?;

        if last_pct != Some(job.pct) {
            println!(
                "{} {:>3}% {} {}",
                colorize_status(job.status),
                job.pct,
                job.stage.bold(),
                job.log_tail.as_deref().unwrap_or("").dimmed()
            );
            last_pct = Some(job.pct);
        }

        if job.status.is_terminal() {
            println!();
            print_job_details(&job);
            if job.status == JobStatus::Failed {
                anyhow::bail!("Job {} failed", id);
            }
            return Ok(());
        }

        if timeout > 0 && started.elapsed() >= Duration::from_secs(timeout) {
            anyhow::bail!("Timed out waiting for job {}", id);
        }

        tokio::time::sleep(interval).await;
    }
}

/// Print detailed job information
fn print_job_details(job: &Job) {
    println!("{}", "Job Details:".bold());
    println!("  ID:        {}", job.id.to_string().cyan());
    println!("  Image:     {}", job.image_id);
    println!("  Mode:      {}", job.mode);
    println!("  Status:    {}", colorize_status(job.status));
    println!("  Stage:     {} ({}%)", job.stage, job.pct);
    println!(
        "  Created:   {}",
        job.created_at.format("%Y-%m-%d %H:%M:%S")
    );

    if let Some(finished) = job.finished_at {
        println!("  Finished:  {}", finished.format("%Y-%m-%d %H:%M:%S"));
        let seconds = finished.signed_duration_since(job.created_at).num_seconds();
        println!("  Duration:  {}s", seconds);
    }

    if let Some(log_tail) = &job.log_tail {
        println!("  Last log:  {}", log_tail.dimmed());
    }

    if !job.result_refs.is_empty() {
        println!("\n{}", "Results:".bold());
        for (path, uri) in &job.result_refs {
            println!("  {} -> {}", path.cyan(), uri);
        }
    }

    if let Some(error) = &job.error {
        println!("\n{}", "Error:".bold());
        println!("{}", error.red());
    }
}

/// Colorize job status for display
fn colorize_status(status: JobStatus) -> ColoredString {
    let status_str = status.as_str();
    match status {
        JobStatus::Queued => status_str.yellow(),
        JobStatus::Running => status_str.cyan(),
        JobStatus::Succeeded => status_str.green(),
        JobStatus::Failed => status_str.red(),
    }
}
