//! Result, upload and viewer command handlers

use anyhow::{Context, Result};
use colored::*;
use lipid_client::OrchestratorClient;
use lipid_core::domain::job::JobId;
use lipid_core::dto::results::SignedUrlsQuery;
use lipid_core::dto::upload::SignedUploadRequest;

use super::with_auth_hint;

/// Print signed download URLs of a job's artifacts
pub async fn signed_urls(
    client: &OrchestratorClient,
    job_id: &str,
    minutes: Option<u32>,
    prefix: Option<String>,
) -> Result<()> {
    let job_id = JobId::from(job_id);
    let urls = client
        .signed_urls(&job_id, &SignedUrlsQuery { minutes, prefix })
        .await?;

    if urls.files.is_empty() {
        println!(
            "{}",
            format!("No artifacts found for job {}.", urls.job_id).yellow()
        );
        return Ok(());
    }

    println!(
        "{}",
        format!("Found {} artifact(s) for job {}:", urls.files.len(), urls.job_id).bold()
    );
    println!();
    for (path, url) in &urls.files {
        println!("  {} {}", "▸".cyan(), path.bold());
        println!("    {}", url.dimmed());
    }

    Ok(())
}

/// Request a signed PUT URL for a slide upload
pub async fn upload_url(
    client: &OrchestratorClient,
    filename: String,
    size: u64,
    mime: String,
) -> Result<()> {
    let upload = client
        .signed_upload(&SignedUploadRequest {
            filename,
            size,
            mime,
        })
        .await
        .map_err(with_auth_hint)
        .context("Failed to request upload URL")?;

    println!("{} Upload URL issued", "✓".green());
    println!("  Storage path: {}", upload.gs_path.cyan());
    println!("  Signed URL:   {}", upload.signed_url);

    Ok(())
}

/// Print the viewer configuration of an image
pub async fn viewer_config(client: &OrchestratorClient, image_id: &str) -> Result<()> {
    let viewer = client.viewer_config(image_id).await?;

    println!("{}", "Viewer Config:".bold());
    println!("  DZI base:  {}", viewer.dzi_base_uri.cyan());
    println!("  Overlays:  {}", viewer.overlays.len());

    if !viewer.legend.is_empty() {
        println!("\n{}", "Legend:".bold());
        match serde_json::to_string_pretty(&viewer.legend) {
            Ok(pretty) => println!("{}", pretty),
            Err(_) => println!("{:?}", viewer.legend),
        }
    }

    Ok(())
}
