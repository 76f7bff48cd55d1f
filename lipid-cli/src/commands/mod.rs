//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod job;
mod results;

pub use job::JobCommands;

use anyhow::Result;
use clap::Subcommand;
use lipid_client::ClientError;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Job management
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// Print signed download URLs for a job's artifacts
    Results {
        /// Job ID
        job_id: String,

        /// URL lifetime in minutes (1-1440, default 60)
        #[arg(long)]
        minutes: Option<u32>,

        /// Only artifacts whose relative path starts with this
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Request a signed upload URL for a slide
    UploadUrl {
        /// Name of the slide file, e.g. "slide.svs"
        filename: String,

        /// File size in bytes
        #[arg(long)]
        size: u64,

        /// Content type of the upload
        #[arg(long, default_value = "application/octet-stream")]
        mime: String,
    },
    /// Show the viewer configuration of an image
    Viewer {
        /// Image ID
        image_id: String,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        Commands::Job { command } => job::handle_job_command(command, &client).await,
        Commands::Results {
            job_id,
            minutes,
            prefix,
        } => results::signed_urls(&client, &job_id, minutes, prefix).await,
        Commands::UploadUrl {
            filename,
            size,
            mime,
        } => results::upload_url(&client, filename, size, mime).await,
        Commands::Viewer { image_id } => results::viewer_config(&client, &image_id).await,
    }
}

/// Turns a client error into a CLI error, pointing at the token on a 401
pub(crate) fn with_auth_hint(err: ClientError) -> anyhow::Error {
    if err.is_unauthorized() {
        anyhow::anyhow!("{err} (pass --token or set LIPID_API_TOKEN)")
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_hint_only_on_unauthorized() {
        let hinted = with_auth_hint(ClientError::api_error(401, "Invalid token"));
        assert!(hinted.to_string().ends_with("(pass --token or set LIPID_API_TOKEN)"));

        let plain = with_auth_hint(ClientError::api_error(404, "Job J1 not found"));
        assert_eq!(plain.to_string(), "API error (status 404): Job J1 not found");
    }
}
