//! Lipid CLI
//!
//! Command-line interface for interacting with the Lipid orchestrator.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "lipid")]
#[command(about = "Lipid slide-analysis job CLI", long_about = None)]
struct Cli {
    /// Orchestrator URL
    #[arg(
        long,
        env = "LIPID_ORCHESTRATOR_URL",
        default_value = "http://localhost:8080"
    )]
    orchestrator_url: String,

    /// API token sent as `Authorization: Bearer <token>`
    #[arg(long, env = "LIPID_API_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        orchestrator_url: cli.orchestrator_url,
        token: cli.token,
    };

    handle_command(cli.command, &config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::JobCommands;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_job_create() {
        let cli = Cli::try_parse_from([
            "lipid",
            "--token",
            "t0k",
            "job",
            "create",
            "--image-id",
            "img1",
            "--mode",
            "40X",
            "--input",
            "gs://uploads/a.svs",
        ])
        .unwrap();

        assert_eq!(cli.token.as_deref(), Some("t0k"));
        match cli.command {
            Commands::Job {
                command:
                    JobCommands::Create {
                        image_id,
                        mode,
                        input,
                    },
            } => {
                assert_eq!(image_id, "img1");
                assert_eq!(mode, "40X");
                assert_eq!(input.as_deref(), Some("gs://uploads/a.svs"));
            }
            _ => panic!("expected job create"),
        }
    }

    #[test]
    fn test_parse_results_defaults() {
        let cli = Cli::try_parse_from(["lipid", "results", "J1"]).unwrap();
        match cli.command {
            Commands::Results {
                job_id,
                minutes,
                prefix,
            } => {
                assert_eq!(job_id, "J1");
                assert!(minutes.is_none());
                assert!(prefix.is_none());
            }
            _ => panic!("expected results"),
        }
    }

    #[test]
    fn test_upload_requires_size() {
        assert!(Cli::try_parse_from(["lipid", "upload-url", "a.svs"]).is_err());
    }
}
