//! Runner configuration
//!
//! One runner process handles exactly one job invocation. The job arrives
//! either as `JOB_ID` / `MODE` / `GS_INPUT` environment overrides (direct
//! invocation) or as a verbatim `DISPATCH_MESSAGE` JSON (queued delivery).

use lipid_core::domain::job::JobId;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// The job this invocation works on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub job_id: JobId,
    /// Raw mode; checked by the pipeline so an unknown value fails the job
    pub mode: String,
    /// Storage URI of the source slide
    pub input_ref: String,
}

/// Runner configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub invocation: Invocation,

    /// Orchestrator base URL (e.g., "http://localhost:8080")
    pub orchestrator_url: String,

    /// Bearer token for the orchestrator's worker endpoints
    pub worker_token: Option<String>,

    /// Timeout of a single orchestrator request
    pub request_timeout: Duration,

    /// Bucket receiving `{job_id}/...` artifacts
    pub results_bucket: String,

    /// Local working area; each job gets `{scratch_dir}/{job_id}`
    pub scratch_dir: PathBuf,

    /// Mount point of the buckets (`gs://b/p` is `{blob_root}/b/p`)
    pub blob_root: PathBuf,

    /// Whole-slide analysis program (40X)
    pub analysis_40x_cmd: String,

    /// Tiled segmentation program (20X)
    pub analysis_20x_cmd: String,

    /// Pyramidal OME-TIFF converter
    pub converter_cmd: String,
}

/// Configuration failure; carries the job id when it was readable
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ConfigError {
    pub job_id: Option<JobId>,
    pub message: String,
}

impl ConfigError {
    fn new(job_id: Option<&JobId>, message: impl Into<String>) -> Self {
        Self {
            job_id: job_id.cloned(),
            message: message.into(),
        }
    }
}

/// `DISPATCH_MESSAGE` payload; fields are optional so a partial message
/// still yields the job id for failure reporting
#[derive(Debug, Default, Deserialize)]
struct RawMessage {
    job_id: Option<String>,
    mode: Option<String>,
    input_ref: Option<String>,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - JOB_ID, MODE, GS_INPUT, or DISPATCH_MESSAGE (required)
    /// - RESULTS_BUCKET (required)
    /// - ORCHESTRATOR_URL (optional, default: http://localhost:8080)
    /// - WORKER_TOKEN (optional)
    /// - REQUEST_TIMEOUT (optional, seconds, default: 30)
    /// - SCRATCH_DIR (optional, default: /tmp/lipid)
    /// - BLOB_ROOT (optional, default: /mnt/gcs)
    /// - ANALYSIS_40X_CMD, ANALYSIS_20X_CMD, CONVERTER_CMD (optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Config::from_env`] with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let invocation = match var("DISPATCH_MESSAGE") {
            Some(raw) => Self::invocation_from_message(&raw)?,
            None => Self::invocation_from_parts(var("JOB_ID"), var("MODE"), var("GS_INPUT"))?,
        };
        let job_id = Some(&invocation.job_id);

        let results_bucket = var("RESULTS_BUCKET")
            .ok_or_else(|| ConfigError::new(job_id, "Missing required input: RESULTS_BUCKET"))?;

        let request_timeout = var("REQUEST_TIMEOUT")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        Ok(Self {
            orchestrator_url: var("ORCHESTRATOR_URL")
                .unwrap_or_else(|| "http://localhost:8080".to_string()),
            worker_token: var("WORKER_TOKEN"),
            request_timeout,
            results_bucket,
            scratch_dir: var("SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/tmp/lipid")),
            blob_root: var("BLOB_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/mnt/gcs")),
            analysis_40x_cmd: var("ANALYSIS_40X_CMD").unwrap_or_else(|| "qupath-headless".to_string()),
            analysis_20x_cmd: var("ANALYSIS_20X_CMD").unwrap_or_else(|| "cellpose-tiles".to_string()),
            converter_cmd: var("CONVERTER_CMD").unwrap_or_else(|| "bfconvert-pyramid".to_string()),
            invocation,
        })
    }

    fn invocation_from_message(raw: &str) -> Result<Invocation, ConfigError> {
        let message: RawMessage = serde_json::from_str(raw)
            .map_err(|e| ConfigError::new(None, format!("Invalid DISPATCH_MESSAGE: {}", e)))?;

        Self::invocation_from_parts(
            message.job_id.filter(|s| !s.is_empty()),
            message.mode.filter(|s| !s.is_empty()),
            message.input_ref.filter(|s| !s.is_empty()),
        )
    }

    fn invocation_from_parts(
        job_id: Option<String>,
        mode: Option<String>,
        input_ref: Option<String>,
    ) -> Result<Invocation, ConfigError> {
        let job_id = job_id
            .map(JobId::from)
            .ok_or_else(|| ConfigError::new(None, "Missing required input: JOB_ID"))?;

        let mode = mode
            .ok_or_else(|| ConfigError::new(Some(&job_id), "Missing required input: MODE"))?;
        let input_ref = input_ref
            .ok_or_else(|| ConfigError::new(Some(&job_id), "Missing required input: GS_INPUT"))?;

        Ok(Invocation {
            job_id,
            mode,
            input_ref,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let job_id = Some(&self.invocation.job_id);

        if !self.orchestrator_url.starts_with("http://")
            && !self.orchestrator_url.starts_with("https://")
        {
            return Err(ConfigError::new(
                job_id,
                "ORCHESTRATOR_URL must start with http:// or https://",
            ));
        }

        if self.request_timeout.as_secs() == 0 {
            return Err(ConfigError::new(job_id, "REQUEST_TIMEOUT must be greater than 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_direct_invocation_env() {
        let config = load(&[
            ("JOB_ID", "J1"),
            ("MODE", "40X"),
            ("GS_INPUT", "gs://uploads/a.svs"),
            ("RESULTS_BUCKET", "results"),
        ])
        .unwrap();

        assert_eq!(
            config.invocation,
            Invocation {
                job_id: JobId::from("J1"),
                mode: "40X".to_string(),
                input_ref: "gs://uploads/a.svs".to_string(),
            }
        );
        assert_eq!(config.orchestrator_url, "http://localhost:8080");
        assert!(config.worker_token.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_dispatch_message_takes_precedence() {
        let config = load(&[
            (
                "DISPATCH_MESSAGE",
                r#"{"job_id":"J2","mode":"20X","imageId":"img1","input_ref":"gs://uploads/b.czi"}"#,
            ),
            ("JOB_ID", "ignored"),
            ("RESULTS_BUCKET", "results"),
        ])
        .unwrap();

        assert_eq!(config.invocation.job_id, JobId::from("J2"));
        assert_eq!(config.invocation.mode, "20X");
        assert_eq!(config.invocation.input_ref, "gs://uploads/b.czi");
    }

    #[test]
    fn test_missing_mode_keeps_job_id() {
        let err = load(&[("JOB_ID", "J1"), ("GS_INPUT", "gs://u/a.svs")]).unwrap_err();
        assert_eq!(err.job_id, Some(JobId::from("J1")));
        assert_eq!(err.message, "Missing required input: MODE");
    }

    #[test]
    fn test_empty_input_is_missing() {
        let err = load(&[("JOB_ID", "J1"), ("MODE", "40X"), ("GS_INPUT", "")]).unwrap_err();
        assert_eq!(err.message, "Missing required input: GS_INPUT");
    }

    #[test]
    fn test_missing_job_id() {
        let err = load(&[("MODE", "40X"), ("GS_INPUT", "gs://u/a.svs")]).unwrap_err();
        assert!(err.job_id.is_none());
    }

    #[test]
    fn test_malformed_message() {
        let err = load(&[("DISPATCH_MESSAGE", "not json")]).unwrap_err();
        assert!(err.job_id.is_none());
        assert!(err.message.starts_with("Invalid DISPATCH_MESSAGE"));

        let partial = load(&[("DISPATCH_MESSAGE", r#"{"job_id":"J3"}"#)]).unwrap_err();
        assert_eq!(partial.job_id, Some(JobId::from("J3")));
    }

    #[test]
    fn test_missing_results_bucket() {
        let err = load(&[("JOB_ID", "J1"), ("MODE", "40X"), ("GS_INPUT", "gs://u/a.svs")])
            .unwrap_err();
        assert_eq!(err.job_id, Some(JobId::from("J1")));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = load(&[
            ("JOB_ID", "J1"),
            ("MODE", "40X"),
            ("GS_INPUT", "gs://u/a.svs"),
            ("RESULTS_BUCKET", "results"),
        ])
        .unwrap();
        config.orchestrator_url = "localhost:8080".to_string();
        assert!(config.validate().is_err());
    }
}
