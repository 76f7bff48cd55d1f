//! Job domain types
//!
//! The job document is shared between orchestrator (persists) and runner
//! (updates through merge patches). Every write goes through [`Job::apply`],
//! which enforces the lifecycle rules:
//!
//! - status moves only `queued -> running -> {succeeded, failed}` (or
//!   `queued -> failed` for jobs that die before doing any work)
//! - a terminal job never changes again
//! - `pct` never decreases; a patch carrying a lower value is stale
//! - `result_refs` only grows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Stage tag of a freshly created job
pub const INITIAL_STAGE: &str = "init";

/// Opaque, globally unique job identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Allocates a fresh identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    /// Whether `self -> next` is a legal lifecycle edge
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Queued, Running) | (Queued, Failed) | (Running, Succeeded) | (Running, Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            other => Err(CoreError::Validation(format!(
                "Invalid job status '{other}'"
            ))),
        }
    }
}

/// Scan magnification the analysis targets
///
/// 40X jobs run the whole-slide analysis, 20X jobs the tiled segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    #[serde(rename = "20X")]
    X20,
    #[serde(rename = "40X")]
    X40,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::X20 => "20X",
            Mode::X40 => "40X",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = CoreError;

    /// Case-insensitive: `"40x"` parses as [`Mode::X40`]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "20X" => Ok(Mode::X20),
            "40X" => Ok(Mode::X40),
            _ => Err(CoreError::Validation(format!(
                "Invalid mode '{s}'. Must be one of: 20X, 40X"
            ))),
        }
    }
}

/// Job document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub stage: String,
    pub pct: u8,
    #[serde(rename = "imageId")]
    pub image_id: String,
    pub mode: Mode,
    /// Relative artifact path -> fully-qualified storage URI
    #[serde(default)]
    pub result_refs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_tail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Initial document written by the lifecycle controller
    pub fn queued(id: JobId, image_id: String, mode: Mode, now: DateTime<Utc>) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            stage: INITIAL_STAGE.to_string(),
            pct: 0,
            image_id,
            mode,
            result_refs: BTreeMap::new(),
            error: None,
            log_tail: None,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    /// Merges `patch` into the document
    ///
    /// Fields absent from the patch are left untouched. `finished_at` is
    /// stamped on the transition into a terminal status.
    pub fn apply(&mut self, patch: JobPatch, now: DateTime<Utc>) -> MergeOutcome {
        if self.status.is_terminal() {
            return MergeOutcome::Terminal;
        }

        if let Some(next) = patch.status {
            if next != self.status && !self.status.can_transition_to(next) {
                return MergeOutcome::InvalidTransition;
            }
        }

        let stale = patch.pct.is_some_and(|pct| pct.min(100) < self.pct);
        let status_change = patch.status.is_some_and(|next| next != self.status);
        if stale && !status_change && patch.result_refs.is_empty() && patch.error.is_none() {
            return MergeOutcome::Stale;
        }

        // Progress fields travel together: a stale pct drops its stage and log too
        if !stale {
            if let Some(stage) = patch.stage {
                self.stage = stage;
            }
            if let Some(pct) = patch.pct {
                self.pct = pct.min(100);
            }
            if let Some(log_tail) = patch.log_tail {
                self.log_tail = Some(log_tail);
            }
        }

        self.result_refs.extend(patch.result_refs);

        // A worker picking the job up supersedes an earlier dispatch error
        if patch.status == Some(JobStatus::Running) && self.status == JobStatus::Queued {
            self.error = None;
        }

        if let Some(error) = patch.error {
            self.error = Some(error);
        }

        if let Some(next) = patch.status {
            if next.is_terminal() && next != self.status {
                self.finished_at = Some(now);
            }
            self.status = next;
        }

        self.updated_at = now;
        MergeOutcome::Applied
    }
}

/// Partial update of a job document
///
/// Only present fields are merged; `result_refs` entries are added to the
/// existing map, never replacing it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pct: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_tail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub result_refs: BTreeMap<String, String>,
}

impl JobPatch {
    /// Progress write of a running job
    pub fn progress(stage: impl Into<String>, pct: u8, log_tail: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Running),
            stage: Some(stage.into()),
            pct: Some(pct),
            log_tail: Some(log_tail.into()),
            ..Self::default()
        }
    }

    /// Terminal success at 100%
    pub fn succeeded(stage: impl Into<String>, log_tail: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Succeeded),
            stage: Some(stage.into()),
            pct: Some(100),
            log_tail: Some(log_tail.into()),
            ..Self::default()
        }
    }

    /// Terminal failure; stage and pct stay where the job stopped
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Terminal failure that also pins the stage it happened in
    ///
    /// Carries no pct, so it applies even when the last progress write was
    /// stale.
    pub fn failed_at(stage: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            stage: Some(stage.into()),
            ..Self::failed(error)
        }
    }

    /// Records an error message without changing status
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Additive result references
    pub fn results(result_refs: BTreeMap<String, String>) -> Self {
        Self {
            result_refs,
            ..Self::default()
        }
    }
}

/// What a merge did to the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOutcome {
    /// The patch was merged
    Applied,
    /// Progress went backwards (duplicate or late delivery); nothing changed
    Stale,
    /// The job already finished; nothing changed
    Terminal,
    /// The requested status is not reachable from the current one
    InvalidTransition,
}

impl MergeOutcome {
    pub fn is_applied(self) -> bool {
        self == MergeOutcome::Applied
    }
}
