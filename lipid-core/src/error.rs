//! Error kinds shared by all Lipid services

/// Domain-level error
///
/// HTTP mapping lives in the orchestrator; the runner records these into the
/// job document.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Unknown mode {0}")]
    UnknownMode(String),

    #[error("Stage '{stage}' failed: {message}")]
    StageFailure { stage: String, message: String },
}

impl CoreError {
    pub fn job_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "Job",
            id: id.to_string(),
        }
    }

    pub fn image_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "Image",
            id: id.to_string(),
        }
    }
}
