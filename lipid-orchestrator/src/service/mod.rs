//! Service Module
//!
//! Business logic layer for the orchestrator.
//! Services receive their stores and collaborators as injected handles.

pub mod job;
pub mod results;
pub mod upload;
pub mod url_cache;
pub mod viewer;

pub use job::JobService;
pub use results::ResultGateway;
pub use upload::UploadService;
pub use url_cache::SignedUrlCache;
pub use viewer::ViewerService;

use lipid_core::domain::job::JobId;
use lipid_core::error::CoreError;
use lipid_core::store::StoreError;

use crate::dispatch::DispatchError;
use crate::signing::SignError;

/// Service error type
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Dispatch of job {job_id} failed: {source}")]
    Dispatch {
        job_id: JobId,
        #[source]
        source: DispatchError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sign(#[from] SignError),
}
