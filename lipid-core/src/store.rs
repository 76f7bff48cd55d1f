//! Store capabilities
//!
//! The Job Store persists job documents and applies merge patches atomically;
//! the Image Store is a read-only catalog populated elsewhere. Both are
//! trait-based so services receive them as injected handles.
//!
//! The in-memory implementations back tests and local development.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

use crate::domain::image::Image;
use crate::domain::job::{Job, JobId, JobPatch, MergeOutcome};

/// Store error type
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Job {0} already exists")]
    AlreadyExists(JobId),

    #[error("Stored document is corrupt: {0}")]
    Corrupt(String),

    #[error("Store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Job document persistence
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Writes a new document; fails if the id is taken
    async fn insert(&self, job: &Job) -> Result<(), StoreError>;

    /// Full document snapshot
    async fn get(&self, id: &JobId) -> Result<Option<Job>, StoreError>;

    /// Only the `result_refs` projection of the document
    async fn result_refs(
        &self,
        id: &JobId,
    ) -> Result<Option<BTreeMap<String, String>>, StoreError>;

    /// Applies `patch` atomically with respect to other writers
    ///
    /// Returns `None` when the document does not exist.
    async fn merge(&self, id: &JobId, patch: JobPatch)
    -> Result<Option<MergeOutcome>, StoreError>;
}

/// Read-only image catalog
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Image>, StoreError>;
}

/// In-memory implementation of JobStore
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<JobId, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: &Job) -> Result<(), StoreError> {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        if jobs.contains_key(&job.id) {
            return Err(StoreError::AlreadyExists(job.id.clone()));
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn get(&self, id: &JobId) -> Result<Option<Job>, StoreError> {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(jobs.get(id).cloned())
    }

    async fn result_refs(
        &self,
        id: &JobId,
    ) -> Result<Option<BTreeMap<String, String>>, StoreError> {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(jobs.get(id).map(|job| job.result_refs.clone()))
    }

    async fn merge(
        &self,
        id: &JobId,
        patch: JobPatch,
    ) -> Result<Option<MergeOutcome>, StoreError> {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(jobs
            .get_mut(id)
            .map(|job| job.apply(patch, chrono::Utc::now())))
    }
}

/// In-memory implementation of ImageStore
#[derive(Default)]
pub struct InMemoryImageStore {
    images: Mutex<HashMap<String, Image>>,
}

impl InMemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, image: Image) {
        let mut images = self.images.lock().unwrap_or_else(PoisonError::into_inner);
        images.insert(image.id.clone(), image);
    }
}

#[async_trait]
impl ImageStore for InMemoryImageStore {
    async fn get(&self, id: &str) -> Result<Option<Image>, StoreError> {
        let images = self.images.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(images.get(id).cloned())
    }
}
