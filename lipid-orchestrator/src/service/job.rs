//! Job Service
//!
//! Lifecycle controller: creates job documents, hands them to the dispatch
//! strategy and applies worker merge patches.

use lipid_core::domain::job::{Job, JobId, JobPatch, MergeOutcome, Mode};
use lipid_core::dto::job::{CreateJob, DispatchMessage};
use lipid_core::error::CoreError;
use lipid_core::storage::StorageUri;
use lipid_core::store::JobStore;
use std::sync::Arc;

use super::ServiceError;
use crate::dispatch::DispatchStrategy;

pub struct JobService {
    store: Arc<dyn JobStore>,
    dispatcher: Arc<dyn DispatchStrategy>,
}

impl JobService {
    pub fn new(store: Arc<dyn JobStore>, dispatcher: Arc<dyn DispatchStrategy>) -> Self {
        Self { store, dispatcher }
    }

    /// Create a queued job and dispatch it once
    ///
    /// When the dispatch hand-off fails the document stays queued, the
    /// failure text is recorded in its `error` field and the error carries
    /// the job id.
    pub async fn create(&self, req: CreateJob) -> Result<JobId, ServiceError> {
        let mode: Mode = req.mode.parse()?;

        if req.image_id.trim().is_empty() {
            return Err(CoreError::Validation("imageId cannot be empty".to_string()).into());
        }

        let input_ref = match req.gs_input.as_deref().map(str::trim) {
            Some(input) if !input.is_empty() => input.parse::<StorageUri>()?.to_string(),
            _ => String::new(),
        };

        let job = Job::queued(JobId::generate(), req.image_id, mode, chrono::Utc::now());
        self.store.insert(&job).await?;

        tracing::info!("Job created: {} ({} on image {})", job.id, mode, job.image_id);

        let message = DispatchMessage {
            job_id: job.id.clone(),
            mode,
            image_id: job.image_id.clone(),
            input_ref,
        };

        if let Err(err) = self.dispatcher.submit(&message).await {
            tracing::error!(
                "Dispatch of job {} via {} failed: {}",
                job.id,
                self.dispatcher.name(),
                err
            );

            if let Err(store_err) = self
                .store
                .merge(&job.id, JobPatch::error(err.to_string()))
                .await
            {
                tracing::warn!(
                    "Failed to record dispatch error on job {}: {}",
                    job.id,
                    store_err
                );
            }

            return Err(ServiceError::Dispatch {
                job_id: job.id,
                source: err,
            });
        }

        Ok(job.id)
    }

    pub async fn get(&self, id: &JobId) -> Result<Job, ServiceError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| CoreError::job_not_found(id).into())
    }

    /// Apply a worker patch
    pub async fn merge(&self, id: &JobId, patch: JobPatch) -> Result<MergeOutcome, ServiceError> {
        let outcome = self
            .store
            .merge(id, patch)
            .await?
            .ok_or_else(|| CoreError::job_not_found(id))?;

        if !outcome.is_applied() {
            tracing::debug!("Merge into job {} not applied: {:?}", id, outcome);
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::testing::RecordingDispatcher;
    use lipid_core::domain::job::JobStatus;
    use lipid_core::store::InMemoryJobStore;

    fn request(mode: &str, gs_input: Option<&str>) -> CreateJob {
        CreateJob {
            image_id: "img1".to_string(),
            mode: mode.to_string(),
            gs_input: gs_input.map(str::to_string),
        }
    }

    fn service(dispatcher: Arc<RecordingDispatcher>) -> (JobService, Arc<InMemoryJobStore>) {
        let store = Arc::new(InMemoryJobStore::new());
        (JobService::new(store.clone(), dispatcher), store)
    }

    #[tokio::test]
    async fn test_create_writes_queued_document_and_dispatches() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let (service, _) = service(dispatcher.clone());

        let id = service
            .create(request("40x", Some("gs://uploads/uploads/1_a.svs")))
            .await
            .unwrap();

        let job = service.get(&id).await.unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.stage, "init");
        assert_eq!(job.pct, 0);
        assert_eq!(job.mode, Mode::X40);

        let submitted = dispatcher.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].job_id, id);
        assert_eq!(submitted[0].input_ref, "gs://uploads/uploads/1_a.svs");
    }

    #[tokio::test]
    async fn test_each_create_allocates_a_new_id() {
        let (service, _) = service(Arc::new(RecordingDispatcher::default()));
        let a = service.create(request("20X", None)).await.unwrap();
        let b = service.create(request("20X", None)).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_invalid_mode_creates_nothing() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let (service, _) = service(dispatcher.clone());

        let err = service.create(request("99X", None)).await.unwrap_err();

        assert!(matches!(err, ServiceError::Core(CoreError::Validation(_))));
        assert!(dispatcher.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_input_is_rejected() {
        let (service, _) = service(Arc::new(RecordingDispatcher::default()));

        assert!(matches!(
            service.create(request("40X", Some("/tmp/a.svs"))).await,
            Err(ServiceError::Core(CoreError::Validation(_)))
        ));

        let mut empty_image = request("40X", None);
        empty_image.image_id = " ".to_string();
        assert!(matches!(
            service.create(empty_image).await,
            Err(ServiceError::Core(CoreError::Validation(_)))
        ));
    }

    #[tokio::test]
    async fn test_dispatch_failure_leaves_job_queued_with_error() {
        let (service, _) = service(Arc::new(RecordingDispatcher::refusing()));

        let err = service.create(request("40X", None)).await.unwrap_err();
        let ServiceError::Dispatch { job_id, .. } = err else {
            panic!("expected dispatch error, got {err:?}");
        };

        let job = service.get(&job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.pct, 0);
        assert!(job.error.unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_get_unknown_job() {
        let (service, _) = service(Arc::new(RecordingDispatcher::default()));
        assert!(matches!(
            service.get(&JobId::from("nonexistent")).await,
            Err(ServiceError::Core(CoreError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_merge_reports_outcome() {
        let (service, _) = service(Arc::new(RecordingDispatcher::default()));
        let id = service.create(request("40X", None)).await.unwrap();

        assert_eq!(
            service
                .merge(&id, JobPatch::progress("convert", 10, "probing"))
                .await
                .unwrap(),
            MergeOutcome::Applied
        );
        assert_eq!(
            service
                .merge(&id, JobPatch::progress("init", 0, "late"))
                .await
                .unwrap(),
            MergeOutcome::Stale
        );
        assert!(matches!(
            service
                .merge(&JobId::from("nope"), JobPatch::failed("x"))
                .await,
            Err(ServiceError::Core(CoreError::NotFound { .. }))
        ));
    }
}
