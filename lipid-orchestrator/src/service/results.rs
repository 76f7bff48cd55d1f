//! Result Access Gateway
//!
//! Turns a job's `result_refs` into time-limited download URLs.

use lipid_core::domain::job::JobId;
use lipid_core::dto::results::{SignedUrls, SignedUrlsQuery};
use lipid_core::error::CoreError;
use lipid_core::store::JobStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::ServiceError;
use super::url_cache::{CacheKey, SignedUrlCache};
use crate::clock::Clock;
use crate::signing::{HttpMethod, SignRequest, UrlSigner};

pub struct ResultGateway {
    store: Arc<dyn JobStore>,
    signer: Arc<dyn UrlSigner>,
    cache: SignedUrlCache,
    clock: Arc<dyn Clock>,
    results_bucket: String,
}

impl ResultGateway {
    pub fn new(
        store: Arc<dyn JobStore>,
        signer: Arc<dyn UrlSigner>,
        cache: SignedUrlCache,
        clock: Arc<dyn Clock>,
        results_bucket: String,
    ) -> Self {
        Self {
            store,
            signer,
            cache,
            clock,
            results_bucket,
        }
    }

    /// Signed GET URLs for the job's artifacts, optionally narrowed by prefix
    pub async fn signed_urls(
        &self,
        job_id: &JobId,
        query: &SignedUrlsQuery,
    ) -> Result<SignedUrls, ServiceError> {
        let minutes = query.minutes()?;
        let expires_in = Duration::from_secs(u64::from(minutes) * 60);
        let prefix = query.prefix.as_deref().unwrap_or("");

        let refs = self
            .store
            .result_refs(job_id)
            .await?
            .ok_or_else(|| CoreError::job_not_found(job_id))?;

        let now = self.clock.now();
        let mut files = BTreeMap::new();

        for rel_path in refs.keys().filter(|key| key.starts_with(prefix)) {
            let blob_path = format!("{}/{}", job_id, rel_path);
            let key = CacheKey::new(
                self.results_bucket.as_str(),
                blob_path.as_str(),
                expires_in.as_secs(),
                now,
            );

            let url = self.cache.get_or_sign(key, || {
                self.signer.sign(&SignRequest {
                    bucket: &self.results_bucket,
                    path: &blob_path,
                    method: HttpMethod::Get,
                    expires_in,
                    content_type: None,
                    now,
                })
            })?;

            files.insert(rel_path.clone(), url);
        }

        tracing::debug!(
            "Signed {} of {} result URLs for job {}",
            files.len(),
            refs.len(),
            job_id
        );

        Ok(SignedUrls {
            job_id: job_id.clone(),
            files,
        })
    }
}
