//! Signed URL Cache
//!
//! Bounded LRU of signed URLs. Keys include a 55-second time window, so
//! repeated requests inside one window get the same URL string while every
//! URL still expires relative to the moment it was signed.

use chrono::{DateTime, Utc};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

use crate::signing::SignError;

/// Width of one cache window in seconds
pub const CACHE_WINDOW_SECS: i64 = 55;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub bucket: String,
    pub blob_path: String,
    pub expires_in_secs: u64,
    pub window: i64,
}

impl CacheKey {
    pub fn new(
        bucket: impl Into<String>,
        blob_path: impl Into<String>,
        expires_in_secs: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            blob_path: blob_path.into(),
            expires_in_secs,
            window: now.timestamp().div_euclid(CACHE_WINDOW_SECS),
        }
    }
}

pub struct SignedUrlCache {
    entries: Mutex<LruCache<CacheKey, String>>,
}

impl SignedUrlCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Cached URL for `key`, signing and caching one if absent
    ///
    /// The lock is released while `sign` runs; two concurrent misses may
    /// both sign, and the later one wins the slot.
    pub fn get_or_sign<F>(&self, key: CacheKey, sign: F) -> Result<String, SignError>
    where
        F: FnOnce() -> Result<String, SignError>,
    {
        if let Some(url) = self.lock().get(&key) {
            return Ok(url.clone());
        }

        let url = sign()?;
        self.lock().put(key, url.clone());
        Ok(url)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<CacheKey, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
