//! Blob store
//!
//! Buckets are reached through a filesystem mount (e.g. gcsfuse):
//! `gs://bucket/path` lives at `{root}/bucket/path`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lipid_core::storage::StorageUri;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Copies the object at `uri` to the local file `dest`
    async fn download(&self, uri: &StorageUri, dest: &Path) -> Result<()>;

    /// Copies the local file `src` to the object at `uri`
    async fn upload(&self, src: &Path, uri: &StorageUri) -> Result<()>;
}

/// Mounted-bucket implementation of BlobStore
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Local path of `uri` under the mount root
    pub fn local_path(&self, uri: &StorageUri) -> Result<PathBuf> {
        let relative = Path::new(&uri.bucket).join(&uri.path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            anyhow::bail!("Refusing storage path outside the mount: {}", uri);
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn download(&self, uri: &StorageUri, dest: &Path) -> Result<()> {
        let src = self.local_path(uri)?;
        debug!("Downloading {} -> {}", uri, dest.display());

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::copy(&src, dest)
            .await
            .with_context(|| format!("Failed to download {}", uri))?;

        Ok(())
    }

    async fn upload(&self, src: &Path, uri: &StorageUri) -> Result<()> {
        let dest = self.local_path(uri)?;
        debug!("Uploading {} -> {}", src.display(), uri);

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::copy(src, &dest)
            .await
            .with_context(|| format!("Failed to upload {}", uri))?;

        Ok(())
    }
}
