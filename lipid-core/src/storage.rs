//! Storage URIs
//!
//! Blobs are addressed as `gs://{bucket}/{path}`.

use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

pub const GS_SCHEME: &str = "gs://";

/// A fully-qualified blob address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageUri {
    pub bucket: String,
    pub path: String,
}

impl StorageUri {
    pub fn new(bucket: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            path: path.into(),
        }
    }

    /// Last path segment
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Final extension of the object name including the dot, e.g. `".czi"`
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        name.rfind('.').filter(|&idx| idx > 0).map(|idx| &name[idx..])
    }
}

impl FromStr for StorageUri {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix(GS_SCHEME).ok_or_else(|| {
            CoreError::Validation(format!("Storage URI '{s}' must start with {GS_SCHEME}"))
        })?;

        match rest.split_once('/') {
            Some((bucket, path)) if !bucket.is_empty() && !path.is_empty() => {
                Ok(Self::new(bucket, path))
            }
            _ => Err(CoreError::Validation(format!(
                "Storage URI '{s}' must have the form {GS_SCHEME}bucket/path"
            ))),
        }
    }
}

impl fmt::Display for StorageUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{GS_SCHEME}{}/{}", self.bucket, self.path)
    }
}
