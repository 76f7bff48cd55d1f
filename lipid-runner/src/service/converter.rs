//! Format conversion
//!
//! Vendor formats the analysis tools cannot read are normalized to a
//! pyramidal OME-TIFF first.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

use super::process::run_tool;

/// Source extensions that require conversion
const CONVERTED_EXTENSIONS: &[&str] = &[".czi", ".vsi"];

/// Whether a file with this extension (including the dot) is converted
pub fn needs_conversion(extension: Option<&str>) -> bool {
    extension.is_some_and(|ext| {
        CONVERTED_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext))
    })
}

#[async_trait]
pub trait Converter: Send + Sync {
    /// Writes a pyramidal OME-TIFF of `input` to `output`
    async fn to_ome_tiff(&self, input: &Path, output: &Path) -> Result<()>;
}

/// Converter backed by an external program
pub struct CommandConverter {
    command: String,
}

impl CommandConverter {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl Converter for CommandConverter {
    async fn to_ome_tiff(&self, input: &Path, output: &Path) -> Result<()> {
        run_tool(&self.command, input, output).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_conversion() {
        assert!(needs_conversion(Some(".czi")));
        assert!(needs_conversion(Some(".VSI")));
        assert!(!needs_conversion(Some(".svs")));
        assert!(!needs_conversion(Some(".tif")));
        assert!(!needs_conversion(None));
    }
}
