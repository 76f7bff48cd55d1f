//! Analysis stages
//!
//! 40X slides go through the whole-slide analysis, 20X slides through the
//! tiled segmentation. Both are external programs writing their artifacts
//! into the output directory.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

use super::process::run_tool;

#[async_trait]
pub trait AnalysisStage: Send + Sync {
    /// Human-readable label for progress logs
    fn label(&self) -> &str;

    /// Analyzes `input`, writing artifacts under `output_dir`
    async fn analyze(&self, input: &Path, output_dir: &Path) -> Result<()>;
}

/// Analysis stage backed by an external program
pub struct CommandAnalysisStage {
    label: String,
    command: String,
}

impl CommandAnalysisStage {
    pub fn new(label: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            command: command.into(),
        }
    }
}

#[async_trait]
impl AnalysisStage for CommandAnalysisStage {
    fn label(&self) -> &str {
        &self.label
    }

    async fn analyze(&self, input: &Path, output_dir: &Path) -> Result<()> {
        run_tool(&self.command, input, output_dir).await
    }
}
