//! Service layer
//!
//! Collaborators the pipeline drives: the blob store, the analysis stages
//! and the format converter.
//!
//! All services are trait-based to enable testing and dependency injection.

mod analysis;
mod blob_store;
mod converter;
mod process;

// Re-export traits
pub use analysis::AnalysisStage;
pub use blob_store::BlobStore;
pub use converter::Converter;

// Re-export implementations
pub use analysis::CommandAnalysisStage;
pub use blob_store::FsBlobStore;
pub use converter::{CommandConverter, needs_conversion};
