//! Repository layer
//!
//! Repositories abstract communication with the orchestrator. They provide
//! simple, focused interfaces without any business logic.
//!
//! All repositories are trait-based to enable testing and mocking.

mod jobs;

// Re-export traits
pub use jobs::JobRepository;

// Re-export implementations
pub use jobs::HttpJobRepository;
